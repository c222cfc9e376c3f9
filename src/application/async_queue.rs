//! Lossy bounded queue for `[L:async]` records.
//!
//! Producers never block: when the queue is full the record is counted as
//! missed. Once the missed count reaches the drop threshold the count starts
//! over and the consumer writes a single `asyncMissed N` notice after the
//! record it is currently handling.

use crate::application::metrics::Metrics;
use crate::application::ports::RecordSink;
use crate::domain::entry::Entry;
use crate::domain::level::Level;
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Default number of missed records before a notice is written.
pub const DEFAULT_DROP_THRESHOLD: u64 = 10_000;

/// What happened to an enqueued record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Enqueued,
    /// The queue was full and the record was lost
    Missed,
    /// The record was lost and a notice carrying the missed count takes its place
    NoticeQueued(u64),
    /// The queue has been closed
    Closed,
}

/// A bounded queue drained by one consumer thread.
#[derive(Debug)]
pub struct AsyncQueue {
    tx: Sender<Entry>,
    missed: AtomicU64,
    notice: Arc<AtomicU64>,
    drop_threshold: u64,
    metrics: Metrics,
    shutdown: Mutex<Option<Sender<()>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncQueue {
    /// Start the consumer thread.
    ///
    /// # Errors
    ///
    /// Fails if the consumer thread cannot be spawned.
    pub fn start(
        capacity: usize,
        drop_threshold: u64,
        sink: Arc<dyn RecordSink>,
        metrics: Metrics,
    ) -> io::Result<Self> {
        let (tx, rx) = bounded(capacity);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let notice = Arc::new(AtomicU64::new(0));

        let consumer = {
            let notice = Arc::clone(&notice);
            thread::Builder::new()
                .name("logroll-async".to_string())
                .spawn(move || consume(rx, shutdown_rx, sink, notice))?
        };

        Ok(Self {
            tx,
            missed: AtomicU64::new(0),
            notice,
            drop_threshold: drop_threshold.max(1),
            metrics,
            shutdown: Mutex::new(Some(shutdown_tx)),
            consumer: Mutex::new(Some(consumer)),
        })
    }

    /// Queue a record without blocking.
    pub fn enqueue(&self, entry: Entry) -> QueueOutcome {
        match self.tx.try_send(entry) {
            Ok(()) => {
                self.metrics.record_async_enqueued();
                QueueOutcome::Enqueued
            }
            Err(TrySendError::Disconnected(_)) => {
                self.metrics.record_async_missed();
                QueueOutcome::Closed
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.record_async_missed();
                let missed = self.missed.fetch_add(1, Ordering::AcqRel) + 1;
                if missed < self.drop_threshold {
                    return QueueOutcome::Missed;
                }
                self.missed.fetch_sub(missed, Ordering::AcqRel);
                self.notice.fetch_add(missed, Ordering::AcqRel);
                tracing::warn!(missed, "async log queue full, records dropped");
                QueueOutcome::NoticeQueued(missed)
            }
        }
    }

    /// Records missed since the last notice.
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Acquire)
    }

    /// Records waiting for the consumer.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }

    /// Stop the consumer after it has drained queued records. Idempotent.
    pub fn close(&self) {
        drop(
            self.shutdown
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let consumer = self
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(consumer) = consumer {
            if consumer.join().is_err() {
                tracing::error!("async log consumer panicked");
            }
        }
    }
}

impl Drop for AsyncQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn consume(
    rx: Receiver<Entry>,
    shutdown: Receiver<()>,
    sink: Arc<dyn RecordSink>,
    notice: Arc<AtomicU64>,
) {
    let deliver = |entry: Entry| {
        sink.emit(entry);
        let missed = notice.swap(0, Ordering::AcqRel);
        if missed > 0 {
            sink.emit(Entry::new(Level::Warn, format!("asyncMissed {}", missed)));
        }
    };

    loop {
        select! {
            recv(rx) -> entry => match entry {
                Ok(entry) => deliver(entry),
                Err(_) => return,
            },
            recv(shutdown) -> _ => {
                for entry in rx.try_iter() {
                    deliver(entry);
                }
                return;
            }
        }
    }
}
