//! Inline rate limiting of repetitive messages.
//!
//! The controller inspects each record for an `[L:...]` directive and decides
//! whether it is written now, held as its key's pending message, dropped, or
//! handed to the async queue. Keys with a flush period get a ticker thread
//! that writes the pending message once per period.

use crate::application::async_queue::{AsyncQueue, QueueOutcome};
use crate::application::metrics::Metrics;
use crate::application::ports::{RecordSink, Storage};
use crate::application::registry::{KeyRegistry, KeyState, NamedConfigRegistry, Offer};
use crate::domain::entry::Entry;
use crate::domain::limit::{parse_directive, LimitDirective};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

/// Decision for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Write this record now
    Emit(Entry),
    /// Held as the pending message of `key`
    Buffered { key: String },
    /// Discarded by `[L:off]` or the minimum level
    Dropped,
    /// Handed to the async queue
    Queued(QueueOutcome),
}

/// Async queue settings, used when the first `[L:async]` record arrives.
#[derive(Debug, Clone, Copy)]
pub struct AsyncQueueConfig {
    pub capacity: usize,
    pub drop_threshold: u64,
}

/// Decides what happens to records carrying limit directives.
pub struct SuppressionController<S>
where
    S: Storage<String, Arc<KeyState>> + Clone,
{
    keys: KeyRegistry<S>,
    named: Arc<NamedConfigRegistry>,
    sink: Arc<dyn RecordSink>,
    metrics: Metrics,
    queue_config: AsyncQueueConfig,
    queue: OnceLock<Option<AsyncQueue>>,
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
    tickers: Mutex<Vec<JoinHandle<()>>>,
}

impl<S> SuppressionController<S>
where
    S: Storage<String, Arc<KeyState>> + Clone,
{
    /// Create a controller writing flushed and queued records to `sink`.
    pub fn new(
        keys: KeyRegistry<S>,
        named: Arc<NamedConfigRegistry>,
        sink: Arc<dyn RecordSink>,
        metrics: Metrics,
        queue_config: AsyncQueueConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded(0);
        Self {
            keys,
            named,
            sink,
            metrics,
            queue_config,
            queue: OnceLock::new(),
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
            tickers: Mutex::new(Vec::new()),
        }
    }

    /// Decide what to do with `entry`.
    ///
    /// Records without a well formed directive are returned unchanged as
    /// [`Verdict::Emit`]. Otherwise the directive is removed from the
    /// message before the record is written, buffered or queued.
    pub fn consider(&self, mut entry: Entry) -> Verdict {
        let parsed = match parse_directive(&entry.message, |name| self.named.get(name)) {
            Some(parsed) => parsed,
            None => return Verdict::Emit(entry),
        };
        let directive = parsed.directive;
        entry.message = parsed.message.into_owned();

        match directive {
            LimitDirective::Off => {
                self.metrics.record_dropped();
                Verdict::Dropped
            }
            LimitDirective::Async => match self.queue() {
                Some(queue) => Verdict::Queued(queue.enqueue(entry)),
                None => Verdict::Emit(entry),
            },
            LimitDirective::Limit(config) if !config.applies_to(entry.level) => {
                Verdict::Emit(entry)
            }
            LimitDirective::Limit(config) => {
                let (state, _) = self.keys.get_or_create(&config);
                let verdict = match state.offer(entry) {
                    Offer::Emit(entry) => Verdict::Emit(entry),
                    Offer::Buffered { .. } => {
                        self.metrics.record_buffered();
                        Verdict::Buffered {
                            key: state.key().to_string(),
                        }
                    }
                };
                if !state.config().every_time.is_zero() {
                    self.ensure_ticker(&state);
                }
                verdict
            }
        }
    }

    /// Write every key's pending message now, as a tick would.
    pub fn flush_pending(&self) -> usize {
        let mut flushed = 0;
        for state in self.keys.states() {
            if let Some(entry) = state.take_pending() {
                self.metrics.record_flushed();
                self.sink.emit(entry);
                flushed += 1;
            }
        }
        flushed
    }

    pub fn keys(&self) -> &KeyRegistry<S> {
        &self.keys
    }

    pub fn named(&self) -> &Arc<NamedConfigRegistry> {
        &self.named
    }

    /// The async queue, if one has been started.
    pub fn async_queue(&self) -> Option<&AsyncQueue> {
        self.queue.get().and_then(Option::as_ref)
    }

    /// Stop tickers and the async queue. Pending and queued records are
    /// written before their threads exit. Idempotent.
    pub fn close(&self) {
        drop(
            self.stop_tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let tickers =
            std::mem::take(&mut *self.tickers.lock().unwrap_or_else(PoisonError::into_inner));
        for ticker in tickers {
            if ticker.join().is_err() {
                tracing::error!("limit ticker panicked");
            }
        }
        if let Some(queue) = self.async_queue() {
            queue.close();
        }
    }

    fn queue(&self) -> Option<&AsyncQueue> {
        self.queue
            .get_or_init(|| {
                match AsyncQueue::start(
                    self.queue_config.capacity,
                    self.queue_config.drop_threshold,
                    Arc::clone(&self.sink),
                    self.metrics.clone(),
                ) {
                    Ok(queue) => Some(queue),
                    Err(error) => {
                        tracing::error!(%error, "failed to start async log queue, writing synchronously");
                        None
                    }
                }
            })
            .as_ref()
    }

    fn ensure_ticker(&self, state: &Arc<KeyState>) {
        if !state.claim_ticker() {
            return;
        }
        let mut tickers = self.tickers.lock().unwrap_or_else(PoisonError::into_inner);
        // Closed: leave the pending message for an explicit flush.
        if self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
        {
            state.release_ticker();
            return;
        }

        let period = state.config().every_time;
        let stop = self.stop_rx.clone();
        let sink = Arc::clone(&self.sink);
        let metrics = self.metrics.clone();
        let ticked = Arc::clone(state);

        let spawned = thread::Builder::new()
            .name(format!("logroll-limit-{}", state.key()))
            .spawn(move || {
                let ticks = tick(period);
                loop {
                    let stopping = select! {
                        recv(ticks) -> _ => false,
                        recv(stop) -> _ => true,
                    };
                    if let Some(entry) = ticked.take_pending() {
                        metrics.record_flushed();
                        sink.emit(entry);
                    }
                    if stopping {
                        return;
                    }
                }
            });

        match spawned {
            Ok(handle) => tickers.push(handle),
            Err(error) => {
                state.release_ticker();
                tracing::error!(key = state.key(), %error, "failed to start limit ticker");
            }
        }
    }
}

impl<S> Drop for SuppressionController<S>
where
    S: Storage<String, Arc<KeyState>> + Clone,
{
    fn drop(&mut self) {
        self.close();
    }
}

impl<S> std::fmt::Debug for SuppressionController<S>
where
    S: Storage<String, Arc<KeyState>> + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressionController")
            .field("keys", &self.keys.len())
            .field("named", &self.named.len())
            .field("queue_config", &self.queue_config)
            .finish()
    }
}
