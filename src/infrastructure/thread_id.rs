//! Small sequential thread identifiers for `%gid`.

use crate::application::ports::ThreadIdSource;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_ID.fetch_add(1, Ordering::Relaxed);
}

/// Id of the current thread, assigned on first use and stable afterwards.
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}

/// Thread id source backed by a thread-local counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalIds;

impl ThreadLocalIds {
    pub fn new() -> Self {
        Self
    }
}

impl ThreadIdSource for ThreadLocalIds {
    fn current(&self) -> u64 {
        current_thread_id()
    }
}
