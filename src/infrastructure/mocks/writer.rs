//! In-memory level writer for testing.

use crate::application::ports::LevelWriter;
use crate::domain::level::Level;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Level writer that keeps every write in memory.
///
/// Clones share the same buffer, so a test can hand one clone to a pipeline
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    writes: Mutex<Vec<(Level, Vec<u8>)>>,
    flushes: AtomicUsize,
    rotations: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn writes(&self) -> std::sync::MutexGuard<'_, Vec<(Level, Vec<u8>)>> {
        self.inner
            .writes
            .lock()
            .expect("MemoryWriter mutex poisoned - a test thread panicked while holding the lock")
    }

    /// Every write as `(level, text)`.
    pub fn records(&self) -> Vec<(Level, String)> {
        self.writes()
            .iter()
            .map(|(level, bytes)| (*level, String::from_utf8_lossy(bytes).into_owned()))
            .collect()
    }

    /// Every write as text.
    pub fn lines(&self) -> Vec<String> {
        self.records().into_iter().map(|(_, line)| line).collect()
    }

    /// All writes concatenated.
    pub fn contents(&self) -> String {
        self.lines().concat()
    }

    pub fn len(&self) -> usize {
        self.writes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush_count(&self) -> usize {
        self.inner.flushes.load(Ordering::SeqCst)
    }

    pub fn rotate_count(&self) -> usize {
        self.inner.rotations.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }
}

impl LevelWriter for MemoryWriter {
    fn write_level(&self, level: Level, buf: &[u8]) -> io::Result<usize> {
        self.writes().push((level, buf.to_vec()));
        Ok(buf.len())
    }

    fn flush(&self) -> io::Result<()> {
        self.inner.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rotate(&self) -> io::Result<()> {
        self.inner.rotations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.inner.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
