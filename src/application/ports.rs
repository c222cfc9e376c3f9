//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::entry::{CallerFrame, Entry};
use crate::domain::level::Level;
use chrono::{DateTime, Local};
use std::fmt::Debug;
use std::hash::Hash;
use std::io;

/// Port for obtaining the current wall-clock time.
///
/// Rotation buckets and file aging are computed from this clock, so tests can
/// cross bucket boundaries without sleeping.
/// Infrastructure provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current time.
    fn now(&self) -> DateTime<Local>;
}

/// Port for resolving call frames above the logging facade.
pub trait CallerResolver: Send + Sync + Debug {
    /// Resolve the frame `skip` levels above the facade (0 = direct caller).
    fn resolve(&self, skip: usize) -> Option<CallerFrame>;
}

/// Port for identifying the calling thread.
pub trait ThreadIdSource: Send + Sync + Debug {
    /// A small, stable identifier of the current thread.
    fn current(&self) -> u64;
}

/// Port for ambient per-call context values rendered by `%context`.
pub trait ContextStore: Send + Sync + Debug {
    /// Look up a named value.
    fn get(&self, name: &str) -> Option<String>;
}

/// Port for byte sinks that receive rendered records.
///
/// Methods take `&self`; implementations synchronize internally so one sink
/// can be shared between threads.
pub trait LevelWriter: Send + Sync + Debug {
    /// Write one rendered record.
    fn write_level(&self, level: Level, buf: &[u8]) -> io::Result<usize>;

    /// Flush buffered output.
    fn flush(&self) -> io::Result<()>;

    /// Force a rotation, for sinks that rotate.
    fn rotate(&self) -> io::Result<()> {
        Ok(())
    }

    /// Flush and release underlying resources. Must be idempotent.
    fn close(&self) -> io::Result<()> {
        self.flush()
    }
}

/// Port for delivering records that leave the synchronous logging path,
/// such as buffered messages flushed by a ticker or drained from the async
/// queue.
pub trait RecordSink: Send + Sync {
    /// Render and persist a record.
    fn emit(&self, entry: Entry);
}

/// Port for concurrent key-value storage.
///
/// This abstraction allows the application layer to store and retrieve values
/// without depending on specific concurrent data structure implementations.
/// Infrastructure provides concrete implementations (ShardedStorage).
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Access an entry with mutable access, creating it if necessary.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    /// * `factory` - Function to create a new value if the key doesn't exist
    /// * `accessor` - Function that gets mutable access to the value
    ///
    /// # Returns
    /// The result from the accessor function
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Clear all entries from the storage.
    fn clear(&self);

    /// Iterate over all entries, providing access to both key and value.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V);
}
