//! Registries backing the suppression controller.
//!
//! [`NamedConfigRegistry`] holds limit configurations referenced by name from
//! `[L:<name>]` directives. [`KeyRegistry`] holds the per-key suppression
//! state, created lazily the first time a key is seen.

use crate::application::ports::Storage;
use crate::domain::entry::Entry;
use crate::domain::limit::LimitConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Limit configurations addressable by name.
///
/// # Examples
///
/// ```
/// use tracing_logroll::{LimitConfig, NamedConfigRegistry};
/// use std::time::Duration;
///
/// let registry = NamedConfigRegistry::new();
/// registry.register(LimitConfig::new("sync", 100, Duration::from_secs(15)));
///
/// assert_eq!(registry.get("sync").unwrap().every_num, 100);
/// assert!(registry.get("other").is_none());
/// ```
#[derive(Debug, Default)]
pub struct NamedConfigRegistry {
    configs: RwLock<HashMap<String, LimitConfig>>,
}

impl NamedConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a configuration under its key, replacing any previous one.
    pub fn register(&self, config: LimitConfig) {
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.key.clone(), config);
    }

    /// Look up a configuration by name.
    pub fn get(&self, name: &str) -> Option<LimitConfig> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of offering a message to a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Offer {
    /// The message hit the `every_num` boundary and should be written now
    Emit(Entry),
    /// The message became the key's pending message
    Buffered {
        /// Whether an older pending message was overwritten
        replaced: bool,
    },
}

#[derive(Debug, Default)]
struct Counter {
    num: u32,
    pending: Option<Entry>,
}

/// Suppression state of one key.
///
/// The configuration is fixed by the first message seen for the key.
#[derive(Debug)]
pub struct KeyState {
    config: LimitConfig,
    counter: Mutex<Counter>,
    ticker_started: AtomicBool,
}

impl KeyState {
    pub fn new(config: LimitConfig) -> Self {
        Self {
            config,
            counter: Mutex::new(Counter::default()),
            ticker_started: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    pub fn config(&self) -> &LimitConfig {
        &self.config
    }

    fn counter(&self) -> MutexGuard<'_, Counter> {
        self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the counter state machine for one message.
    ///
    /// With `every_num > 0` the 1st, `every_num + 1`th, ... messages are
    /// emitted and clear the pending slot; all others overwrite it. With
    /// `every_num == 0` every message is buffered for the ticker.
    pub fn offer(&self, entry: Entry) -> Offer {
        let mut counter = self.counter();
        let every_num = self.config.every_num;

        if every_num > 0 {
            if counter.num == every_num {
                counter.num = 0;
            }
            if counter.num == 0 {
                counter.num += 1;
                counter.pending = None;
                return Offer::Emit(entry);
            }
        }

        counter.num = counter.num.saturating_add(1);
        let replaced = counter.pending.replace(entry).is_some();
        Offer::Buffered { replaced }
    }

    /// Take the pending message, leaving the slot empty.
    pub fn take_pending(&self) -> Option<Entry> {
        self.counter().pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.counter().pending.is_some()
    }

    /// Mark the ticker as started; true only for the first caller.
    pub(crate) fn claim_ticker(&self) -> bool {
        !self.ticker_started.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn release_ticker(&self) {
        self.ticker_started.store(false, Ordering::Release);
    }
}

/// Registry of per-key suppression state.
///
/// Generic over the storage implementation; in production this is
/// `Arc<ShardedStorage<String, Arc<KeyState>>>`.
#[derive(Clone, Debug)]
pub struct KeyRegistry<S>
where
    S: Storage<String, Arc<KeyState>> + Clone,
{
    storage: S,
}

impl<S> KeyRegistry<S>
where
    S: Storage<String, Arc<KeyState>> + Clone,
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Get the state for `config.key`, creating it from `config` if needed.
    ///
    /// The flag is true when the state was created by this call.
    pub fn get_or_create(&self, config: &LimitConfig) -> (Arc<KeyState>, bool) {
        let mut created = false;
        let state = self.storage.with_entry_mut(
            config.key.clone(),
            || {
                created = true;
                Arc::new(KeyState::new(config.clone()))
            },
            |state| Arc::clone(state),
        );
        (state, created)
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Clear all tracked state.
    pub fn clear(&self) {
        self.storage.clear();
    }

    /// All tracked states.
    pub fn states(&self) -> Vec<Arc<KeyState>> {
        let mut states = Vec::with_capacity(self.storage.len());
        self.storage.for_each(|_, state| states.push(Arc::clone(state)));
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::level::Level;
    use crate::infrastructure::storage::ShardedStorage;
    use std::time::Duration;

    fn registry() -> KeyRegistry<Arc<ShardedStorage<String, Arc<KeyState>>>> {
        KeyRegistry::new(Arc::new(ShardedStorage::new()))
    }

    fn entry(n: u32) -> Entry {
        Entry::new(Level::Info, format!("#{}", n))
    }

    #[test]
    fn test_every_third_message_is_emitted() {
        let state = KeyState::new(LimitConfig::new("k", 3, Duration::ZERO));
        let emitted: Vec<u32> = (1..=7)
            .filter(|&n| matches!(state.offer(entry(n)), Offer::Emit(_)))
            .collect();

        assert_eq!(emitted, vec![1, 4, 7]);
        // #7 cleared the slot that #5 and #6 overwrote
        assert!(!state.has_pending());
    }

    #[test]
    fn test_pending_is_last_write_wins() {
        let state = KeyState::new(LimitConfig::new("k", 3, Duration::ZERO));
        assert_eq!(state.offer(entry(1)), Offer::Emit(entry(1)));
        assert_eq!(state.offer(entry(2)), Offer::Buffered { replaced: false });
        assert_eq!(state.offer(entry(3)), Offer::Buffered { replaced: true });

        assert_eq!(state.take_pending(), Some(entry(3)));
        assert_eq!(state.take_pending(), None);
    }

    #[test]
    fn test_zero_every_num_buffers_everything() {
        let state = KeyState::new(LimitConfig::new("k", 0, Duration::from_secs(1)));
        for n in 1..=3 {
            assert!(matches!(state.offer(entry(n)), Offer::Buffered { .. }));
        }
        assert_eq!(state.take_pending(), Some(entry(3)));
    }

    #[test]
    fn test_get_or_create_keeps_first_config() {
        let registry = registry();
        let first = LimitConfig::new("k", 2, Duration::ZERO);
        let second = LimitConfig::new("k", 9, Duration::ZERO);

        let (state, created) = registry.get_or_create(&first);
        assert!(created);
        let (again, created) = registry.get_or_create(&second);
        assert!(!created);

        assert!(Arc::ptr_eq(&state, &again));
        assert_eq!(again.config().every_num, 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.states().len(), 1);
    }

    #[test]
    fn test_ticker_claimed_once() {
        let state = KeyState::new(LimitConfig::new("k", 0, Duration::from_secs(1)));
        assert!(state.claim_ticker());
        assert!(!state.claim_ticker());
        state.release_ticker();
        assert!(state.claim_ticker());
    }

    #[test]
    fn test_named_registry_replaces() {
        let registry = NamedConfigRegistry::new();
        assert!(registry.is_empty());
        registry.register(LimitConfig::new("a", 1, Duration::ZERO));
        registry.register(LimitConfig::new("a", 5, Duration::ZERO).with_level(Level::Warn));

        let config = registry.get("a").unwrap();
        assert_eq!(config.every_num, 5);
        assert_eq!(config.level, Level::Warn);
        assert_eq!(registry.len(), 1);
    }
}
