//! Ambient per-thread context values for `%context` directives.

use crate::application::ports::ContextStore;
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static CONTEXT: RefCell<HashMap<String, String>> = RefCell::new(HashMap::new());
}

/// Context store reading the current thread's values.
///
/// Values are set with [`ThreadLocalContext::set`] and removed when the
/// returned guard is dropped.
///
/// # Examples
///
/// ```
/// use tracing_logroll::infrastructure::context::ThreadLocalContext;
/// use tracing_logroll::application::ports::ContextStore;
///
/// let store = ThreadLocalContext::new();
/// {
///     let _guard = ThreadLocalContext::set("request", "r-17");
///     assert_eq!(store.get("request").as_deref(), Some("r-17"));
/// }
/// assert_eq!(store.get("request"), None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalContext;

impl ThreadLocalContext {
    pub fn new() -> Self {
        Self
    }

    /// Set `name` on the current thread until the guard drops.
    ///
    /// A previous value is restored when the guard drops.
    #[must_use = "the value is removed when the guard is dropped"]
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> ContextGuard {
        let name = name.into();
        let previous =
            CONTEXT.with(|ctx| ctx.borrow_mut().insert(name.clone(), value.into()));
        ContextGuard { name, previous }
    }
}

impl ContextStore for ThreadLocalContext {
    fn get(&self, name: &str) -> Option<String> {
        CONTEXT.with(|ctx| ctx.borrow().get(name).cloned())
    }
}

/// Restores the previous context value on drop.
#[derive(Debug)]
pub struct ContextGuard {
    name: String,
    previous: Option<String>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            match self.previous.take() {
                Some(previous) => ctx.insert(std::mem::take(&mut self.name), previous),
                None => ctx.remove(&self.name),
            };
        });
    }
}
