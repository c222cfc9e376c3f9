//! Mock clock for testing.

use crate::application::ports::Clock;
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, so rotation buckets
/// and retention cutoffs can be crossed without sleeping.
///
/// # Examples
///
/// ```
/// use tracing_logroll::infrastructure::mocks::MockClock;
/// use tracing_logroll::application::ports::Clock;
/// use chrono::{Local, TimeZone};
/// use std::time::Duration;
///
/// let start = Local.with_ymd_and_hms(2024, 1, 2, 23, 59, 0).unwrap();
/// let clock = MockClock::new(start);
/// assert_eq!(clock.now(), start);
///
/// // Advance past midnight
/// clock.advance(Duration::from_secs(120));
/// assert_eq!(clock.now().format("%Y-%m-%d").to_string(), "2024-01-03");
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<DateTime<Local>>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific time.
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time += chrono::Duration::from_std(duration).expect("duration out of range");
    }

    /// Set the clock to a specific time.
    pub fn set(&self, time: DateTime<Local>) {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock") =
            time;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Local> {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}
