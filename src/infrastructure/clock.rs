//! Clock adapters for time operations.
//!
//! Provides [`SystemClock`] (local wall time) and [`UtcClock`] for production use.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a controllable test clock.
//! Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! tracing-logroll = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use chrono::{DateTime, Local, TimeDelta, Utc};

/// System clock reporting local wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// System clock whose readings fall on UTC calendar days.
///
/// Rotation buckets are derived from the clock's local rendering, so with
/// this clock a daily bucket changes at UTC midnight.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcClock;

impl UtcClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for UtcClock {
    fn now(&self) -> DateTime<Local> {
        let offset = *Local::now().offset();
        let shift = TimeDelta::seconds(i64::from(offset.local_minus_utc()));
        // Shift so that the local rendering shows UTC fields.
        DateTime::from_naive_utc_and_offset(Utc::now().naive_utc() - shift, offset)
    }
}
