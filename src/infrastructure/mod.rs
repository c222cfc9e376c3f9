//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time, UTC, mock)
//! - Rotating log files and their retention
//! - Plain `io::Write` sinks such as stdout
//! - Thread ids and thread-local context values
//! - Storage implementations (sharded maps)
//! - Tracing integration (Layer trait)

pub mod clock;
pub mod context;
pub mod io_writer;
pub mod layer;
pub mod rotate;
pub mod storage;
pub mod thread_id;
pub(crate) mod visitor;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for clocks,
/// writers and diagnostics.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// tracing-logroll = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
