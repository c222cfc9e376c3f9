//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain types and owns the runtime state:
//! - Layout engine (compiled patterns and rendering)
//! - Named limit configurations and per-key suppression state
//! - Suppression controller with its tickers and async queue
//! - The log pipeline and its builder
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod async_queue;
pub mod layout;
pub mod metrics;
pub mod pipeline;
pub mod ports;
pub mod registry;
pub mod suppression;
