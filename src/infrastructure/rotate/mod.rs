//! Size and time based log file rotation.
//!
//! [`RotatingWriter`] owns the live file; [`maintenance`] ages out and
//! compresses what it rotates away.

pub mod error;
pub mod maintenance;
pub mod options;
mod writer;

pub use error::RotateError;
pub use maintenance::{gzip_file, run_maintenance, MaintenanceReport};
pub use options::{
    FileRotatedEvent, RotateOptions, RotateOptionsBuilder, RotationHandler, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_MAX_AGE, DEFAULT_ROTATE_LAYOUT,
};
pub use writer::RotatingWriter;
