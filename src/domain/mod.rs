//! Domain layer - pure types and parsers with no runtime state.
//!
//! This layer contains the vocabulary shared by the rest of the crate:
//! - Severity levels and log entries
//! - Token based time layouts
//! - Inline level tags and rate limit directives
//! - Compact duration strings

pub mod duration;
pub mod entry;
pub mod level;
pub mod level_tag;
pub mod limit;
pub(crate) mod tag;
pub mod time_layout;
