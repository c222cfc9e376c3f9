//! # tracing-logroll
//!
//! Rotating log files, a pattern layout language and inline rate limiting
//! for the `tracing` ecosystem.
//!
//! A [`LogPipeline`] takes a raw message, reads an optional level tag from it
//! (`E!`, `W!`, ...), lets the suppression controller decide whether the
//! message is written now, held back or dropped, renders it with a
//! [`Layout`] and writes it to every configured sink. The most common sink is
//! a [`RotatingWriter`], which rotates by time bucket and size and cleans up
//! after itself.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tracing_logroll::{LogPipeline, LogPipelineLayer, RotateOptions};
//! use tracing_subscriber::prelude::*;
//! use std::time::Duration;
//!
//! let file = RotateOptions::builder("logs/app.log")
//!     .with_max_size(50 * 1024 * 1024)
//!     .with_max_age(Duration::from_secs(7 * 24 * 3600))
//!     .with_gzip_age(Duration::from_secs(24 * 3600))
//!     .build()
//!     .unwrap();
//!
//! let pipeline = LogPipeline::builder()
//!     .with_layout("%t [%5l] %caller : %fields %msg%n")
//!     .with_rotating_file(file)
//!     .build()
//!     .unwrap();
//!
//! tracing_subscriber::registry()
//!     .with(LogPipelineLayer::new(pipeline.clone()))
//!     .init();
//!
//! tracing::info!(user = 42, "[L:100,15s:login] user logged in");
//! ```
//!
//! ## Layouts
//!
//! A layout pattern mixes literal text with `%` directives:
//!
//! | Directive | Output |
//! |-----------|--------|
//! | `%t{yyyy-MM-dd HH:mm:ss.SSS}` | record time |
//! | `%l{printcolor=true,lowercase=true,length=4}` | level name, width 5 by default |
//! | `%pid`, `%gid` | process id, logging thread id |
//! | `%trace` | trace id, `-` when absent |
//! | `%caller{level=warn,sep=:,skip=1}` | `function file:line` frames |
//! | `%context{name=request}` | a thread-local context value |
//! | `%fields` | structured fields as JSON |
//! | `%msg{singleline=false}` | the message |
//! | `%n` | newline |
//!
//! Widths use the `%-10.20l` form: pad to 10, cut at 20, `-` pads on the
//! right. Time layouts use the tokens `yyyy yy MM dd HH hh mm ss SSS`.
//!
//! ## Inline rate limiting
//!
//! A message may carry one `[L:...]` directive, which is removed before it
//! is written:
//!
//! - `[L:100,15s:sync]` writes 1 of every 100 messages with key `sync` and
//!   flushes the latest held-back one every 15 seconds
//! - `[L:15s]` holds every message and flushes the latest each 15 seconds,
//!   keyed by the message's first two words
//! - `[L:name]` uses a configuration registered with
//!   [`LogPipelineBuilder::with_limit_config`]
//! - `[L:off]` drops the message, `[L:async]` writes it through a lossy
//!   bounded queue
//!
//! ```
//! use tracing_logroll::{Level, LogPipeline};
//! use tracing_logroll::infrastructure::mocks::MemoryWriter;
//! use std::sync::Arc;
//!
//! let memory = MemoryWriter::new();
//! let pipeline = LogPipeline::builder()
//!     .with_layout("%msg")
//!     .with_writer(Arc::new(memory.clone()))
//!     .build()
//!     .unwrap();
//!
//! for n in 1..=7 {
//!     pipeline.log(Level::Info, &format!("[L:3,0s:poll] poll #{}", n)).unwrap();
//! }
//! assert_eq!(memory.lines(), vec!["poll #1", "poll #4", "poll #7"]);
//! ```
//!
//! ## Rotation
//!
//! The live file always keeps its configured name. When the time bucket
//! (`.yyyy-MM-dd` by default) changes, or the file reaches `max_size`, it is
//! renamed to `app.log.2024-01-02`, `app.log.2024-01-02.1`, ... and a new
//! live file is started. After a rotation a background pass removes files
//! older than `max_age`, compresses files older than `gzip_age` and trims
//! the oldest files beyond `total_size_cap`.
//!
//! ## Diagnostics
//!
//! Rotations, removals, compressions and failures are reported through
//! `tracing` under the `tracing_logroll` target. [`LogPipelineLayer`] never
//! feeds those events back into a pipeline.

// Domain layer - pure types and parsers
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    duration::{parse_duration, ParseDurationError},
    entry::{CallerFrame, Entry, Fields},
    level::{Level, ParseLevelError},
    level_tag::{LevelTagParser, ParsedLevel},
    limit::{parse_directive, LimitConfig, LimitDirective, ParsedDirective},
    time_layout::TimeLayout,
};

pub use application::{
    async_queue::{AsyncQueue, QueueOutcome},
    layout::{Layout, LayoutError, LayoutOptions, DEFAULT_LAYOUT, DEFAULT_TIME_LAYOUT},
    metrics::{Metrics, MetricsSnapshot},
    pipeline::{BuildError, LogPipeline, LogPipelineBuilder, PipelineWriter},
    ports::{CallerResolver, Clock, ContextStore, LevelWriter, RecordSink, Storage, ThreadIdSource},
    registry::{KeyRegistry, KeyState, NamedConfigRegistry},
    suppression::{AsyncQueueConfig, SuppressionController, Verdict},
};

pub use infrastructure::{
    clock::{SystemClock, UtcClock},
    context::{ContextGuard, ThreadLocalContext},
    io_writer::IoWriter,
    layer::LogPipelineLayer,
    rotate::{
        FileRotatedEvent, MaintenanceReport, RotateError, RotateOptions, RotateOptionsBuilder,
        RotatingWriter,
    },
    storage::ShardedStorage,
    thread_id::ThreadLocalIds,
};
