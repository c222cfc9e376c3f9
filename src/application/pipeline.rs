//! The logging pipeline.
//!
//! A [`LogPipeline`] runs each raw message through level tag parsing,
//! suppression, rendering and finally every configured writer:
//!
//! ```text
//! message -> LevelTagParser -> SuppressionController -> Layout -> LevelWriter(s)
//! ```

use crate::application::async_queue::{DEFAULT_DROP_THRESHOLD, DEFAULT_QUEUE_CAPACITY};
use crate::application::layout::{Layout, LayoutError, LayoutOptions, DEFAULT_LAYOUT};
use crate::application::metrics::Metrics;
use crate::application::ports::{
    CallerResolver, Clock, ContextStore, LevelWriter, RecordSink, ThreadIdSource,
};
use crate::application::registry::{KeyRegistry, KeyState, NamedConfigRegistry};
use crate::application::suppression::{AsyncQueueConfig, SuppressionController, Verdict};
use crate::domain::entry::Entry;
use crate::domain::level::Level;
use crate::domain::level_tag::LevelTagParser;
use crate::domain::limit::LimitConfig;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::context::ThreadLocalContext;
use crate::infrastructure::io_writer::IoWriter;
use crate::infrastructure::rotate::{RotateError, RotateOptions, RotatingWriter};
use crate::infrastructure::storage::ShardedStorage;
use crate::infrastructure::thread_id::ThreadLocalIds;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type KeyStorage = Arc<ShardedStorage<String, Arc<KeyState>>>;

/// Error returned when building a pipeline or its rotation options.
#[derive(Debug)]
pub enum BuildError {
    /// Async queue capacity must be greater than zero
    ZeroQueueCapacity,
    /// Async drop threshold must be greater than zero
    ZeroDropThreshold,
    /// Rotating writer flush interval must be greater than zero
    ZeroFlushInterval,
    /// The layout pattern did not compile
    Layout(LayoutError),
    /// A rotating writer could not be created
    Rotate(RotateError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::ZeroQueueCapacity => write!(f, "async queue capacity must be greater than 0"),
            BuildError::ZeroDropThreshold => write!(f, "async drop threshold must be greater than 0"),
            BuildError::ZeroFlushInterval => write!(f, "flush interval must be greater than 0"),
            BuildError::Layout(e) => write!(f, "layout error: {}", e),
            BuildError::Rotate(e) => write!(f, "rotating writer error: {}", e),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Layout(e) => Some(e),
            BuildError::Rotate(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LayoutError> for BuildError {
    fn from(e: LayoutError) -> Self {
        BuildError::Layout(e)
    }
}

impl From<RotateError> for BuildError {
    fn from(e: RotateError) -> Self {
        BuildError::Rotate(e)
    }
}

#[derive(Debug)]
struct Sink {
    layout: Layout,
    writer: Arc<dyn LevelWriter>,
}

/// Renders records and hands them to every writer.
#[derive(Debug)]
pub(crate) struct PipelineCore {
    sinks: Vec<Sink>,
    metrics: Metrics,
}

impl PipelineCore {
    /// Write `entry` to every sink; all sinks are attempted and the first
    /// error is returned.
    fn write(&self, entry: &Entry) -> io::Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            let bytes = sink.layout.render(entry);
            if let Err(error) = sink.writer.write_level(entry.level, &bytes) {
                self.metrics.record_write_error();
                tracing::error!(%error, "failed to write log record");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn each_writer(&self, op: impl Fn(&dyn LevelWriter) -> io::Result<()>) -> io::Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(error) = op(sink.writer.as_ref()) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl RecordSink for PipelineCore {
    fn emit(&self, entry: Entry) {
        // Failures are already counted and reported by `write`.
        let _ = self.write(&entry);
    }
}

/// A configured logging pipeline.
///
/// Clones share the same writers, counters and suppression state.
///
/// # Examples
///
/// ```
/// use tracing_logroll::{Level, LogPipeline, Verdict};
/// use tracing_logroll::infrastructure::mocks::MemoryWriter;
/// use std::sync::Arc;
///
/// let memory = MemoryWriter::new();
/// let pipeline = LogPipeline::builder()
///     .with_layout("%l %msg")
///     .with_writer(Arc::new(memory.clone()))
///     .build()
///     .unwrap();
///
/// pipeline.log(Level::Info, "W! disk almost full").unwrap();
/// assert!(matches!(pipeline.log(Level::Info, "[L:off] noise").unwrap(), Verdict::Dropped));
///
/// assert_eq!(memory.lines(), vec![" WARN disk almost full"]);
/// ```
#[derive(Debug, Clone)]
pub struct LogPipeline {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    core: Arc<PipelineCore>,
    controller: SuppressionController<KeyStorage>,
    level_tags: LevelTagParser,
    min_level: Level,
    clock: Arc<dyn Clock>,
    thread_ids: Arc<dyn ThreadIdSource>,
    caller_resolver: Option<Arc<dyn CallerResolver>>,
    /// Level and frame count at which `%caller` prints, if the layout has one
    caller_demand: Option<(Level, usize)>,
    metrics: Metrics,
    closed: AtomicBool,
}

impl LogPipeline {
    pub fn builder() -> LogPipelineBuilder {
        LogPipelineBuilder::new()
    }

    /// Log a raw message.
    ///
    /// A level tag in the message (`E!`, or a registered custom tag) overrides
    /// `level`; a `[L:...]` directive decides whether the record is written.
    ///
    /// # Errors
    ///
    /// Returns the first writer error when the record is written now.
    pub fn log(&self, level: Level, message: &str) -> io::Result<Verdict> {
        let parsed = self.inner.level_tags.parse(message, level);
        self.log_entry(Entry::new(parsed.level, parsed.message.into_owned()))
    }

    /// Log a prepared record. Level tags are not parsed; directives are.
    ///
    /// # Errors
    ///
    /// Returns the first writer error when the record is written now.
    pub fn log_entry(&self, mut entry: Entry) -> io::Result<Verdict> {
        let inner = &self.inner;
        if entry.level < inner.min_level {
            inner.metrics.record_dropped();
            return Ok(Verdict::Dropped);
        }

        // Buffered and queued records render later, possibly on another thread.
        if entry.time.is_none() {
            entry.time = Some(inner.clock.now());
        }
        if entry.thread_id.is_none() {
            entry.thread_id = Some(inner.thread_ids.current());
        }
        inner.capture_callers(&mut entry);

        match inner.controller.consider(entry) {
            Verdict::Emit(entry) => {
                inner.metrics.record_emitted();
                inner.core.write(&entry)?;
                Ok(Verdict::Emit(entry))
            }
            verdict => Ok(verdict),
        }
    }

    /// An `io::Write` adapter logging each write as one message at `info`.
    pub fn writer(&self) -> PipelineWriter {
        self.writer_at(Level::Info)
    }

    /// An `io::Write` adapter logging each write as one message at `level`.
    pub fn writer_at(&self, level: Level) -> PipelineWriter {
        PipelineWriter {
            pipeline: self.clone(),
            level,
        }
    }

    /// Register or replace a named limit configuration.
    pub fn register_limit(&self, config: LimitConfig) {
        self.inner.controller.named().register(config);
    }

    /// Write every pending suppressed message now.
    pub fn flush_pending(&self) -> usize {
        self.inner.controller.flush_pending()
    }

    /// Force every rotating writer to rotate.
    ///
    /// # Errors
    ///
    /// All writers are rotated; the first failure is returned.
    pub fn rotate(&self) -> io::Result<()> {
        self.inner.core.each_writer(|writer| writer.rotate())
    }

    /// Flush every writer.
    ///
    /// # Errors
    ///
    /// All writers are flushed; the first failure is returned.
    pub fn flush(&self) -> io::Result<()> {
        self.inner.core.each_writer(|writer| writer.flush())
    }

    /// Stop tickers and the async queue, writing what they hold, then close
    /// every writer. Idempotent.
    ///
    /// # Errors
    ///
    /// All writers are closed; the first failure is returned.
    pub fn close(&self) -> io::Result<()> {
        self.inner.close()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn min_level(&self) -> Level {
        self.inner.min_level
    }

    /// Number of keys with suppression state.
    pub fn tracked_keys(&self) -> usize {
        self.inner.controller.keys().len()
    }
}

impl Inner {
    /// Resolve the frames `%caller` will print while still on the logging
    /// thread. Records below its level resolve nothing.
    fn capture_callers(&self, entry: &mut Entry) {
        let (Some(resolver), Some((level, frames))) = (&self.caller_resolver, self.caller_demand)
        else {
            return;
        };
        if entry.level < level {
            return;
        }
        let frames = entry.caller_skip.unwrap_or(frames);
        for skip in entry.callers.len()..frames {
            match resolver.resolve(skip) {
                Some(frame) => entry.callers.push(frame),
                None => break,
            }
        }
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.controller.close();
        self.core.each_writer(|writer| writer.close())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::error!(%error, "failed to close log writers");
        }
    }
}

/// `io::Write` adapter returned by [`LogPipeline::writer`].
///
/// A trailing newline is removed from each write since layouts add their own.
#[derive(Debug, Clone)]
pub struct PipelineWriter {
    pipeline: LogPipeline,
    level: Level,
}

impl io::Write for PipelineWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let text = text.strip_suffix('\n').unwrap_or(&text);
        let text = text.strip_suffix('\r').unwrap_or(text);
        self.pipeline.log(self.level, text)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.pipeline.flush()
    }
}

/// Builder for [`LogPipeline`].
///
/// With no writer configured the pipeline writes to stdout.
pub struct LogPipelineBuilder {
    layout: Option<String>,
    print_color: bool,
    stdout: bool,
    writers: Vec<Arc<dyn LevelWriter>>,
    rotating: Vec<RotateOptions>,
    level: Level,
    level_tags: LevelTagParser,
    limit_configs: Vec<LimitConfig>,
    queue_capacity: usize,
    drop_threshold: u64,
    clock: Option<Arc<dyn Clock>>,
    caller_resolver: Option<Arc<dyn CallerResolver>>,
    thread_ids: Option<Arc<dyn ThreadIdSource>>,
    context: Option<Arc<dyn ContextStore>>,
}

impl LogPipelineBuilder {
    fn new() -> Self {
        Self {
            layout: None,
            print_color: false,
            stdout: false,
            writers: Vec::new(),
            rotating: Vec::new(),
            level: Level::Info,
            level_tags: LevelTagParser::new(),
            limit_configs: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drop_threshold: DEFAULT_DROP_THRESHOLD,
            clock: None,
            caller_resolver: None,
            thread_ids: None,
            context: None,
        }
    }

    /// Layout pattern, e.g. `%t [%5l] %msg%n`.
    pub fn with_layout(mut self, pattern: impl Into<String>) -> Self {
        self.layout = Some(pattern.into());
        self
    }

    /// Color level names on stdout. Other writers never get color codes.
    pub fn with_print_color(mut self, print_color: bool) -> Self {
        self.print_color = print_color;
        self
    }

    /// Also write to stdout.
    pub fn with_stdout(mut self) -> Self {
        self.stdout = true;
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn LevelWriter>) -> Self {
        self.writers.push(writer);
        self
    }

    /// Write to a rotating log file created at build time.
    pub fn with_rotating_file(mut self, options: RotateOptions) -> Self {
        self.rotating.push(options);
        self
    }

    /// Minimum level; records below it are discarded.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Register a custom level tag such as `[ERROR]`.
    pub fn with_level_tag(mut self, tag: impl Into<String>, level: Level) -> Self {
        self.level_tags.register(tag, level);
        self
    }

    /// Register a named limit configuration for `[L:<name>]`.
    pub fn with_limit_config(mut self, config: LimitConfig) -> Self {
        self.limit_configs.push(config);
        self
    }

    pub fn with_async_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Missed async records counted before an `asyncMissed` notice.
    pub fn with_async_drop_threshold(mut self, threshold: u64) -> Self {
        self.drop_threshold = threshold;
        self
    }

    /// Clock for record timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_caller_resolver(mut self, resolver: Arc<dyn CallerResolver>) -> Self {
        self.caller_resolver = Some(resolver);
        self
    }

    pub fn with_thread_ids(mut self, thread_ids: Arc<dyn ThreadIdSource>) -> Self {
        self.thread_ids = Some(thread_ids);
        self
    }

    pub fn with_context_store(mut self, context: Arc<dyn ContextStore>) -> Self {
        self.context = Some(context);
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `BuildError` if the queue settings are zero, the layout does
    /// not compile or a rotating writer cannot be created.
    pub fn build(self) -> Result<LogPipeline, BuildError> {
        if self.queue_capacity == 0 {
            return Err(BuildError::ZeroQueueCapacity);
        }
        if self.drop_threshold == 0 {
            return Err(BuildError::ZeroDropThreshold);
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let thread_ids = self
            .thread_ids
            .unwrap_or_else(|| Arc::new(ThreadLocalIds::new()));
        let layout_options = LayoutOptions {
            print_color: self.print_color,
            clock: Arc::clone(&clock),
            caller_resolver: None,
            thread_ids: Arc::clone(&thread_ids),
            context: self
                .context
                .unwrap_or_else(|| Arc::new(ThreadLocalContext::new())),
        };
        let layout = Layout::compile(
            self.layout.as_deref().unwrap_or(DEFAULT_LAYOUT),
            &layout_options,
        )?;
        let plain = layout.without_color();
        let caller_demand = layout.caller_demand();

        let mut sinks = Vec::new();
        for options in self.rotating {
            sinks.push(Sink {
                layout: plain.clone(),
                writer: Arc::new(RotatingWriter::new(options)?),
            });
        }
        for writer in self.writers {
            sinks.push(Sink {
                layout: plain.clone(),
                writer,
            });
        }
        if self.stdout || sinks.is_empty() {
            sinks.push(Sink {
                layout,
                writer: Arc::new(IoWriter::stdout()),
            });
        }

        let named = Arc::new(NamedConfigRegistry::new());
        for config in self.limit_configs {
            named.register(config);
        }

        let metrics = Metrics::new();
        let core = Arc::new(PipelineCore {
            sinks,
            metrics: metrics.clone(),
        });
        let controller = SuppressionController::new(
            KeyRegistry::new(Arc::new(ShardedStorage::new())),
            named,
            Arc::clone(&core) as Arc<dyn RecordSink>,
            metrics.clone(),
            AsyncQueueConfig {
                capacity: self.queue_capacity,
                drop_threshold: self.drop_threshold,
            },
        );

        Ok(LogPipeline {
            inner: Arc::new(Inner {
                core,
                controller,
                level_tags: self.level_tags,
                min_level: self.level,
                clock,
                thread_ids,
                caller_resolver: self.caller_resolver,
                caller_demand,
                metrics,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entry::CallerFrame;
    use crate::infrastructure::mocks::{MemoryWriter, MockClock};
    use chrono::{Local, TimeZone};
    use std::io::Write;
    use std::time::Duration;

    fn pipeline(memory: &MemoryWriter) -> LogPipelineBuilder {
        let clock = MockClock::new(Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap());
        LogPipeline::builder()
            .with_layout("%t{HH:mm:ss} %l %msg")
            .with_clock(Arc::new(clock))
            .with_writer(Arc::new(memory.clone()))
    }

    #[test]
    fn test_level_tags_and_layout() {
        let memory = MemoryWriter::new();
        let pipeline = pipeline(&memory).build().unwrap();

        pipeline.log(Level::Info, "plain").unwrap();
        pipeline.log(Level::Info, "E! broken").unwrap();

        assert_eq!(memory.lines(), vec!["07:08:09  INFO plain", "07:08:09 ERROR broken"]);
        assert_eq!(memory.records()[1].0, Level::Error);
    }

    #[test]
    fn test_min_level_drops() {
        let memory = MemoryWriter::new();
        let pipeline = pipeline(&memory).with_level(Level::Warn).build().unwrap();

        assert_eq!(pipeline.log(Level::Info, "quiet").unwrap(), Verdict::Dropped);
        assert!(matches!(pipeline.log(Level::Info, "W! loud").unwrap(), Verdict::Emit(_)));
        assert_eq!(memory.len(), 1);
        assert_eq!(pipeline.metrics().dropped(), 1);
    }

    #[test]
    fn test_every_third_is_written() {
        let memory = MemoryWriter::new();
        let pipeline = pipeline(&memory).build().unwrap();

        for n in 1..=7 {
            pipeline.log(Level::Info, &format!("[L:3,0s:burst] #{}", n)).unwrap();
        }
        assert_eq!(memory.lines().len(), 3);
        assert!(memory.lines()[2].ends_with("#7"));
        assert_eq!(pipeline.metrics().buffered(), 4);
        assert_eq!(pipeline.tracked_keys(), 1);
    }

    #[test]
    fn test_named_config_and_close_flushes_pending() {
        let memory = MemoryWriter::new();
        let pipeline = pipeline(&memory)
            .with_limit_config(LimitConfig::new("sync", 10, Duration::from_secs(3600)))
            .build()
            .unwrap();

        pipeline.log(Level::Info, "[L:sync] first").unwrap();
        pipeline.log(Level::Info, "[L:sync] second").unwrap();
        pipeline.log(Level::Info, "[L:sync] third").unwrap();
        assert_eq!(memory.len(), 1);

        pipeline.close().unwrap();
        assert_eq!(memory.lines(), vec!["07:08:09  INFO first", "07:08:09  INFO third"]);
        assert_eq!(memory.close_count(), 1);

        pipeline.close().unwrap();
        assert_eq!(memory.close_count(), 1);
    }

    #[test]
    fn test_io_writer_adapter() {
        let memory = MemoryWriter::new();
        let pipeline = pipeline(&memory).build().unwrap();

        let mut writer = pipeline.writer();
        writer.write_all(b"from std\n").unwrap();
        writer.write_all(b"D! hidden\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(memory.lines(), vec!["07:08:09  INFO from std"]);
        assert_eq!(memory.flush_count(), 1);
    }

    #[test]
    fn test_caller_snapshot_from_entry() {
        let memory = MemoryWriter::new();
        let pipeline = LogPipeline::builder()
            .with_layout("%caller %msg")
            .with_writer(Arc::new(memory.clone()))
            .build()
            .unwrap();

        let entry = Entry::new(Level::Warn, "hi")
            .with_caller(CallerFrame::new(Some("app::run".into()), "src/run.rs", 12));
        pipeline.log_entry(entry).unwrap();
        assert_eq!(memory.contents(), "app::run run.rs:12 hi");
    }

    #[derive(Debug, Default)]
    struct CountingResolver {
        calls: std::sync::atomic::AtomicUsize,
    }

    impl CallerResolver for CountingResolver {
        fn resolve(&self, skip: usize) -> Option<CallerFrame> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Some(CallerFrame::new(Some(format!("app::f{}", skip)), "src/app.rs", 10 + skip as u32))
        }
    }

    #[test]
    fn test_callers_resolved_only_when_printed() {
        let memory = MemoryWriter::new();
        let resolver = Arc::new(CountingResolver::default());
        let pipeline = LogPipeline::builder()
            .with_layout("%caller %msg")
            .with_caller_resolver(resolver.clone())
            .with_writer(Arc::new(memory.clone()))
            .build()
            .unwrap();

        for _ in 0..100 {
            pipeline.log(Level::Info, "hot path").unwrap();
        }
        assert_eq!(resolver.calls.load(Ordering::Relaxed), 0);

        pipeline.log(Level::Warn, "slow path").unwrap();
        assert_eq!(resolver.calls.load(Ordering::Relaxed), 1);
        assert_eq!(memory.lines()[100], "app::f0 app.rs:10 slow path");
    }

    #[test]
    fn test_no_caller_part_resolves_nothing() {
        let memory = MemoryWriter::new();
        let resolver = Arc::new(CountingResolver::default());
        let pipeline = LogPipeline::builder()
            .with_layout("%msg")
            .with_caller_resolver(resolver.clone())
            .with_writer(Arc::new(memory.clone()))
            .build()
            .unwrap();

        pipeline.log(Level::Error, "boom").unwrap();
        assert_eq!(resolver.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_buffered_records_keep_frames_from_log_time() {
        let memory = MemoryWriter::new();
        let resolver = Arc::new(CountingResolver::default());
        let pipeline = LogPipeline::builder()
            .with_layout("%caller{level=info,skip=2} %msg")
            .with_caller_resolver(resolver.clone())
            .with_writer(Arc::new(memory.clone()))
            .build()
            .unwrap();

        pipeline.log(Level::Info, "[L:5,0s:held] first").unwrap();
        pipeline.log(Level::Info, "[L:5,0s:held] second").unwrap();
        assert_eq!(resolver.calls.load(Ordering::Relaxed), 4);

        // Written later from the pending slot without resolving again.
        assert_eq!(pipeline.flush_pending(), 1);
        assert_eq!(resolver.calls.load(Ordering::Relaxed), 4);
        assert_eq!(
            memory.lines(),
            vec![
                "app::f0 app.rs:10 app::f1 app.rs:11 first",
                "app::f0 app.rs:10 app::f1 app.rs:11 second",
            ]
        );
    }

    #[test]
    fn test_rotate_reaches_writers() {
        let memory = MemoryWriter::new();
        let pipeline = pipeline(&memory).build().unwrap();
        pipeline.rotate().unwrap();
        assert_eq!(memory.rotate_count(), 1);
    }

    #[test]
    fn test_build_validation() {
        assert!(matches!(
            LogPipeline::builder().with_async_queue_capacity(0).build(),
            Err(BuildError::ZeroQueueCapacity)
        ));
        assert!(matches!(
            LogPipeline::builder().with_async_drop_threshold(0).build(),
            Err(BuildError::ZeroDropThreshold)
        ));
        assert!(matches!(
            LogPipeline::builder().with_layout("%nope").build(),
            Err(BuildError::Layout(LayoutError::UnknownIndicator(_)))
        ));
    }
}
