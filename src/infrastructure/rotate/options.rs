//! Configuration of a [`RotatingWriter`](super::RotatingWriter).

use crate::application::pipeline::BuildError;
use crate::application::ports::Clock;
use crate::domain::time_layout::TimeLayout;
use crate::infrastructure::clock::SystemClock;
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default bucket suffix layout: one file per day.
pub const DEFAULT_ROTATE_LAYOUT: &str = ".yyyy-MM-dd";

/// Default retention of rotated files.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default period of the background buffer flush.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(3);

/// Notification sent after the live file has been rotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRotatedEvent {
    /// Name the finished segment was renamed to
    pub previous_file: PathBuf,
    /// Bucket name of the new live segment
    pub current_file: PathBuf,
}

/// Callback invoked with each [`FileRotatedEvent`].
pub type RotationHandler = Arc<dyn Fn(&FileRotatedEvent) + Send + Sync>;

/// Validated rotation settings.
///
/// # Examples
///
/// ```
/// use tracing_logroll::RotateOptions;
/// use std::time::Duration;
///
/// let options = RotateOptions::builder("logs/app.log")
///     .with_max_size(10 * 1024 * 1024)
///     .with_max_age(Duration::from_secs(3 * 24 * 3600))
///     .with_gzip_age(Duration::from_secs(24 * 3600))
///     .build()
///     .unwrap();
///
/// assert_eq!(options.max_size(), 10 * 1024 * 1024);
/// ```
#[derive(Clone)]
pub struct RotateOptions {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    rotate_layout: TimeLayout,
    full_layout: Option<TimeLayout>,
    max_size: u64,
    max_age: Duration,
    gzip_age: Duration,
    total_size_cap: Option<u64>,
    flush_interval: Duration,
    handler: Option<RotationHandler>,
}

impl RotateOptions {
    /// Start configuring a writer for the log file at `path`.
    ///
    /// A leading `~/` is expanded to the home directory.
    pub fn builder(path: impl AsRef<Path>) -> RotateOptionsBuilder {
        RotateOptionsBuilder::new(path.as_ref())
    }

    /// The live log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn rotate_layout(&self) -> &TimeLayout {
        &self.rotate_layout
    }

    pub fn full_layout(&self) -> Option<&TimeLayout> {
        self.full_layout.as_ref()
    }

    /// Size in bytes that forces a rotation; 0 disables.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Age after which rotated files are removed; zero disables.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Age after which rotated files are compressed; zero disables.
    pub fn gzip_age(&self) -> Duration {
        self.gzip_age
    }

    pub fn total_size_cap(&self) -> Option<u64> {
        self.total_size_cap
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub(crate) fn handler(&self) -> Option<&RotationHandler> {
        self.handler.as_ref()
    }

    /// Whether rotations should trigger a maintenance pass.
    pub fn needs_maintenance(&self) -> bool {
        !self.max_age.is_zero() || !self.gzip_age.is_zero() || self.total_size_cap.is_some()
    }

    /// File name of the bucket containing `now`.
    pub fn bucket_path(&self, now: &DateTime<Local>) -> PathBuf {
        let suffix = self.rotate_layout.format(now);
        match &self.full_layout {
            Some(full) => PathBuf::from(full.format(now) + &suffix),
            None => {
                let mut path = self.path.clone().into_os_string();
                path.push(suffix);
                PathBuf::from(path)
            }
        }
    }
}

impl fmt::Debug for RotateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotateOptions")
            .field("path", &self.path)
            .field("rotate_layout", &self.rotate_layout.source())
            .field("full_layout", &self.full_layout.as_ref().map(TimeLayout::source))
            .field("max_size", &self.max_size)
            .field("max_age", &self.max_age)
            .field("gzip_age", &self.gzip_age)
            .field("total_size_cap", &self.total_size_cap)
            .field("flush_interval", &self.flush_interval)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Builder for [`RotateOptions`].
pub struct RotateOptionsBuilder {
    path: PathBuf,
    clock: Option<Arc<dyn Clock>>,
    rotate_layout: String,
    full_layout: Option<String>,
    max_size: u64,
    max_age: Duration,
    gzip_age: Duration,
    total_size_cap: Option<u64>,
    flush_interval: Duration,
    handler: Option<RotationHandler>,
}

impl RotateOptionsBuilder {
    fn new(path: &Path) -> Self {
        Self {
            path: expand_home(path),
            clock: None,
            rotate_layout: DEFAULT_ROTATE_LAYOUT.to_string(),
            full_layout: None,
            max_size: 0,
            max_age: DEFAULT_MAX_AGE,
            gzip_age: Duration::ZERO,
            total_size_cap: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            handler: None,
        }
    }

    /// Clock used for buckets and file aging.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Token layout of the bucket suffix, e.g. `.yyyy-MM-dd-HH`.
    pub fn with_rotate_layout(mut self, layout: impl Into<String>) -> Self {
        self.rotate_layout = layout.into();
        self
    }

    /// Token layout of the whole rotated file name, e.g. `logs/yyyy-MM-dd/app.log`.
    ///
    /// The suffix layout is still appended; set it to `""` to use this
    /// layout alone.
    pub fn with_full_layout(mut self, layout: impl Into<String>) -> Self {
        self.full_layout = Some(layout.into());
        self
    }

    /// Rotate once the live file reaches `bytes`; 0 disables.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Remove rotated files older than `age`; zero disables.
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = age;
        self
    }

    /// Compress rotated files older than `age`; zero disables.
    pub fn with_gzip_age(mut self, age: Duration) -> Self {
        self.gzip_age = age;
        self
    }

    /// Remove the oldest rotated files while they total more than `bytes`.
    pub fn with_total_size_cap(mut self, bytes: u64) -> Self {
        self.total_size_cap = Some(bytes);
        self
    }

    /// Period of the background buffer flush.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Callback invoked after every rotation, outside the writer lock.
    pub fn with_rotation_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FileRotatedEvent) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Validate and build the options.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::ZeroFlushInterval` if the flush interval is zero.
    pub fn build(self) -> Result<RotateOptions, BuildError> {
        if self.flush_interval.is_zero() {
            return Err(BuildError::ZeroFlushInterval);
        }

        Ok(RotateOptions {
            path: self.path,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            rotate_layout: TimeLayout::new(&self.rotate_layout),
            full_layout: self.full_layout.as_deref().map(|full| {
                TimeLayout::new(&expand_home(Path::new(full)).to_string_lossy())
            }),
            max_size: self.max_size,
            max_age: self.max_age,
            gzip_age: self.gzip_age,
            total_size_cap: self.total_size_cap,
            flush_interval: self.flush_interval,
            handler: self.handler,
        })
    }
}

/// Expand a leading `~` to the home directory, when one is known.
pub(crate) fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
