//! The rotating file writer.

use super::error::RotateError;
use super::maintenance::{run_maintenance, MaintenanceReport};
use super::options::{FileRotatedEvent, RotateOptions};
use crate::application::ports::LevelWriter;
use crate::domain::level::Level;
use crossbeam_channel::{bounded, select, tick, Sender};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Writes to a single live log file and renames it away when its time
/// bucket ends or it grows past the size limit.
///
/// The live file always sits at the configured path. A finished segment is
/// renamed to the name of the bucket it was opened in, with a `.N`
/// generation suffix when the bucket already has rotated files. Every write
/// and rotation is serialized by one mutex; retention runs on a background
/// thread after each rotation.
///
/// # Examples
///
/// ```no_run
/// use tracing_logroll::{Level, LevelWriter, RotateOptions, RotatingWriter};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let options = RotateOptions::builder("logs/app.log")
///     .with_max_size(10 * 1024 * 1024)
///     .build()?;
/// let writer = RotatingWriter::new(options)?;
///
/// writer.write_level(Level::Info, b"started\n")?;
/// writer.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RotatingWriter {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    options: RotateOptions,
    state: Mutex<State>,
    maintaining: Arc<AtomicBool>,
    maintenance: Mutex<Option<JoinHandle<MaintenanceReport>>>,
    /// Set while a flush thread is running
    flushing: AtomicBool,
    flusher: Mutex<Option<Flusher>>,
}

#[derive(Debug)]
struct Flusher {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
struct State {
    file: Option<BufWriter<File>>,
    /// Bytes in the live file, including what was there when it was opened
    size: u64,
    /// Bucket name the live segment was opened in
    bucket: PathBuf,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Bucket,
    Size,
    Manual,
}

impl RotatingWriter {
    /// Create the writer, its directory and its flush thread.
    ///
    /// The live file is opened lazily by the first write.
    ///
    /// # Errors
    ///
    /// Returns `RotateError::CreateDir` if the directory holding the log
    /// file cannot be created, or `RotateError::Open` if the flush thread
    /// cannot be spawned.
    pub fn new(options: RotateOptions) -> Result<Self, RotateError> {
        let path = options.path().to_path_buf();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| RotateError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let bucket = options.bucket_path(&options.clock().now());
        let shared = Arc::new(Shared {
            options,
            state: Mutex::new(State {
                file: None,
                size: 0,
                bucket,
                generation: 0,
            }),
            maintaining: Arc::new(AtomicBool::new(false)),
            maintenance: Mutex::new(None),
            flushing: AtomicBool::new(false),
            flusher: Mutex::new(None),
        });
        start_flusher(&shared).map_err(|source| RotateError::Open { path, source })?;

        Ok(Self { shared })
    }

    /// The live log file.
    pub fn log_file(&self) -> &Path {
        self.shared.options.path()
    }

    pub fn options(&self) -> &RotateOptions {
        &self.shared.options
    }

    /// Name the live segment will be given when it is rotated away.
    pub fn current_file_name(&self) -> PathBuf {
        let state = lock(&self.shared.state);
        segment_name(&state.bucket, state.generation)
    }

    /// Bytes in the live file.
    pub fn current_size(&self) -> u64 {
        lock(&self.shared.state).size
    }

    /// Write `buf` to the live file, rotating first when needed.
    ///
    /// # Errors
    ///
    /// Open, rename and write failures are returned for this call; the
    /// bytes are not written when rotation fails.
    pub fn write(&self, buf: &[u8]) -> Result<usize, RotateError> {
        let shared = &self.shared;
        let now = shared.options.clock().now();
        let bucket = shared.options.bucket_path(&now);

        let event = {
            let mut state = lock(&shared.state);
            shared.ensure_open(&mut state)?;

            let trigger = if bucket != state.bucket {
                Some(Trigger::Bucket)
            } else if shared.options.max_size() > 0 && state.size >= shared.options.max_size() {
                Some(Trigger::Size)
            } else {
                None
            };
            let event = match trigger {
                Some(trigger) => shared.rotate_locked(&mut state, bucket, trigger)?,
                None => None,
            };

            let path = shared.options.path();
            let file = shared.ensure_open(&mut state)?;
            file.write_all(buf).map_err(|source| RotateError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            state.size += buf.len() as u64;
            event
        };

        if let Some(event) = event {
            shared.after_rotation(&event);
        }
        // Writing after close reopened the file; flush it in the background again.
        if !shared.flushing.load(Ordering::Acquire) {
            if let Err(error) = start_flusher(shared) {
                tracing::warn!(%error, "failed to restart log flush thread");
            }
        }
        Ok(buf.len())
    }

    /// Rotate now, regardless of size and bucket.
    ///
    /// Does nothing when there is no live file on disk.
    ///
    /// # Errors
    ///
    /// Returns the flush, rename or open failure that stopped the rotation.
    pub fn rotate(&self) -> Result<(), RotateError> {
        let shared = &self.shared;
        let bucket = shared.options.bucket_path(&shared.options.clock().now());
        let event = {
            let mut state = lock(&shared.state);
            let trigger = if bucket != state.bucket {
                Trigger::Bucket
            } else {
                Trigger::Manual
            };
            shared.rotate_locked(&mut state, bucket, trigger)?
        };
        if let Some(event) = event {
            shared.after_rotation(&event);
        }
        Ok(())
    }

    /// Flush buffered bytes to the live file.
    ///
    /// # Errors
    ///
    /// Returns `RotateError::Flush` if the flush fails.
    pub fn flush(&self) -> Result<(), RotateError> {
        self.shared.flush()
    }

    /// Flush and close the live file and stop the flush thread.
    ///
    /// Idempotent. A later write reopens the live file, keeps appending and
    /// starts a new flush thread.
    ///
    /// # Errors
    ///
    /// Returns `RotateError::Flush` if buffered bytes could not be written.
    pub fn close(&self) -> Result<(), RotateError> {
        let flusher = lock(&self.shared.flusher).take();
        self.shared.flushing.store(false, Ordering::Release);
        if let Some(Flusher { stop, handle }) = flusher {
            drop(stop);
            if handle.join().is_err() {
                tracing::error!("log flush thread panicked");
            }
        }

        let mut state = lock(&self.shared.state);
        match state.file.take() {
            Some(mut file) => file.flush().map_err(|source| RotateError::Flush {
                path: self.shared.options.path().to_path_buf(),
                source,
            }),
            None => Ok(()),
        }
    }

    /// Wait for the last started maintenance pass, if any.
    pub fn wait_maintenance(&self) -> Option<MaintenanceReport> {
        let handle = lock(&self.shared.maintenance).take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                tracing::error!("log maintenance thread panicked");
                None
            }
        }
    }

    /// Run a maintenance pass on the calling thread.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        let now = self.shared.options.clock().now();
        run_maintenance(&self.shared.options, now)
    }
}

impl Shared {
    fn ensure_open<'a>(&self, state: &'a mut State) -> Result<&'a mut BufWriter<File>, RotateError> {
        match state.file {
            Some(ref mut file) => Ok(file),
            None => {
                let path = self.options.path();
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| RotateError::Open {
                        path: path.to_path_buf(),
                        source,
                    })?;
                state.size = file.metadata().map(|meta| meta.len()).unwrap_or(0);
                Ok(state.file.insert(BufWriter::new(file)))
            }
        }
    }

    /// Rename the live file away and open a fresh one.
    ///
    /// Returns `None` when there was nothing on disk to rotate.
    fn rotate_locked(
        &self,
        state: &mut State,
        bucket: PathBuf,
        trigger: Trigger,
    ) -> Result<Option<FileRotatedEvent>, RotateError> {
        let base = self.options.path();

        if let Some(mut file) = state.file.take() {
            file.flush().map_err(|source| RotateError::Flush {
                path: base.to_path_buf(),
                source,
            })?;
        }

        if !base.exists() {
            if trigger == Trigger::Bucket {
                state.bucket = bucket;
                state.generation = 0;
            }
            return Ok(None);
        }

        let (target, generation) = self.free_name(&state.bucket, state.generation);
        if let Some(dir) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| RotateError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let started = Instant::now();
        fs::rename(base, &target).map_err(|source| RotateError::Rename {
            from: base.to_path_buf(),
            to: target.clone(),
            source,
        })?;
        tracing::info!(
            from = %base.display(),
            path = %target.display(),
            duration = ?started.elapsed(),
            "log file rotated"
        );

        match trigger {
            Trigger::Bucket => {
                state.bucket = bucket;
                state.generation = 0;
            }
            Trigger::Size | Trigger::Manual => state.generation = generation + 1,
        }
        self.ensure_open(state)?;

        Ok(Some(FileRotatedEvent {
            previous_file: target,
            current_file: segment_name(&state.bucket, state.generation),
        }))
    }

    /// First name at or above `generation` not already taken on disk.
    fn free_name(&self, bucket: &Path, generation: u32) -> (PathBuf, u32) {
        let base = self.options.path();
        let mut generation = generation;
        loop {
            let candidate = segment_name(bucket, generation);
            if candidate != base && !candidate.exists() {
                return (candidate, generation);
            }
            generation += 1;
        }
    }

    fn after_rotation(&self, event: &FileRotatedEvent) {
        if let Some(handler) = self.options.handler() {
            handler(event);
        }
        if self.options.needs_maintenance() {
            self.spawn_maintenance();
        }
    }

    /// Start a maintenance pass unless one is already running.
    fn spawn_maintenance(&self) {
        if self
            .maintaining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let options = self.options.clone();
        let maintaining = Arc::clone(&self.maintaining);
        let spawned = thread::Builder::new()
            .name("logroll-maintenance".to_string())
            .spawn(move || {
                let report = run_maintenance(&options, options.clock().now());
                maintaining.store(false, Ordering::Release);
                report
            });

        match spawned {
            Ok(handle) => *lock(&self.maintenance) = Some(handle),
            Err(error) => {
                self.maintaining.store(false, Ordering::Release);
                tracing::error!(%error, "failed to start log maintenance");
            }
        }
    }

    fn flush(&self) -> Result<(), RotateError> {
        let mut state = lock(&self.state);
        match state.file.as_mut() {
            Some(file) => file.flush().map_err(|source| RotateError::Flush {
                path: self.options.path().to_path_buf(),
                source,
            }),
            None => Ok(()),
        }
    }
}

impl LevelWriter for RotatingWriter {
    fn write_level(&self, _level: Level, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write(buf)?)
    }

    fn flush(&self) -> io::Result<()> {
        Ok(RotatingWriter::flush(self)?)
    }

    fn rotate(&self) -> io::Result<()> {
        Ok(RotatingWriter::rotate(self)?)
    }

    fn close(&self) -> io::Result<()> {
        Ok(RotatingWriter::close(self)?)
    }
}

impl Drop for RotatingWriter {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            tracing::error!(%error, "failed to close log file");
        }
    }
}

/// Start the periodic flush thread unless one is running.
fn start_flusher(shared: &Arc<Shared>) -> io::Result<()> {
    let mut flusher = lock(&shared.flusher);
    if flusher.is_some() {
        return Ok(());
    }

    let (stop, stop_rx) = bounded::<()>(0);
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let interval = shared.options.flush_interval();
    let handle = thread::Builder::new()
        .name("logroll-flush".to_string())
        .spawn(move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        let Some(shared) = weak.upgrade() else { return };
                        if let Err(error) = shared.flush() {
                            tracing::warn!(%error, "periodic log flush failed");
                        }
                    }
                    recv(stop_rx) -> _ => return,
                }
            }
        })?;

    *flusher = Some(Flusher { stop, handle });
    shared.flushing.store(true, Ordering::Release);
    Ok(())
}

fn segment_name(bucket: &Path, generation: u32) -> PathBuf {
    if generation == 0 {
        return bucket.to_path_buf();
    }
    let mut name = bucket.as_os_str().to_owned();
    name.push(format!(".{}", generation));
    PathBuf::from(name)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
