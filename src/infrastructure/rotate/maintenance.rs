//! Retention of rotated log files.
//!
//! A maintenance pass looks at every rotated file belonging to a writer,
//! removes those older than the maximum age, compresses those older than
//! the gzip age and finally enforces the total size cap. Failures are
//! reported through `tracing` and left for the next pass.

use super::options::RotateOptions;
use chrono::{DateTime, Local, TimeDelta};
use flate2::write::GzEncoder;
use flate2::Compression;
use regex::Regex;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const GZ_SUFFIX: &str = ".gz";

// Directory depth searched below the literal prefix of a full layout.
const MAX_SCAN_DEPTH: usize = 8;

/// What a maintenance pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub removed: Vec<PathBuf>,
    pub compressed: Vec<PathBuf>,
    /// Files that could not be inspected, removed or compressed
    pub errors: usize,
}

#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    modified: SystemTime,
    len: u64,
}

/// Run one maintenance pass over the rotated files of `options`.
pub fn run_maintenance(options: &RotateOptions, now: DateTime<Local>) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();
    let candidates = rotated_files(options, &mut report);

    let remove_cutoff = cutoff(now, options.max_age());
    let gzip_cutoff = cutoff(now, options.gzip_age());
    let gzip_age = to_delta(options.gzip_age());

    let mut to_gzip = Vec::new();
    for candidate in &candidates {
        let modified = DateTime::<Local>::from(candidate.modified);
        let is_gz = is_gz(&candidate.path);
        // A .gz file was written gzip_age after its source; it is kept that much longer.
        let aged = if is_gz { modified + gzip_age } else { modified };

        if remove_cutoff.is_some_and(|cutoff| aged < cutoff) {
            remove(&candidate.path, "max_age", &mut report);
        } else if !is_gz && gzip_cutoff.is_some_and(|cutoff| modified < cutoff) {
            to_gzip.push(candidate.path.as_path());
        }
    }

    if !to_gzip.is_empty() {
        let results: Vec<(&Path, io::Result<PathBuf>)> = std::thread::scope(|scope| {
            let jobs: Vec<_> = to_gzip
                .iter()
                .map(|&path| (path, scope.spawn(move || gzip_file(path))))
                .collect();
            jobs.into_iter()
                .map(|(path, job)| {
                    let result = job.join().unwrap_or_else(|_| {
                        Err(io::Error::new(io::ErrorKind::Other, "gzip worker panicked"))
                    });
                    (path, result)
                })
                .collect()
        });

        for (path, result) in results {
            match result {
                Ok(target) => {
                    tracing::info!(
                        path = %path.display(),
                        gzip_age = ?options.gzip_age(),
                        "log file compressed"
                    );
                    report.compressed.push(target);
                }
                Err(error) => {
                    tracing::error!(path = %path.display(), %error, "failed to compress log file");
                    report.errors += 1;
                }
            }
        }
    }

    if let Some(cap) = options.total_size_cap() {
        enforce_size_cap(options, cap, &mut report);
    }

    report
}

fn enforce_size_cap(options: &RotateOptions, cap: u64, report: &mut MaintenanceReport) {
    let mut files = rotated_files(options, report);
    files.sort_by_key(|candidate| candidate.modified);

    let mut total: u64 = files.iter().map(|candidate| candidate.len).sum();
    for candidate in files {
        if total <= cap {
            break;
        }
        if remove(&candidate.path, "total_size_cap", report) {
            total = total.saturating_sub(candidate.len);
        }
    }
}

fn remove(path: &Path, reason: &'static str, report: &mut MaintenanceReport) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), reason, "log file removed");
            report.removed.push(path.to_path_buf());
            true
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => false,
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to remove log file");
            report.errors += 1;
            false
        }
    }
}

/// Compress `path` into `path.gz`, removing the source only once the
/// compressed copy is complete.
pub fn gzip_file(path: &Path) -> io::Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(GZ_SUFFIX);
    let target = PathBuf::from(target);

    if let Err(error) = write_gzip(path, &target) {
        let _ = fs::remove_file(&target);
        return Err(error);
    }
    fs::remove_file(path)?;
    Ok(target)
}

fn write_gzip(source: &Path, target: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let output = File::create(target)?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder)?;
    let mut output = encoder.finish()?;
    output.flush()?;
    output.get_ref().sync_all()
}

fn is_gz(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().ends_with(GZ_SUFFIX)
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn cutoff(now: DateTime<Local>, age: Duration) -> Option<DateTime<Local>> {
    if age.is_zero() {
        return None;
    }
    now.checked_sub_signed(to_delta(age))
}

/// Rotated files of a writer, never including the live file.
fn rotated_files(options: &RotateOptions, report: &mut MaintenanceReport) -> Vec<Candidate> {
    let paths = match options.full_layout() {
        Some(full) => full_layout_files(options, full.regex_source(), &full.literal_prefix()),
        None => prefixed_files(options.path()),
    };

    let paths = match paths {
        Ok(paths) => paths,
        Err(error) => {
            tracing::error!(path = %options.path().display(), %error, "failed to list log files");
            report.errors += 1;
            return Vec::new();
        }
    };

    let mut candidates = Vec::with_capacity(paths.len());
    for path in paths {
        if path == options.path() {
            continue;
        }
        match fs::metadata(&path).and_then(|meta| Ok((meta.modified()?, meta.len()))) {
            Ok((modified, len)) => candidates.push(Candidate {
                path,
                modified,
                len,
            }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "failed to stat log file");
                report.errors += 1;
            }
        }
    }
    candidates
}

/// Files whose path starts with the live file's path, as `app.log*` would.
fn prefixed_files(base: &Path) -> io::Result<Vec<PathBuf>> {
    let dir = match base.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let Some(prefix) = base.file_name().map(|name| name.to_string_lossy().into_owned()) else {
        return Ok(Vec::new());
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            files.push(base.with_file_name(entry.file_name()));
        }
    }
    Ok(files)
}

/// Files matching the full layout plus the suffix layout, generation and
/// `.gz` decorations.
fn full_layout_files(
    options: &RotateOptions,
    full_regex: String,
    literal_prefix: &str,
) -> io::Result<Vec<PathBuf>> {
    let pattern = format!(
        r"^{}{}(\.\d+)?(\.gz)?$",
        full_regex,
        options.rotate_layout().regex_source()
    );
    let re = Regex::new(&pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let root = match literal_prefix.rfind('/') {
        Some(slash) => PathBuf::from(&literal_prefix[..=slash]),
        None => PathBuf::from("."),
    };

    let mut files = Vec::new();
    let mut stack = vec![(root, 0)];
    while let Some((dir, depth)) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => continue,
            Err(error) => return Err(error),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() && depth < MAX_SCAN_DEPTH {
                stack.push((path, depth + 1));
            } else if file_type.is_file() {
                let display = path.to_string_lossy();
                let relative = display.strip_prefix("./").unwrap_or(&*display);
                if re.is_match(relative) {
                    files.push(PathBuf::from(relative));
                }
            }
        }
    }
    Ok(files)
}
