//! Errors raised while opening, rotating and writing log files.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Error returned by [`RotatingWriter`](super::RotatingWriter) operations.
#[derive(Debug)]
pub enum RotateError {
    /// The directory holding the log file could not be created
    CreateDir { path: PathBuf, source: io::Error },
    /// The live log file could not be opened
    Open { path: PathBuf, source: io::Error },
    /// The live log file could not be renamed to its rotated name
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    /// Buffered output could not be flushed
    Flush { path: PathBuf, source: io::Error },
    /// Writing to the live log file failed
    Write { path: PathBuf, source: io::Error },
}

impl RotateError {
    fn source_ref(&self) -> &io::Error {
        match self {
            RotateError::CreateDir { source, .. }
            | RotateError::Open { source, .. }
            | RotateError::Rename { source, .. }
            | RotateError::Flush { source, .. }
            | RotateError::Write { source, .. } => source,
        }
    }

    /// Kind of the underlying I/O error.
    pub fn kind(&self) -> io::ErrorKind {
        self.source_ref().kind()
    }
}

impl fmt::Display for RotateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotateError::CreateDir { path, source } => {
                write!(f, "failed to create directory {}: {}", path.display(), source)
            }
            RotateError::Open { path, source } => {
                write!(f, "failed to open log file {}: {}", path.display(), source)
            }
            RotateError::Rename { from, to, source } => write!(
                f,
                "failed to rename {} to {}: {}",
                from.display(),
                to.display(),
                source
            ),
            RotateError::Flush { path, source } => {
                write!(f, "failed to flush {}: {}", path.display(), source)
            }
            RotateError::Write { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for RotateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source_ref())
    }
}

impl From<RotateError> for io::Error {
    fn from(err: RotateError) -> Self {
        io::Error::new(err.kind(), err)
    }
}
