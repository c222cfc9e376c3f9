//! Level writer over any `io::Write`.

use crate::application::ports::LevelWriter;
use crate::domain::level::Level;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Adapts an `io::Write` (stdout, a socket, a `Vec<u8>`) to [`LevelWriter`].
///
/// Writes are serialized by a mutex and the level is ignored.
///
/// # Examples
///
/// ```
/// use tracing_logroll::{IoWriter, Level, LevelWriter};
///
/// let writer = IoWriter::new(Vec::new());
/// writer.write_level(Level::Info, b"hello\n").unwrap();
/// assert_eq!(writer.into_inner(), b"hello\n");
/// ```
pub struct IoWriter<W> {
    inner: Mutex<W>,
}

impl<W: Write + Send> IoWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Recover the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IoWriter<io::Stdout> {
    /// Writer for the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl IoWriter<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W> fmt::Debug for IoWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoWriter")
            .field("inner", &std::any::type_name::<W>())
            .finish()
    }
}

impl<W: Write + Send> LevelWriter for IoWriter<W> {
    fn write_level(&self, _level: Level, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&self) -> io::Result<()> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writes_are_appended() {
        let writer = IoWriter::new(Vec::new());
        writer.write_level(Level::Warn, b"a").unwrap();
        writer.write_level(Level::Info, b"b").unwrap();
        writer.close().unwrap();
        assert_eq!(writer.into_inner(), b"ab");
    }

    #[test]
    fn test_errors_are_returned() {
        let writer = IoWriter::new(Broken);
        let err = writer.write_level(Level::Info, b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
