//! Tests of the tracing integration and of the crate's own diagnostics.

use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_logroll::infrastructure::mocks::{MemoryWriter, MockCaptureLayer};
use tracing_logroll::{Level, LevelWriter, LogPipeline, LogPipelineLayer, RotateOptions};
use tracing_subscriber::layer::SubscriberExt;

#[derive(Debug)]
struct FailingWriter;

impl LevelWriter for FailingWriter {
    fn write_level(&self, _level: Level, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_events_reach_rotating_file() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = LogPipeline::builder()
        .with_layout("[%l] %fields %msg%n")
        .with_level(Level::Debug)
        .with_rotating_file(
            RotateOptions::builder(dir.path().join("events.log"))
                .with_max_age(Duration::ZERO)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let subscriber =
        tracing_subscriber::registry().with(LogPipelineLayer::new(pipeline.clone()));
    tracing::subscriber::with_default(subscriber, || {
        tracing::trace!("too verbose");
        tracing::debug!(attempt = 2, "retrying");
        for _ in 0..5 {
            tracing::warn!("[L:5,0s:flaky] upstream flaky");
        }
    });
    pipeline.close().unwrap();

    let contents = fs::read_to_string(dir.path().join("events.log")).unwrap();
    assert_eq!(
        contents,
        "[DEBUG] {\"attempt\":2} retrying\n[ WARN]  upstream flaky\n"
    );
}

#[test]
fn test_events_and_raw_messages_share_limits() {
    let memory = MemoryWriter::new();
    let pipeline = LogPipeline::builder()
        .with_layout("%msg")
        .with_writer(Arc::new(memory.clone()))
        .build()
        .unwrap();

    let subscriber =
        tracing_subscriber::registry().with(LogPipelineLayer::new(pipeline.clone()));
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("[L:2,0s:shared] from tracing");
    });
    pipeline.log(Level::Info, "[L:2,0s:shared] from log").unwrap();
    pipeline.log(Level::Info, "[L:2,0s:shared] from log again").unwrap();

    assert_eq!(memory.lines(), vec!["from tracing", "from log again"]);
}

#[test]
fn test_write_errors_are_counted_and_reported() {
    let capture = MockCaptureLayer::new();
    let memory = MemoryWriter::new();
    let pipeline = LogPipeline::builder()
        .with_layout("%msg")
        .with_writer(Arc::new(FailingWriter))
        .with_writer(Arc::new(memory.clone()))
        .build()
        .unwrap();

    let subscriber = tracing_subscriber::registry()
        .with(capture.clone())
        .with(LogPipelineLayer::new(pipeline.clone()));
    let result = tracing::subscriber::with_default(subscriber, || {
        pipeline.log(Level::Info, "hello")
    });

    let err = result.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    // The healthy writer still got the record.
    assert_eq!(memory.lines(), vec!["hello"]);
    assert_eq!(pipeline.metrics().write_errors(), 1);

    let reported = capture.matching("failed to write log record");
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].level, tracing::Level::ERROR);
    // The diagnostic was not fed back into the pipeline.
    assert_eq!(memory.len(), 1);
}
