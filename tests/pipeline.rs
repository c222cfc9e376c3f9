//! End-to-end tests of the log pipeline: level tags, suppression, the async
//! queue and rotating file output.

use chrono::{Local, TimeZone};
use std::fs;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_logroll::infrastructure::mocks::{MemoryWriter, MockClock};
use tracing_logroll::{
    Level, LimitConfig, LogPipeline, LogPipelineBuilder, QueueOutcome, RotateOptions, Verdict,
};

fn memory_pipeline(memory: &MemoryWriter) -> LogPipelineBuilder {
    LogPipeline::builder()
        .with_layout("%l %msg")
        .with_writer(Arc::new(memory.clone()))
}

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_pipeline_writes_rotating_file() {
    let dir = tempfile::tempdir().unwrap();
    let clock = MockClock::new(Local.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
    let file = RotateOptions::builder(dir.path().join("app.log"))
        .with_clock(Arc::new(clock.clone()))
        .with_max_age(Duration::ZERO)
        .build()
        .unwrap();

    let pipeline = LogPipeline::builder()
        .with_layout("%t{HH:mm} [%-5l] %msg%n")
        .with_print_color(true)
        .with_clock(Arc::new(clock.clone()))
        .with_rotating_file(file)
        .build()
        .unwrap();

    pipeline.log(Level::Info, "starting").unwrap();
    pipeline.log(Level::Info, "E! disk failure").unwrap();
    clock.advance(Duration::from_secs(24 * 3600));
    pipeline.log(Level::Info, "next day").unwrap();
    pipeline.close().unwrap();

    // Files never receive color codes.
    assert_eq!(
        fs::read_to_string(dir.path().join("app.log.2024-06-01")).unwrap(),
        "08:00 [INFO ] starting\n08:00 [ERROR] disk failure\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("app.log")).unwrap(),
        "08:00 [INFO ] next day\n"
    );
}

#[test]
fn test_one_of_every_n() {
    let memory = MemoryWriter::new();
    let pipeline = memory_pipeline(&memory).build().unwrap();

    let verdicts: Vec<Verdict> = (1..=7)
        .map(|n| pipeline.log(Level::Info, &format!("[L:3,0s:poll] poll #{}", n)).unwrap())
        .collect();

    assert_eq!(memory.lines(), vec![" INFO poll #1", " INFO poll #4", " INFO poll #7"]);
    assert!(matches!(verdicts[1], Verdict::Buffered { ref key } if key == "poll"));
    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.emitted, 3);
    assert_eq!(snapshot.buffered, 4);
}

#[test]
fn test_more_severe_levels_bypass_limit() {
    let memory = MemoryWriter::new();
    let pipeline = memory_pipeline(&memory)
        .with_limit_config(LimitConfig::new("db", 100, Duration::ZERO).with_level(Level::Warn))
        .build()
        .unwrap();

    pipeline.log(Level::Warn, "[L:db] slow query").unwrap();
    pipeline.log(Level::Warn, "[L:db] slow query").unwrap();
    pipeline.log(Level::Error, "[L:db] connection lost").unwrap();
    pipeline.log(Level::Error, "[L:db] connection lost").unwrap();

    assert_eq!(
        memory.lines(),
        vec![" WARN slow query", "ERROR connection lost", "ERROR connection lost"]
    );
}

#[test]
fn test_ticker_flushes_latest_pending() {
    let memory = MemoryWriter::new();
    let pipeline = memory_pipeline(&memory).build().unwrap();

    for n in 1..=5 {
        pipeline.log(Level::Info, &format!("[L:50ms:beat] beat {}", n)).unwrap();
    }
    wait_until(|| memory.lines().last().map(String::as_str) == Some(" INFO beat 5"));

    let flushed = memory.len();
    assert!((1..=5).contains(&flushed));
    thread::sleep(Duration::from_millis(150));
    assert_eq!(memory.len(), flushed, "nothing pending, nothing flushed");
    assert!(pipeline.metrics().flushed() >= 1);
}

#[test]
fn test_unknown_named_config_is_ignored() {
    let memory = MemoryWriter::new();
    let pipeline = memory_pipeline(&memory).build().unwrap();

    pipeline.log(Level::Info, "[L:nosuchconfig] kept as is").unwrap();
    assert_eq!(memory.lines(), vec![" INFO [L:nosuchconfig] kept as is"]);
}

#[test]
fn test_runtime_registered_config() {
    let memory = MemoryWriter::new();
    let pipeline = memory_pipeline(&memory).build().unwrap();
    pipeline.register_limit(LimitConfig::new("late", 2, Duration::ZERO));

    for _ in 0..4 {
        pipeline.log(Level::Info, "[L:late] tick").unwrap();
    }
    assert_eq!(memory.len(), 2);
}

#[test]
fn test_async_records_are_drained_on_close() {
    let memory = MemoryWriter::new();
    let pipeline = memory_pipeline(&memory).build().unwrap();

    for n in 0..10 {
        let verdict = pipeline.log(Level::Info, &format!("[L:async] job {}", n)).unwrap();
        assert_eq!(verdict, Verdict::Queued(QueueOutcome::Enqueued));
    }
    pipeline.close().unwrap();

    let expected: Vec<String> = (0..10).map(|n| format!(" INFO job {}", n)).collect();
    assert_eq!(memory.lines(), expected);
    assert_eq!(pipeline.metrics().async_enqueued(), 10);
}

#[test]
fn test_custom_level_tags() {
    let memory = MemoryWriter::new();
    let pipeline = memory_pipeline(&memory)
        .with_level_tag("[ERROR]", Level::Error)
        .with_level_tag("<dbg>", Level::Debug)
        .with_level(Level::Info)
        .build()
        .unwrap();

    pipeline.log(Level::Info, "[ERROR] db down").unwrap();
    pipeline.log(Level::Info, "<dbg> noisy").unwrap();
    assert_eq!(memory.lines(), vec!["ERROR db down"]);
}

#[test]
fn test_std_writer_adapter() {
    let memory = MemoryWriter::new();
    let pipeline = memory_pipeline(&memory).build().unwrap();

    let mut out = pipeline.writer_at(Level::Warn);
    out.write_all(b"[L:off] hidden\n").unwrap();
    out.write_all(b"visible\n").unwrap();

    assert_eq!(memory.lines(), vec![" WARN visible"]);
    assert_eq!(pipeline.metrics().dropped(), 1);
}

#[test]
fn test_clones_share_state() {
    let memory = MemoryWriter::new();
    let pipeline = memory_pipeline(&memory).build().unwrap();
    let clone = pipeline.clone();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = clone.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    pipeline.log(Level::Info, "[L:10,0s:shared] hit").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memory.len(), 10);
    assert_eq!(pipeline.tracked_keys(), 1);
}
