#![cfg(unix)]

use std::time::{Duration, Instant};

use cloudpull::error::Error;
use cloudpull::contract::Invoke;
use cloudpull::runner::{BoundedBuffer, ProcessRunner};
use cloudpull::stream::stream_records;

fn sh(script: &str) -> (ProcessRunner, Vec<String>) {
    (
        ProcessRunner::new("/bin/sh"),
        vec!["-c".to_string(), script.to_string()],
    )
}

#[tokio::test]
async fn captures_stdout_on_success() {
    let (runner, args) = sh("echo hello");
    let output = runner.run_capture(args.clone(), 1024).await.unwrap();
    assert_eq!(output.trim(), "hello");
}

#[tokio::test]
async fn stdout_capture_never_exceeds_the_ceiling() {
    let (runner, args) = sh("head -c 100000 /dev/zero | tr '\\0' 'a'");
    let output = runner.run_capture(args.clone(), 1000).await.unwrap();
    assert_eq!(output.len(), 1000);
    assert!(output.bytes().all(|b| b == b'a'));
}

#[tokio::test]
async fn slow_process_times_out_rather_than_failing() {
    let (runner, args) = sh("sleep 5");
    let runner = runner.with_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let err = runner.run_capture(args.clone(), 1024).await.unwrap_err();

    assert!(matches!(err, Error::Timeout(_)), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn non_zero_exit_carries_captured_stderr() {
    let (runner, args) = sh("echo oops >&2; exit 3");
    let err = runner.run_capture(args.clone(), 1024).await.unwrap_err();

    match err {
        Error::ProcessFailure { status, stderr } => {
            assert_eq!(status.code(), Some(3));
            assert!(stderr.contains("oops"));
        }
        other => panic!("expected ProcessFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let runner = ProcessRunner::new("/nonexistent/tool-binary");
    let err = runner
        .run_capture(vec!["quota".to_string()], 1024)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }), "got {err:?}");
}

#[tokio::test]
async fn streaming_reads_live_output_line_by_line() {
    let (runner, args) = sh("printf 'a.txt\\nb.txt\\ntotal 2\\nc.txt\\n'");
    let stream = runner.spawn_streaming(args.clone()).await.unwrap();

    let mut names = Vec::new();
    stream_records(stream, false, |record| {
        names.push(record.name);
        Ok(())
    })
    .await
    .unwrap();

    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
}

#[tokio::test]
async fn streaming_surfaces_late_process_failure_with_stderr() {
    let (runner, args) = sh("printf 'a.txt\\n'; echo boom >&2; exit 7");
    let stream = runner.spawn_streaming(args.clone()).await.unwrap();

    let mut names = Vec::new();
    let err = stream_records(stream, false, |record| {
        names.push(record.name);
        Ok(())
    })
    .await
    .unwrap_err();

    // Records already delivered are not retracted.
    assert_eq!(names, vec!["a.txt"]);
    match err {
        Error::ProcessFailure { status, stderr } => {
            assert_eq!(status.code(), Some(7));
            assert!(stderr.contains("boom"));
        }
        other => panic!("expected ProcessFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn streaming_callback_error_kills_the_child_promptly() {
    // Without the abort this script would run for minutes.
    let (runner, args) = sh("printf 'a.txt\\n'; sleep 120");
    let stream = runner.spawn_streaming(args.clone()).await.unwrap();

    let started = Instant::now();
    let err = stream_records(stream, false, |_| anyhow::bail!("stop"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CallbackFailed(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn bounded_buffer_drops_writes_past_the_ceiling() {
    let mut buf = BoundedBuffer::new(8);
    assert!(buf.push(b"12345").is_ok());
    assert!(!buf.is_truncated());

    // Partial fit: retains up to the ceiling, records the overflow.
    assert!(buf.push(b"67890").is_ok());
    assert_eq!(buf.len(), 8);
    assert!(buf.is_truncated());

    // At capacity: the write reports the internal capacity error.
    assert!(buf.push(b"x").is_err());
    assert_eq!(buf.len(), 8);
    assert_eq!(buf.to_string_lossy(), "12345678");
}
