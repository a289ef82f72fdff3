#![cfg(unix)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use mutator::runner::{self, TestRunner, Watchdog};
use mutator::Error;
use tempfile::TempDir;

// --- popen_streaming_output ---

#[test]
fn streams_every_line_in_order() {
    let mut lines = Vec::new();
    let code = runner::popen_streaming_output("echo one; echo two; echo three", |l| lines.push(l.to_string()), None)
        .unwrap();
    assert_eq!(code, 0);
    assert_eq!(lines, vec!["one", "two", "three"]);
}

#[test]
fn captures_stderr_too() {
    let mut lines = Vec::new();
    runner::popen_streaming_output("echo oops >&2", |l| lines.push(l.to_string()), None).unwrap();
    assert_eq!(lines, vec!["oops"]);
}

#[test]
fn reports_exit_code() {
    assert_eq!(runner::popen_streaming_output("exit 3", |_| {}, None).unwrap(), 3);
    assert_eq!(runner::popen_streaming_output("true", |_| {}, None).unwrap(), 0);
}

#[test]
fn last_line_without_newline_is_delivered() {
    let mut lines = Vec::new();
    runner::popen_streaming_output("printf 'a\\nb'", |l| lines.push(l.to_string()), None).unwrap();
    assert_eq!(lines, vec!["a", "b"]);
}

#[test]
fn timeout_kills_the_process() {
    let start = Instant::now();
    let result = runner::popen_streaming_output("sleep 5", |_| {}, Some(Duration::from_millis(200)));
    assert!(matches!(result, Err(Error::Timeout { .. })), "{result:?}");
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn timeout_kills_grandchildren() {
    let start = Instant::now();
    let result = runner::popen_streaming_output("sleep 5 & sleep 5; wait", |_| {}, Some(Duration::from_millis(200)));
    assert!(matches!(result, Err(Error::Timeout { .. })), "{result:?}");
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn fast_command_beats_the_deadline() {
    let code = runner::popen_streaming_output("exit 0", |_| {}, Some(Duration::from_secs(10))).unwrap();
    assert_eq!(code, 0);
}

// --- watchdog ---

#[test]
fn watchdog_fires_after_timeout() {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let mut dog = Watchdog::start(Duration::from_millis(10), move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    std::thread::sleep(Duration::from_millis(200));
    assert!(dog.has_fired());
    assert!(dog.cancel());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn cancelled_watchdog_never_fires() {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let mut dog = Watchdog::start(Duration::from_secs(60), move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    assert!(!dog.cancel());
    assert!(!dog.cancel());
    drop(dog);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

// --- pass/fail ---

#[test]
fn no_tests_collected_only_passes_incrementally() {
    assert!(runner::tests_passed(0, false));
    assert!(!runner::tests_passed(1, false));
    assert!(!runner::tests_passed(runner::NO_TESTS_COLLECTED, false));
    assert!(runner::tests_passed(runner::NO_TESTS_COLLECTED, true));
    assert!(!runner::tests_passed(1, true));
}

#[test]
fn test_runner_reports_pass_and_fail() {
    let green = TestRunner::new("true", true);
    assert!(green.tests_pass(None, |_| {}).unwrap());
    let red = TestRunner::new("false", true);
    assert!(!red.tests_pass(None, |_| {}).unwrap());
}

#[test]
fn test_runner_hands_lines_to_callback() {
    let runner = TestRunner::new("echo collected 3 items", true);
    let mut lines = Vec::new();
    runner.tests_pass(None, |l| lines.push(l.to_string())).unwrap();
    assert_eq!(lines, vec!["collected 3 items"]);
}

#[test]
fn testmon_command_is_incremental() {
    assert!(TestRunner::new("python -m pytest --testmon", true).incremental);
    assert!(!TestRunner::new("python -m pytest", true).incremental);
}

// --- hooks ---

#[test]
fn hook_output_is_returned() {
    assert_eq!(runner::run_hook("echo pre; echo hook"), "pre\nhook");
}

#[test]
fn failing_hook_is_not_fatal() {
    assert_eq!(runner::run_hook("echo partial; exit 7"), "partial");
}

// --- incremental snapshot ---

#[test]
fn snapshot_round_trip() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join(runner::INCREMENTAL_DATA);
    std::fs::write(&data, "baseline").unwrap();

    runner::snapshot_incremental_data(dir.path()).unwrap();
    std::fs::write(&data, "dirty").unwrap();
    runner::restore_incremental_snapshot(dir.path()).unwrap();

    assert_eq!(std::fs::read_to_string(&data).unwrap(), "baseline");
}

#[test]
fn only_mutant_runs_restore_the_snapshot() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join(runner::INCREMENTAL_DATA);
    std::fs::write(&data, "current").unwrap();
    std::fs::write(dir.path().join(runner::INCREMENTAL_SNAPSHOT), "stale").unwrap();
    let runner = TestRunner::new("true --testmon", true).with_data_dir(dir.path());

    assert!(runner.baseline_passes(|_| {}).unwrap());
    assert_eq!(std::fs::read_to_string(&data).unwrap(), "current");

    assert!(runner.tests_pass(None, |_| {}).unwrap());
    assert_eq!(std::fs::read_to_string(&data).unwrap(), "stale");
}

#[test]
fn missing_incremental_data_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    runner::snapshot_incremental_data(dir.path()).unwrap();
    runner::restore_incremental_snapshot(dir.path()).unwrap();
    assert!(!dir.path().join(runner::INCREMENTAL_DATA).exists());
}
