//! CLI argument parsing tests for flow
//!
//! Options are checked before any data moves, so every case here runs with an empty stdin.

use assert_cmd::Command;
use predicates::prelude::*;

fn flow() -> Command {
    Command::cargo_bin("flow").unwrap()
}

#[test]
fn test_help_runs() {
    flow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--length"));
}

#[test]
fn test_version_runs() {
    flow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_arguments_prints_usage() {
    flow()
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Usage"));
}

// ============================================================================
// Flag Tests
// ============================================================================

#[test]
fn test_short_h_is_human_readable_not_help() {
    flow()
        .args(["-h", "-c"])
        .write_stdin("")
        .assert()
        .success()
        .stderr(predicate::str::contains("Usage").not());
}

#[test]
fn test_combined_short_flags() {
    flow()
        .arg("-chsernt")
        .write_stdin("abc")
        .assert()
        .success()
        .stdout("abc");
}

#[test]
fn test_long_flags() {
    flow()
        .args([
            "--counters",
            "--human",
            "--elapsed",
            "--eta",
            "--remaining",
            "--newline",
            "--totals",
            "--bar=30",
            "--length=3",
        ])
        .write_stdin("abc")
        .assert()
        .success()
        .stdout("abc");
}

#[test]
fn test_interval_and_chunk_size() {
    flow()
        .args(["-c", "-i", "200ms", "--chunk-size", "1KiB"])
        .write_stdin("abc")
        .assert()
        .success()
        .stdout("abc");
}

#[test]
fn test_verbose_logs_to_stderr_only() {
    flow()
        .args(["-vv", "-c"])
        .write_stdin("abc")
        .assert()
        .success()
        .stdout("abc")
        .stderr(predicate::str::contains("display config: DisplayConfig"))
        .stderr(predicate::str::contains("end of stream"));
}

// ============================================================================
// Rejected Input
// ============================================================================

#[test]
fn test_unknown_option() {
    flow().arg("--bogus").write_stdin("").assert().code(7);
}

#[test]
fn test_size_options_conflict() {
    flow()
        .args(["-l", "10", "-u", "/"])
        .write_stdin("")
        .assert()
        .code(7);
}

#[test]
fn test_invalid_interval() {
    flow().args(["-i", "soon"]).write_stdin("").assert().code(7);
}

#[test]
fn test_zero_interval() {
    flow()
        .args(["-i", "0s"])
        .write_stdin("")
        .assert()
        .code(9)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_bar_width_floor_is_documented() {
    flow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("raised to 10"));
}

#[test]
fn test_sub_millisecond_interval() {
    flow()
        .args(["-i", "500us"])
        .write_stdin("")
        .assert()
        .code(9)
        .stderr(predicate::str::contains("at least 1ms"));
}

#[test]
fn test_zero_chunk_size() {
    flow()
        .args(["--chunk-size", "0"])
        .write_stdin("")
        .assert()
        .code(7);
}

#[test]
fn test_bad_length() {
    flow()
        .args(["-l", "abc"])
        .write_stdin("data")
        .assert()
        .code(4)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("abc"));
}

#[test]
fn test_bad_bar_width() {
    flow()
        .arg("-bxyz")
        .write_stdin("data")
        .assert()
        .code(8)
        .stdout(predicate::str::is_empty());
}
