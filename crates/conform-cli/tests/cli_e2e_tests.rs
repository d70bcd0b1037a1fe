//! End-to-end tests for `conform run`
//!
//! The subject binary is `sh` and every corpus file is a small shell script,
//! so a corpus file decides its own verdict through its exit status.
//!
//! Tests cover:
//! - Invocation counts and ordering
//! - Exit codes of the harness
//! - Fatal discovery errors
//! - Timeouts and unlaunchable subjects
//! - JSON output and the results log

#![cfg(unix)]

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

/// Create a project with an `impl/test` corpus
fn create_corpus(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let corpus = temp_dir.path().join("impl").join("test");
    fs::create_dir_all(&corpus).unwrap();
    for (name, content) in files {
        fs::write(corpus.join(name), content).unwrap();
    }
    temp_dir
}

fn run_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("conform").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("CONFORM_CORPUS_DIR")
        .env_remove("CONFORM_SUFFIX")
        .env_remove("CONFORM_TIMEOUT")
        .env_remove("CONFORM_JSON")
        .env("CONFORM_SUBJECT", "sh")
        .env("NO_COLOR", "1")
        .arg("run");
    cmd
}

// ============================================================================
// conform run - Success Cases
// ============================================================================

#[test]
fn test_run_three_matching_files_issues_six_invocations() {
    let dir = create_corpus(&[
        ("a.pf", "exit 0"),
        ("b.pf", "exit 0"),
        ("c.pf", "exit 0"),
        ("ignored.txt", "exit 1"),
    ]);

    run_cmd(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Test #6 passed"))
        .stdout(predicate::str::contains("Test #7").not())
        .stdout(predicate::str::contains("Total tests: 6"))
        .stdout(predicate::str::contains("Passed tests: 6"))
        .stdout(predicate::str::contains("Failed tests: 0"))
        .stdout(predicate::str::contains("Time elapsed:"));
}

#[test]
fn test_run_optimized_mode_gets_flag() {
    let dir = create_corpus(&[("a.pf", "exit 0")]);

    run_cmd(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Test #1 passed: sh \"impl/test/a.pf\" -v\n"))
        .stdout(predicate::str::contains("Test #2 passed: sh \"impl/test/a.pf\" -v -O\n"));
}

#[test]
fn test_run_empty_corpus_succeeds_with_zero_totals() {
    let dir = create_corpus(&[]);

    run_cmd(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total tests: 0"));
}

// ============================================================================
// conform run - Failure Cases
// ============================================================================

#[test]
fn test_run_failure_sets_exit_code_and_shows_output() {
    let dir = create_corpus(&[
        ("good.pf", "exit 0"),
        ("bad.pf", "echo 'error: unexpected token' >&2; exit 1"),
    ]);

    run_cmd(&dir)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed: sh \"impl/test/bad.pf\" -v"))
        .stdout(predicate::str::contains("error: unexpected token"))
        .stdout(predicate::str::contains("Passed tests: 2"))
        .stdout(predicate::str::contains("Failed tests: 2"));
}

#[test]
fn test_run_missing_corpus_is_fatal() {
    let dir = TempDir::new().unwrap();

    run_cmd(&dir)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Test #").not())
        .stderr(predicate::str::contains("Corpus directory not found"));
}

#[test]
fn test_run_unlaunchable_subject_keeps_going() {
    let dir = create_corpus(&[("a.pf", ""), ("b.pf", "")]);

    run_cmd(&dir)
        .args(["--subject", "./no-such-compiler"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Test #4 failed"))
        .stdout(predicate::str::contains("failed to launch ./no-such-compiler"))
        .stdout(predicate::str::contains("Failed tests: 4"));
}

#[test]
fn test_run_timeout_kills_slow_subject() {
    // `sleep` is a child of the subject, like an assembler under a compiler
    let dir = create_corpus(&[("slow.pf", "echo compiling\nsleep 30\n")]);

    let start = std::time::Instant::now();
    run_cmd(&dir)
        .args(["--timeout", "1"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("timed out after"))
        .stdout(predicate::str::contains("compiling"))
        .stdout(predicate::str::contains("Failed tests: 2"));
    assert!(start.elapsed() < std::time::Duration::from_secs(15));
}

#[test]
fn test_run_failure_output_keeps_stream_order() {
    let dir = create_corpus(&[(
        "bad.pf",
        "echo parsing\necho 'error: line 3' >&2\necho 'after error'\nexit 1\n",
    )]);

    run_cmd(&dir)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("parsing\nerror: line 3\nafter error\n"));
}

#[test]
fn test_run_rejects_empty_suffix() {
    let dir = create_corpus(&[("a.pf", "exit 0"), ("notes.txt", "exit 0")]);

    run_cmd(&dir)
        .args(["--suffix", ""])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("Test #").not());
}

// ============================================================================
// conform run - Output Formats
// ============================================================================

#[test]
fn test_run_json_output() {
    let dir = create_corpus(&[("a.pf", "exit 0")]);

    let output = run_cmd(&dir).arg("--json").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["id"], 1);
    assert_eq!(records[1]["mode"], "optimized");
    assert_eq!(records[2]["type"], "summary");
    assert_eq!(records[2]["success"], true);
}

#[test]
fn test_run_results_log_written() {
    let dir = create_corpus(&[("a.pf", "exit 3")]);
    let log = dir.path().join("run.jsonl");

    run_cmd(&dir)
        .arg("--results-log")
        .arg(&log)
        .assert()
        .code(1);

    let content = fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("\"exit_code\":3"));
    assert!(lines[2].contains("\"failed\":2"));
}

#[test]
fn test_run_pattern_filter() {
    let dir = create_corpus(&[("loops.pf", "exit 0"), ("arith.pf", "exit 1")]);

    run_cmd(&dir)
        .arg("loops")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total tests: 2"))
        .stdout(predicate::str::contains("arith").not());
}
