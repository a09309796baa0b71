//! Corruption recovery tests for the ironplan binary.
//!
//! These verify the CLI degrades gracefully when state files are damaged:
//! corrupt athlete state falls back to defaults, and bad set-log lines
//! are skipped rather than poisoning the whole log.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("ironplan"))
}

fn run(data_dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    cli()
        .args(args)
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
}

#[test]
fn test_corrupt_athlete_state_falls_back_to_defaults() {
    let temp_dir = setup_test_dir();
    let state_path = temp_dir.path().join("log/athlete.json");
    fs::create_dir_all(state_path.parent().unwrap()).unwrap();
    fs::write(&state_path, "{ this is not json").unwrap();

    run(temp_dir.path(), &["status"])
        .stdout(predicate::str::contains("Not enrolled"));
}

#[test]
fn test_enroll_recovers_from_corrupt_state() {
    let temp_dir = setup_test_dir();
    let state_path = temp_dir.path().join("log/athlete.json");
    fs::create_dir_all(state_path.parent().unwrap()).unwrap();
    fs::write(&state_path, "garbage").unwrap();

    run(temp_dir.path(), &["enroll", "linear_base"])
        .stdout(predicate::str::contains("Enrolled"));

    run(temp_dir.path(), &["status"])
        .stdout(predicate::str::contains("Linear Base"));
}

#[test]
fn test_corrupt_set_log_lines_are_skipped() {
    let temp_dir = setup_test_dir();
    run(temp_dir.path(), &["enroll", "linear_base"]);
    run(temp_dir.path(), &["max", "squat", "300", "--kind", "tm"]);
    run(temp_dir.path(), &["start"]);
    run(temp_dir.path(), &["log", "linear_squat", "--reps", "5"]);

    // Inject a garbage line into the set log
    let log_path = temp_dir.path().join("log/sets.jsonl");
    {
        let mut file = fs::OpenOptions::new().append(true).open(&log_path).unwrap();
        writeln!(file, "{{ broken line").unwrap();
    }

    // Further logging and rollup still work around the bad line
    run(temp_dir.path(), &["log", "linear_squat", "--reps", "5"]);
    run(temp_dir.path(), &["rollup"])
        .stdout(predicate::str::contains("Rolled up 2 sets"));
}

#[test]
fn test_fresh_data_dir_is_created() {
    let temp_dir = setup_test_dir();
    let nested = temp_dir.path().join("deeply/nested/data");

    cli()
        .arg("status")
        .arg("--data-dir")
        .arg(&nested)
        .assert()
        .success();

    assert!(nested.join("log").exists());
}
