//! CLI smoke tests

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_pipeline_commands() {
    Command::cargo_bin("ip")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Adaptive interpretation pipeline"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("answer"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn start_requires_diagnostic_file() {
    Command::cargo_bin("ip")
        .unwrap()
        .args(["start", "run-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--diagnostic"));
}

#[test]
fn rejects_unknown_format() {
    Command::cargo_bin("ip")
        .unwrap()
        .args(["status", "run-1", "--format", "csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown format"));
}
