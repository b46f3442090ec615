//! Smoke tests for the trk CLI.
//!
//! These tests verify basic CLI functionality:
//! - `trk --version` outputs version info
//! - `trk --help` outputs help text
//! - unknown commands fail

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the trk binary.
fn trk() -> Command {
    Command::new(env!("CARGO_BIN_EXE_trk"))
}

#[test]
fn test_version_flag() {
    trk()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("trk"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    trk()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("Options:"));
}

#[test]
fn test_rig_help() {
    trk()
        .args(["rig", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("switch"));
}

#[test]
fn test_no_command_fails() {
    trk().assert().failure().stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_invalid_command() {
    trk()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
