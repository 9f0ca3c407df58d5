//! End-to-end CLI tests for the sync-games binary.

use assert_cmd::Command;
use predicates::prelude::*;

const CLEARED_ENV: &[&str] = &[
    "SSH_USER",
    "SSH_HOST",
    "SSH_PATH",
    "SSH_PORT",
    "SSH_KEY_PATH",
    "SSH_PASSWORD",
    "RUST_LOG",
];

fn sync_games() -> Command {
    let mut cmd = Command::cargo_bin("sync-games").unwrap();
    for key in CLEARED_ENV {
        cmd.env_remove(key);
    }
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    sync_games()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Synchronize the game archive catalog"))
        .stdout(predicate::str::contains("--max-transfers"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    sync_games()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync-games"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    sync_games()
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Without a mirror server or path the run stops before touching the network.
#[test]
fn test_binary_missing_remote_configuration_fails() {
    sync_games()
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("mirror server not set"));
}

#[test]
fn test_binary_missing_remote_path_fails() {
    sync_games()
        .args(["--scp-server", "sync@mirror.invalid"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("mirror path not set"));
}
