//! Integration tests for CLI parsing and the version command.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn tether() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tether"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    tether()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("setup"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("stop"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_help_hides_proxy_flags() {
    tether()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--remote-instance").not());
}

#[test]
fn test_no_subcommand_prints_help_and_fails() {
    tether()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_subcommand_fails() {
    tether().arg("launch").assert().failure();
}

#[test]
fn test_version_flag() {
    tether()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_version_command_text() {
    tether()
        .arg("version")
        .assert()
        .success()
        .stdout(format!("tether {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_color_env_accepts_conventional_values() {
    for value in ["1", "true", "yes", "0", ""] {
        Command::new(assert_cmd::cargo::cargo_bin!("tether"))
            .env("NO_COLOR", value)
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }
}

#[test]
fn test_no_color_flag_without_env() {
    Command::new(assert_cmd::cargo::cargo_bin!("tether"))
        .env_remove("NO_COLOR")
        .args(["--no-color", "version"])
        .assert()
        .success();
}

#[test]
fn test_version_command_json() {
    let output = tether()
        .args(["--output-format", "json", "version"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_invalid_output_format_is_rejected() {
    tether()
        .args(["--output-format", "yaml", "version"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid output format"));
}

#[test]
fn test_exec_requires_arguments() {
    tether().arg("exec").assert().failure();
}

#[test]
fn test_setup_rejects_unknown_elevation() {
    tether()
        .args(["setup", "--remote", "host", "--remote-elevate", "doas"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("doas"));
}
