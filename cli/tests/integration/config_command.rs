//! Integration tests for `tether config` command.
//!
//! All filesystem-touching tests set `TETHER_CONFIG` to a temp path so they
//! never read or write `~/.tether/config.yaml`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn tether() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tether"));
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Returns a `TempDir` and the path string for a config file inside it.
fn temp_config_path() -> (TempDir, String) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir
        .path()
        .join("config.yaml")
        .to_string_lossy()
        .into_owned();
    (dir, path)
}

#[test]
fn test_config_help_shows_show_and_set_subcommands() {
    tether()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("set"));
}

#[test]
fn test_config_show_without_file_uses_defaults() {
    let (_dir, path) = temp_config_path();
    tether()
        .args(["config", "show"])
        .env("TETHER_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("agent.binary"))
        .stdout(predicate::str::contains("ami"))
        .stdout(predicate::str::contains("locality.invalid_locator"));
}

#[test]
fn test_config_show_masks_secret_env_values() {
    let (_dir, path) = temp_config_path();
    tether()
        .args(["config", "show"])
        .env("TETHER_CONFIG", &path)
        .env("TETHER_SSH_PASSWORD", "hunter2")
        .assert()
        .success()
        .stdout(predicate::str::contains("hunter2").not())
        .stdout(predicate::str::contains("(set)"));
}

#[test]
fn test_config_set_then_show_roundtrip() {
    let (_dir, path) = temp_config_path();
    tether()
        .args(["config", "set", "agent.binary", "/opt/ami/bin/ami"])
        .env("TETHER_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Set agent.binary"));

    tether()
        .args(["config", "show"])
        .env("TETHER_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::contains("/opt/ami/bin/ami"));
}

#[test]
fn test_config_show_json() {
    let (_dir, path) = temp_config_path();
    let output = tether()
        .args(["--output-format", "json", "config", "show"])
        .env("TETHER_CONFIG", &path)
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["path"], path.as_str());
    assert_eq!(value["config"]["remote"]["program"], "tether");
    assert_eq!(value["config"]["locality"]["invalid_locator"], "local");
}

#[test]
fn test_config_set_unknown_key_exits_with_configuration_code() {
    let (_dir, path) = temp_config_path();
    tether()
        .args(["config", "set", "remote.hostname", "x"])
        .env("TETHER_CONFIG", &path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("remote.hostname"));
}

#[test]
fn test_config_set_invalid_policy_is_rejected() {
    let (_dir, path) = temp_config_path();
    tether()
        .args(["config", "set", "locality.invalid_locator", "maybe"])
        .env("TETHER_CONFIG", &path)
        .assert()
        .code(2);
    assert!(!std::path::Path::new(&path).exists());
}

#[test]
fn test_config_set_agent_timeout() {
    let (_dir, path) = temp_config_path();
    tether()
        .args(["config", "set", "agent.timeout_secs", "0"])
        .env("TETHER_CONFIG", &path)
        .assert()
        .code(2);

    tether()
        .args(["config", "set", "agent.timeout_secs", "45"])
        .env("TETHER_CONFIG", &path)
        .assert()
        .success();
    tether()
        .args(["config", "show"])
        .env("TETHER_CONFIG", &path)
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"agent\.timeout_secs:\s+45").unwrap());
}

#[test]
fn test_config_set_unknown_key_json_error() {
    let (_dir, path) = temp_config_path();
    let output = tether()
        .args(["--output-format", "json", "config", "set", "nope", "x"])
        .env("TETHER_CONFIG", &path)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "CONFIGURATION");
}
