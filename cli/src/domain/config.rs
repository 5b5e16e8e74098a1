//! Domain types and validators for Tether configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::locator::InvalidLocatorPolicy;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "agent.binary",
    "agent.timeout_secs",
    "remote.program",
    "remote.connect_timeout_secs",
    "remote.command_timeout_secs",
    "remote.passphrase_env",
    "remote.password_env",
    "bootstrap.url",
    "bootstrap.upload_path",
    "bootstrap.install_dir",
    "locality.invalid_locator",
];
pub const VALID_INVALID_LOCATOR_POLICIES: &[&str] = &["local", "error"];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.tether/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TetherConfig {
    /// Local agent binary settings.
    pub agent: AgentConfig,
    /// SSH connection settings.
    pub remote: RemoteConfig,
    /// Remote bootstrap settings.
    pub bootstrap: BootstrapConfig,
    /// Locator resolution settings.
    pub locality: LocalityConfig,
}

/// Agent binary invoked for local execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Name (looked up on `PATH`) or absolute path of the agent binary.
    pub binary: String,
    /// Bound on a captured agent call (`info`, `exec --capture`); the agent
    /// is killed when it expires. Pass-through calls are not bounded.
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary: "ami".to_string(),
            timeout_secs: 300,
        }
    }
}

impl AgentConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// SSH connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Program invoked on the remote host.
    pub program: String,
    /// Bound on dial + handshake + authentication. `0` disables it.
    pub connect_timeout_secs: u64,
    /// Bound on a whole remote call. `0` disables it.
    pub command_timeout_secs: u64,
    /// Environment variable holding the private key passphrase.
    pub passphrase_env: String,
    /// Environment variable holding the SSH password for bootstrap.
    pub password_env: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            program: "tether".to_string(),
            connect_timeout_secs: 30,
            command_timeout_secs: 0,
            passphrase_env: "TETHER_KEY_PASSPHRASE".to_string(),
            password_env: "TETHER_SSH_PASSWORD".to_string(),
        }
    }
}

impl RemoteConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Remote bootstrap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Release artifact URL; `{arch}` expands to `amd64` or `arm64`.
    pub url: String,
    /// Temporary upload location on the remote host.
    pub upload_path: String,
    /// Directory the binary is moved into on the remote host.
    pub install_dir: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            url: "https://github.com/tether-cli/tether/releases/latest/download/tether-linux-{arch}"
                .to_string(),
            upload_path: "/tmp/tether".to_string(),
            install_dir: "/usr/sbin".to_string(),
        }
    }
}

/// Locator resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LocalityConfig {
    /// `local` treats malformed locators as local apps, `error` surfaces them.
    pub invalid_locator: InvalidLocatorPolicy,
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let invalid = |valid: &str| -> anyhow::Error {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            valid: valid.to_string(),
        }
        .into()
    };
    match key {
        "locality.invalid_locator" if !VALID_INVALID_LOCATOR_POLICIES.contains(&value) => {
            Err(invalid(&VALID_INVALID_LOCATOR_POLICIES.join(", ")))
        }
        "remote.connect_timeout_secs" | "remote.command_timeout_secs"
            if value.parse::<u64>().is_err() =>
        {
            Err(invalid("a whole number of seconds"))
        }
        "agent.timeout_secs" if !value.parse::<u64>().is_ok_and(|secs| secs > 0) => {
            Err(invalid("a positive number of seconds"))
        }
        "bootstrap.url" if !value.contains("{arch}") => Err(invalid("a URL containing {arch}")),
        "agent.binary" | "remote.program" | "remote.passphrase_env" | "remote.password_env"
        | "bootstrap.upload_path" | "bootstrap.install_dir"
            if value.trim().is_empty() =>
        {
            Err(invalid("a non-empty string"))
        }
        _ => Ok(()),
    }
}

/// Applies a validated `key = value` to `config`.
///
/// # Errors
///
/// Returns an error if the key is unknown or the value invalid.
pub fn apply_config_value(config: &mut TetherConfig, key: &str, value: &str) -> Result<()> {
    validate_config_key(key)?;
    validate_config_value(key, value)?;
    match key {
        "agent.binary" => config.agent.binary = value.to_string(),
        "agent.timeout_secs" => config.agent.timeout_secs = value.parse()?,
        "remote.program" => config.remote.program = value.to_string(),
        "remote.connect_timeout_secs" => config.remote.connect_timeout_secs = value.parse()?,
        "remote.command_timeout_secs" => config.remote.command_timeout_secs = value.parse()?,
        "remote.passphrase_env" => config.remote.passphrase_env = value.to_string(),
        "remote.password_env" => config.remote.password_env = value.to_string(),
        "bootstrap.url" => config.bootstrap.url = value.to_string(),
        "bootstrap.upload_path" => config.bootstrap.upload_path = value.to_string(),
        "bootstrap.install_dir" => config.bootstrap.install_dir = value.to_string(),
        "locality.invalid_locator" => {
            config.locality.invalid_locator = if value == "error" {
                InvalidLocatorPolicy::Surface
            } else {
                InvalidLocatorPolicy::TreatAsLocal
            };
        }
        _ => anyhow::bail!("Unknown setting: {key}"),
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
