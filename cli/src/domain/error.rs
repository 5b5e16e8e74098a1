//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Dispatch errors ───────────────────────────────────────────────────────────

/// Errors surfaced by the dispatch subsystem (locator, keys, sessions,
/// bootstrap, local execution).
///
/// Every variant maps to a distinct process exit code via [`exit_code`].
///
/// [`exit_code`]: DispatchError::exit_code
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Locator missing or malformed, or an invalid local setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Key parse, passphrase or password rejection.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Dial, handshake, network failure or deadline expiry.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote command failed or its exit status could not be captured.
    #[error("remote execution failed: {message}")]
    RemoteExecution {
        message: String,
        exit_code: Option<i32>,
    },

    /// The agent binary could not be found or spawned, or exited nonzero.
    #[error("local execution failed: {message}")]
    LocalExecution {
        message: String,
        exit_code: Option<i32>,
    },

    /// Locator or credentials JSON encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Key, locator or credentials write failure.
    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl DispatchError {
    /// Process exit code for this error class.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Authentication(_) => 3,
            Self::Connection(_) => 4,
            Self::RemoteExecution { .. } => 5,
            Self::LocalExecution { .. } => 6,
            Self::Serialization(_) => 7,
            Self::Filesystem(_) => 8,
        }
    }

    /// Short machine-readable code used by JSON error output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION",
            Self::Authentication(_) => "AUTHENTICATION",
            Self::Connection(_) => "CONNECTION",
            Self::RemoteExecution { .. } => "REMOTE_EXECUTION",
            Self::LocalExecution { .. } => "LOCAL_EXECUTION",
            Self::Serialization(_) => "SERIALIZATION",
            Self::Filesystem(_) => "FILESYSTEM",
        }
    }

    /// A remote execution failure without a remote exit status.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteExecution {
            message: message.into(),
            exit_code: None,
        }
    }

    /// A local execution failure without a process exit status.
    #[must_use]
    pub fn local(message: impl Into<String>) -> Self {
        Self::LocalExecution {
            message: message.into(),
            exit_code: None,
        }
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
