//! Remote locator: the persisted descriptor that marks an app directory as
//! operating on a remote host.
//!
//! Pure types and merge logic only. Reading and writing locators lives in
//! `crate::infra::locator`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::DispatchError;

/// File name of the locator inside an app directory.
pub const LOCATOR_FILE: &str = ".tether-remote.json";
/// Default private key file name inside an app directory.
pub const PRIVATE_KEY_FILE: &str = ".tether-remote-key";
/// Default public key file name inside an app directory.
pub const PUBLIC_KEY_FILE: &str = ".tether-remote-key.pub";
/// Directory holding elevation credentials, kept apart from the locator.
pub const CREDENTIALS_DIR: &str = ".tether-credentials";

pub const DEFAULT_SSH_PORT: &str = "22";
pub const DEFAULT_SSH_USER: &str = "root";

/// Privilege escalation used on the remote host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElevationKind {
    #[default]
    #[serde(rename = "", alias = "none")]
    None,
    #[serde(rename = "su")]
    Su,
    #[serde(rename = "sudo")]
    Sudo,
}

impl ElevationKind {
    /// Parses `su`, `sudo`, `none` or the empty string.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any other value.
    pub fn parse(value: &str) -> Result<Self, DispatchError> {
        match value.trim() {
            "" | "none" => Ok(Self::None),
            "su" => Ok(Self::Su),
            "sudo" => Ok(Self::Sudo),
            other => Err(DispatchError::Configuration(format!(
                "invalid elevation '{other}' (expected su, sudo or none)"
            ))),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Su => "su",
            Self::Sudo => "sudo",
        }
    }
}

/// Credentials for `su`/`sudo` on the remote host.
///
/// Stored in the credentials directory, never inside the locator file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ElevationCredentials {
    pub kind: ElevationKind,
    pub user: String,
    pub password: String,
}

/// Connection and credential-location metadata for a remote app.
///
/// Field names are serialized in `PascalCase` to stay compatible with
/// existing locator files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Locator {
    /// Target app identifier (e.g. `node`, `signer`).
    pub app: String,
    pub host: String,
    pub username: String,
    /// App path on the remote host. Empty means the remote default.
    pub instance_path: String,
    pub elevate: ElevationKind,
    /// Path to the private key file.
    pub private_key: String,
    /// Path to the public key file.
    pub public_key: String,
    pub port: String,
    /// Path to the elevation credentials directory.
    pub elevation_credentials: String,
}

impl Locator {
    /// Populates every empty field from `previous`. Fields already set on
    /// `self` win; previously set fields are never dropped.
    #[must_use]
    pub fn merge_from(mut self, previous: &Locator) -> Self {
        fn fill(field: &mut String, prev: &str) {
            if field.is_empty() {
                prev.clone_into(field);
            }
        }
        fill(&mut self.app, &previous.app);
        fill(&mut self.host, &previous.host);
        fill(&mut self.username, &previous.username);
        fill(&mut self.instance_path, &previous.instance_path);
        fill(&mut self.private_key, &previous.private_key);
        fill(&mut self.public_key, &previous.public_key);
        fill(&mut self.port, &previous.port);
        fill(&mut self.elevation_credentials, &previous.elevation_credentials);
        if self.elevate == ElevationKind::None {
            self.elevate = previous.elevate;
        }
        self
    }

    /// Fills port, user and key paths that are still empty with defaults
    /// rooted at `app_dir`.
    #[must_use]
    pub fn with_defaults(mut self, app_dir: &Path) -> Self {
        if self.port.is_empty() {
            DEFAULT_SSH_PORT.clone_into(&mut self.port);
        }
        if self.username.is_empty() {
            DEFAULT_SSH_USER.clone_into(&mut self.username);
        }
        if self.private_key.is_empty() {
            self.private_key = app_dir.join(PRIVATE_KEY_FILE).display().to_string();
        }
        if self.public_key.is_empty() {
            self.public_key = app_dir.join(PUBLIC_KEY_FILE).display().to_string();
        }
        self
    }

    /// `host:port` string used to dial the remote.
    #[must_use]
    pub fn address(&self) -> String {
        let port = if self.port.is_empty() {
            DEFAULT_SSH_PORT
        } else {
            self.port.as_str()
        };
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{port}", self.host)
        } else {
            format!("{}:{port}", self.host)
        }
    }

    /// Checks the fields required to open a session.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the host is empty or the port is not
    /// a valid TCP port.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.host.trim().is_empty() {
            return Err(DispatchError::Configuration(
                "remote locator has no host".to_string(),
            ));
        }
        if !self.port.is_empty() && self.port.parse::<u16>().is_err() {
            return Err(DispatchError::Configuration(format!(
                "invalid SSH port '{}'",
                self.port
            )));
        }
        Ok(())
    }
}

// ── Locality ──────────────────────────────────────────────────────────────────

/// What to do when a locator file exists but cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidLocatorPolicy {
    /// Treat the app as local, matching the historical behaviour.
    #[default]
    #[serde(rename = "local")]
    TreatAsLocal,
    /// Surface a configuration error.
    #[serde(rename = "error")]
    Surface,
}

impl InvalidLocatorPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TreatAsLocal => "local",
            Self::Surface => "error",
        }
    }
}

/// Result of resolving where an app lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locality {
    /// No locator file.
    Local,
    /// Locator present and well-formed.
    Remote(Locator),
    /// Locator present but unreadable or malformed.
    Invalid(String),
}

impl Locality {
    /// Returns the locator when remote, folding `Invalid` into "not remote".
    #[must_use]
    pub fn remote(&self) -> Option<&Locator> {
        match self {
            Self::Remote(locator) => Some(locator),
            Self::Local | Self::Invalid(_) => None,
        }
    }

    /// Applies `policy` to an `Invalid` result.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for `Invalid` under
    /// [`InvalidLocatorPolicy::Surface`].
    pub fn apply(self, policy: InvalidLocatorPolicy) -> Result<Option<Locator>, DispatchError> {
        match (self, policy) {
            (Self::Remote(locator), _) => Ok(Some(locator)),
            (Self::Local, _) | (Self::Invalid(_), InvalidLocatorPolicy::TreatAsLocal) => Ok(None),
            (Self::Invalid(reason), InvalidLocatorPolicy::Surface) => {
                Err(DispatchError::Configuration(reason))
            }
        }
    }
}

// ── Remote target ─────────────────────────────────────────────────────────────

/// A `[user@]host[:port]` target given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub username: Option<String>,
    pub host: String,
    pub port: Option<String>,
}

/// Parses `[user@]host[:port]`. IPv6 hosts must be bracketed when a port is
/// given (`[::1]:2222`).
///
/// # Errors
///
/// Returns a configuration error for an empty host or a non-numeric port.
pub fn parse_remote_target(raw: &str) -> Result<RemoteTarget, DispatchError> {
    let raw = raw.trim();
    let (username, rest) = match raw.rsplit_once('@') {
        Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
        Some((_, rest)) => (None, rest),
        None => (None, raw),
    };

    let (host, port) = if let Some(stripped) = rest.strip_prefix('[') {
        let (host, tail) = stripped.split_once(']').ok_or_else(|| {
            DispatchError::Configuration(format!("unterminated IPv6 host in '{raw}'"))
        })?;
        (host.to_string(), tail.strip_prefix(':').map(str::to_string))
    } else if rest.matches(':').count() == 1 {
        let (host, port) = rest.split_once(':').unwrap_or((rest, ""));
        (host.to_string(), Some(port.to_string()))
    } else {
        (rest.to_string(), None)
    };

    if host.is_empty() {
        return Err(DispatchError::Configuration(format!(
            "remote target '{raw}' has no host"
        )));
    }
    if let Some(port) = &port
        && port.parse::<u16>().is_err()
    {
        return Err(DispatchError::Configuration(format!(
            "invalid SSH port '{port}' in '{raw}'"
        )));
    }

    Ok(RemoteTarget {
        username,
        host,
        port,
    })
}
