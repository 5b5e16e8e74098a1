//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;

use crate::domain::{
    Deadline, DispatchError, ElevationCredentials, KeyPair, Locality, Locator, TetherConfig,
};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Environment variables passed to a spawned program.
pub type EnvVars = [(String, String)];

/// Abstracts local process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture stdout and stderr separately.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str], env: &EnvVars) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvVars,
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program and capture stdout and stderr interleaved in one buffer.
    async fn run_combined(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvVars,
    ) -> Result<(Vec<u8>, ExitStatus)>;
    /// Run a program with inherited stdio and return only its exit status.
    async fn run_status(&self, program: &str, args: &[&str], env: &EnvVars) -> Result<ExitStatus>;
}

// ── Locator Store Port ────────────────────────────────────────────────────────

/// Persistence of remote locators and elevation credentials.
pub trait LocatorStore {
    /// Resolves where the app at `app_dir` lives.
    fn resolve(&self, app_dir: &Path) -> Locality;

    /// `Some` iff a locator exists under `app_dir` and parses. Never fails
    /// and has no side effects.
    fn is_remote(&self, app_dir: &Path) -> Option<Locator> {
        self.resolve(app_dir).remote().cloned()
    }

    /// Strict load that surfaces missing or malformed locators.
    ///
    /// # Errors
    ///
    /// Returns a configuration or serialization error.
    fn load(&self, app_dir: &Path) -> Result<Locator, DispatchError>;

    /// Provisions keys and writes key files plus the locator under `app_dir`.
    /// Returns the locator as written and the key pair in use.
    ///
    /// # Errors
    ///
    /// Any I/O failure aborts with a filesystem error; nothing is rolled back.
    fn write(
        &self,
        app_dir: &Path,
        locator: &Locator,
        reset: bool,
    ) -> Result<(Locator, KeyPair), DispatchError>;

    /// Writes elevation credentials to the separate credentials store and
    /// returns its directory.
    ///
    /// # Errors
    ///
    /// Returns a filesystem or serialization error.
    fn write_credentials(
        &self,
        app_dir: &Path,
        credentials: &ElevationCredentials,
    ) -> Result<PathBuf, DispatchError>;
}

// ── Remote Session Ports ──────────────────────────────────────────────────────

/// How to authenticate when opening a session.
#[derive(Clone)]
pub enum AuthMethod {
    /// Key pair referenced by the locator's key paths.
    LocatorKey,
    /// Password authentication, used while bootstrapping an untrusted host.
    Password(String),
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocatorKey => f.write_str("LocatorKey"),
            Self::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl RemoteOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Opens SSH sessions. Blocking; callers run it off the async runtime.
pub trait SessionConnector: Send + Sync {
    type Session: RemoteSession;

    /// Dials, authenticates and opens the SFTP channel for `locator`.
    ///
    /// # Errors
    ///
    /// Returns a connection, authentication or configuration error.
    fn open(
        &self,
        locator: &Locator,
        auth: &AuthMethod,
        deadline: Deadline,
    ) -> Result<Self::Session, DispatchError>;
}

/// One live SSH connection plus SFTP channel.
pub trait RemoteSession {
    /// Runs `command` on a fresh channel, capturing both streams. `env` is
    /// applied best-effort through the SSH environment request.
    ///
    /// # Errors
    ///
    /// Returns a remote execution or connection error.
    fn run(&mut self, command: &str, env: &EnvVars) -> Result<RemoteOutput, DispatchError>;

    /// Runs `command`, streaming its output to the local stdout/stderr, and
    /// returns the remote exit status. `env` is prepended to the command line.
    ///
    /// # Errors
    ///
    /// Returns a remote execution error if the exit status cannot be captured.
    fn run_piped(&mut self, command: &str, env: &EnvVars) -> Result<i32, DispatchError>;

    /// Copies `local` to `remote` over SFTP, creating or truncating it.
    ///
    /// # Errors
    ///
    /// Returns a filesystem or remote execution error.
    fn upload(&mut self, local: &Path, remote: &str, mode: i32) -> Result<(), DispatchError>;

    /// Closes the connection; the SFTP channel goes with it. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a connection error if the disconnect message fails.
    fn close(&mut self) -> Result<(), DispatchError>;
}

// ── Artifact Port ─────────────────────────────────────────────────────────────

/// A downloaded release artifact held in a temporary file.
pub struct Artifact {
    /// Deleted when dropped.
    pub file: tempfile::NamedTempFile,
    /// Lowercase hex SHA-256 of the contents.
    pub sha256: String,
}

/// Downloads release artifacts to local temporary files.
pub trait ArtifactFetcher {
    /// # Errors
    ///
    /// Returns a connection error for network failures and a filesystem
    /// error if the temporary file cannot be written.
    fn fetch(&self, url: &str, deadline: Deadline) -> Result<Artifact, DispatchError>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait; no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<TetherConfig>;
    /// Persist the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &TetherConfig) -> Result<()>;
    /// Location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<PathBuf>;
}
