//! Remote bootstrap: prepares a host to receive proxied commands.
//!
//! Installs the architecture-matched `tether` binary on the remote host and
//! authorizes the local public key. Runs once per host or on key reset.

use tracing::{debug, info, warn};

use crate::application::ports::{
    ArtifactFetcher, AuthMethod, ProgressReporter, RemoteSession, SessionConnector,
};
use crate::application::services::session::with_session;
use crate::domain::keys::validate_public_key;
use crate::domain::platform::{ARCH_PROBE_COMMAND, artifact_url};
use crate::domain::{Architecture, Deadline, DispatchError, ElevationKind, KeyPair, Locator};

/// Where and what to install on the remote host.
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    /// Installed binary name.
    pub program: String,
    /// Release URL template with an `{arch}` placeholder.
    pub url_template: String,
    /// Temporary upload path on the remote host.
    pub upload_path: String,
    /// Remote system binary directory.
    pub install_dir: String,
}

impl BootstrapSettings {
    #[must_use]
    pub fn install_path(&self) -> String {
        format!("{}/{}", self.install_dir.trim_end_matches('/'), self.program)
    }
}

/// State of elevation-specific preparation after bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationPrep {
    /// The locator does not elevate.
    NotRequired,
    /// `su`/`sudo` preparation is not implemented; the host may need manual
    /// configuration before elevated operations work.
    NotImplemented(ElevationKind),
}

/// Outcome of a successful bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub architecture: Architecture,
    pub installed_to: String,
    /// `true` when the key line was appended during this run.
    pub key_added: bool,
    /// `true` when key authentication failed and a password was used.
    pub used_password: bool,
    pub elevation: ElevationPrep,
}

/// Opens a session preferring the locator's key, falling back to password
/// authentication when the key is rejected.
///
/// # Errors
///
/// Returns the connection error, or the error of the password attempt.
pub fn open_with_fallback<C, P>(
    connector: &C,
    locator: &Locator,
    password: P,
    deadline: Deadline,
    reporter: &impl ProgressReporter,
) -> Result<(C::Session, bool), DispatchError>
where
    C: SessionConnector + ?Sized,
    P: FnOnce() -> Result<String, DispatchError>,
{
    match connector.open(locator, &AuthMethod::LocatorKey, deadline) {
        Ok(session) => Ok((session, false)),
        Err(DispatchError::Authentication(reason)) => {
            debug!(%reason, "key authentication rejected");
            reporter.warn("Key not yet trusted by the remote host, using password authentication");
            let password = password()?;
            let session = connector.open(locator, &AuthMethod::Password(password), deadline)?;
            Ok((session, true))
        }
        Err(other) => Err(other),
    }
}

/// Bootstraps the host described by `locator`.
///
/// # Errors
///
/// Returns a typed error from the first failing step; the session is closed
/// on every path.
#[allow(clippy::too_many_arguments)]
pub fn bootstrap<C, F, P>(
    connector: &C,
    fetcher: &F,
    reporter: &impl ProgressReporter,
    settings: &BootstrapSettings,
    locator: &Locator,
    keys: &KeyPair,
    password: P,
    deadline: Deadline,
) -> Result<BootstrapReport, DispatchError>
where
    C: SessionConnector + ?Sized,
    F: ArtifactFetcher + ?Sized,
    P: FnOnce() -> Result<String, DispatchError>,
{
    reporter.step(&format!("Connecting to {}", locator.address()));
    let (session, used_password) =
        open_with_fallback(connector, locator, password, deadline, reporter)?;

    with_session(session, |session| {
        let architecture = detect_architecture(session)?;
        reporter.step(&format!("Remote architecture: {architecture}"));

        install_binary(session, fetcher, reporter, settings, architecture, deadline)?;
        reporter.success(&format!("Installed {}", settings.install_path()));

        let key_added = authorize_key(session, &keys.public_key)?;
        if key_added {
            reporter.success("Authorized local key on the remote host");
        } else {
            reporter.step("Local key already authorized");
        }

        let elevation = match locator.elevate {
            ElevationKind::None => ElevationPrep::NotRequired,
            kind => {
                warn!(elevation = kind.as_str(), "elevation preparation is not implemented");
                reporter.warn(&format!(
                    "Elevation via {} is not prepared automatically; configure it on the remote host",
                    kind.as_str()
                ));
                ElevationPrep::NotImplemented(kind)
            }
        };

        info!(host = %locator.host, %architecture, key_added, "bootstrap complete");
        Ok(BootstrapReport {
            architecture,
            installed_to: settings.install_path(),
            key_added,
            used_password,
            elevation,
        })
    })
}

/// Runs the architecture probe and maps its output.
///
/// # Errors
///
/// Returns a remote execution error if the probe fails or reports an
/// unsupported architecture.
pub fn detect_architecture(session: &mut impl RemoteSession) -> Result<Architecture, DispatchError> {
    let output = session.run(ARCH_PROBE_COMMAND, &[])?;
    if !output.success() {
        return Err(DispatchError::RemoteExecution {
            message: format!("'{ARCH_PROBE_COMMAND}' failed: {}", output.stderr_lossy().trim()),
            exit_code: Some(output.exit_code),
        });
    }
    let raw = output.stdout_lossy();
    match Architecture::from_uname(&raw) {
        Architecture::Unknown => Err(DispatchError::remote(format!(
            "unsupported remote architecture '{}'",
            raw.trim()
        ))),
        arch => Ok(arch),
    }
}

fn install_binary<F>(
    session: &mut impl RemoteSession,
    fetcher: &F,
    reporter: &impl ProgressReporter,
    settings: &BootstrapSettings,
    architecture: Architecture,
    deadline: Deadline,
) -> Result<(), DispatchError>
where
    F: ArtifactFetcher + ?Sized,
{
    let url = artifact_url(&settings.url_template, architecture);
    reporter.step(&format!("Downloading {url}"));
    let artifact = fetcher.fetch(&url, deadline)?;

    reporter.step(&format!("Uploading to {}", settings.upload_path));
    session.upload(artifact.file.path(), &settings.upload_path, 0o755)?;
    verify_upload(session, &settings.upload_path, &artifact.sha256)?;

    let upload = shell_words::quote(&settings.upload_path);
    let install_path = settings.install_path();
    let target = shell_words::quote(&install_path);
    let output = session.run(&format!("chmod +x {upload} && mv -f {upload} {target}"), &[])?;
    if !output.success() {
        return Err(DispatchError::RemoteExecution {
            message: format!(
                "failed to install {install_path}: {}",
                output.stderr_lossy().trim()
            ),
            exit_code: Some(output.exit_code),
        });
    }
    Ok(())
}

/// Compares the remote digest with the local one when `sha256sum` exists on
/// the remote host.
fn verify_upload(
    session: &mut impl RemoteSession,
    remote_path: &str,
    expected: &str,
) -> Result<(), DispatchError> {
    let output = session.run(&format!("sha256sum {}", shell_words::quote(remote_path)), &[])?;
    if !output.success() {
        debug!("sha256sum unavailable on remote host, skipping upload verification");
        return Ok(());
    }
    let stdout = output.stdout_lossy();
    let actual = stdout.split_whitespace().next().unwrap_or_default();
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(DispatchError::remote(format!(
            "uploaded artifact checksum mismatch: expected {expected}, got {actual}"
        )));
    }
    Ok(())
}

/// Validates that a public key is a single well-formed OpenSSH line.
/// Quoting for the remote shell is done by the caller.
///
/// # Errors
///
/// Returns an authentication error for a multi-line or unparsable key.
pub fn validate_pubkey(key: &str) -> Result<(), DispatchError> {
    let key = key.trim();
    if key.contains(['\n', '\r']) {
        return Err(DispatchError::Authentication(
            "public key must be a single line".to_string(),
        ));
    }
    validate_public_key(key)
}

/// Appends `public_key` to the remote user's `~/.ssh/authorized_keys` unless
/// an identical line exists. Returns `true` when the line was appended.
///
/// # Errors
///
/// Returns an authentication error for a malformed key or a remote execution
/// error if the script fails.
pub fn authorize_key(
    session: &mut impl RemoteSession,
    public_key: &str,
) -> Result<bool, DispatchError> {
    validate_pubkey(public_key)?;
    let key = shell_words::quote(public_key.trim()).into_owned();

    let script = format!(
        "mkdir -p ~/.ssh && chmod 700 ~/.ssh && \
         touch ~/.ssh/authorized_keys && chmod 600 ~/.ssh/authorized_keys && \
         if grep -qxF {key} ~/.ssh/authorized_keys; then echo present; \
         else printf '%s\\n' {key} >> ~/.ssh/authorized_keys && echo added; fi"
    );

    let output = session.run(&script, &[])?;
    if !output.success() {
        return Err(DispatchError::RemoteExecution {
            message: format!("failed to authorize key: {}", output.stderr_lossy().trim()),
            exit_code: Some(output.exit_code),
        });
    }
    Ok(output.stdout_lossy().trim() == "added")
}
