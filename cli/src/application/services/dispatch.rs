//! Command dispatch facade: the single call-through surface for app
//! operations.
//!
//! Each call resolves the app's locality once and then either spawns the
//! agent binary locally or proxies the current invocation to the remote host
//! over a fresh SSH session. `Start → {Local | Remote} → Done`; no retries and
//! no session reuse between calls.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::application::ports::{
    AuthMethod, CommandRunner, LocatorStore, RemoteSession, SessionConnector,
};
use crate::application::services::session::open_and_run;
use crate::domain::proxy::{remote_command_line, rewrite_args};
use crate::domain::{
    Deadline, DispatchError, InvalidLocatorPolicy, Locator, OutputFormat, RemoteInstanceVars,
};

/// Prefix of environment variables carrying remote instance vars to the agent.
pub const VAR_ENV_PREFIX: &str = "TETHER_VAR_";

/// Per-invocation state handed to the dispatcher by the caller.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    /// The current process argument vector, program name first.
    pub argv: Vec<String>,
    /// Facts forwarded to the remote side, or received from the local side
    /// when this process is itself a remote instance.
    pub vars: RemoteInstanceVars,
    /// Set when this invocation was produced by remote resolution; forces
    /// local execution.
    pub remote_instance: bool,
    /// Handling of malformed locator files.
    pub invalid_locator: InvalidLocatorPolicy,
    /// Environment for remote commands (best effort), usually
    /// [`forwarded_env`] of the caller's environment.
    pub remote_env: Vec<(String, String)>,
}

/// Where a call was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Local,
    Remote,
}

/// Captured output of a dispatched call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
    pub exit_code: i32,
    pub location: Location,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Converts a nonzero exit code into the matching execution error.
    ///
    /// # Errors
    ///
    /// Returns a local or remote execution error carrying the exit code.
    pub fn check(self) -> Result<Self, DispatchError> {
        if self.success() {
            return Ok(self);
        }
        let message = format!("command exited with code {}", self.exit_code);
        Err(match self.location {
            Location::Local => DispatchError::LocalExecution {
                message,
                exit_code: Some(self.exit_code),
            },
            Location::Remote => DispatchError::RemoteExecution {
                message,
                exit_code: Some(self.exit_code),
            },
        })
    }
}

/// Settings the dispatcher needs from configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Agent binary spawned for local execution.
    pub agent_binary: String,
    /// Program invoked on the remote host.
    pub remote_program: String,
    /// Bound on a whole remote call; zero disables it.
    pub command_timeout: Duration,
}

/// The dispatch facade.
pub struct Dispatcher<R, S, C> {
    runner: R,
    locators: S,
    connector: Arc<C>,
    settings: DispatchSettings,
    context: DispatchContext,
}

impl<R, S, C> Dispatcher<R, S, C>
where
    R: CommandRunner,
    S: LocatorStore,
    C: SessionConnector + 'static,
{
    pub fn new(
        runner: R,
        locators: S,
        connector: Arc<C>,
        settings: DispatchSettings,
        context: DispatchContext,
    ) -> Self {
        Self {
            runner,
            locators,
            connector,
            settings,
            context,
        }
    }

    #[must_use]
    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Runs `args` against the app with stdio attached to the caller's.
    /// Returns the exit code of the agent (local) or the remote program.
    ///
    /// # Errors
    ///
    /// Returns a typed error when the agent cannot be spawned or the remote
    /// call fails.
    pub async fn execute(&self, app_dir: &Path, args: &[&str]) -> Result<i32, DispatchError> {
        match self.locate(app_dir)? {
            None => {
                let argv = local_args(app_dir, args);
                let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
                let status = self
                    .runner
                    .run_status(&self.settings.agent_binary, &argv, &self.agent_env())
                    .await
                    .map_err(|e| DispatchError::local(format!("{e:#}")))?;
                Ok(status.code().unwrap_or(1))
            }
            Some(locator) => {
                let command = self.remote_command(&locator, OutputFormat::Text);
                let env = self.context.remote_env.clone();
                self.remote(locator, move |session| session.run_piped(&command, &env))
                    .await
            }
        }
    }

    /// Runs `args` and captures output: stdout and stderr combined when local,
    /// remote stdout when remote.
    ///
    /// # Errors
    ///
    /// Returns a typed error when the agent cannot be spawned or the remote
    /// call fails. A nonzero exit code is not an error; see
    /// [`CommandOutput::check`].
    pub async fn execute_get_output(
        &self,
        app_dir: &Path,
        args: &[&str],
    ) -> Result<CommandOutput, DispatchError> {
        match self.locate(app_dir)? {
            None => {
                let argv = local_args(app_dir, args);
                let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
                let (output, status) = self
                    .runner
                    .run_combined(&self.settings.agent_binary, &argv, &self.agent_env())
                    .await
                    .map_err(|e| DispatchError::local(format!("{e:#}")))?;
                Ok(CommandOutput {
                    output: String::from_utf8_lossy(&output).into_owned(),
                    exit_code: status.code().unwrap_or(1),
                    location: Location::Local,
                })
            }
            Some(locator) => self.remote_captured(locator).await,
        }
    }

    /// Runs `args` and captures stdout only, for callers that parse JSON from
    /// the result.
    ///
    /// # Errors
    ///
    /// Same as [`execute_get_output`](Self::execute_get_output).
    pub async fn execute_info(
        &self,
        app_dir: &Path,
        args: &[&str],
    ) -> Result<CommandOutput, DispatchError> {
        match self.locate(app_dir)? {
            None => {
                let argv = local_args(app_dir, args);
                let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
                let output = self
                    .runner
                    .run(&self.settings.agent_binary, &argv, &self.agent_env())
                    .await
                    .map_err(|e| DispatchError::local(format!("{e:#}")))?;
                Ok(CommandOutput {
                    output: String::from_utf8_lossy(&output.stdout).into_owned(),
                    exit_code: output.status.code().unwrap_or(1),
                    location: Location::Local,
                })
            }
            Some(locator) => self.remote_captured(locator).await,
        }
    }

    fn locate(&self, app_dir: &Path) -> Result<Option<Locator>, DispatchError> {
        if self.context.remote_instance {
            debug!("remote instance invocation, executing locally");
            return Ok(None);
        }
        let locator = self
            .locators
            .resolve(app_dir)
            .apply(self.context.invalid_locator)?;
        match &locator {
            Some(l) => info!(app = %app_dir.display(), host = %l.host, "dispatching remotely"),
            None => debug!(app = %app_dir.display(), "dispatching locally"),
        }
        Ok(locator)
    }

    fn remote_command(&self, locator: &Locator, format: OutputFormat) -> String {
        let args = rewrite_args(
            &self.context.argv,
            format,
            &self.context.vars,
            &locator.instance_path,
        );
        remote_command_line(&self.settings.remote_program, &args)
    }

    async fn remote_captured(&self, locator: Locator) -> Result<CommandOutput, DispatchError> {
        let command = self.remote_command(&locator, OutputFormat::Json);
        let env = self.context.remote_env.clone();
        let output = self
            .remote(locator, move |session| session.run(&command, &env))
            .await?;
        Ok(CommandOutput {
            output: output.stdout_lossy(),
            exit_code: output.exit_code,
            location: Location::Remote,
        })
    }

    /// Runs `body` on a fresh session off the async runtime. The session is
    /// closed before this returns.
    async fn remote<T, F>(&self, locator: Locator, body: F) -> Result<T, DispatchError>
    where
        T: Send + 'static,
        F: FnOnce(&mut C::Session) -> Result<T, DispatchError> + Send + 'static,
    {
        let connector = Arc::clone(&self.connector);
        let deadline = Deadline::after(self.settings.command_timeout);
        tokio::task::spawn_blocking(move || {
            open_and_run(
                connector.as_ref(),
                &locator,
                &AuthMethod::LocatorKey,
                deadline,
                body,
            )
        })
        .await
        .map_err(|e| DispatchError::Connection(format!("remote call aborted: {e}")))?
    }

    fn agent_env(&self) -> Vec<(String, String)> {
        self.context
            .vars
            .iter()
            .map(|(k, v)| (format!("{VAR_ENV_PREFIX}{}", k.to_ascii_uppercase()), v.to_string()))
            .collect()
    }
}

/// Selects the `TETHER_VAR_*` variables of `env` for the remote command, so
/// they reach the agent as they would locally. Keys that are not plain shell
/// identifiers are dropped.
#[must_use]
pub fn forwarded_env(env: impl IntoIterator<Item = (String, String)>) -> Vec<(String, String)> {
    let mut forwarded: Vec<(String, String)> = env
        .into_iter()
        .filter(|(key, _)| {
            key.strip_prefix(VAR_ENV_PREFIX).is_some_and(|name| {
                !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
        })
        .collect();
    forwarded.sort();
    forwarded
}

/// Arguments for the local agent: `--path=<app_dir>` followed by `args`.
fn local_args(app_dir: &Path, args: &[&str]) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(format!("--path={}", app_dir.display()));
    argv.extend(args.iter().map(|a| (*a).to_string()));
    argv
}
