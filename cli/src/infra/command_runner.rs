//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution with guaranteed timeout and kill on all platforms.

use std::path::PathBuf;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::application::ports::{CommandRunner, EnvVars};

/// Default timeout for captured agent calls; `agent.timeout_secs` overrides it.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(300);

/// Production `CommandRunner`; uses tokio for async process execution
/// with guaranteed timeout and kill on all platforms.
///
/// On Windows, `tokio::time::timeout` around `.output().await` does NOT kill
/// the child process when the timeout fires. This implementation uses
/// `tokio::select!` with explicit `child.kill()` to terminate the process.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

/// Resolves `program` on `PATH`, or as given when it contains a separator.
fn resolve_program(program: &str) -> Result<PathBuf> {
    let path = which::which(program).with_context(|| format!("{program} not found"))?;
    debug!(program, path = %path.display(), "resolved program");
    Ok(path)
}

fn command(program: &str, args: &[&str], env: &EnvVars) -> Result<tokio::process::Command> {
    let mut cmd = tokio::process::Command::new(resolve_program(program)?);
    cmd.args(args)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .kill_on_drop(true);
    Ok(cmd)
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str], env: &EnvVars) -> Result<Output> {
        self.run_with_timeout(program, args, env, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvVars,
        timeout: Duration,
    ) -> Result<Output> {
        let mut child = command(program, args, env)?
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                Ok(Output {
                    status: status.with_context(|| format!("waiting for {program}"))?,
                    stdout,
                    stderr,
                })
            } => result,
            () = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }

    async fn run_combined(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvVars,
    ) -> Result<(Vec<u8>, ExitStatus)> {
        let mut child = command(program, args, env)?
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut combined = Vec::new();
        let mut out_buf = [0u8; 8192];
        let mut err_buf = [0u8; 8192];

        let drain = async {
            while stdout.is_some() || stderr.is_some() {
                tokio::select! {
                    n = read_chunk(&mut stdout, &mut out_buf), if stdout.is_some() => {
                        match n {
                            Some(n) => combined.extend_from_slice(&out_buf[..n]),
                            None => stdout = None,
                        }
                    }
                    n = read_chunk(&mut stderr, &mut err_buf), if stderr.is_some() => {
                        match n {
                            Some(n) => combined.extend_from_slice(&err_buf[..n]),
                            None => stderr = None,
                        }
                    }
                }
            }
            child.wait().await
        };

        tokio::select! {
            status = drain => {
                let status = status.with_context(|| format!("waiting for {program}"))?;
                Ok((combined, status))
            }
            () = tokio::time::sleep(self.timeout) => {
                anyhow::bail!("{program} timed out after {}s", self.timeout.as_secs())
            }
        }
    }

    async fn run_status(&self, program: &str, args: &[&str], env: &EnvVars) -> Result<ExitStatus> {
        let mut child = command(program, args, env)?
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))
    }
}

/// Reads one chunk; `None` on EOF or read error.
async fn read_chunk<R>(reader: &mut Option<R>, buf: &mut [u8]) -> Option<usize>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let reader = reader.as_mut()?;
    match reader.read(buf).await {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}
