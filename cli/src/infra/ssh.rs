//! Session manager: `ssh2`-backed implementation of the session ports.
//!
//! All calls block; the dispatcher runs them inside `spawn_blocking`.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use ssh2::{Channel, HashType, OpenFlags, OpenType, Session, Sftp};
use tracing::{debug, warn};

use crate::application::ports::{
    AuthMethod, EnvVars, RemoteOutput, RemoteSession, SessionConnector,
};
use crate::domain::keys::{decrypt_private_key, is_encrypted};
use crate::domain::proxy::env_prefix;
use crate::domain::{Deadline, DispatchError, Locator};
use crate::infra::download::hex_encode;
use crate::infra::{keys, prompt};

/// Pause between polls of a non-blocking channel with no data.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Opens `ssh2` sessions.
#[derive(Debug, Clone)]
pub struct Ssh2Connector {
    /// Bound on dial, handshake and authentication.
    pub connect_timeout: Duration,
    /// Environment variable holding the private key passphrase.
    pub passphrase_env: String,
}

impl SessionConnector for Ssh2Connector {
    type Session = Ssh2Session;

    fn open(
        &self,
        locator: &Locator,
        auth: &AuthMethod,
        deadline: Deadline,
    ) -> Result<Ssh2Session, DispatchError> {
        locator.validate()?;
        let connect_deadline = deadline.min_with(self.connect_timeout);
        let tcp = dial(&locator.address(), connect_deadline)?;

        let mut session = Session::new()
            .map_err(|e| DispatchError::Connection(format!("cannot create SSH session: {e}")))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(connect_deadline.timeout_ms());
        session.handshake().map_err(|e| map_ssh_error("handshake", e))?;

        if let Some(hash) = session.host_key_hash(HashType::Sha256) {
            debug!(host = %locator.host, fingerprint = %hex_encode(hash), "remote host key");
        }

        self.authenticate(&session, locator, auth)?;

        let sftp = session.sftp().map_err(|e| map_ssh_error("opening SFTP", e))?;
        debug!(host = %locator.host, user = %locator.username, "SSH session open");
        Ok(Ssh2Session {
            session,
            sftp: Some(sftp),
            deadline,
            closed: false,
        })
    }
}

impl Ssh2Connector {
    fn authenticate(
        &self,
        session: &Session,
        locator: &Locator,
        auth: &AuthMethod,
    ) -> Result<(), DispatchError> {
        let user = &locator.username;
        let result = match auth {
            AuthMethod::LocatorKey => {
                let pair = keys::load(locator)?;
                let private_key = if is_encrypted(&pair.private_key) {
                    let passphrase = prompt::secret(&self.passphrase_env, "Private key passphrase")?;
                    decrypt_private_key(&pair.private_key, &passphrase)?
                } else {
                    pair.private_key
                };
                session.userauth_pubkey_memory(user, None, &private_key, None)
            }
            AuthMethod::Password(password) => session.userauth_password(user, password),
        };
        result.map_err(|e| {
            DispatchError::Authentication(format!("{user}@{} rejected: {e}", locator.host))
        })?;
        if !session.authenticated() {
            return Err(DispatchError::Authentication(format!(
                "{user}@{} rejected credentials",
                locator.host
            )));
        }
        Ok(())
    }
}

fn dial(address: &str, deadline: Deadline) -> Result<TcpStream, DispatchError> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|e| DispatchError::Connection(format!("cannot resolve {address}: {e}")))?;
    let mut last_err = None;
    for addr in addrs {
        deadline.check("connect")?;
        let result = match deadline.remaining() {
            Some(remaining) => TcpStream::connect_timeout(&addr, remaining),
            None => TcpStream::connect(addr),
        };
        match result {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(DispatchError::Connection(match last_err {
        Some(e) => format!("cannot connect to {address}: {e}"),
        None => format!("{address} resolved to no addresses"),
    }))
}

/// One SSH connection with its SFTP channel.
pub struct Ssh2Session {
    session: Session,
    sftp: Option<Sftp>,
    deadline: Deadline,
    closed: bool,
}

impl Ssh2Session {
    fn ensure_open(&self, operation: &str) -> Result<(), DispatchError> {
        if self.closed {
            return Err(DispatchError::Connection(format!(
                "{operation} on a closed session"
            )));
        }
        self.deadline.check(operation)?;
        self.session.set_timeout(self.deadline.timeout_ms());
        Ok(())
    }

    fn exec(&self, command: &str, env: &EnvVars) -> Result<Channel, DispatchError> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| map_ssh_error("opening channel", e))?;
        for (key, value) in env {
            if let Err(e) = channel.setenv(key, value) {
                warn!(%key, error = %e, "remote host refused environment variable");
            }
        }
        debug!(%command, "remote exec");
        channel
            .exec(command)
            .map_err(|e| map_ssh_error("exec", e))?;
        Ok(channel)
    }

    /// Drains both channel streams until EOF, handing each chunk to `sink`.
    fn pump(
        &self,
        channel: &mut Channel,
        mut sink: impl FnMut(bool, &[u8]) -> std::io::Result<()>,
    ) -> Result<(), DispatchError> {
        self.session.set_blocking(false);
        let result = self.pump_nonblocking(channel, &mut sink);
        self.session.set_blocking(true);
        result
    }

    fn pump_nonblocking(
        &self,
        channel: &mut Channel,
        sink: &mut impl FnMut(bool, &[u8]) -> std::io::Result<()>,
    ) -> Result<(), DispatchError> {
        let mut stderr = channel.stderr();
        let mut buf = [0u8; 8192];
        loop {
            let mut progressed = false;
            for is_stderr in [false, true] {
                let read = if is_stderr {
                    stderr.read(&mut buf)
                } else {
                    channel.read(&mut buf)
                };
                match read {
                    Ok(0) => {}
                    Ok(n) => {
                        sink(is_stderr, &buf[..n]).map_err(|e| {
                            DispatchError::Filesystem(format!("cannot forward output: {e}"))
                        })?;
                        progressed = true;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        return Err(DispatchError::Connection(format!(
                            "SSH read failed: {e}"
                        )));
                    }
                }
            }
            if channel.eof() && !progressed {
                return Ok(());
            }
            self.deadline.check("remote command")?;
            if !progressed {
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }

    fn finish(&self, channel: &mut Channel) -> Result<i32, DispatchError> {
        self.session.set_timeout(self.deadline.timeout_ms());
        channel
            .wait_close()
            .map_err(|e| map_ssh_error("waiting for remote command", e))?;
        let signal = channel.exit_signal().ok().and_then(|s| s.exit_signal);
        if let Some(name) = signal {
            return Err(DispatchError::RemoteExecution {
                message: format!("remote command terminated by signal {name}"),
                exit_code: None,
            });
        }
        channel.exit_status().map_err(|e| DispatchError::RemoteExecution {
            message: format!("remote exit status unavailable: {e}"),
            exit_code: None,
        })
    }
}

impl RemoteSession for Ssh2Session {
    fn run(&mut self, command: &str, env: &EnvVars) -> Result<RemoteOutput, DispatchError> {
        self.ensure_open("run")?;
        let mut channel = self.exec(command, env)?;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        self.pump(&mut channel, |is_stderr, chunk| {
            if is_stderr {
                stderr.extend_from_slice(chunk);
            } else {
                stdout.extend_from_slice(chunk);
            }
            Ok(())
        })?;
        let exit_code = self.finish(&mut channel)?;
        debug!(exit_code, "remote command finished");
        Ok(RemoteOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    fn run_piped(&mut self, command: &str, env: &EnvVars) -> Result<i32, DispatchError> {
        self.ensure_open("run")?;
        let command = format!("{}{command}", env_prefix(env));
        let mut channel = self.exec(&command, &[])?;
        let mut out = std::io::stdout().lock();
        let mut err = std::io::stderr().lock();
        self.pump(&mut channel, |is_stderr, chunk| {
            if is_stderr {
                err.write_all(chunk)?;
                err.flush()
            } else {
                out.write_all(chunk)?;
                out.flush()
            }
        })?;
        let exit_code = self.finish(&mut channel)?;
        debug!(exit_code, "piped remote command finished");
        Ok(exit_code)
    }

    fn upload(&mut self, local: &Path, remote: &str, mode: i32) -> Result<(), DispatchError> {
        self.ensure_open("upload")?;
        let sftp = self
            .sftp
            .as_ref()
            .ok_or_else(|| DispatchError::Connection("SFTP channel is closed".to_string()))?;
        let mut source = std::fs::File::open(local).map_err(|e| {
            DispatchError::Filesystem(format!("cannot open {}: {e}", local.display()))
        })?;
        let mut target = sftp
            .open_mode(
                Path::new(remote),
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                mode,
                OpenType::File,
            )
            .map_err(|e| DispatchError::RemoteExecution {
                message: format!("cannot create {remote}: {e}"),
                exit_code: None,
            })?;
        let bytes = std::io::copy(&mut source, &mut target).map_err(|e| {
            DispatchError::RemoteExecution {
                message: format!("cannot upload to {remote}: {e}"),
                exit_code: None,
            }
        })?;
        debug!(%remote, bytes, "uploaded");
        Ok(())
    }

    fn close(&mut self) -> Result<(), DispatchError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sftp = None;
        self.session
            .disconnect(None, "closing", None)
            .map_err(|e| map_ssh_error("disconnect", e))
    }
}

impl Drop for Ssh2Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            debug!(error = %e, "SSH disconnect on drop failed");
        }
    }
}

fn map_ssh_error(operation: &str, err: ssh2::Error) -> DispatchError {
    let io_err: std::io::Error = err.into();
    match io_err.kind() {
        std::io::ErrorKind::TimedOut => {
            DispatchError::Connection(format!("{operation} timed out"))
        }
        _ => DispatchError::Connection(format!("{operation} failed: {io_err}")),
    }
}
