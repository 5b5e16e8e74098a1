//! Application context: unified state passed to every command handler.
//!
//! Constructed once in `Cli::run()` from the global flags and the loaded
//! configuration, then passed as `&AppContext` to all command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::application::services::bootstrap::BootstrapSettings;
use crate::application::services::config_service;
use crate::application::services::dispatch::{
    DispatchContext, DispatchSettings, Dispatcher, forwarded_env,
};
use crate::domain::{OutputFormat, RemoteInstanceVars, TetherConfig};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::locator::FsLocatorStore;
use crate::infra::ssh::Ssh2Connector;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// Production dispatcher type.
pub type AppDispatcher = Dispatcher<TokioCommandRunner, FsLocatorStore, Ssh2Connector>;

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Requested output format.
    pub format: OutputFormat,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// App directory (`--path`).
    pub path: PathBuf,
    /// Process argument vector, program name first.
    pub argv: Vec<String>,
    /// Set when invoked by a remote dispatcher.
    pub remote_instance: bool,
    /// Vars forwarded by a remote dispatcher.
    pub vars: RemoteInstanceVars,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output format (text vs JSON).
    pub format: OutputFormat,
    /// Loaded configuration.
    pub config: TetherConfig,
    /// Configuration persistence.
    pub config_store: YamlConfigStore,
    /// App directory the command operates on.
    pub path: PathBuf,
    /// Per-invocation dispatch state.
    pub dispatch: DispatchContext,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn new(flags: AppFlags) -> Result<Self> {
        let config_store = YamlConfigStore;
        let config = config_service::load_config(&config_store)?;
        let dispatch = DispatchContext {
            argv: flags.argv,
            vars: flags.vars,
            remote_instance: flags.remote_instance,
            invalid_locator: config.locality.invalid_locator,
            remote_env: forwarded_env(
                std::env::vars_os()
                    .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
            ),
        };
        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            format: flags.output.format,
            config,
            config_store,
            path: flags.path,
            dispatch,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.format {
            OutputFormat::Text => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputFormat::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// SSH connector configured from `remote.*`.
    #[must_use]
    pub fn connector(&self) -> Ssh2Connector {
        Ssh2Connector {
            connect_timeout: self.config.remote.connect_timeout(),
            passphrase_env: self.config.remote.passphrase_env.clone(),
        }
    }

    /// Builds the dispatch facade for this invocation.
    #[must_use]
    pub fn dispatcher(&self) -> AppDispatcher {
        Dispatcher::new(
            TokioCommandRunner::new(self.config.agent.timeout()),
            FsLocatorStore,
            Arc::new(self.connector()),
            DispatchSettings {
                agent_binary: self.config.agent.binary.clone(),
                remote_program: self.config.remote.program.clone(),
                command_timeout: self.config.remote.command_timeout(),
            },
            self.dispatch.clone(),
        )
    }

    /// Bootstrap settings from `bootstrap.*` and `remote.program`.
    #[must_use]
    pub fn bootstrap_settings(&self) -> BootstrapSettings {
        BootstrapSettings {
            program: self.config.remote.program.clone(),
            url_template: self.config.bootstrap.url.clone(),
            upload_path: self.config.bootstrap.upload_path.clone(),
            install_dir: self.config.bootstrap.install_dir.clone(),
        }
    }
}
