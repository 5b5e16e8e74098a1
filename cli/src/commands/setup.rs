//! `tether setup`: configure an app directory, optionally binding it to a
//! remote host and bootstrapping that host.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::bootstrap::{BootstrapReport, bootstrap};
use crate::application::services::setup::{RemoteSetup, configure_remote};
use crate::domain::locator::parse_remote_target;
use crate::domain::{Deadline, DispatchError, ElevationKind, KeyPair, Locator};
use crate::infra::download::UreqFetcher;
use crate::infra::locator::FsLocatorStore;
use crate::infra::prompt;
use crate::output::Progress;

/// Arguments for the setup command.
#[derive(Args, Default)]
pub struct SetupArgs {
    /// Remote host as `[user@]host[:port]`
    #[arg(long, value_name = "TARGET")]
    pub remote: Option<String>,

    /// App path on the remote host
    #[arg(long)]
    pub remote_path: Option<String>,

    /// App identifier on the remote host
    #[arg(long)]
    pub remote_app: Option<String>,

    /// Privilege elevation on the remote host
    #[arg(long, value_name = "su|sudo|none", value_parser = parse_elevation)]
    pub remote_elevate: Option<ElevationKind>,

    /// User for privilege elevation
    #[arg(long)]
    pub remote_elevate_user: Option<String>,

    /// Password for privilege elevation
    #[arg(long)]
    pub remote_elevate_password: Option<String>,

    /// Generate a new key pair even if one exists
    #[arg(long)]
    pub reset_key: bool,

    /// Only write the locator; do not touch the remote host
    #[arg(long)]
    pub skip_bootstrap: bool,
}

fn parse_elevation(raw: &str) -> Result<ElevationKind, String> {
    ElevationKind::parse(raw).map_err(|e| e.to_string())
}

impl SetupArgs {
    /// `true` when any remote option is present.
    #[must_use]
    pub fn configures_remote(&self) -> bool {
        self.remote.is_some()
            || self.remote_path.is_some()
            || self.remote_app.is_some()
            || self.remote_elevate.is_some()
            || self.remote_elevate_user.is_some()
            || self.remote_elevate_password.is_some()
            || self.reset_key
    }

    /// Builds the service request.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a malformed `--remote` target.
    pub fn to_request(&self) -> Result<RemoteSetup, DispatchError> {
        let target = self.remote.as_deref().map(parse_remote_target).transpose()?;
        Ok(RemoteSetup {
            app: self.remote_app.clone().unwrap_or_default(),
            target,
            instance_path: self.remote_path.clone().unwrap_or_default(),
            elevate: self.remote_elevate,
            elevation_user: self.remote_elevate_user.clone().unwrap_or_default(),
            elevation_password: self.remote_elevate_password.clone().unwrap_or_default(),
            reset_key: self.reset_key,
        })
    }
}

/// Run `tether setup`.
///
/// Without remote options the agent's own `setup` runs wherever the app
/// lives. With remote options the locator is written and, unless
/// `--skip-bootstrap`, the remote host is bootstrapped.
///
/// # Errors
///
/// Returns a typed error from locator writing or bootstrap.
pub async fn run(app: &AppContext, args: &SetupArgs) -> Result<ExitCode> {
    if !args.configures_remote() {
        let code = app.dispatcher().execute(&app.path, &["setup"]).await?;
        return Ok(super::exit_code(code));
    }

    let request = args.to_request()?;
    let (locator, keys) = configure_remote(&FsLocatorStore, &app.path, &request)?;
    if keys.is_new && !app.is_json() {
        app.output.info(&format!("Generated key pair {}", locator.public_key));
    }

    let report = if args.skip_bootstrap {
        None
    } else {
        Some(bootstrap_remote(app, &locator, &keys)?)
    };

    app.renderer()
        .render_setup(&locator, &keys, report.as_ref())?;
    Ok(ExitCode::SUCCESS)
}

fn bootstrap_remote(
    app: &AppContext,
    locator: &Locator,
    keys: &KeyPair,
) -> Result<BootstrapReport, DispatchError> {
    let progress = Progress::new(&app.output, app.is_json(), "Bootstrapping remote host");
    let connector = app.connector();
    let settings = app.bootstrap_settings();
    let password_env = app.config.remote.password_env.as_str();
    let label = format!("SSH password for {}@{}", locator.username, locator.host);
    let deadline = Deadline::after(app.config.remote.command_timeout());

    let result = tokio::task::block_in_place(|| {
        bootstrap(
            &connector,
            &UreqFetcher,
            &progress,
            &settings,
            locator,
            keys,
            || progress.suspend(|| prompt::secret(password_env, &label)),
            deadline,
        )
    });
    match &result {
        Ok(_) => progress.finish(Some("Remote host ready")),
        Err(_) => progress.finish(None),
    }
    result
}
