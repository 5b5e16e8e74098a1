//! `tether start|stop|info`: app lifecycle operations routed through the
//! dispatch facade.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;

/// Run `tether start`. The agent's exit code is returned unchanged.
///
/// # Errors
///
/// Returns an error if the agent cannot be spawned or the remote call fails.
pub async fn start(app: &AppContext) -> Result<ExitCode> {
    passthrough(app, "start").await
}

/// Run `tether stop`. The agent's exit code is returned unchanged.
///
/// # Errors
///
/// Returns an error if the agent cannot be spawned or the remote call fails.
pub async fn stop(app: &AppContext) -> Result<ExitCode> {
    passthrough(app, "stop").await
}

/// Run `tether info` and render the agent's stdout.
///
/// # Errors
///
/// Returns an execution error carrying the agent's exit code when it fails.
pub async fn info(app: &AppContext) -> Result<ExitCode> {
    let output = app
        .dispatcher()
        .execute_info(&app.path, &["info"])
        .await?
        .check()?;
    app.renderer().render_output(&output)?;
    Ok(ExitCode::SUCCESS)
}

async fn passthrough(app: &AppContext, verb: &str) -> Result<ExitCode> {
    let code = app.dispatcher().execute(&app.path, &[verb]).await?;
    Ok(super::exit_code(code))
}
