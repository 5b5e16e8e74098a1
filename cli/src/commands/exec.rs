//! `tether exec`: pass arbitrary arguments to the agent, locally or on the
//! remote host.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;

/// Arguments for the exec command.
#[derive(Args)]
#[command(trailing_var_arg = true)]
pub struct ExecArgs {
    /// Capture output instead of attaching the terminal
    #[arg(long)]
    pub capture: bool,

    /// Agent arguments
    #[arg(required = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Run the agent with `args`.
///
/// Without `--capture`, stdio is attached and the agent's exit code is
/// returned unchanged. With `--capture`, combined output is collected and
/// rendered, and the exit code is still passed through.
///
/// # Errors
///
/// Returns an error if the agent cannot be spawned or the remote call fails.
pub async fn run(app: &AppContext, args: &ExecArgs) -> Result<ExitCode> {
    let argv: Vec<&str> = args.args.iter().map(String::as_str).collect();
    let dispatcher = app.dispatcher();
    if !args.capture {
        let code = dispatcher.execute(&app.path, &argv).await?;
        return Ok(super::exit_code(code));
    }
    let output = dispatcher.execute_get_output(&app.path, &argv).await?;
    app.renderer().render_output(&output)?;
    Ok(super::exit_code(output.exit_code))
}
