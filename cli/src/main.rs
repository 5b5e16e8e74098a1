//! Tether CLI - run managed apps locally or on remote hosts over SSH

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tether_cli::cli::Cli;
use tether_cli::domain::{ConfigError, DispatchError, OutputFormat};
use tether_cli::output::json::format_error;

/// Environment variable holding the tracing filter.
const LOG_ENV: &str = "TETHER_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let cli = Cli::parse_from(&argv);
    let json = cli.output_format == OutputFormat::Json;
    init_tracing(cli.no_color);

    match cli.run(argv).await {
        Ok(code) => code,
        Err(e) => report_error(&e, json),
    }
}

fn init_tracing(no_color: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .init();
}

/// Prints one error line (or a JSON error object) and maps the error to the
/// process exit code.
fn report_error(err: &anyhow::Error, json: bool) -> ExitCode {
    let (code, name) = if let Some(e) = err.downcast_ref::<DispatchError>() {
        (e.exit_code(), e.code())
    } else if err.downcast_ref::<ConfigError>().is_some() {
        (2, "CONFIGURATION")
    } else {
        (1, "ERROR")
    };

    let message = format!("{err:#}");
    match json.then(|| format_error(&message, name)) {
        Some(Ok(body)) => println!("{body}"),
        _ => eprintln!("Error: {message}"),
    }
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
