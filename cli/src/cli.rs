//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, AppFlags, OutputFlags};
use crate::commands;
use crate::domain::{OutputFormat, RemoteInstanceVars};

/// Run managed apps locally or on remote hosts over SSH
#[derive(Parser)]
#[command(
    name = "tether",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true,
    args_override_self = true
)]
pub struct Cli {
    /// App directory
    #[arg(short, long, global = true, default_value = ".")]
    pub path: PathBuf,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_parser = parse_format)]
    pub output_format: OutputFormat,

    /// Invoked by a remote dispatcher; always execute locally
    #[arg(long, global = true, hide = true)]
    pub remote_instance: bool,

    /// Values forwarded by a remote dispatcher (`k=v;k2=v2`)
    #[arg(long, global = true, hide = true, value_parser = parse_vars)]
    pub remote_instance_vars: Option<RemoteInstanceVars>,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Configure the app directory, optionally for a remote host
    Setup(commands::setup::SetupArgs),

    /// Start the app
    Start,

    /// Stop the app
    Stop,

    /// Show app information
    Info,

    /// Run agent arguments against the app
    Exec(commands::exec::ExecArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

fn parse_format(raw: &str) -> Result<OutputFormat, String> {
    raw.parse()
}

fn parse_vars(raw: &str) -> Result<RemoteInstanceVars, String> {
    RemoteInstanceVars::parse(raw).map_err(|e| e.to_string())
}

impl Cli {
    /// Execute the CLI command with the process argument vector `argv`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self, argv: Vec<String>) -> Result<ExitCode> {
        let Cli {
            path,
            output_format,
            remote_instance,
            remote_instance_vars,
            quiet,
            no_color,
            command,
        } = self;

        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                format: output_format,
            },
            path,
            argv,
            remote_instance,
            vars: remote_instance_vars.unwrap_or_default(),
        })?;

        match command {
            Command::Setup(args) => commands::setup::run(&app, &args).await,
            Command::Start => commands::lifecycle::start(&app).await,
            Command::Stop => commands::lifecycle::stop(&app).await,
            Command::Info => commands::lifecycle::info(&app).await,
            Command::Exec(args) => commands::exec::run(&app, &args).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
