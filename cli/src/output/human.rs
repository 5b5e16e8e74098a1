//! Human-readable terminal renderer.

use std::path::Path;

use owo_colors::OwoColorize as _;

use crate::application::services::bootstrap::{BootstrapReport, ElevationPrep};
use crate::application::services::dispatch::{CommandOutput, Location};
use crate::domain::{ElevationKind, KeyPair, Locator, TetherConfig};
use crate::infra::config::CONFIG_ENV;
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        println!("tether {version}");
    }

    /// Render the current configuration.
    pub fn render_config(&self, config: &TetherConfig, path: &Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        for (key, value) in config_rows(config) {
            println!("  {:<30} {value}", format!("{key}:"));
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in [
            CONFIG_ENV,
            config.remote.passphrase_env.as_str(),
            config.remote.password_env.as_str(),
            "TETHER_LOG",
            "NO_COLOR",
        ] {
            let value = match std::env::var(var) {
                Ok(_) if var == config.remote.passphrase_env || var == config.remote.password_env => {
                    "(set)".to_string()
                }
                Ok(v) => v,
                Err(_) => "(not set)".to_string(),
            };
            println!("    {:<28} {value}", format!("{var}:"));
        }
        println!();
    }

    /// Render the result of `setup`.
    pub fn render_setup(
        &self,
        locator: &Locator,
        keys: &KeyPair,
        bootstrap: Option<&BootstrapReport>,
    ) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header("Remote app configured:");
        self.ctx.kv("Host:    ", &locator.address());
        self.ctx.kv("User:    ", &locator.username);
        if !locator.app.is_empty() {
            self.ctx.kv("App:     ", &locator.app);
        }
        if !locator.instance_path.is_empty() {
            self.ctx.kv("Path:    ", &locator.instance_path);
        }
        if locator.elevate != ElevationKind::None {
            self.ctx.kv("Elevate: ", locator.elevate.as_str());
        }
        self.ctx.kv(
            "Key:     ",
            &format!(
                "{} ({})",
                locator.public_key,
                if keys.is_new { "new" } else { "existing" }
            ),
        );

        match bootstrap {
            Some(report) => {
                self.ctx
                    .kv("Arch:    ", report.architecture.as_str());
                self.ctx.kv("Binary:  ", &report.installed_to);
                if let ElevationPrep::NotImplemented(kind) = report.elevation {
                    self.ctx.warn(&format!(
                        "Elevation via {} must be configured on the remote host",
                        kind.as_str()
                    ));
                }
            }
            None => self
                .ctx
                .info("Bootstrap skipped; the remote host must already trust this key"),
        }
        println!();
    }

    /// Print captured agent output verbatim. Remote output wrapped in the
    /// JSON envelope of the remote renderer is unwrapped first.
    pub fn render_output(&self, output: &CommandOutput) {
        let unwrapped = match output.location {
            Location::Remote => unwrap_envelope(&output.output),
            Location::Local => None,
        };
        let text = unwrapped.as_deref().unwrap_or(&output.output);
        print!("{text}");
        if !text.is_empty() && !text.ends_with('\n') {
            println!();
        }
    }
}

/// Returns the `output` field of a `{"output": .., "exit_code": ..}` envelope.
fn unwrap_envelope(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("exit_code")?;
    value.get("output")?.as_str().map(str::to_string)
}

/// `key`/`value` pairs shown by `config show`, in `VALID_CONFIG_KEYS` order.
#[must_use]
pub fn config_rows(config: &TetherConfig) -> Vec<(&'static str, String)> {
    vec![
        ("agent.binary", config.agent.binary.clone()),
        ("agent.timeout_secs", config.agent.timeout_secs.to_string()),
        ("remote.program", config.remote.program.clone()),
        (
            "remote.connect_timeout_secs",
            config.remote.connect_timeout_secs.to_string(),
        ),
        (
            "remote.command_timeout_secs",
            config.remote.command_timeout_secs.to_string(),
        ),
        ("remote.passphrase_env", config.remote.passphrase_env.clone()),
        ("remote.password_env", config.remote.password_env.clone()),
        ("bootstrap.url", config.bootstrap.url.clone()),
        ("bootstrap.upload_path", config.bootstrap.upload_path.clone()),
        ("bootstrap.install_dir", config.bootstrap.install_dir.clone()),
        (
            "locality.invalid_locator",
            config.locality.invalid_locator.as_str().to_string(),
        ),
    ]
}
