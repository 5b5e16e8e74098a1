//! JSON output helpers.
//!
//! Provides the error-object formatter used by every `--output-format json`
//! code path when a command fails, plus the JSON renderer.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::application::services::bootstrap::{BootstrapReport, ElevationPrep};
use crate::application::services::dispatch::{CommandOutput, Location};
use crate::domain::{KeyPair, Locator, TetherConfig};

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Renders command results as JSON documents on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    fn print(value: &serde_json::Value) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("JSON serialization failed")?
        );
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(&self, config: &TetherConfig, path: &Path) -> Result<()> {
        Self::print(&json!({
            "path": path.display().to_string(),
            "config": serde_json::to_value(config).context("JSON serialization failed")?,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_setup(
        &self,
        locator: &Locator,
        keys: &KeyPair,
        bootstrap: Option<&BootstrapReport>,
    ) -> Result<()> {
        let bootstrap = bootstrap.map(|report| {
            json!({
                "architecture": report.architecture.as_str(),
                "installed_to": report.installed_to,
                "key_added": report.key_added,
                "used_password": report.used_password,
                "elevation": match report.elevation {
                    ElevationPrep::NotRequired => "not_required",
                    ElevationPrep::NotImplemented(_) => "not_implemented",
                },
            })
        });
        Self::print(&json!({
            "locator": serde_json::to_value(locator).context("JSON serialization failed")?,
            "public_key": keys.public_key,
            "new_key": keys.is_new,
            "bootstrap": bootstrap,
        }))
    }

    /// Passes JSON produced by the agent through unchanged; anything else is
    /// wrapped in an envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_output(&self, output: &CommandOutput) -> Result<()> {
        if serde_json::from_str::<serde_json::Value>(&output.output).is_ok() {
            println!("{}", output.output.trim_end());
            return Ok(());
        }
        Self::print(&json!({
            "output": output.output,
            "exit_code": output.exit_code,
            "remote": output.location == Location::Remote,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        Self::print(&json!({ "version": version }))
    }
}
