//! Secret acquisition: environment first, then an interactive prompt.

use std::io::IsTerminal;

use dialoguer::Password;
use tracing::debug;

use crate::domain::DispatchError;

/// Reads a secret from `env_var`, or prompts for it when stdin is a terminal.
///
/// # Errors
///
/// Returns an authentication error when the variable is unset and no
/// terminal is available, or the prompt fails.
pub fn secret(env_var: &str, prompt: &str) -> Result<String, DispatchError> {
    if let Some(value) = (!env_var.is_empty())
        .then(|| std::env::var(env_var).ok())
        .flatten()
    {
        debug!(env_var, "secret taken from environment");
        return Ok(value);
    }
    if !std::io::stdin().is_terminal() {
        return Err(DispatchError::Authentication(format!(
            "{prompt} required; set {env_var}"
        )));
    }
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| DispatchError::Authentication(format!("cannot read {prompt}: {e}")))
}
