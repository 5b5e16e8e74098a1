//! Proxy protocol: rewriting the current invocation into the argument vector
//! executed by `tether` on the remote host.
//!
//! The remote side receives `--remote-instance` so it never tries to resolve
//! remoteness again, and a `--path` pointing at its own instance path.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DispatchError;

/// Placeholder for the remote program name; replaced when the command line is
/// built for a concrete remote binary.
pub const PROGRAM_PLACEHOLDER: &str = "{program}";

pub const FLAG_PATH_SHORT: &str = "-p";
pub const FLAG_PATH: &str = "--path";
pub const FLAG_OUTPUT_FORMAT: &str = "--output-format";
pub const FLAG_REMOTE_INSTANCE: &str = "--remote-instance";
pub const FLAG_REMOTE_INSTANCE_VARS: &str = "--remote-instance-vars";

/// Output format requested from the remote side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("invalid output format '{other}' (expected text or json)")),
        }
    }
}

// ── Remote instance vars ──────────────────────────────────────────────────────

/// Locally computed facts forwarded to the remote side so it does not have to
/// recompute them (e.g. a resolved key hash).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteInstanceVars(BTreeMap<String, String>);

impl RemoteInstanceVars {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is empty or either side
    /// contains a character reserved by the wire format (`=` in keys, `;`
    /// anywhere).
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), DispatchError> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() || key.contains(['=', ';']) || value.contains(';') {
            return Err(DispatchError::Configuration(format!(
                "invalid remote instance var '{key}={value}'"
            )));
        }
        self.0.insert(key, value);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encodes as `k=v;k2=v2` with keys in sorted order.
    #[must_use]
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Parses the `k=v;k2=v2` form produced by [`encode`](Self::encode).
    /// Empty segments are ignored.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a segment without `=`.
    pub fn parse(raw: &str) -> Result<Self, DispatchError> {
        let mut vars = Self::new();
        for segment in raw.split(';').filter(|s| !s.trim().is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                DispatchError::Configuration(format!("malformed remote instance var '{segment}'"))
            })?;
            vars.insert(key.trim(), value)?;
        }
        Ok(vars)
    }
}

// ── Argument rewriting ────────────────────────────────────────────────────────

/// Builds the argument vector for the remote invocation from the local `argv`.
///
/// Layout: `[program, --output-format=<fmt>, [--remote-instance-vars=..],
/// --remote-instance, [--path <instance_path>], <original args>]`.
///
/// Any `-p`/`--path` from the original arguments is dropped together with its
/// value, as are previously injected proxy flags. Arguments after a bare `--`
/// are passed through untouched.
#[must_use]
pub fn rewrite_args(
    argv: &[String],
    format: OutputFormat,
    vars: &RemoteInstanceVars,
    instance_path: &str,
) -> Vec<String> {
    let mut out = vec![
        PROGRAM_PLACEHOLDER.to_string(),
        format!("{FLAG_OUTPUT_FORMAT}={format}"),
    ];
    if !vars.is_empty() {
        out.push(format!("{FLAG_REMOTE_INSTANCE_VARS}={}", vars.encode()));
    }
    out.push(FLAG_REMOTE_INSTANCE.to_string());
    if !instance_path.is_empty() {
        out.push(FLAG_PATH.to_string());
        out.push(instance_path.to_string());
    }
    out.extend(strip_proxy_flags(argv.iter().skip(1)));
    out
}

fn strip_proxy_flags<'a>(args: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut kept = Vec::new();
    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--" => {
                kept.push(arg.clone());
                kept.extend(args.by_ref().cloned());
            }
            FLAG_PATH_SHORT | FLAG_PATH | FLAG_OUTPUT_FORMAT | FLAG_REMOTE_INSTANCE_VARS => {
                args.next();
            }
            FLAG_REMOTE_INSTANCE => {}
            a if is_inline_proxy_flag(a) || is_attached_short_path(a) => {}
            _ => kept.push(arg.clone()),
        }
    }
    kept
}

fn is_inline_proxy_flag(arg: &str) -> bool {
    [FLAG_PATH, FLAG_PATH_SHORT, FLAG_OUTPUT_FORMAT, FLAG_REMOTE_INSTANCE_VARS]
        .iter()
        .any(|flag| {
            arg.strip_prefix(flag)
                .is_some_and(|rest| rest.starts_with('='))
        })
}

/// `-p<value>` with the value attached, as clap accepts for short options.
fn is_attached_short_path(arg: &str) -> bool {
    !arg.starts_with("--") && arg.len() > FLAG_PATH_SHORT.len() && arg.starts_with(FLAG_PATH_SHORT)
}

/// Joins the rewritten arguments into a shell command line, substituting the
/// remote program for the placeholder.
#[must_use]
pub fn remote_command_line(program: &str, args: &[String]) -> String {
    let words = args.iter().map(|a| {
        if a == PROGRAM_PLACEHOLDER {
            program
        } else {
            a.as_str()
        }
    });
    shell_words::join(words)
}

/// Renders environment variables as `export KEY="value"; ` assignments to
/// prepend to a remote command line.
#[must_use]
pub fn env_prefix(env: &[(String, String)]) -> String {
    env.iter()
        .map(|(key, value)| format!("export {key}=\"{}\"; ", escape_double_quoted(value)))
        .collect()
}

fn escape_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
