//! Command implementations

pub mod config;
pub mod exec;
pub mod lifecycle;
pub mod setup;
pub mod version;

use std::process::ExitCode;

/// Converts an agent or remote exit code into the process exit code.
/// Codes outside `0..=255` map to 1.
#[must_use]
pub fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
