//! Remote platform detection.

use std::fmt;

/// Command run on the remote host to learn its CPU architecture.
pub const ARCH_PROBE_COMMAND: &str = "uname -m";

/// Canonical architecture names used in release artifact URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Amd64,
    Arm64,
    Unknown,
}

impl Architecture {
    /// Maps `uname -m` output to a canonical architecture.
    #[must_use]
    pub fn from_uname(output: &str) -> Self {
        match output.trim() {
            "x86_64" => Self::Amd64,
            "aarch64" => Self::Arm64,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expands the `{arch}` placeholder of a release URL template.
#[must_use]
pub fn artifact_url(template: &str, arch: Architecture) -> String {
    template.replace("{arch}", arch.as_str())
}
