//! Severity levels shared by policy rules, breaches and risk events.

use serde::{Deserialize, Serialize};

use crate::error::FolioError;

/// How serious a governance finding is.
///
/// Ordered: `Info < Warn < Error`. Only `Error` findings block trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn blocks(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Warn
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(FolioError::Validation(format!(
                "unknown severity '{other}': expected info, warn or error"
            ))),
        }
    }
}
