//! # Error Types
//!
//! The error taxonomy shared by every Folio crate. Each variant maps to one
//! class of failure the operator can act on:
//!
//! - `Validation`: bad user input (ticker, shares, price, status).
//! - `MarketDataDownload` / `NoMarketData`: the market-data family; see
//!   [`FolioError::is_market_data`].
//! - `Repository`: persistence failure.
//! - `Config`: invalid settings.
//! - `NotFound`: a referenced row does not exist.
//! - `PermissionDenied`: an operation refused by policy (governance rules,
//!   production-only guards).

use thiserror::Error;

/// Top-level error type for Folio.
#[derive(Error, Debug)]
pub enum FolioError {
    /// Input rejected before any side effect.
    #[error("validation error: {0}")]
    Validation(String),

    /// Fetching market data failed.
    #[error("market data download failed: {0}")]
    MarketDataDownload(String),

    /// The provider has no data for the requested instrument or window.
    #[error("no market data: {0}")]
    NoMarketData(String),

    /// Persistence failure.
    #[error("repository error: {0}")]
    Repository(String),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("not found: {0}")]
    NotFound(String),

    /// Refused by policy.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Content integrity violation (malformed stored hash, broken chain).
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FolioError {
    /// True for both market-data variants.
    pub fn is_market_data(&self) -> bool {
        matches!(self, Self::MarketDataDownload(_) | Self::NoMarketData(_))
    }

    /// Stable machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::MarketDataDownload(_) => "market_data_download_error",
            Self::NoMarketData(_) => "no_market_data_error",
            Self::Repository(_) => "repository_error",
            Self::Config(_) => "config_error",
            Self::NotFound(_) => "not_found_error",
            Self::PermissionDenied(_) => "permission_error",
            Self::Canonicalization(_) => "canonicalization_error",
            Self::Integrity(_) => "integrity_error",
            Self::Io(_) => "io_error",
        }
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Errors raised while resolving [`crate::Settings`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid APP_ENV '{0}': expected 'dev_stage' or 'production'")]
    UnknownEnv(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
