//! # Runtime Settings
//!
//! Settings resolve in this order, later sources winning:
//!
//! 1. built-in defaults,
//! 2. an optional YAML file (`--config` or `APP_CONFIG`),
//! 3. a `.env` file in the working directory (never overrides real env),
//! 4. `APP_*` environment variables.
//!
//! CLI flags are applied on top by the binary.
//!
//! Variables:
//! - `APP_ENV`: `dev_stage` or `production` (default `production`)
//! - `APP_DATA_DIR` (default `data`)
//! - `APP_DB_FILE` (default `<data_dir>/trading.db`)
//! - `APP_PORTFOLIO_CSV` (default `<data_dir>/chatgpt_portfolio_update.csv`)
//! - `APP_TRADE_LOG_CSV` (default `<data_dir>/chatgpt_trade_log.csv`)
//! - `APP_TRADING_HOLIDAYS`: comma-separated `YYYY-MM-DD`
//! - `APP_SYNTHETIC_SEED` (default 42)
//! - `APP_BIND` (default `127.0.0.1:8080`)
//! - `APP_ENFORCE_GOVERNANCE`: `true`/`false` (default `false`)

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::{parse_date, TradingCalendar};
use crate::error::ConfigError;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DB_FILE: &str = "trading.db";
pub const DEFAULT_PORTFOLIO_CSV: &str = "chatgpt_portfolio_update.csv";
pub const DEFAULT_TRADE_LOG_CSV: &str = "chatgpt_trade_log.csv";
pub const DEFAULT_SYNTHETIC_SEED: u64 = 42;
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Which data path the process runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEnv {
    /// Seeded synthetic market data, safe for offline use.
    DevStage,
    Production,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DevStage => "dev_stage",
            Self::Production => "production",
        }
    }

    pub fn is_dev_stage(&self) -> bool {
        matches!(self, Self::DevStage)
    }

    /// Parse an `APP_ENV` value. Empty means production; the legacy value
    /// `development` also maps to production.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev_stage" => Ok(Self::DevStage),
            "" | "production" | "development" => Ok(Self::Production),
            other => Err(ConfigError::UnknownEnv(other.to_string())),
        }
    }
}

impl Default for AppEnv {
    fn default() -> Self {
        Self::Production
    }
}

impl std::fmt::Display for AppEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AppEnv {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub env: AppEnv,
    pub data_dir: PathBuf,
    pub db_file: PathBuf,
    pub portfolio_csv: PathBuf,
    pub trade_log_csv: PathBuf,
    pub trading_holidays: Vec<NaiveDate>,
    pub synthetic_seed: u64,
    pub bind: String,
    pub enforce_governance: bool,
}

/// Shape of the optional YAML settings file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    env: Option<String>,
    data_dir: Option<PathBuf>,
    db_file: Option<PathBuf>,
    portfolio_csv: Option<PathBuf>,
    trade_log_csv: Option<PathBuf>,
    trading_holidays: Option<Vec<String>>,
    synthetic_seed: Option<u64>,
    bind: Option<String>,
    enforce_governance: Option<bool>,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        Self {
            env: AppEnv::default(),
            db_file: data_dir.join(DEFAULT_DB_FILE),
            portfolio_csv: data_dir.join(DEFAULT_PORTFOLIO_CSV),
            trade_log_csv: data_dir.join(DEFAULT_TRADE_LOG_CSV),
            data_dir,
            trading_holidays: Vec::new(),
            synthetic_seed: DEFAULT_SYNTHETIC_SEED,
            bind: DEFAULT_BIND.to_string(),
            enforce_governance: false,
        }
    }
}

impl Settings {
    /// Load from the process environment, reading `.env` first.
    ///
    /// `config_file` takes precedence over `APP_CONFIG`.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        let from_env = std::env::var("APP_CONFIG").ok().map(PathBuf::from);
        let file = config_file.map(Path::to_path_buf).or(from_env);
        Self::from_lookup(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Load from the process environment without a settings file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Resolve settings from an optional YAML file and a variable lookup.
    pub fn from_lookup<F>(file: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match file {
            Some(path) => read_file(path)?,
            None => FileSettings::default(),
        };
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let env = match var("APP_ENV").or(file.env) {
            Some(raw) => AppEnv::parse(&raw)?,
            None => AppEnv::default(),
        };

        let data_dir = var("APP_DATA_DIR")
            .map(PathBuf::from)
            .or(file.data_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let path_or = |key: &str, from_file: Option<PathBuf>, default: &str| {
            var(key)
                .map(PathBuf::from)
                .or(from_file)
                .unwrap_or_else(|| data_dir.join(default))
        };
        let db_file = path_or("APP_DB_FILE", file.db_file, DEFAULT_DB_FILE);
        let portfolio_csv = path_or("APP_PORTFOLIO_CSV", file.portfolio_csv, DEFAULT_PORTFOLIO_CSV);
        let trade_log_csv = path_or("APP_TRADE_LOG_CSV", file.trade_log_csv, DEFAULT_TRADE_LOG_CSV);

        let trading_holidays = match var("APP_TRADING_HOLIDAYS") {
            Some(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_date("APP_TRADING_HOLIDAYS", s))
                .collect::<Result<Vec<_>, _>>()?,
            None => file
                .trading_holidays
                .unwrap_or_default()
                .iter()
                .map(|s| parse_date("trading_holidays", s))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let synthetic_seed = match var("APP_SYNTHETIC_SEED") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "APP_SYNTHETIC_SEED".into(),
                reason: format!("'{raw}': {e}"),
            })?,
            None => file.synthetic_seed.unwrap_or(DEFAULT_SYNTHETIC_SEED),
        };

        let enforce_governance = match var("APP_ENFORCE_GOVERNANCE") {
            Some(raw) => parse_bool("APP_ENFORCE_GOVERNANCE", &raw)?,
            None => file.enforce_governance.unwrap_or(false),
        };

        Ok(Self {
            env,
            data_dir,
            db_file,
            portfolio_csv,
            trade_log_csv,
            trading_holidays,
            synthetic_seed,
            bind: var("APP_BIND")
                .or(file.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            enforce_governance,
        })
    }

    pub fn calendar(&self) -> TradingCalendar {
        TradingCalendar::new(self.trading_holidays.iter().copied())
    }
}

fn read_file(path: &Path) -> Result<FileSettings, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::ParseFile {
        path: path.display().to_string(),
        source,
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}
