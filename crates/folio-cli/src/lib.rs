//! # folio-cli: the `folio` Command-Line Tool
//!
//! ## Subcommands
//!
//! - `folio snapshot`, `folio rebalance`, `folio seed`: daily portfolio
//!   operations ([`portfolio`]).
//! - `folio export`, `folio import`: CSV transfer ([`transfer`]).
//! - `folio buy`, `folio sell`, `folio price`: manual trades and price
//!   overrides ([`trade`]).
//! - `folio governance ...`: rules, audit chain, config snapshots, breaches
//!   ([`governance`]).
//! - `folio risk ...`: risk snapshot, events, exposure, performance
//!   ([`risk`]).
//! - `folio serve`: the HTTP governance console ([`serve`]).
//!
//! ## Exit codes
//!
//! Handlers return `anyhow::Result<u8>`: `0` on success, `1` when the
//! operation was rejected or a chain failed verification. An `Err` is an
//! operational failure and exits with `2`.

pub mod governance;
pub mod portfolio;
pub mod risk;
pub mod serve;
pub mod trade;
pub mod transfer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use folio_core::{AppEnv, Clock, FolioError, Settings, SystemClock};
use folio_portfolio::MarketData;
use folio_service::{load_market, open_pool, Ledger, ServiceError};
use serde::Serialize;

pub const EXIT_OK: u8 = 0;
pub const EXIT_REJECTED: u8 = 1;
pub const EXIT_ERROR: u8 = 2;

/// Flags that override resolved settings.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_file: Option<PathBuf>,
    pub env: Option<String>,
}

/// Apply CLI flags on top of file and environment settings.
pub fn apply_overrides(mut settings: Settings, overrides: &Overrides) -> Result<Settings> {
    if let Some(raw) = &overrides.env {
        settings.env = AppEnv::parse(raw).context("invalid --env")?;
    }
    if let Some(db_file) = &overrides.db_file {
        settings.db_file = db_file.clone();
    }
    Ok(settings)
}

pub fn resolve_settings(config: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let settings = Settings::load(config).context("failed to load settings")?;
    apply_overrides(settings, overrides)
}

/// Everything a command handler needs: settings, the governance store over
/// the opened database, and the clock.
#[derive(Clone)]
pub struct Runtime {
    pub settings: Settings,
    pub ledger: Ledger,
    pub clock: Arc<dyn Clock>,
}

impl Runtime {
    pub async fn open(settings: Settings) -> Result<Self> {
        let pool = open_pool(&settings.db_file)
            .await
            .with_context(|| format!("failed to open database {}", settings.db_file.display()))?;
        tracing::debug!(db = %settings.db_file.display(), env = settings.env.as_str(), "database ready");
        Ok(Self {
            settings,
            ledger: Ledger::new(pool),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.ledger.pool()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn market(&self) -> Result<Arc<dyn MarketData>> {
        Ok(load_market(self.pool(), self.settings.env, self.settings.synthetic_seed, self.today()).await?)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub fn print_json_pretty<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Report a rejection the operator can act on and map it to
/// [`EXIT_REJECTED`]. Other failures propagate.
pub fn rejected(err: ServiceError) -> Result<u8> {
    match err.as_domain() {
        Some(
            FolioError::Validation(msg)
            | FolioError::NotFound(msg)
            | FolioError::PermissionDenied(msg)
            | FolioError::NoMarketData(msg)
            | FolioError::MarketDataDownload(msg),
        ) => {
            tracing::warn!(kind = err.kind(), "operation rejected");
            eprintln!("{msg}");
            Ok(EXIT_REJECTED)
        }
        _ => Err(err.into()),
    }
}
