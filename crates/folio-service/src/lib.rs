//! # folio-service: Persistence and Application Services
//!
//! Everything that touches the SQLite database lives here. The pure crates
//! (`folio-portfolio`, `folio-ledger`, `folio-risk`) decide; this crate loads
//! their inputs, persists their outputs, and keeps the governance hash chains
//! consistent.
//!
//! ## Layout
//!
//! - [`db`]: pool construction and embedded migrations.
//! - [`repo`]: plain table access for holdings, cash, history, the trade log
//!   and manual prices.
//! - [`ledger`]: the governance store. All chain appends go through
//!   [`Ledger`], which serializes them in-process.
//! - [`trading`], [`snapshot`], [`risk_monitor`], [`transfer`], [`seed`]:
//!   the operations the CLI and HTTP console expose.
//!
//! ## Transactions
//!
//! Write helpers in [`repo`] take `&mut SqliteConnection` so callers can
//! compose them inside one transaction. Reads take the pool.

pub mod db;
pub mod error;
pub mod ledger;
pub mod pricing;
pub mod repo;
pub mod risk_monitor;
pub mod seed;
pub mod snapshot;
pub mod trading;
pub mod transfer;

pub use db::{memory_pool, migrate, open_pool};
pub use error::ServiceError;
pub use ledger::{GovernanceInit, GovernanceVerification, Ledger, SavedSnapshot};
pub use pricing::load_market;
pub use risk_monitor::{PerformanceReport, RiskMonitor};
pub use seed::{seed_dev_stage, SeedReport};
pub use snapshot::{take_snapshot, SnapshotReport};
pub use trading::{TradeExecutor, TradeOptions, TradeReceipt};
pub use transfer::{
    export_history_csv, export_trade_log_csv, import_history_csv, import_trade_log_csv, ExportFormat,
    ImportReport, TradeImportReport,
};
