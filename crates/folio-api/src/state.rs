//! # Application State
//!
//! Shared state for the Axum application, passed to every handler via the
//! `State` extractor. Cloning is cheap: the ledger wraps a pooled handle and
//! the rest is behind `Arc`.

use std::sync::Arc;

use folio_core::{Clock, Settings, SystemClock};
use folio_risk::RiskThresholds;
use folio_service::{Ledger, RiskMonitor};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub settings: Arc<Settings>,
    pub clock: Arc<dyn Clock>,
    pub thresholds: RiskThresholds,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("env", &self.settings.env)
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(pool: SqlitePool, settings: Settings) -> Self {
        Self::with_clock(pool, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, settings: Settings, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Ledger::new(pool),
            settings: Arc::new(settings),
            clock,
            thresholds: RiskThresholds::default(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.ledger.pool()
    }

    pub fn risk_monitor(&self) -> RiskMonitor {
        RiskMonitor::new(self.ledger.clone()).with_thresholds(self.thresholds)
    }
}
