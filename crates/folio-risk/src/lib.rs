//! # folio-risk: Portfolio Risk Math
//!
//! Pure functions over equity and position-value series. Persistence and
//! event emission live in `folio-service::risk_monitor`.
//!
//! All percentages are expressed in percent (`12.5` means 12.5%), matching
//! the thresholds operators configure.

pub mod analytics;
pub mod exposure;
pub mod signals;
pub mod snapshot;

pub use analytics::{
    drawdowns_by_ticker, max_drawdown, percent_returns, portfolio_volatility, sortino_ratio, streaks,
    DrawdownStats, Streaks, VolatilityStats,
};
pub use exposure::{compute_exposure_scalar, RegimeProbabilities};
pub use signals::{signals, RiskEventType, RiskSignal, RiskThresholds};
pub use snapshot::{compute_snapshot, RiskInputs, RiskSnapshot};
