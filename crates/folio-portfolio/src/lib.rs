//! # folio-portfolio: Portfolio Domain
//!
//! Pure portfolio state and the two file formats the system exchanges with
//! the outside world.
//!
//! - [`position`]: holdings and cash, with the buy/sell arithmetic.
//! - [`snapshot`]: the daily valuation rows, including the `TOTAL` row.
//! - [`trade`]: trade-log entries written for every manual trade.
//! - [`csv_format`]: `chatgpt_portfolio_update.csv` and
//!   `chatgpt_trade_log.csv` codecs.
//! - [`market`]: the market-data seam, with a seeded synthetic provider
//!   and operator price overrides.
//!
//! Nothing here touches storage; `folio-service` persists these types.

pub mod csv_format;
pub mod market;
pub mod position;
pub mod snapshot;
pub mod trade;

pub use market::{
    fetch_prices, provider_for, Candle, CompanyProfile, DayRange, LayeredMarket,
    ManualPriceBook, MarketData, Quote, SyntheticMarket,
};
pub use position::{Portfolio, PortfolioMetrics, Position};
pub use snapshot::{build_snapshot, round2, SnapshotRow, TOTAL_TICKER};
pub use trade::TradeLogEntry;
