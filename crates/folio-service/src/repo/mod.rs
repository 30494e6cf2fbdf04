//! # Repositories
//!
//! Row-level access to the core tables. Reads take the pool; writes that
//! belong to a larger unit of work take a `&mut SqliteConnection` so the
//! caller can run them inside its own transaction.

pub mod portfolio;
pub mod prices;
pub mod trades;

pub use portfolio::{
    cash_balance, equity_history, equity_series, latest_history_date, load_history,
    load_portfolio, replace_history, replace_history_for_date, save_portfolio, set_cash,
    value_series_by_ticker, LoadedPortfolio,
};
pub use prices::{list_manual_prices, load_price_book, remove_manual_price, set_manual_price, ManualPrice};
pub use trades::{append_trade, list_trades, replace_trade_log, traded_notional_on};
