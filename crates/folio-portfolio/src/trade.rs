//! Trade-log entries, one per executed manual trade.

use chrono::NaiveDate;
use folio_core::Ticker;
use serde::{Deserialize, Serialize};

pub const MANUAL_BUY_REASON: &str = "MANUAL BUY - New position";
pub const MANUAL_SELL_REASON: &str = "MANUAL SELL - User";

/// One `trade_log` row. Buy rows leave the sell columns empty and vice
/// versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub date: NaiveDate,
    pub ticker: String,
    pub shares_bought: Option<f64>,
    pub buy_price: Option<f64>,
    pub cost_basis: Option<f64>,
    pub pnl: Option<f64>,
    pub reason: Option<String>,
    pub shares_sold: Option<f64>,
    pub sell_price: Option<f64>,
}

impl TradeLogEntry {
    pub fn buy(date: NaiveDate, ticker: &Ticker, shares: f64, price: f64) -> Self {
        Self {
            date,
            ticker: ticker.to_string(),
            shares_bought: Some(shares),
            buy_price: Some(price),
            cost_basis: Some(shares * price),
            pnl: Some(0.0),
            reason: Some(MANUAL_BUY_REASON.to_string()),
            shares_sold: None,
            sell_price: None,
        }
    }

    /// `buy_price` is the position's average buy price at the time of sale.
    pub fn sell(
        date: NaiveDate,
        ticker: &Ticker,
        shares: f64,
        price: f64,
        buy_price: f64,
        pnl: f64,
    ) -> Self {
        Self {
            date,
            ticker: ticker.to_string(),
            shares_bought: None,
            buy_price: Some(buy_price),
            cost_basis: Some(buy_price * shares),
            pnl: Some(pnl),
            reason: Some(MANUAL_SELL_REASON.to_string()),
            shares_sold: Some(shares),
            sell_price: Some(price),
        }
    }

    pub fn is_sell(&self) -> bool {
        self.shares_sold.is_some()
    }

    /// Gross traded value of the row.
    pub fn notional(&self) -> f64 {
        match (self.shares_sold, self.sell_price) {
            (Some(shares), Some(price)) => shares * price,
            _ => self.shares_bought.unwrap_or(0.0) * self.buy_price.unwrap_or(0.0),
        }
    }
}
