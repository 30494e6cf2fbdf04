//! # Daily Snapshot
//!
//! A snapshot is one valuation row per position plus a `TOTAL` row. The
//! rows map one-to-one onto `portfolio_history` and onto the
//! `chatgpt_portfolio_update.csv` schema.
//!
//! Position rows carry the per-share buy price in `cost_basis` (the
//! `Cost Basis` column of the history table). Monetary columns are rounded
//! to cents; the `TOTAL` row sums the rounded values.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::position::Portfolio;

pub const TOTAL_TICKER: &str = "TOTAL";
pub const HOLD_ACTION: &str = "HOLD";

/// One `portfolio_history` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub shares: Option<f64>,
    pub cost_basis: Option<f64>,
    pub stop_loss: Option<f64>,
    pub current_price: Option<f64>,
    pub total_value: Option<f64>,
    pub pnl: Option<f64>,
    pub action: Option<String>,
    pub cash_balance: Option<f64>,
    pub total_equity: Option<f64>,
}

impl SnapshotRow {
    pub fn is_total(&self) -> bool {
        self.ticker == TOTAL_TICKER
    }
}

/// Round half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Value `portfolio` at `prices` for `date`.
///
/// Tickers absent from `prices` are valued at zero.
pub fn build_snapshot(
    portfolio: &Portfolio,
    prices: &HashMap<String, f64>,
    date: NaiveDate,
) -> Vec<SnapshotRow> {
    let mut rows = Vec::with_capacity(portfolio.len() + 1);
    let mut total_value = 0.0;
    let mut total_pnl = 0.0;

    for p in portfolio.positions() {
        let current = prices.get(p.ticker.as_str()).copied().unwrap_or(0.0);
        let value = round2(current * p.shares);
        let pnl = round2((current - p.buy_price) * p.shares);
        total_value += value;
        total_pnl += pnl;
        rows.push(SnapshotRow {
            date,
            ticker: p.ticker.to_string(),
            shares: Some(p.shares),
            cost_basis: Some(p.buy_price),
            stop_loss: Some(p.stop_loss),
            current_price: Some(current),
            total_value: Some(value),
            pnl: Some(pnl),
            action: Some(HOLD_ACTION.to_string()),
            cash_balance: None,
            total_equity: None,
        });
    }

    rows.push(SnapshotRow {
        date,
        ticker: TOTAL_TICKER.to_string(),
        shares: None,
        cost_basis: None,
        stop_loss: None,
        current_price: None,
        total_value: Some(round2(total_value)),
        pnl: Some(round2(total_pnl)),
        action: None,
        cash_balance: Some(round2(portfolio.cash)),
        total_equity: Some(round2(total_value + portfolio.cash)),
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use folio_core::Ticker;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 5).unwrap()
    }

    fn position(ticker: &str, shares: f64, buy: f64) -> Position {
        Position {
            ticker: Ticker::parse(ticker).unwrap(),
            shares,
            stop_loss: 0.0,
            buy_price: buy,
            cost_basis: shares * buy,
        }
    }

    #[test]
    fn rows_and_total() {
        let pf = Portfolio::new([position("AAA", 10.0, 10.0), position("BBB", 3.0, 2.5)], 100.126);
        let prices = HashMap::from([("AAA".to_string(), 11.111), ("BBB".to_string(), 2.0)]);
        let rows = build_snapshot(&pf, &prices, date());

        assert_eq!(rows.len(), 3);
        let aaa = &rows[0];
        assert_eq!(aaa.ticker, "AAA");
        assert_eq!(aaa.cost_basis, Some(10.0));
        assert_eq!(aaa.total_value, Some(111.11));
        assert_eq!(aaa.pnl, Some(11.11));
        assert_eq!(aaa.action.as_deref(), Some("HOLD"));
        assert_eq!(aaa.cash_balance, None);

        let total = rows.last().unwrap();
        assert!(total.is_total());
        assert_eq!(total.total_value, Some(117.11));
        assert_eq!(total.pnl, Some(9.61));
        assert_eq!(total.cash_balance, Some(100.13));
        assert_eq!(total.total_equity, Some(217.24));
        assert_eq!(total.shares, None);
    }

    #[test]
    fn missing_price_values_at_zero() {
        let pf = Portfolio::new([position("AAA", 2.0, 5.0)], 0.0);
        let rows = build_snapshot(&pf, &HashMap::new(), date());
        assert_eq!(rows[0].current_price, Some(0.0));
        assert_eq!(rows[0].total_value, Some(0.0));
        assert_eq!(rows[0].pnl, Some(-10.0));
    }

    #[test]
    fn empty_portfolio_has_only_total() {
        let pf = Portfolio::new([], 50.0);
        let rows = build_snapshot(&pf, &HashMap::new(), date());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_equity, Some(50.0));
    }

    proptest! {
        #[test]
        fn total_equity_is_value_plus_cash(
            shares in 1u32..10_000,
            price in 1u32..100_000,
            cash in 0u32..1_000_000,
        ) {
            let price = f64::from(price) / 100.0;
            let cash = f64::from(cash) / 100.0;
            let pf = Portfolio::new([position("AAA", f64::from(shares), 1.0)], cash);
            let prices = HashMap::from([("AAA".to_string(), price)]);
            let rows = build_snapshot(&pf, &prices, date());
            let total = rows.last().unwrap();
            let expected = round2(total.total_value.unwrap() + cash);
            prop_assert!((total.total_equity.unwrap() - expected).abs() < 0.011);
        }
    }
}
