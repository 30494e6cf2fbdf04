//! # Positions and Cash
//!
//! `Portfolio` owns the holdings keyed by ticker plus the cash balance.
//! Buy and sell are pure state transitions; callers decide when to persist.
//!
//! ## Invariants
//!
//! - A position never holds zero or negative shares; a sell that empties a
//!   position removes it.
//! - `buy_price` is the weighted average purchase price and does not move
//!   on sells.
//! - `cost_basis` never goes negative.

use std::collections::{BTreeMap, HashMap};

use folio_core::{validate_price, validate_shares, FolioError, Ticker};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: Ticker,
    pub shares: f64,
    /// Zero means no stop loss.
    pub stop_loss: f64,
    pub buy_price: f64,
    pub cost_basis: f64,
}

impl Position {
    pub fn value_at_cost(&self) -> f64 {
        self.shares * self.buy_price
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    positions: BTreeMap<Ticker, Position>,
    pub cash: f64,
}

/// Summary figures for a priced portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub total_value: f64,
    pub total_cost: f64,
    pub total_gain: f64,
    /// Fractional return on cost; zero when nothing is held.
    pub total_return: f64,
    pub holdings_count: usize,
}

impl Portfolio {
    pub fn new(positions: impl IntoIterator<Item = Position>, cash: f64) -> Self {
        Self {
            positions: positions
                .into_iter()
                .map(|p| (p.ticker.clone(), p))
                .collect(),
            cash,
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, ticker: &Ticker) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn tickers(&self) -> Vec<Ticker> {
        self.positions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn shares_of(&self, ticker: &Ticker) -> f64 {
        self.positions.get(ticker).map_or(0.0, |p| p.shares)
    }

    /// Sum of `cost_basis` across holdings.
    pub fn total_cost_basis(&self) -> f64 {
        self.positions.values().map(|p| p.cost_basis).sum()
    }

    /// Cash plus holdings valued at their average buy price.
    pub fn equity_at_cost(&self) -> f64 {
        self.cash + self.positions.values().map(Position::value_at_cost).sum::<f64>()
    }

    /// Add `shares` at `price`, averaging into an existing position.
    ///
    /// Cash is not touched; the trade executor debits it after its own
    /// affordability check.
    pub fn apply_buy(
        &mut self,
        ticker: &Ticker,
        shares: f64,
        price: f64,
        stop_loss: Option<f64>,
    ) -> Result<&Position, FolioError> {
        validate_shares(shares)?;
        validate_price(price)?;
        let cost = shares * price;
        let position = self
            .positions
            .entry(ticker.clone())
            .and_modify(|p| {
                p.shares += shares;
                p.cost_basis += cost;
                p.buy_price = p.cost_basis / p.shares;
                if let Some(stop) = stop_loss {
                    p.stop_loss = stop;
                }
            })
            .or_insert_with(|| Position {
                ticker: ticker.clone(),
                shares,
                stop_loss: stop_loss.unwrap_or(0.0),
                buy_price: price,
                cost_basis: cost,
            });
        Ok(position)
    }

    /// Remove `shares` at `price` and return the realized PnL.
    pub fn apply_sell(&mut self, ticker: &Ticker, shares: f64, price: f64) -> Result<f64, FolioError> {
        validate_shares(shares)?;
        validate_price(price)?;
        let position = self
            .positions
            .get_mut(ticker)
            .ok_or_else(|| FolioError::NotFound("Ticker not in portfolio".into()))?;
        if shares > position.shares {
            return Err(FolioError::Validation(format!(
                "Insufficient shares: holding {}, selling {}",
                position.shares, shares
            )));
        }
        let cost_out = position.buy_price * shares;
        let pnl = price * shares - cost_out;
        let remaining = position.shares - shares;
        if remaining <= 0.0 {
            self.positions.remove(ticker);
        } else {
            position.shares = remaining;
            position.cost_basis = (position.cost_basis - cost_out).max(0.0);
        }
        Ok(pnl)
    }

    /// Value the holdings at `prices` (keyed by ticker text). Missing prices
    /// value the position at zero.
    pub fn metrics(&self, prices: &HashMap<String, f64>) -> PortfolioMetrics {
        let total_value: f64 = self
            .positions
            .values()
            .map(|p| p.shares * prices.get(p.ticker.as_str()).copied().unwrap_or(0.0))
            .sum();
        let total_cost = self.total_cost_basis();
        let total_gain = total_value - total_cost;
        PortfolioMetrics {
            total_value,
            total_cost,
            total_gain,
            total_return: if total_cost > 0.0 { total_gain / total_cost } else { 0.0 },
            holdings_count: self.positions.len(),
        }
    }
}
