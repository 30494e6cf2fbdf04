//! # Trade Execution
//!
//! Manual buys and sells against the stored portfolio. The checks run in a
//! fixed order and nothing is written until all of them pass:
//!
//! 1. input validation (ticker format, positive shares and price);
//! 2. sells only: the ticker must be held;
//! 3. the price must lie within today's range (`low <= price <= high`);
//! 4. buys only: the cost must not exceed cash;
//! 5. optional pre-trade governance. Breaches are recorded either way;
//!    blocking breaches fail the trade with `PermissionDenied`.
//!
//! A passing trade appends to the trade log, updates holdings and cash,
//! persists today's snapshot and writes a `trade` audit event in one
//! transaction. Trades through clones of one [`Ledger`] run one at a time,
//! from loading the portfolio to commit.

use std::sync::Arc;

use folio_core::{validate_price, validate_shares, validate_stop_loss, Clock, FolioError, Ticker};
use folio_ledger::{evaluate_pre_trade, BreachLog, OrderSide, PreTradeContext, ProposedOrder};
use folio_portfolio::market::fetch_sectors;
use folio_portfolio::{fetch_prices, MarketData, Portfolio, TradeLogEntry};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::ServiceError;
use crate::ledger::Ledger;
use crate::repo;
use crate::snapshot::persist_snapshot;

pub const TRADE: &str = "trade";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeOptions {
    pub enforce_governance: bool,
    pub check_day_range: bool,
}

impl Default for TradeOptions {
    fn default() -> Self {
        Self {
            enforce_governance: false,
            check_day_range: true,
        }
    }
}

/// A completed trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReceipt {
    pub message: String,
    pub trade_id: i64,
    pub side: OrderSide,
    pub ticker: String,
    pub shares: f64,
    pub price: f64,
    /// Realized PnL for sells.
    pub pnl: Option<f64>,
    pub cash_after: f64,
    /// Non-blocking breaches recorded on the way.
    pub breaches: Vec<BreachLog>,
}

#[derive(Clone)]
pub struct TradeExecutor {
    pool: SqlitePool,
    ledger: Ledger,
    market: Arc<dyn MarketData>,
    clock: Arc<dyn Clock>,
    options: TradeOptions,
}

impl std::fmt::Debug for TradeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeExecutor")
            .field("market", &self.market.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TradeExecutor {
    pub fn new(ledger: Ledger, market: Arc<dyn MarketData>, clock: Arc<dyn Clock>, options: TradeOptions) -> Self {
        Self {
            pool: ledger.pool().clone(),
            ledger,
            market,
            clock,
            options,
        }
    }

    pub async fn buy(
        &self,
        ticker: &str,
        shares: f64,
        price: f64,
        stop_loss: Option<f64>,
    ) -> Result<TradeReceipt, ServiceError> {
        let ticker = Ticker::parse(ticker)?;
        validate_shares(shares)?;
        validate_price(price)?;
        let stop_loss = stop_loss.map(validate_stop_loss).transpose()?;
        self.check_day_range(&ticker, price)?;

        let _trade = self.ledger.lock_trades().await;
        let mut portfolio = repo::load_portfolio(&self.pool).await?.portfolio;
        let cost = shares * price;
        if cost > portfolio.cash {
            return Err(FolioError::Validation("Insufficient cash for this trade.".into()).into());
        }

        let order = ProposedOrder {
            ticker: ticker.clone(),
            side: OrderSide::Buy,
            shares,
            price,
        };
        let breaches = self.pre_trade(&portfolio, &order).await?;

        portfolio.apply_buy(&ticker, shares, price, stop_loss)?;
        portfolio.cash -= cost;
        let entry = TradeLogEntry::buy(self.clock.today(), &ticker, shares, price);

        let mut receipt = TradeReceipt {
            message: format!("Bought {shares} shares of {ticker} at ${price:.2}."),
            trade_id: 0,
            side: OrderSide::Buy,
            ticker: ticker.to_string(),
            shares,
            price,
            pnl: None,
            cash_after: portfolio.cash,
            breaches,
        };
        self.commit(&portfolio, &entry, &mut receipt).await?;
        Ok(receipt)
    }

    pub async fn sell(&self, ticker: &str, shares: f64, price: f64) -> Result<TradeReceipt, ServiceError> {
        let ticker = Ticker::parse(ticker)?;
        validate_shares(shares)?;
        validate_price(price)?;

        let _trade = self.ledger.lock_trades().await;
        let mut portfolio = repo::load_portfolio(&self.pool).await?.portfolio;
        let held = portfolio
            .position(&ticker)
            .ok_or_else(|| FolioError::NotFound("Ticker not in portfolio".into()))?;
        let buy_price = held.buy_price;
        self.check_day_range(&ticker, price)?;

        let pnl = portfolio.apply_sell(&ticker, shares, price)?;
        portfolio.cash += shares * price;
        let entry = TradeLogEntry::sell(self.clock.today(), &ticker, shares, price, buy_price, pnl);

        let mut receipt = TradeReceipt {
            message: format!("Sold {shares} shares of {ticker} at ${price:.2}."),
            trade_id: 0,
            side: OrderSide::Sell,
            ticker: ticker.to_string(),
            shares,
            price,
            pnl: Some(pnl),
            cash_after: portfolio.cash,
            breaches: Vec::new(),
        };
        self.commit(&portfolio, &entry, &mut receipt).await?;
        Ok(receipt)
    }

    fn check_day_range(&self, ticker: &Ticker, price: f64) -> Result<(), FolioError> {
        if !self.options.check_day_range {
            return Ok(());
        }
        let range = self.market.day_range(ticker)?;
        if range.contains(price) {
            Ok(())
        } else {
            Err(FolioError::Validation(format!(
                "Price outside today's range {:.2}-{:.2}",
                range.low, range.high
            )))
        }
    }

    /// Evaluate active rules and record any breaches. Fails when a breach
    /// blocks the trade.
    async fn pre_trade(&self, portfolio: &Portfolio, order: &ProposedOrder) -> Result<Vec<BreachLog>, ServiceError> {
        if !self.options.enforce_governance {
            return Ok(Vec::new());
        }
        let rules = self.ledger.list_active_rules().await?;
        let traded_notional_today = repo::traded_notional_on(&self.pool, self.clock.today()).await?;
        let mut tickers = portfolio.tickers();
        if !tickers.contains(&order.ticker) {
            tickers.push(order.ticker.clone());
        }
        let sectors = fetch_sectors(self.market.as_ref(), &tickers);
        let ctx = PreTradeContext {
            portfolio,
            sectors: &sectors,
            traded_notional_today,
        };
        let decision = evaluate_pre_trade(&rules, order, &ctx);
        let logged = self.ledger.record_breaches(&decision).await?;
        if decision.will_block {
            let codes: Vec<&str> = decision
                .breaches
                .iter()
                .filter(|b| b.severity.blocks())
                .map(|b| b.rule_code.as_str())
                .collect();
            tracing::warn!(ticker = %order.ticker, rules = ?codes, "trade blocked by policy");
            return Err(FolioError::PermissionDenied(format!("Trade blocked by policy: {}", codes.join(", "))).into());
        }
        Ok(logged)
    }

    /// Write the trade, today's snapshot and the `trade` audit event in one
    /// transaction. Fills in `receipt.trade_id`.
    async fn commit(
        &self,
        portfolio: &Portfolio,
        entry: &TradeLogEntry,
        receipt: &mut TradeReceipt,
    ) -> Result<(), ServiceError> {
        let prices = fetch_prices(self.market.as_ref(), &portfolio.tickers());
        let _guard = self.ledger.lock_appends().await;
        let mut tx = self.pool.begin().await?;
        receipt.trade_id = repo::append_trade(&mut tx, entry).await?;
        persist_snapshot(&mut tx, portfolio, &prices, entry.date).await?;
        let payload = json!({
            "side": receipt.side,
            "ticker": receipt.ticker,
            "shares": receipt.shares,
            "price": receipt.price,
            "pnl": receipt.pnl,
            "cash_after": receipt.cash_after,
        });
        let trade_id = receipt.trade_id.to_string();
        self.ledger
            .append_audit_in(&mut tx, TRADE, &payload, Some("trade_log"), Some(&trade_id))
            .await?;
        tx.commit().await?;
        tracing::info!(trade_id = receipt.trade_id, message = %receipt.message, "trade executed");
        Ok(())
    }
}
