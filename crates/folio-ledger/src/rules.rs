//! # Pre-Trade Rule Evaluation
//!
//! Evaluates the active policy rules against a proposed order before it
//! executes. Only buys are evaluated; sells reduce exposure.
//!
//! Projections use cost-basis equity (`cash + Σ shares × buy_price`) so the
//! result does not depend on a live price feed:
//!
//! - `projected_pos_value = (existing_shares + shares) × price`
//! - `projected_equity = current_equity`, or the order notional when the
//!   portfolio has no equity yet, floored at `1e-9`.
//!
//! A rule breaches when its ratio exceeds the threshold by more than
//! [`TOLERANCE`]. Rules without a threshold are skipped.

use std::collections::HashMap;

use folio_core::{Severity, Ticker};
use folio_portfolio::Portfolio;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{PolicyRule, RuleType};

pub const TOLERANCE: f64 = 1e-12;
const EQUITY_FLOOR: f64 = 1e-9;

pub const POSITION_WEIGHT_EXCEEDED: &str = "position_weight_exceeded";
pub const TRADE_NOTIONAL_EXCEEDED: &str = "trade_notional_exceeded";
pub const SECTOR_WEIGHT_EXCEEDED: &str = "sector_weight_exceeded";
pub const TURNOVER_EXCEEDED: &str = "turnover_exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedOrder {
    pub ticker: Ticker,
    pub side: OrderSide,
    pub shares: f64,
    pub price: f64,
}

impl ProposedOrder {
    pub fn notional(&self) -> f64 {
        self.shares * self.price
    }
}

/// Portfolio state the rules are measured against.
#[derive(Debug, Clone, Copy)]
pub struct PreTradeContext<'a> {
    pub portfolio: &'a Portfolio,
    /// Sector per ticker. Tickers without an entry skip sector rules.
    pub sectors: &'a HashMap<String, String>,
    /// Gross notional already traded today.
    pub traded_notional_today: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleBreach {
    pub rule_code: String,
    pub rule_type: RuleType,
    pub severity: Severity,
    pub reason: &'static str,
    pub details: Value,
}

impl RuleBreach {
    /// Context stored in `breach_log.context_json`.
    pub fn context(&self) -> Value {
        let mut ctx = json!({ "reason": self.reason });
        if let (Some(map), Value::Object(details)) = (ctx.as_object_mut(), &self.details) {
            for (k, v) in details {
                map.insert(k.clone(), v.clone());
            }
        }
        ctx
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreTradeDecision {
    pub breaches: Vec<RuleBreach>,
    /// True when any breach comes from an `error` severity rule.
    pub will_block: bool,
}

impl PreTradeDecision {
    fn from_breaches(breaches: Vec<RuleBreach>) -> Self {
        let will_block = breaches.iter().any(|b| b.severity.blocks());
        Self {
            breaches,
            will_block,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.breaches.is_empty()
    }
}

pub fn evaluate_pre_trade(
    rules: &[PolicyRule],
    order: &ProposedOrder,
    ctx: &PreTradeContext<'_>,
) -> PreTradeDecision {
    if order.side != OrderSide::Buy {
        return PreTradeDecision::from_breaches(Vec::new());
    }

    let ticker = order.ticker.as_str();
    let existing_shares = ctx.portfolio.shares_of(&order.ticker);
    let notional = order.notional();
    let projected_pos_value = (existing_shares + order.shares) * order.price;
    let current_equity = ctx.portfolio.equity_at_cost();
    let projected_equity = if current_equity > 0.0 {
        current_equity
    } else {
        notional
    }
    .max(EQUITY_FLOOR);
    let sector = ctx.sectors.get(ticker);

    let mut breaches = Vec::new();
    for rule in rules.iter().filter(|r| r.active) {
        let Some(threshold) = rule.threshold else {
            continue;
        };
        let breach = |reason: &'static str, details: Value| RuleBreach {
            rule_code: rule.code.clone(),
            rule_type: rule.rule_type.clone(),
            severity: rule.severity,
            reason,
            details,
        };

        match &rule.rule_type {
            RuleType::PositionWeight => {
                // Seeding an empty book: the first position is the whole book.
                let seeding = existing_shares <= 0.0
                    && (projected_equity - projected_pos_value).abs() < EQUITY_FLOOR;
                if seeding {
                    continue;
                }
                let weight = projected_pos_value / projected_equity;
                if weight > threshold + TOLERANCE {
                    breaches.push(breach(
                        POSITION_WEIGHT_EXCEEDED,
                        json!({
                            "ticker": ticker,
                            "projected_weight": weight,
                            "threshold": threshold,
                        }),
                    ));
                }
            }
            RuleType::MaxTradeNotionalPct => {
                let base = if current_equity > 0.0 { current_equity } else { notional };
                let pct = if base > 0.0 { notional / base } else { 0.0 };
                if pct > threshold + TOLERANCE {
                    breaches.push(breach(
                        TRADE_NOTIONAL_EXCEEDED,
                        json!({
                            "notional": notional,
                            "pct": pct,
                            "threshold": threshold,
                        }),
                    ));
                }
            }
            RuleType::SectorAggregateWeight => {
                let Some(sector) = sector else {
                    continue;
                };
                let others: f64 = ctx
                    .portfolio
                    .positions()
                    .filter(|p| p.ticker != order.ticker)
                    .filter(|p| ctx.sectors.get(p.ticker.as_str()) == Some(sector))
                    .map(|p| p.value_at_cost())
                    .sum();
                let weight = (others + projected_pos_value) / projected_equity;
                if weight > threshold + TOLERANCE {
                    breaches.push(breach(
                        SECTOR_WEIGHT_EXCEEDED,
                        json!({
                            "sector": sector,
                            "projected_sector_weight": weight,
                            "threshold": threshold,
                        }),
                    ));
                }
            }
            RuleType::Turnover => {
                let traded = ctx.traded_notional_today.max(0.0) + notional;
                let ratio = traded / projected_equity;
                if ratio > threshold + TOLERANCE {
                    breaches.push(breach(
                        TURNOVER_EXCEEDED,
                        json!({
                            "traded_notional": traded,
                            "turnover": ratio,
                            "threshold": threshold,
                        }),
                    ));
                }
            }
            RuleType::Other(kind) => {
                tracing::trace!(rule = %rule.code, kind = %kind, "rule type not evaluated pre-trade");
            }
        }
    }

    PreTradeDecision::from_breaches(breaches)
}
