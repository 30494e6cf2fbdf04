//! Dev-stage seeding: two synthetic holdings, starting cash and a
//! deterministic price history, written only into an empty database.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use folio_core::Ticker;
use folio_portfolio::{build_snapshot, Portfolio, Position};
use serde::Serialize;
use serde_json::json;

use crate::error::ServiceError;
use crate::ledger::Ledger;
use crate::repo;

pub const SEED: &str = "seed";
pub const SEED_CASH: f64 = 10_000.0;
pub const SEED_HISTORY_DAYS: i64 = 20;
/// Daily price step applied to the buy price, oldest day first.
const DAILY_STEP: f64 = 0.01;

/// `(ticker, shares, buy_price, stop_loss)`
const SEED_POSITIONS: [(&str, f64, f64, f64); 2] = [("SYNAAA", 100.0, 5.0, 4.5), ("SYNBBB", 50.0, 8.0, 7.25)];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedReport {
    pub seeded: bool,
    pub positions: usize,
    pub history_days: usize,
    pub cash: f64,
}

pub fn seed_portfolio() -> Result<Portfolio, ServiceError> {
    let positions = SEED_POSITIONS
        .iter()
        .map(|&(ticker, shares, buy_price, stop_loss)| {
            Ok(Position {
                ticker: Ticker::parse(ticker)?,
                shares,
                stop_loss,
                buy_price,
                cost_basis: shares * buy_price,
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;
    Ok(Portfolio::new(positions, SEED_CASH))
}

/// Prices `days_ago` days before today: the buy price plus one percent per
/// day since the first seeded day.
fn seed_prices(portfolio: &Portfolio, days_ago: i64) -> HashMap<String, f64> {
    let factor = 1.0 + DAILY_STEP * (SEED_HISTORY_DAYS - days_ago) as f64;
    portfolio
        .positions()
        .map(|p| (p.ticker.to_string(), p.buy_price * factor))
        .collect()
}

/// Seed holdings, cash and the [`SEED_HISTORY_DAYS`] calendar days before
/// `today`. Does nothing when holdings or cash already exist.
pub async fn seed_dev_stage(ledger: &Ledger, today: NaiveDate) -> Result<SeedReport, ServiceError> {
    let pool = ledger.pool();
    let loaded = repo::load_portfolio(pool).await?;
    if !loaded.is_first_time {
        tracing::debug!("dev-stage seed skipped: portfolio or cash already present");
        return Ok(SeedReport {
            seeded: false,
            positions: loaded.portfolio.len(),
            history_days: 0,
            cash: loaded.portfolio.cash,
        });
    }

    let portfolio = seed_portfolio()?;
    let mut tx = pool.begin().await?;
    repo::save_portfolio(&mut tx, &portfolio).await?;
    for days_ago in (1..=SEED_HISTORY_DAYS).rev() {
        let date = today - Duration::days(days_ago);
        let rows = build_snapshot(&portfolio, &seed_prices(&portfolio, days_ago), date);
        repo::replace_history_for_date(&mut tx, date, &rows).await?;
    }
    tx.commit().await?;

    let report = SeedReport {
        seeded: true,
        positions: portfolio.len(),
        history_days: SEED_HISTORY_DAYS as usize,
        cash: portfolio.cash,
    };
    ledger
        .log_audit_event(
            SEED,
            &json!({
                "positions": report.positions,
                "history_days": report.history_days,
                "cash": report.cash,
            }),
            None,
            None,
        )
        .await?;
    tracing::info!(positions = report.positions, history_days = report.history_days, "dev-stage data seeded");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()
    }

    #[tokio::test]
    async fn seeds_empty_database_once() {
        let ledger = Ledger::new(memory_pool().await.unwrap());
        let report = seed_dev_stage(&ledger, today()).await.unwrap();
        assert!(report.seeded);
        assert_eq!(report.positions, 2);

        let loaded = repo::load_portfolio(ledger.pool()).await.unwrap();
        assert!(!loaded.is_first_time);
        assert_eq!(loaded.portfolio.cash, SEED_CASH);
        let aaa = loaded.portfolio.position(&Ticker::parse("SYNAAA").unwrap()).unwrap();
        assert_eq!(aaa.cost_basis, 500.0);
        assert_eq!(aaa.stop_loss, 4.5);

        let series = repo::equity_series(ledger.pool()).await.unwrap();
        assert_eq!(series.len(), 20);
        assert_eq!(series.first().unwrap().0, today() - Duration::days(20));
        assert_eq!(series.last().unwrap().0, today() - Duration::days(1));
        // Prices climb one percent a day, so equity is non-decreasing.
        assert!(series.windows(2).all(|w| w[1].1 >= w[0].1));

        let again = seed_dev_stage(&ledger, today()).await.unwrap();
        assert!(!again.seeded);
        assert_eq!(repo::equity_series(ledger.pool()).await.unwrap().len(), 20);
        assert_eq!(ledger.recent_audit_events(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn existing_cash_blocks_seeding() {
        let ledger = Ledger::new(memory_pool().await.unwrap());
        let mut conn = ledger.pool().acquire().await.unwrap();
        repo::set_cash(&mut conn, 50.0).await.unwrap();
        drop(conn);
        let report = seed_dev_stage(&ledger, today()).await.unwrap();
        assert!(!report.seeded);
        assert_eq!(report.cash, 50.0);
    }

    #[test]
    fn first_day_prices_equal_buy_price() {
        let portfolio = seed_portfolio().unwrap();
        let first = seed_prices(&portfolio, SEED_HISTORY_DAYS);
        assert_eq!(first["SYNAAA"], 5.0);
        let last = seed_prices(&portfolio, 1);
        assert!((last["SYNBBB"] - 8.0 * 1.19).abs() < 1e-12);
    }
}
