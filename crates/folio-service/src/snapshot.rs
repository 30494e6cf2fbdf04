//! Daily portfolio snapshot: value holdings, persist holdings and cash, and
//! replace that date's history rows.

use std::collections::HashMap;

use chrono::NaiveDate;
use folio_portfolio::{build_snapshot, fetch_prices, MarketData, Portfolio, SnapshotRow};
use serde::Serialize;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::ServiceError;
use crate::ledger::Ledger;
use crate::repo;

pub const PORTFOLIO_SNAPSHOT: &str = "portfolio_snapshot";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotReport {
    pub date: NaiveDate,
    /// Position rows followed by the `TOTAL` row.
    pub rows: Vec<SnapshotRow>,
    pub cash: f64,
    pub total_equity: f64,
}

impl SnapshotReport {
    fn new(date: NaiveDate, rows: Vec<SnapshotRow>) -> Self {
        let total = rows.iter().find(|r| r.is_total());
        let cash = total.and_then(|r| r.cash_balance).unwrap_or(0.0);
        let total_equity = total.and_then(|r| r.total_equity).unwrap_or(0.0);
        Self {
            date,
            rows,
            cash,
            total_equity,
        }
    }
}

/// Write `portfolio` and its valuation for `date` inside the caller's
/// transaction.
pub async fn persist_snapshot(
    conn: &mut SqliteConnection,
    portfolio: &Portfolio,
    prices: &HashMap<String, f64>,
    date: NaiveDate,
) -> Result<Vec<SnapshotRow>, ServiceError> {
    let rows = build_snapshot(portfolio, prices, date);
    repo::save_portfolio(conn, portfolio).await?;
    repo::replace_history_for_date(conn, date, &rows).await?;
    Ok(rows)
}

/// Snapshot the stored portfolio for `date`. Running it twice for one date
/// leaves a single set of rows.
pub async fn take_snapshot(
    pool: &SqlitePool,
    ledger: &Ledger,
    market: &dyn MarketData,
    date: NaiveDate,
) -> Result<SnapshotReport, ServiceError> {
    let loaded = repo::load_portfolio(pool).await?;
    let prices = fetch_prices(market, &loaded.portfolio.tickers());

    let mut tx = pool.begin().await?;
    let rows = persist_snapshot(&mut tx, &loaded.portfolio, &prices, date).await?;
    tx.commit().await?;

    let report = SnapshotReport::new(date, rows);
    ledger
        .log_audit_event(
            PORTFOLIO_SNAPSHOT,
            &json!({
                "date": date.to_string(),
                "holdings": loaded.portfolio.len(),
                "cash": report.cash,
                "total_equity": report.total_equity,
            }),
            Some("portfolio_history"),
            Some(&date.to_string()),
        )
        .await?;
    tracing::info!(%date, rows = report.rows.len(), total_equity = report.total_equity, "snapshot persisted");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use folio_core::Ticker;
    use folio_portfolio::{ManualPriceBook, Position};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    async fn seeded(pool: &SqlitePool) {
        let portfolio = Portfolio::new(
            [Position {
                ticker: Ticker::parse("ABC").unwrap(),
                shares: 10.0,
                stop_loss: 0.0,
                buy_price: 5.0,
                cost_basis: 50.0,
            }],
            100.0,
        );
        let mut conn = pool.acquire().await.unwrap();
        repo::save_portfolio(&mut conn, &portfolio).await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_is_idempotent_per_date() {
        let pool = memory_pool().await.unwrap();
        let ledger = Ledger::new(pool.clone());
        seeded(&pool).await;
        let book = ManualPriceBook::from_prices(date(), [("ABC".to_string(), 6.0)]);

        let first = take_snapshot(&pool, &ledger, &book, date()).await.unwrap();
        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.total_equity, 160.0);
        assert_eq!(first.cash, 100.0);

        take_snapshot(&pool, &ledger, &book, date()).await.unwrap();
        assert_eq!(repo::load_history(&pool).await.unwrap().len(), 2);

        let audit = ledger.recent_audit_events(5).await.unwrap();
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[0].category, PORTFOLIO_SNAPSHOT);
        assert_eq!(audit[0].ref_id.as_deref(), Some("2024-06-03"));
    }

    #[tokio::test]
    async fn missing_price_values_position_at_zero() {
        let pool = memory_pool().await.unwrap();
        let ledger = Ledger::new(pool.clone());
        seeded(&pool).await;
        let book = ManualPriceBook::new(date());
        let report = take_snapshot(&pool, &ledger, &book, date()).await.unwrap();
        assert_eq!(report.rows[0].total_value, Some(0.0));
        assert_eq!(report.total_equity, 100.0);
    }
}
