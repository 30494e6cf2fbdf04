//! Holdings, cash and daily history.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use folio_core::{FolioError, Ticker};
use folio_portfolio::{Portfolio, Position, SnapshotRow, TOTAL_TICKER};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::ServiceError;

#[derive(sqlx::FromRow)]
struct PositionRow {
    ticker: String,
    shares: f64,
    stop_loss: f64,
    buy_price: f64,
    cost_basis: f64,
}

impl TryFrom<PositionRow> for Position {
    type Error = FolioError;

    fn try_from(row: PositionRow) -> Result<Self, Self::Error> {
        Ok(Position {
            ticker: Ticker::parse(&row.ticker)?,
            shares: row.shares,
            stop_loss: row.stop_loss,
            buy_price: row.buy_price,
            cost_basis: row.cost_basis,
        })
    }
}

/// Holdings plus cash as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPortfolio {
    pub portfolio: Portfolio,
    /// No holdings and no cash row yet.
    pub is_first_time: bool,
}

pub async fn load_portfolio(pool: &SqlitePool) -> Result<LoadedPortfolio, ServiceError> {
    let rows = sqlx::query_as::<_, PositionRow>(
        "SELECT ticker, shares, stop_loss, buy_price, cost_basis FROM portfolio ORDER BY ticker",
    )
    .fetch_all(pool)
    .await?;
    let cash = cash_balance(pool).await?;
    let is_first_time = rows.is_empty() && cash.is_none();
    let positions = rows
        .into_iter()
        .map(Position::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LoadedPortfolio {
        portfolio: Portfolio::new(positions, cash.unwrap_or(0.0)),
        is_first_time,
    })
}

pub async fn cash_balance(pool: &SqlitePool) -> Result<Option<f64>, ServiceError> {
    Ok(sqlx::query_scalar("SELECT balance FROM cash WHERE id = 0")
        .fetch_optional(pool)
        .await?)
}

pub async fn set_cash(conn: &mut SqliteConnection, balance: f64) -> Result<(), ServiceError> {
    sqlx::query(
        "INSERT INTO cash (id, balance) VALUES (0, ?)
         ON CONFLICT(id) DO UPDATE SET balance = excluded.balance",
    )
    .bind(balance)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Replace every holding and the cash balance.
pub async fn save_portfolio(conn: &mut SqliteConnection, portfolio: &Portfolio) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM portfolio").execute(&mut *conn).await?;
    for p in portfolio.positions() {
        sqlx::query(
            "INSERT INTO portfolio (ticker, shares, stop_loss, buy_price, cost_basis)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(p.ticker.as_str())
        .bind(p.shares)
        .bind(p.stop_loss)
        .bind(p.buy_price)
        .bind(p.cost_basis)
        .execute(&mut *conn)
        .await?;
    }
    set_cash(conn, portfolio.cash).await
}

// ─── History ───────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct HistoryRow {
    date: NaiveDate,
    ticker: String,
    shares: Option<f64>,
    cost_basis: Option<f64>,
    stop_loss: Option<f64>,
    current_price: Option<f64>,
    total_value: Option<f64>,
    pnl: Option<f64>,
    action: Option<String>,
    cash_balance: Option<f64>,
    total_equity: Option<f64>,
}

impl From<HistoryRow> for SnapshotRow {
    fn from(r: HistoryRow) -> Self {
        SnapshotRow {
            date: r.date,
            ticker: r.ticker,
            shares: r.shares,
            cost_basis: r.cost_basis,
            stop_loss: r.stop_loss,
            current_price: r.current_price,
            total_value: r.total_value,
            pnl: r.pnl,
            action: r.action,
            cash_balance: r.cash_balance,
            total_equity: r.total_equity,
        }
    }
}

/// Every history row ordered by date, then ticker.
pub async fn load_history(pool: &SqlitePool) -> Result<Vec<SnapshotRow>, ServiceError> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT date, ticker, shares, cost_basis, stop_loss, current_price, total_value,
                pnl, action, cash_balance, total_equity
         FROM portfolio_history ORDER BY date, ticker",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(SnapshotRow::from).collect())
}

async fn insert_history_rows(conn: &mut SqliteConnection, rows: &[SnapshotRow]) -> Result<(), ServiceError> {
    for r in rows {
        sqlx::query(
            "INSERT INTO portfolio_history (date, ticker, shares, cost_basis, stop_loss,
                current_price, total_value, pnl, action, cash_balance, total_equity)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(r.date)
        .bind(&r.ticker)
        .bind(r.shares)
        .bind(r.cost_basis)
        .bind(r.stop_loss)
        .bind(r.current_price)
        .bind(r.total_value)
        .bind(r.pnl)
        .bind(&r.action)
        .bind(r.cash_balance)
        .bind(r.total_equity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Replace the whole history table.
pub async fn replace_history(conn: &mut SqliteConnection, rows: &[SnapshotRow]) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM portfolio_history").execute(&mut *conn).await?;
    insert_history_rows(conn, rows).await
}

/// Replace the rows for one date; other dates are untouched.
pub async fn replace_history_for_date(
    conn: &mut SqliteConnection,
    date: NaiveDate,
    rows: &[SnapshotRow],
) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM portfolio_history WHERE date = ?")
        .bind(date)
        .execute(&mut *conn)
        .await?;
    insert_history_rows(conn, rows).await
}

/// Most recent `limit` daily equity values, newest first.
pub async fn equity_history(pool: &SqlitePool, limit: usize) -> Result<Vec<f64>, ServiceError> {
    Ok(sqlx::query_scalar(
        "SELECT total_equity FROM portfolio_history
         WHERE total_equity IS NOT NULL
         ORDER BY date DESC LIMIT ?",
    )
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?)
}

/// Daily total equity from the `TOTAL` rows, oldest first.
pub async fn equity_series(pool: &SqlitePool) -> Result<Vec<(NaiveDate, f64)>, ServiceError> {
    Ok(sqlx::query_as(
        "SELECT date, total_equity FROM portfolio_history
         WHERE ticker = ? AND total_equity IS NOT NULL
         ORDER BY date",
    )
    .bind(TOTAL_TICKER)
    .fetch_all(pool)
    .await?)
}

/// Position values per ticker, oldest first. `TOTAL` rows are excluded.
pub async fn value_series_by_ticker(pool: &SqlitePool) -> Result<BTreeMap<String, Vec<f64>>, ServiceError> {
    let rows: Vec<(String, f64)> = sqlx::query_as(
        "SELECT ticker, total_value FROM portfolio_history
         WHERE ticker <> ? AND total_value IS NOT NULL
         ORDER BY ticker, date",
    )
    .bind(TOTAL_TICKER)
    .fetch_all(pool)
    .await?;
    let mut out: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (ticker, value) in rows {
        out.entry(ticker).or_default().push(value);
    }
    Ok(out)
}

pub async fn latest_history_date(pool: &SqlitePool) -> Result<Option<NaiveDate>, ServiceError> {
    Ok(sqlx::query_scalar("SELECT MAX(date) FROM portfolio_history")
        .fetch_one(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use folio_portfolio::build_snapshot;
    use std::collections::HashMap;

    fn t(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn sample_portfolio() -> Portfolio {
        let mut p = Portfolio::new([], 1000.0);
        p.apply_buy(&t("ABC"), 10.0, 5.0, Some(4.0)).unwrap();
        p.apply_buy(&t("XYZ"), 2.0, 50.0, None).unwrap();
        p
    }

    #[tokio::test]
    async fn empty_database_is_first_time() {
        let pool = memory_pool().await.unwrap();
        let loaded = load_portfolio(&pool).await.unwrap();
        assert!(loaded.is_first_time);
        assert!(loaded.portfolio.is_empty());
        assert_eq!(loaded.portfolio.cash, 0.0);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let pool = memory_pool().await.unwrap();
        let portfolio = sample_portfolio();
        let mut conn = pool.acquire().await.unwrap();
        save_portfolio(&mut conn, &portfolio).await.unwrap();
        drop(conn);

        let loaded = load_portfolio(&pool).await.unwrap();
        assert!(!loaded.is_first_time);
        assert_eq!(loaded.portfolio, portfolio);
    }

    #[tokio::test]
    async fn cash_row_alone_is_not_first_time() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        set_cash(&mut conn, 0.0).await.unwrap();
        drop(conn);
        assert!(!load_portfolio(&pool).await.unwrap().is_first_time);
        assert_eq!(cash_balance(&pool).await.unwrap(), Some(0.0));
    }

    #[tokio::test]
    async fn history_replacement_is_per_date() {
        let pool = memory_pool().await.unwrap();
        let portfolio = sample_portfolio();
        let prices = HashMap::from([("ABC".to_string(), 6.0), ("XYZ".to_string(), 40.0)]);
        let mut conn = pool.acquire().await.unwrap();
        replace_history_for_date(&mut conn, date(1), &build_snapshot(&portfolio, &prices, date(1)))
            .await
            .unwrap();
        replace_history_for_date(&mut conn, date(4), &build_snapshot(&portfolio, &prices, date(4)))
            .await
            .unwrap();
        // Re-running a date replaces instead of duplicating.
        replace_history_for_date(&mut conn, date(4), &build_snapshot(&portfolio, &prices, date(4)))
            .await
            .unwrap();
        drop(conn);

        let history = load_history(&pool).await.unwrap();
        assert_eq!(history.len(), 6);
        assert_eq!(history[0].date, date(1));
        assert_eq!(latest_history_date(&pool).await.unwrap(), Some(date(4)));

        let equity = equity_history(&pool, 40).await.unwrap();
        // 60 + 80 in positions plus 1000 cash
        assert_eq!(equity, vec![1140.0, 1140.0]);
        let series = equity_series(&pool).await.unwrap();
        assert_eq!(series, vec![(date(1), 1140.0), (date(4), 1140.0)]);
        let by_ticker = value_series_by_ticker(&pool).await.unwrap();
        assert_eq!(by_ticker["ABC"], vec![60.0, 60.0]);
        assert!(!by_ticker.contains_key(TOTAL_TICKER));
    }

    #[tokio::test]
    async fn equity_history_is_newest_first_and_limited() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        for d in 1..=5u32 {
            let p = Portfolio::new([], f64::from(d) * 100.0);
            replace_history_for_date(&mut conn, date(d), &build_snapshot(&p, &HashMap::new(), date(d)))
                .await
                .unwrap();
        }
        drop(conn);
        assert_eq!(equity_history(&pool, 3).await.unwrap(), vec![500.0, 400.0, 300.0]);
    }
}
