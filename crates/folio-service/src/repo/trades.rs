//! Trade log rows.

use chrono::NaiveDate;
use folio_portfolio::TradeLogEntry;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::ServiceError;

#[derive(sqlx::FromRow)]
struct TradeRow {
    date: NaiveDate,
    ticker: String,
    shares_bought: Option<f64>,
    buy_price: Option<f64>,
    cost_basis: Option<f64>,
    pnl: Option<f64>,
    reason: Option<String>,
    shares_sold: Option<f64>,
    sell_price: Option<f64>,
}

impl From<TradeRow> for TradeLogEntry {
    fn from(r: TradeRow) -> Self {
        TradeLogEntry {
            date: r.date,
            ticker: r.ticker,
            shares_bought: r.shares_bought,
            buy_price: r.buy_price,
            cost_basis: r.cost_basis,
            pnl: r.pnl,
            reason: r.reason,
            shares_sold: r.shares_sold,
            sell_price: r.sell_price,
        }
    }
}

/// Append one entry and return its row id.
pub async fn append_trade(conn: &mut SqliteConnection, entry: &TradeLogEntry) -> Result<i64, ServiceError> {
    let result = sqlx::query(
        "INSERT INTO trade_log (date, ticker, shares_bought, buy_price, cost_basis, pnl,
            reason, shares_sold, sell_price)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.date)
    .bind(&entry.ticker)
    .bind(entry.shares_bought)
    .bind(entry.buy_price)
    .bind(entry.cost_basis)
    .bind(entry.pnl)
    .bind(&entry.reason)
    .bind(entry.shares_sold)
    .bind(entry.sell_price)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Entries in insertion order.
pub async fn list_trades(pool: &SqlitePool) -> Result<Vec<TradeLogEntry>, ServiceError> {
    let rows = sqlx::query_as::<_, TradeRow>(
        "SELECT date, ticker, shares_bought, buy_price, cost_basis, pnl, reason,
                shares_sold, sell_price
         FROM trade_log ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(TradeLogEntry::from).collect())
}

pub async fn replace_trade_log(conn: &mut SqliteConnection, entries: &[TradeLogEntry]) -> Result<(), ServiceError> {
    sqlx::query("DELETE FROM trade_log").execute(&mut *conn).await?;
    for entry in entries {
        append_trade(conn, entry).await?;
    }
    Ok(())
}

/// Gross notional (buys plus sells) traded on `date`.
pub async fn traded_notional_on(pool: &SqlitePool, date: NaiveDate) -> Result<f64, ServiceError> {
    // TOTAL() is 0.0 on no rows and always a float.
    Ok(sqlx::query_scalar(
        "SELECT TOTAL(COALESCE(shares_bought * buy_price, 0.0) + COALESCE(shares_sold * sell_price, 0.0))
         FROM trade_log WHERE date = ?",
    )
    .bind(date)
    .fetch_one(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use folio_core::Ticker;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[tokio::test]
    async fn append_and_list_in_order() {
        let pool = memory_pool().await.unwrap();
        let abc = Ticker::parse("abc").unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let first = append_trade(&mut conn, &TradeLogEntry::buy(day(1), &abc, 10.0, 5.0))
            .await
            .unwrap();
        let second = append_trade(&mut conn, &TradeLogEntry::sell(day(2), &abc, 4.0, 6.0, 5.0, 4.0))
            .await
            .unwrap();
        drop(conn);
        assert!(second > first);

        let trades = list_trades(&pool).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].shares_bought, Some(10.0));
        assert!(trades[1].is_sell());
        assert_eq!(trades[1].sell_price, Some(6.0));
    }

    #[tokio::test]
    async fn notional_sums_both_sides_for_one_day() {
        let pool = memory_pool().await.unwrap();
        let abc = Ticker::parse("ABC").unwrap();
        let mut conn = pool.acquire().await.unwrap();
        append_trade(&mut conn, &TradeLogEntry::buy(day(1), &abc, 10.0, 5.0)).await.unwrap();
        append_trade(&mut conn, &TradeLogEntry::sell(day(1), &abc, 2.0, 6.0, 5.0, 2.0)).await.unwrap();
        append_trade(&mut conn, &TradeLogEntry::buy(day(2), &abc, 1.0, 100.0)).await.unwrap();
        drop(conn);

        assert_eq!(traded_notional_on(&pool, day(1)).await.unwrap(), 62.0);
        assert_eq!(traded_notional_on(&pool, day(3)).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn replace_clears_previous_rows() {
        let pool = memory_pool().await.unwrap();
        let abc = Ticker::parse("ABC").unwrap();
        let mut conn = pool.acquire().await.unwrap();
        append_trade(&mut conn, &TradeLogEntry::buy(day(1), &abc, 1.0, 1.0)).await.unwrap();
        replace_trade_log(&mut conn, &[]).await.unwrap();
        drop(conn);
        assert!(list_trades(&pool).await.unwrap().is_empty());
    }
}
