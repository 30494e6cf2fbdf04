//! Manual price overrides.

use chrono::NaiveDate;
use folio_core::{validate_price, Ticker};
use folio_portfolio::ManualPriceBook;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ManualPrice {
    pub ticker: String,
    pub price: f64,
    pub updated_at: String,
}

pub async fn list_manual_prices(pool: &SqlitePool) -> Result<Vec<ManualPrice>, ServiceError> {
    Ok(sqlx::query_as::<_, ManualPrice>(
        "SELECT ticker, price, updated_at FROM manual_price ORDER BY ticker",
    )
    .fetch_all(pool)
    .await?)
}

/// All overrides as a price book dated `as_of`.
pub async fn load_price_book(pool: &SqlitePool, as_of: NaiveDate) -> Result<ManualPriceBook, ServiceError> {
    let prices = list_manual_prices(pool).await?;
    Ok(ManualPriceBook::from_prices(
        as_of,
        prices.into_iter().map(|p| (p.ticker, p.price)),
    ))
}

pub async fn set_manual_price(pool: &SqlitePool, ticker: &Ticker, price: f64) -> Result<(), ServiceError> {
    validate_price(price)?;
    sqlx::query(
        "INSERT INTO manual_price (ticker, price) VALUES (?, ?)
         ON CONFLICT(ticker) DO UPDATE SET price = excluded.price, updated_at = datetime('now')",
    )
    .bind(ticker.as_str())
    .bind(price)
    .execute(pool)
    .await?;
    tracing::info!(ticker = %ticker, price, "manual price set");
    Ok(())
}

/// Returns whether an override existed.
pub async fn remove_manual_price(pool: &SqlitePool, ticker: &Ticker) -> Result<bool, ServiceError> {
    let result = sqlx::query("DELETE FROM manual_price WHERE ticker = ?")
        .bind(ticker.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
