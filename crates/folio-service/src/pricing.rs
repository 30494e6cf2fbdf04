//! Market-data provider for the configured environment, with the stored
//! manual overrides layered on top.

use std::sync::Arc;

use chrono::NaiveDate;
use folio_core::AppEnv;
use folio_portfolio::{provider_for, MarketData};
use sqlx::SqlitePool;

use crate::error::ServiceError;
use crate::repo;

pub async fn load_market(
    pool: &SqlitePool,
    env: AppEnv,
    synthetic_seed: u64,
    today: NaiveDate,
) -> Result<Arc<dyn MarketData>, ServiceError> {
    let overrides = repo::load_price_book(pool, today).await?;
    tracing::debug!(env = env.as_str(), overrides = !overrides.is_empty(), "market data provider selected");
    Ok(provider_for(env, synthetic_seed, today, overrides))
}
