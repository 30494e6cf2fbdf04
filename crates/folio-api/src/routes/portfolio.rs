//! # Portfolio View
//!
//! Current holdings and cash, valued with the configured market data.
//! Tickers without a price are valued at zero.

use std::collections::HashMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use folio_core::AppEnv;
use folio_portfolio::{fetch_prices, PortfolioMetrics, Position};
use folio_service::{load_market, repo};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PortfolioView {
    pub as_of: NaiveDate,
    pub env: AppEnv,
    pub positions: Vec<Position>,
    pub prices: HashMap<String, f64>,
    pub cash: f64,
    pub metrics: PortfolioMetrics,
    /// No holdings and no cash recorded yet.
    pub is_first_time: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/portfolio", get(portfolio))
}

/// GET /v1/portfolio
async fn portfolio(State(state): State<AppState>) -> Result<Json<PortfolioView>, AppError> {
    let today = state.clock.today();
    let loaded = repo::load_portfolio(state.pool()).await?;
    let market = load_market(state.pool(), state.settings.env, state.settings.synthetic_seed, today).await?;
    let prices = fetch_prices(market.as_ref(), &loaded.portfolio.tickers());
    let metrics = loaded.portfolio.metrics(&prices);
    Ok(Json(PortfolioView {
        as_of: today,
        env: state.settings.env,
        positions: loaded.portfolio.positions().cloned().collect(),
        cash: loaded.portfolio.cash,
        prices,
        metrics,
        is_first_time: loaded.is_first_time,
    }))
}
