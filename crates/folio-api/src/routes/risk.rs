//! # Risk API
//!
//! Stored risk events, and on-demand evaluation of the current portfolio.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use folio_ledger::RiskEvent;
use folio_risk::{RegimeProbabilities, RiskSnapshot};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, Validate};
use crate::routes::governance::LimitQuery;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EvaluateRequest {
    /// Append one chained risk event per fired threshold.
    pub emit: bool,
    pub regime: Option<RegimeProbabilities>,
}

impl Validate for EvaluateRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(r) = &self.regime {
            for (name, p) in [("bear", r.bear), ("high_vol", r.high_vol)] {
                if !(0.0..=1.0).contains(&p) {
                    return Err(format!("{name} probability must be within [0, 1]"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub snapshot: RiskSnapshot,
    pub events: Vec<RiskEvent>,
    pub exposure_scalar: f64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/risk/events", get(list_events))
        .route("/v1/risk/evaluate", post(evaluate))
}

/// GET /v1/risk/events: newest first.
async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Vec<RiskEvent>>, AppError> {
    let query = extract_query(query)?;
    Ok(Json(state.ledger.recent_risk_events(query.limit()).await?))
}

/// POST /v1/risk/evaluate
async fn evaluate(
    State(state): State<AppState>,
    body: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let monitor = state.risk_monitor();
    let snapshot = monitor.compute_snapshot().await?;
    let events = if req.emit {
        monitor.emit_risk_events(&snapshot).await?
    } else {
        Vec::new()
    };
    let exposure_scalar = monitor.exposure_scalar(req.regime.as_ref()).await?;
    Ok(Json(EvaluateResponse {
        snapshot,
        events,
        exposure_scalar,
    }))
}
