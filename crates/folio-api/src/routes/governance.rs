//! # Governance Console API
//!
//! Policy rules, the audit chain, config snapshots and breaches. Every
//! write goes through [`folio_service::Ledger`], so each change lands in the
//! audit chain in the same transaction.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use folio_ledger::{AuditEvent, BreachLog, BreachStatus, ChainVerification, NewRule, PolicyRule};
use folio_service::{GovernanceVerification, SavedSnapshot};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, extract_validated_json, Validate};
use crate::state::AppState;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BreachQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub open_only: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    /// Verify only the oldest `limit` links (all when zero).
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub kind: String,
    pub content: Value,
}

impl Validate for SnapshotRequest {
    fn validate(&self) -> Result<(), String> {
        if self.kind.trim().is_empty() {
            return Err("snapshot kind must not be empty".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    pub notes: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/governance/rules", get(list_rules).post(upsert_rule))
        .route("/v1/governance/audit", get(list_audit))
        .route("/v1/governance/audit/verify", get(verify_audit))
        .route("/v1/governance/snapshots", post(save_snapshot))
        .route("/v1/governance/snapshots/verify", get(verify_snapshots))
        .route("/v1/governance/verify", get(verify_all))
        .route("/v1/governance/breaches", get(list_breaches))
        .route("/v1/governance/breaches/{id}/status", put(update_breach_status))
        .route("/v1/governance/breaches/{id}/notes", put(update_breach_notes))
}

/// GET /v1/governance/rules
async fn list_rules(State(state): State<AppState>) -> Result<Json<Vec<PolicyRule>>, AppError> {
    Ok(Json(state.ledger.list_rules().await?))
}

/// POST /v1/governance/rules: create or replace a rule by code.
async fn upsert_rule(
    State(state): State<AppState>,
    body: Result<Json<NewRule>, JsonRejection>,
) -> Result<Json<PolicyRule>, AppError> {
    let rule = extract_json(body)?;
    Ok(Json(state.ledger.upsert_policy_rule(rule).await?))
}

/// GET /v1/governance/audit: newest first.
async fn list_audit(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditEvent>>, AppError> {
    let query = extract_query(query)?;
    Ok(Json(state.ledger.recent_audit_events(query.limit()).await?))
}

/// GET /v1/governance/audit/verify
async fn verify_audit(
    State(state): State<AppState>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Result<Json<ChainVerification>, AppError> {
    let query = extract_query(query)?;
    Ok(Json(state.ledger.verify_audit_chain(query.limit).await?))
}

/// POST /v1/governance/snapshots: 201 when appended, 200 when the content
/// matched the latest snapshot of its kind.
async fn save_snapshot(
    State(state): State<AppState>,
    body: Result<Json<SnapshotRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedSnapshot>), AppError> {
    let req = extract_validated_json(body)?;
    let saved = state.ledger.save_config_snapshot(req.kind.trim(), &req.content).await?;
    let status = if saved.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(saved)))
}

/// GET /v1/governance/snapshots/verify: one verification per kind.
async fn verify_snapshots(State(state): State<AppState>) -> Result<Json<BTreeMap<String, ChainVerification>>, AppError> {
    Ok(Json(state.ledger.verify_config_snapshots().await?))
}

/// GET /v1/governance/verify: every chain at once.
async fn verify_all(State(state): State<AppState>) -> Result<Json<GovernanceVerification>, AppError> {
    Ok(Json(state.ledger.verify_all().await?))
}

/// GET /v1/governance/breaches
async fn list_breaches(
    State(state): State<AppState>,
    query: Result<Query<BreachQuery>, QueryRejection>,
) -> Result<Json<Vec<BreachLog>>, AppError> {
    let query = extract_query(query)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Ok(Json(state.ledger.list_breaches(limit, query.open_only).await?))
}

/// PUT /v1/governance/breaches/{id}/status
async fn update_breach_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<BreachLog>, AppError> {
    let req = extract_json(body)?;
    let status: BreachStatus = req.status.parse()?;
    Ok(Json(state.ledger.update_breach_status(id, status).await?))
}

/// PUT /v1/governance/breaches/{id}/notes
async fn update_breach_notes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Result<Json<NotesRequest>, JsonRejection>,
) -> Result<Json<BreachLog>, AppError> {
    let req = extract_json(body)?;
    Ok(Json(state.ledger.update_breach_notes(id, &req.notes).await?))
}
