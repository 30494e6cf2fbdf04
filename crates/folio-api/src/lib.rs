//! # folio-api: Governance Console over HTTP
//!
//! A JSON API over the governance store and the persisted portfolio.
//!
//! ## API Surface
//!
//! | Prefix | Module | Domain |
//! |---|---|---|
//! | `/health/*` | this module | liveness and readiness probes |
//! | `/v1/governance/*` | [`routes::governance`] | rules, audit chain, config snapshots, breaches |
//! | `/v1/risk/*` | [`routes::risk`] | risk events and evaluation |
//! | `/v1/portfolio` | [`routes::portfolio`] | holdings view |
//!
//! Errors use the body `{"error": {"code", "message"}}`; see [`error`].
//!
//! Requests carry no caller identity. Bind to a loopback address.

pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::governance::router())
        .merge(routes::risk::router())
        .merge(routes::portfolio::router())
        .layer(TraceLayer::new_for_http());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api).with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    if !local.ip().is_loopback() {
        tracing::warn!(addr = %local, "governance console has no authentication and is reachable off-host");
    }
    tracing::info!(addr = %local, "governance console listening");
    axum::serve(listener, app(state)).await
}

async fn liveness() -> &'static str {
    "ok"
}

/// Ready once the database answers.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
