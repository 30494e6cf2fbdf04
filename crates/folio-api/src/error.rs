//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Service and domain errors map to HTTP status codes; every error response
//! carries the JSON body `{"error": {"code", "message"}}`. Internal details
//! are logged, never returned.
//!
//! The console has no caller identity. It is meant to listen on a loopback
//! address (`APP_BIND`, default `127.0.0.1:8080`) and trusts whoever can
//! reach it. `403` is reserved for requests refused by policy, never for
//! authentication.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use folio_core::FolioError;
use folio_service::ServiceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND").
    pub code: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    /// 404
    #[error("not found: {0}")]
    NotFound(String),

    /// 422
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Refused by policy (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Market data unavailable (503).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// 500. The message is logged but not returned to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "MARKET_DATA_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<FolioError> for AppError {
    fn from(err: FolioError) -> Self {
        match err {
            FolioError::Validation(msg) => Self::Validation(msg),
            FolioError::NotFound(msg) => Self::NotFound(msg),
            FolioError::PermissionDenied(msg) => Self::Forbidden(msg),
            e @ (FolioError::MarketDataDownload(_) | FolioError::NoMarketData(_)) => Self::Unavailable(e.to_string()),
            FolioError::Canonicalization(e) => Self::Validation(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => e.into(),
            ServiceError::Csv(e) => Self::Validation(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (FolioError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (FolioError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (FolioError::PermissionDenied("x".into()), StatusCode::FORBIDDEN),
            (FolioError::NoMarketData("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (FolioError::MarketDataDownload("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (FolioError::Repository("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_and_code().0, status);
        }
    }

    #[test]
    fn service_errors_unwrap_domain() {
        let err = AppError::from(ServiceError::from(FolioError::NotFound("breach 9".into())));
        assert!(matches!(err, AppError::NotFound(ref m) if m == "breach 9"));
        let err = AppError::from(ServiceError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.status_and_code(), (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"));
    }

    #[test]
    fn policy_refusal_is_forbidden_with_its_message() {
        let blocked = ServiceError::from(FolioError::PermissionDenied("Trade blocked by policy: MAX_TRADE".into()));
        let err = AppError::from(blocked);
        assert!(matches!(err, AppError::Forbidden(ref m) if m == "Trade blocked by policy: MAX_TRADE"));
        assert_eq!(err.status_and_code(), (StatusCode::FORBIDDEN, "FORBIDDEN"));
    }

    #[test]
    fn internal_message_is_hidden() {
        let response = AppError::Internal("secret path".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
