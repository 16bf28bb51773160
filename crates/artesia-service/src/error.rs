//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use artesia_core::{BalanceError, ConversionId};
use artesia_ledger::ConversionError;
use artesia_store::StoreError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient credits.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// The transformation failed and the credit was refunded.
    #[error("transformation failed: {reason}")]
    TransformationFailed {
        /// The failed conversion.
        conversion_id: ConversionId,
        /// What went wrong.
        reason: String,
        /// Balance after the refund.
        credits_remaining: i64,
    },

    /// A required collaborator is not configured.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientCredits { balance, required } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                self.to_string(),
                Some(serde_json::json!({
                    "balance": balance,
                    "required": required
                })),
            ),
            Self::TransformationFailed {
                conversion_id,
                reason,
                credits_remaining,
            } => (
                StatusCode::BAD_GATEWAY,
                "transformation_failed",
                "Transformation failed; your credit has been refunded".to_string(),
                Some(serde_json::json!({
                    "conversion_id": conversion_id.to_string(),
                    "reason": reason,
                    "credits_refunded": true,
                    "credits_remaining": credits_remaining
                })),
            ),
            Self::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
                None,
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::AlreadyExists { entity, id } => {
                Self::Conflict(format!("{entity} already exists: {id}"))
            }
            StoreError::Balance(BalanceError::InsufficientCredits { balance, required }) => {
                Self::InsufficientCredits { balance, required }
            }
            StoreError::Balance(e) => Self::BadRequest(e.to_string()),
            StoreError::Transition(e) => Self::Conflict(e.to_string()),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

impl From<ConversionError> for ApiError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::StyleNotFound { style_id } => {
                Self::NotFound(format!("Style not found: {style_id}"))
            }
            ConversionError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredits { balance, required }
            }
            ConversionError::AccountNotFound { .. } => Self::NotFound("Account not found".into()),
            ConversionError::InvalidImage(msg) => Self::BadRequest(msg),
            ConversionError::TransformationFailed {
                conversion_id,
                reason,
                credits_remaining,
            } => Self::TransformationFailed {
                conversion_id,
                reason,
                credits_remaining,
            },
            ConversionError::Storage(e) => e.into(),
            ConversionError::Internal(msg) => Self::Internal(msg),
        }
    }
}
