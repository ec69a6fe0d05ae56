use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::utils::response::error as error_response;

/// Top-level application error. Every handler owns exactly one boundary that
/// translates this enum into the wire envelope `{"error": kind, ...context}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("waiting-room token is missing or expired")]
    InvalidToken,

    #[error("no admission grant for this token")]
    NotAdmitted,

    #[error("sales are paused for this event")]
    SalesPaused,

    #[error("per-event purchase limit exceeded")]
    PurchaseLimitExceeded {
        already_purchased: i64,
        active_holds: i64,
        requested: i32,
        limit: i32,
    },

    #[error("requested quantity exceeds the tier limit")]
    PerTierLimitExceeded { requested: i32, limit: i32 },

    #[error("insufficient inventory for the requested quantity")]
    InsufficientInventory { available: i64, requested: i32 },

    #[error("user already holds an active reservation for this event")]
    DoubleHold,

    #[error("reservation is expired or not in a usable state")]
    ReservationExpiredOrInvalid,

    #[error("checkout session is no longer pending")]
    SessionNotPending { status: String },

    #[error("rate limit exceeded")]
    RateLimited { retry_after_seconds: u64 },

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("ephemeral store error")]
    Redis(#[from] redis::RedisError),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) | AppError::InvalidToken => StatusCode::NOT_FOUND,
            AppError::NotAdmitted
            | AppError::SalesPaused
            | AppError::PurchaseLimitExceeded { .. }
            | AppError::PerTierLimitExceeded { .. } => StatusCode::FORBIDDEN,
            AppError::InsufficientInventory { .. }
            | AppError::DoubleHold
            | AppError::ReservationExpiredOrInvalid
            | AppError::SessionNotPending { .. } => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable error kind, the `error` field of the envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidToken => "invalid_token",
            AppError::NotAdmitted => "not_admitted",
            AppError::SalesPaused => "sales_paused",
            AppError::PurchaseLimitExceeded { .. } => "purchase_limit_exceeded",
            AppError::PerTierLimitExceeded { .. } => "per_tier_limit_exceeded",
            AppError::InsufficientInventory { .. } => "insufficient_inventory",
            AppError::DoubleHold => "double_hold",
            AppError::ReservationExpiredOrInvalid => "reservation_expired_or_invalid",
            AppError::SessionNotPending { .. } => "session_not_pending",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => "internal_error",
        }
    }

    /// Contextual fields merged into the envelope alongside `error`.
    fn context(&self) -> Map<String, Value> {
        let value = match self {
            AppError::PurchaseLimitExceeded {
                already_purchased,
                active_holds,
                requested,
                limit,
            } => json!({
                "alreadyPurchased": already_purchased,
                "activeHolds": active_holds,
                "requested": requested,
                "limit": limit,
            }),
            AppError::PerTierLimitExceeded { requested, limit } => json!({
                "requested": requested,
                "limit": limit,
            }),
            AppError::InsufficientInventory {
                available,
                requested,
            } => json!({
                "available": available,
                "requested": requested,
            }),
            AppError::SessionNotPending { status } => json!({ "status": status }),
            AppError::RateLimited {
                retry_after_seconds,
            } => json!({ "retryAfterSeconds": retry_after_seconds }),
            _ => json!({}),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn log(&self) {
        match self {
            AppError::Database(e) => {
                error!(error = ?e, "database error");
            }
            AppError::Redis(e) => {
                error!(error = ?e, "ephemeral store error");
            }
            AppError::Internal(msg) => {
                error!(message = %msg, "internal error");
            }
            other => {
                warn!(kind = other.kind(), message = %other, "request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();
        let context = self.context();

        self.log();

        // Internal details stay in the logs; clients get the stable kind only.
        let message = if status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        error_response(kind, message, context, status)
    }
}
