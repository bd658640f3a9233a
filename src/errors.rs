use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Typed error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "kind": "insufficient_stock",
    "message": "Insufficient stock: this item just sold out",
    "timestamp": "2025-06-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Machine-readable error kind (snake_case)
    #[schema(example = "insufficient_stock")]
    pub kind: String,
    /// Human-readable error description
    #[schema(example = "Insufficient stock: this item just sold out")]
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    #[schema(example = "2025-06-09T10:30:00.000Z")]
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Discount code not found: {0}")]
    CodeNotFound(String),

    #[error("This code is not active yet")]
    CodeNotYetActive(String),

    #[error("This code has expired")]
    CodeExpired(String),

    #[error("Order total does not meet the minimum for this code: {0}")]
    MinimumNotMet(String),

    #[error("This code has reached its usage limit")]
    UsageLimitExceeded(String),

    #[error("You have already used this code the maximum number of times")]
    PerUserLimitExceeded(String),

    #[error("This discount type is not supported at checkout: {0}")]
    UnsupportedDiscountType(String),

    #[error("Payment could not be completed: {0}")]
    PaymentFailed(String),

    #[error("Payment provider did not respond in time")]
    PaymentGatewayTimeout(String),

    #[error("Payment was captured but the order could not be recorded; reference {0}")]
    PaymentCapturedUnreconciled(String),

    #[error("Idempotency conflict: {0}")]
    IdempotencyConflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Stable machine-readable kind used in error bodies and the attempt journal.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::CodeNotFound(_) => "code_not_found",
            Self::CodeNotYetActive(_) => "code_not_yet_active",
            Self::CodeExpired(_) => "code_expired",
            Self::MinimumNotMet(_) => "minimum_not_met",
            Self::UsageLimitExceeded(_) => "usage_limit_exceeded",
            Self::PerUserLimitExceeded(_) => "per_user_limit_exceeded",
            Self::UnsupportedDiscountType(_) => "unsupported_discount_type",
            Self::PaymentFailed(_) => "payment_failed",
            Self::PaymentGatewayTimeout(_) => "payment_gateway_timeout",
            Self::PaymentCapturedUnreconciled(_) => "payment_captured_unreconciled",
            Self::IdempotencyConflict(_) => "idempotency_conflict",
            Self::EventError(_) => "event_error",
            Self::InternalError(_) => "internal_error",
            Self::ExternalServiceError(_) => "external_service_error",
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock(_)
            | Self::CodeNotFound(_)
            | Self::CodeNotYetActive(_)
            | Self::CodeExpired(_)
            | Self::MinimumNotMet(_)
            | Self::UsageLimitExceeded(_)
            | Self::PerUserLimitExceeded(_)
            | Self::UnsupportedDiscountType(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
            Self::PaymentGatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            // Money has moved; the client request was fine, the backend is not.
            Self::PaymentCapturedUnreconciled(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IdempotencyConflict(_) => StatusCode::CONFLICT,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) => "Internal server error".to_string(),
            Self::PaymentCapturedUnreconciled(_) => {
                "Your payment was received but the order could not be confirmed. \
                 Support has been notified; do not retry this payment."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let err = ErrorResponse {
            kind: self.kind().to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_errors_are_unprocessable() {
        for err in [
            ServiceError::CodeNotFound("NOPE".into()),
            ServiceError::CodeExpired("SAVE10".into()),
            ServiceError::MinimumNotMet("SAVE10".into()),
            ServiceError::UsageLimitExceeded("SAVE10".into()),
        ] {
            assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn payment_errors_map_distinctly() {
        assert_eq!(
            ServiceError::PaymentFailed("card declined".into()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ServiceError::PaymentGatewayTimeout("10s".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ServiceError::IdempotencyConflict("key reused".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn internal_details_do_not_leak() {
        let err = ServiceError::db_error("relation orders does not exist");
        assert_eq!(err.response_message(), "Database error");
        assert_eq!(err.kind(), "database_error");
    }

    #[test]
    fn unreconciled_message_warns_against_retry() {
        let err = ServiceError::PaymentCapturedUnreconciled("ch_123".into());
        assert!(err.response_message().contains("do not retry"));
    }
}
