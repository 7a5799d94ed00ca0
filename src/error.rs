use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("PIN must be exactly 4 digits")]
    InvalidPin,

    #[error("Phone number already registered")]
    DuplicateIdentity,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Gateway authentication failed")]
    GatewayAuthFailed,

    #[error("Gateway request timed out")]
    GatewayTimeout,

    #[error("Gateway rejected request (code {code}): {message}")]
    GatewayRejected { code: String, message: String },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed callback payload: {0}")]
    MalformedCallback(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidFormat(_)
            | AppError::Validation(_)
            | AppError::InvalidPin
            | AppError::DuplicateIdentity
            | AppError::InsufficientBalance
            | AppError::MalformedCallback(_) => StatusCode::BAD_REQUEST,
            AppError::GatewayUnavailable(_)
            | AppError::GatewayAuthFailed
            | AppError::GatewayTimeout
            | AppError::GatewayRejected { .. } => StatusCode::BAD_REQUEST,
            AppError::TransactionNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the end user. Gateway and database internals
    /// stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::GatewayUnavailable(_) | AppError::GatewayTimeout => {
                "Unable to reach M-Pesa. Please try again.".to_string()
            }
            AppError::GatewayAuthFailed => {
                "Payment service is temporarily unavailable. Please try again.".to_string()
            }
            AppError::GatewayRejected { message, .. } => message.clone(),
            AppError::Validation(message) => message.clone(),
            AppError::Database(_) | AppError::Internal(_) => {
                "An error occurred. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = Json(json!({
            "success": false,
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}
