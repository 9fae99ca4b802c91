use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::transitions::InvalidTransition;

/// Error taxonomy for the money-movement core. Each variant carries its
/// HTTP mapping so gateways retry only what is actually transient.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid signature")]
    SignatureInvalid,

    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("{code}: {message}")]
    BusinessRule { code: &'static str, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn business(code: &'static str, message: impl Into<String>) -> Self {
        CoreError::BusinessRule {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CoreError::MalformedInput(_) => "MALFORMED_INPUT",
            CoreError::SignatureInvalid => "SIGNATURE_INVALID",
            CoreError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            CoreError::BusinessRule { code, .. } => code,
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Database(_) => "DATABASE_ERROR",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<InvalidTransition> for CoreError {
    fn from(t: InvalidTransition) -> Self {
        CoreError::BusinessRule {
            code: "INVALID_TRANSITION",
            message: t.to_string(),
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::MalformedInput(_) | CoreError::BusinessRule { .. } => StatusCode::BAD_REQUEST,
            CoreError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            CoreError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Database(_) | CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {:#}", self);
        }

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
