//! Error taxonomy for the HTTP boundary and its JSON rendering.
//!
//! Every failure becomes `{error, code, details?}` with a stable `code`. Internal
//! errors are logged in full and reported to the client generically.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::rate_limit::WINDOW_SECS;

pub const HEADER_RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const HEADER_RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{0}")]
    InvalidJson(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("rate limit exceeded")]
    RateLimited { reset_at: i64 },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Validation failure naming the offending field.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(serde_json::json!({ "field": field })),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON with missing or mistyped fields.
            JsonRejection::JsonDataError(e) => Self::validation(e.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                Self::InvalidJson("expected Content-Type: application/json".into())
            }
            other => Self::InvalidJson(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let reset_at = match &self {
            Self::RateLimited { reset_at } => Some(*reset_at),
            _ => None,
        };

        let (error, details) = match self {
            Self::Validation { message, details } => (message, details),
            Self::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                ("internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        let mut response = (status, Json(ErrorBody { error, code, details })).into_response();

        if let Some(reset_at) = reset_at {
            let headers = response.headers_mut();
            headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(WINDOW_SECS));
            headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from(0u64));
            headers.insert(HEADER_RATE_LIMIT_RESET, HeaderValue::from(reset_at));
        }
        response
    }
}
