//! JSON error envelope.
//!
//! Every error leaving the gateway has the shape
//! `{"error": "<message>", "details": "<optional>"}`. Server-side failures are
//! logged in full and reported to the caller as a generic message.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::StoreError;

/// Why the abuse guard refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleReason {
    /// Lifetime message cap reached.
    TotalCap { limit: u64 },
    /// Too many messages within the sliding window.
    WindowCap,
}

impl ThrottleReason {
    pub fn message(&self) -> String {
        match self {
            ThrottleReason::TotalCap { limit } => {
                format!("Message limit exceeded. Maximum {} messages allowed.", limit)
            }
            ThrottleReason::WindowCap => {
                "Rate limit exceeded. Please wait before sending another message.".to_string()
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThrottleReason::TotalCap { .. } => "total_cap",
            ThrottleReason::WindowCap => "window_cap",
        }
    }
}

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    Validation(String),

    #[error("Invalid request body: {details}")]
    InvalidBody { details: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Unsupported media type")]
    UnsupportedMediaType,

    #[error("Throttled: {}", .0.message())]
    Throttled(ThrottleReason),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match self {
            ApiError::Storage(err) => {
                tracing::error!(error = %err, "Storage failure");
                ("Internal server error".to_string(), None)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                ("Internal server error".to_string(), None)
            }
            ApiError::InvalidBody { details } => {
                ("Invalid request body".to_string(), Some(details))
            }
            ApiError::Validation(msg) | ApiError::Unauthorized(msg) | ApiError::NotFound(msg) => {
                (msg, None)
            }
            ApiError::MethodNotAllowed => ("Method not allowed".to_string(), None),
            ApiError::PayloadTooLarge => ("Request body too large".to_string(), None),
            ApiError::UnsupportedMediaType => {
                ("Content-Type must be application/json".to_string(), None)
            }
            ApiError::Throttled(reason) => (reason.message(), None),
        };

        (status, Json(ErrorBody { error: message, details })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::InvalidBody {
            details: rejection.body_text(),
        }
    }
}

/// Opaque 500 for faults that never became an [`ApiError`].
pub fn internal_error_response() -> Response {
    let body = ErrorBody {
        error: "Internal server error".to_string(),
        details: None,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
