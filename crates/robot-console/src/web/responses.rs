//! HTTP response types and utilities
//!
//! JSON API endpoints answer with [`ApiResponse`]; the stream proxy has its
//! own flat error body, [`ProxyErrorBody`], since players and operators read it
//! directly.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{AppError, AppResult, ProxyError};

pub const PROXY_ERROR_MESSAGE: &str = "Failed to proxy stream";

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn error_with_details(message: String, details: HashMap<String, String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            details: Some(details),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(self)).into_response()
    }
}

/// Error body of the stream proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyErrorBody {
    pub error: String,
    pub details: String,
    /// Stable error class, e.g. `upstream_status`
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl From<&ProxyError> for ProxyErrorBody {
    fn from(error: &ProxyError) -> Self {
        Self {
            error: PROXY_ERROR_MESSAGE.to_string(),
            details: error.to_string(),
            kind: error.kind().to_string(),
            upstream_status: error.upstream_status(),
        }
    }
}

/// Helper function to convert AppResult to HTTP response
pub fn handle_result<T>(result: AppResult<T>) -> Response
where
    T: Serialize,
{
    match result {
        Ok(data) => ok(data).into_response(),
        Err(error) => handle_error(error).into_response(),
    }
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> impl IntoResponse {
    let (status, message, details) = match &error {
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone(), None),
        AppError::Configuration { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Configuration error: {}", message),
            None,
        ),
        AppError::ExternalService { service, message } => (
            StatusCode::BAD_GATEWAY,
            format!("External service error ({}): {}", service, message),
            None,
        ),
        AppError::Http(_) => (
            StatusCode::BAD_GATEWAY,
            "External service communication failed".to_string(),
            None,
        ),
        AppError::Proxy(proxy_error) => {
            let mut details = HashMap::new();
            details.insert("kind".to_string(), proxy_error.kind().to_string());
            if let Some(status) = proxy_error.upstream_status() {
                details.insert("upstream_status".to_string(), status.to_string());
            }
            (
                StatusCode::BAD_GATEWAY,
                proxy_error.to_string(),
                Some(details),
            )
        }
        AppError::Playback(playback_error) => (
            StatusCode::CONFLICT,
            playback_error.to_string(),
            None,
        ),
        AppError::Io(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Storage operation failed".to_string(),
            None,
        ),
        AppError::Serialization(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Serialization failed".to_string(),
            None,
        ),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {}", message),
            None,
        ),
    };

    if status.is_server_error() {
        tracing::error!(error = %error, "Request failed");
    }

    let response = if let Some(details) = details {
        ApiResponse::<()>::error_with_details(message, details)
    } else {
        ApiResponse::<()>::error(message)
    };

    (status, Json(response))
}

/// Success response helpers
pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

pub fn bad_request(message: &str) -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(message.to_string())),
    )
}
