//! Error type definitions for the robot console
//!
//! Proxy and playback errors never cross their component boundary as panics:
//! the proxy turns them into structured HTTP responses and the playback
//! controller turns them into the `error` connection state.

use axum::http::StatusCode;
use thiserror::Error;

use crate::playback::ConnectionState;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// External service errors
    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Stream proxy errors
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// Playback controller errors
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while relaying a request to the upstream stream server
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The upstream target could not be built from the inbound path
    #[error("Invalid upstream target '{target}': {message}")]
    InvalidTarget { target: String, message: String },

    /// Connection, DNS or timeout failure talking to the upstream
    #[error("Failed to fetch stream from {url}: {message}")]
    UpstreamRequest { url: String, message: String },

    /// The upstream answered with a non-success status
    #[error("Failed to fetch stream: {status} {reason} ({url})")]
    UpstreamStatus {
        url: String,
        status: u16,
        reason: String,
    },

    /// The upstream body could not be read to completion
    #[error("Failed to read upstream body from {url}: {message}")]
    UpstreamBody { url: String, message: String },

    /// Building the relayed response failed
    #[error("Failed to build proxy response: {0}")]
    Response(#[from] axum::http::Error),
}

/// Errors raised by the playback controller and its collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Connect was requested with a blank stream reference
    #[error("Stream URL must not be empty")]
    EmptyUrl,

    /// The requested action is not valid in the current state
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: ConnectionState,
    },

    /// Neither native playback nor the fallback client is available
    #[error("Adaptive streaming is not supported by this runtime: {reason}")]
    Unsupported { reason: String },

    /// A recovery attempt on the fallback client failed
    #[error("Media recovery failed: {message}")]
    Recovery { message: String },

    /// The fallback client was already released
    #[error("Adaptive client has been destroyed")]
    ClientDestroyed,
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an external service error
    pub fn external_service<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl ProxyError {
    /// Stable machine-readable error class, reported in proxy error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTarget { .. } => "invalid_target",
            Self::UpstreamRequest { .. } => "upstream_request",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::UpstreamBody { .. } => "upstream_body",
            Self::Response(_) => "response",
        }
    }

    /// Upstream HTTP status, when the failure came from one
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Status code reported to the caller.
    ///
    /// Always 500 unless `propagate` is set, in which case an upstream
    /// error status is passed through unchanged.
    pub fn status_code(&self, propagate: bool) -> StatusCode {
        match self.upstream_status() {
            Some(status) if propagate => {
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
