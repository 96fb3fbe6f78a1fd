//! Stream proxy HTTP handlers
//!
//! Failures never escape these handlers: every error becomes a JSON body
//! carrying the same cross-origin headers as a successful relay.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::config::ProxyConfig;
use crate::config::defaults::PROXY_BASE_PATH;
use crate::errors::{ProxyError, ProxyResult};
use crate::proxy::headers::{
    MANIFEST_CACHE_CONTROL, apply_cors, apply_preflight, segment_cache_control,
};
use crate::proxy::{ProxiedBody, ProxiedResponse};
use crate::web::AppState;
use crate::web::responses::ProxyErrorBody;

/// `GET /api/stream/{*tail}`
pub async fn proxy_stream(State(state): State<AppState>, uri: Uri) -> Response {
    // Take the tail from the raw request path so it is relayed byte-for-byte
    let tail = uri.path().strip_prefix(PROXY_BASE_PATH).unwrap_or_default();
    let settings = state.proxy.settings();

    let result = match state.proxy.fetch(tail, uri.query()).await {
        Ok(proxied) => {
            debug!(tail, manifest = proxied.is_manifest(), "Relaying stream resource");
            relay_response(proxied, settings)
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => response,
        Err(error) => proxy_error_response(&error, settings.propagate_upstream_status),
    }
}

/// `OPTIONS /api/stream/{*tail}`
pub async fn preflight(State(state): State<AppState>) -> Response {
    let mut response = StatusCode::OK.into_response();
    apply_preflight(response.headers_mut(), state.proxy.settings().preflight_max_age);
    response
}

fn relay_response(proxied: ProxiedResponse, settings: &ProxyConfig) -> ProxyResult<Response> {
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, proxied.content_type.as_str());

    let mut response = match proxied.body {
        ProxiedBody::Manifest(text) => builder
            .header(header::CACHE_CONTROL, MANIFEST_CACHE_CONTROL)
            .body(Body::from(text))?,
        ProxiedBody::Buffered(bytes) => builder
            .header(header::CACHE_CONTROL, segment_cache_control(settings.segment_max_age))
            .header(header::CONTENT_LENGTH, bytes.len())
            .body(Body::from(bytes))?,
        ProxiedBody::Streamed(upstream) => {
            let mut builder = builder.header(
                header::CACHE_CONTROL,
                segment_cache_control(settings.segment_max_age),
            );
            if let Some(length) = proxied.content_length {
                builder = builder.header(header::CONTENT_LENGTH, length);
            }
            builder.body(Body::from_stream(upstream.bytes_stream()))?
        }
    };

    apply_cors(response.headers_mut());
    Ok(response)
}

fn proxy_error_response(error: &ProxyError, propagate_status: bool) -> Response {
    let status = error.status_code(propagate_status);
    warn!(
        kind = error.kind(),
        status = status.as_u16(),
        error = %error,
        "Stream proxy request failed"
    );

    let mut response = (status, Json(ProxyErrorBody::from(error))).into_response();
    apply_cors(response.headers_mut());
    response
}
