//! HTTP middleware

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, Method, Uri},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{debug, info, warn};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Request logging middleware
///
/// Logs every request with timing and tags the response with its request id.
/// Segment fetches are frequent, so successful stream requests log at debug.
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let is_stream = uri.path().starts_with(crate::config::defaults::PROXY_BASE_PATH);

    debug!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "HTTP request started"
    );

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let duration = start.elapsed();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    if status >= 400 {
        warn!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed with error"
        );
    } else if is_stream {
        debug!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "Stream request completed"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;
    use tracing_test::traced_test;

    fn app() -> Router {
        Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/fail", get(|| async { StatusCode::BAD_GATEWAY }))
            .layer(axum::middleware::from_fn(request_logging_middleware))
    }

    #[tokio::test]
    #[traced_test]
    async fn test_request_id_and_logging() {
        let response = app()
            .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(request_id).is_ok());
        assert!(logs_contain("HTTP request completed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_error_responses_log_at_warn() {
        let response = app()
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(logs_contain("HTTP request completed with error"));
    }
}
