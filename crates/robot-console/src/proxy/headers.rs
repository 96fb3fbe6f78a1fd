//! Response headers attached to every relayed stream response

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use std::time::Duration;

pub const CROSS_ORIGIN_RESOURCE_POLICY: HeaderName =
    HeaderName::from_static("cross-origin-resource-policy");

pub const MANIFEST_CACHE_CONTROL: &str = "no-cache";

/// Permissive cross-origin headers so any page can embed the player
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(CROSS_ORIGIN_RESOURCE_POLICY, HeaderValue::from_static("cross-origin"));
}

/// Preflight answer headers: CORS plus the preflight cache lifetime
pub fn apply_preflight(headers: &mut HeaderMap, max_age: Duration) {
    apply_cors(headers);
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from(max_age.as_secs()),
    );
}

/// `Cache-Control` value for immutable media segments
pub fn segment_cache_control(max_age: Duration) -> String {
    format!("public, max-age={}", max_age.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_headers() {
        let mut headers = HeaderMap::new();
        apply_cors(&mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
        assert_eq!(headers["cross-origin-resource-policy"], "cross-origin");
        assert!(headers.get(header::ACCESS_CONTROL_MAX_AGE).is_none());
    }

    #[test]
    fn test_preflight_headers() {
        let mut headers = HeaderMap::new();
        apply_preflight(&mut headers, Duration::from_secs(86400));
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_segment_cache_control() {
        assert_eq!(
            segment_cache_control(Duration::from_secs(3600)),
            "public, max-age=3600"
        );
    }
}
