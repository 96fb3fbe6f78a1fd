//! Stream reference classification and proxy rewriting
//!
//! A stream reference entered by the operator is one of:
//!
//! - an **upstream** URL on the robot's stream server (`<upstream-base>/<path>`),
//! - an already **proxied** same-origin path (`<proxy-base>/<path>`),
//! - any other external URL, which is played as-is.
//!
//! Upstream and proxied forms are derived from each other by swapping the
//! base, so `to_upstream(to_proxied(u)) == u` for every upstream reference.

use crate::config::Config;
use crate::config::defaults::PROXY_BASE_PATH;

/// Rewrites stream references between their upstream and proxied forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUrlRewriter {
    /// Upstream base without trailing slash, e.g. `http://10.0.0.7:8000`
    upstream_base: String,
    /// Proxy base path without trailing slash, e.g. `/api/stream`
    proxy_base: String,
}

impl StreamUrlRewriter {
    pub fn new(upstream_base: impl Into<String>, proxy_base: impl Into<String>) -> Self {
        let upstream_base = upstream_base.into().trim_end_matches('/').to_string();
        let proxy_base = proxy_base.into().trim_end_matches('/').to_string();
        Self {
            upstream_base,
            proxy_base,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.upstream.normalized_base_url(), PROXY_BASE_PATH)
    }

    pub fn upstream_base(&self) -> &str {
        &self.upstream_base
    }

    pub fn proxy_base(&self) -> &str {
        &self.proxy_base
    }

    fn upstream_prefix(&self) -> String {
        format!("{}/", self.upstream_base)
    }

    fn proxy_prefix(&self) -> String {
        format!("{}/", self.proxy_base)
    }

    /// True when `url` points at the upstream stream server
    pub fn is_upstream_reference(&self, url: &str) -> bool {
        url.starts_with(&self.upstream_prefix())
    }

    /// True when `url` is already routed through the proxy
    pub fn is_proxied(&self, url: &str) -> bool {
        url.starts_with(&self.proxy_prefix())
    }

    /// Upstream reference → same-origin proxied path; anything else unchanged
    pub fn to_proxied(&self, url: &str) -> String {
        match url.strip_prefix(&self.upstream_prefix()) {
            Some(rest) => format!("{}{}", self.proxy_prefix(), rest),
            None => url.to_string(),
        }
    }

    /// Proxied path → upstream URL; anything else unchanged
    pub fn to_upstream(&self, url: &str) -> String {
        match url.strip_prefix(&self.proxy_prefix()) {
            Some(rest) => format!("{}{}", self.upstream_prefix(), rest),
            None => url.to_string(),
        }
    }

    /// Operator-facing form: proxied paths are shown as their upstream origin
    pub fn display_form(&self, url: &str) -> String {
        if self.is_proxied(url) {
            format!("{} (proxied)", self.to_upstream(url))
        } else {
            url.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn rewriter() -> StreamUrlRewriter {
        StreamUrlRewriter::new("http://10.0.0.7:8000", "/api/stream")
    }

    #[test]
    fn test_upstream_reference_detection() {
        let r = rewriter();
        assert!(r.is_upstream_reference("http://10.0.0.7:8000/live/index.m3u8"));
        assert!(!r.is_upstream_reference("http://10.0.0.7:8000"));
        assert!(!r.is_upstream_reference("http://10.0.0.7:80001/live/index.m3u8"));
        assert!(!r.is_upstream_reference("/api/stream/live/index.m3u8"));
        assert!(!r.is_upstream_reference("https://cdn.example.com/x.m3u8"));
    }

    #[test]
    fn test_to_proxied_rewrites_upstream() {
        let r = rewriter();
        assert_eq!(
            r.to_proxied("http://10.0.0.7:8000/live/index.m3u8"),
            "/api/stream/live/index.m3u8"
        );
        assert_eq!(
            r.to_proxied("http://10.0.0.7:8000/cam%201/index.m3u8?token=a b"),
            "/api/stream/cam%201/index.m3u8?token=a b"
        );
    }

    /// Only a literal leading `<base>/` counts; anything else passes through
    #[rstest]
    #[case("10.0.0.7:8000/live/index.m3u8")]
    #[case("//10.0.0.7:8000/live/index.m3u8")]
    #[case("HTTP://10.0.0.7:8000/live/index.m3u8")]
    #[case("https://cdn.example.com/play?src=http://10.0.0.7:8000/live/index.m3u8")]
    fn test_upstream_match_is_a_literal_prefix(#[case] url: &str) {
        let r = rewriter();
        assert!(!r.is_upstream_reference(url));
        assert_eq!(r.to_proxied(url), url);
    }

    #[rstest]
    #[case("https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8")]
    #[case("/api/stream/live/index.m3u8")]
    #[case("ws://10.0.0.7:9000/feed")]
    #[case("")]
    fn test_to_proxied_is_identity_for_other_urls(#[case] url: &str) {
        assert_eq!(rewriter().to_proxied(url), url);
    }

    #[test]
    fn test_to_upstream_strips_proxy_prefix() {
        let r = rewriter();
        assert_eq!(
            r.to_upstream("/api/stream/live/index.m3u8"),
            "http://10.0.0.7:8000/live/index.m3u8"
        );
        assert_eq!(r.to_upstream("/api/streaming/x.m3u8"), "/api/streaming/x.m3u8");
        assert_eq!(
            r.to_upstream("https://cdn.example.com/x.m3u8"),
            "https://cdn.example.com/x.m3u8"
        );
    }

    #[test]
    fn test_display_form_annotates_proxied() {
        let r = rewriter();
        assert_eq!(
            r.display_form("/api/stream/live/index.m3u8"),
            "http://10.0.0.7:8000/live/index.m3u8 (proxied)"
        );
        assert_eq!(
            r.display_form("https://cdn.example.com/x.m3u8"),
            "https://cdn.example.com/x.m3u8"
        );
    }

    #[test]
    fn test_trailing_slashes_are_normalized() {
        let r = StreamUrlRewriter::new("http://10.0.0.7:8000/", "/api/stream/");
        assert_eq!(r.upstream_base(), "http://10.0.0.7:8000");
        assert_eq!(r.proxy_base(), "/api/stream");
        assert_eq!(
            r.to_proxied("http://10.0.0.7:8000/a.m3u8"),
            "/api/stream/a.m3u8"
        );
    }

    proptest! {
        #[test]
        fn prop_upstream_round_trip(path in "[A-Za-z0-9_%./?=&-]{0,48}") {
            let r = rewriter();
            let url = format!("http://10.0.0.7:8000/{path}");
            prop_assert!(r.is_upstream_reference(&url));
            prop_assert_eq!(r.to_upstream(&r.to_proxied(&url)), url);
        }

        #[test]
        fn prop_foreign_urls_untouched(host in "[a-z]{1,12}\\.example\\.com", path in "[a-z0-9/]{0,24}") {
            let r = rewriter();
            let url = format!("https://{host}/{path}");
            prop_assert_eq!(r.to_proxied(&url), url.clone());
            prop_assert_eq!(r.to_upstream(&url), url);
        }

        #[test]
        fn prop_proxied_urls_are_stable(path in "[A-Za-z0-9_./-]{0,32}") {
            let r = rewriter();
            let proxied = format!("/api/stream/{path}");
            prop_assert_eq!(r.to_proxied(&proxied), proxied.clone());
            prop_assert_eq!(r.to_proxied(&r.to_upstream(&proxied)), proxied);
        }
    }
}
