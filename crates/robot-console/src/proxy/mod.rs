//! Same-origin relay for the robot's HLS stream server
//!
//! `StreamProxy` resolves an inbound path tail against the upstream base,
//! fetches it, and classifies the result as a playlist (rewritten so nested
//! references come back through the proxy) or a media segment (relayed as-is).
//! It holds no per-request state apart from the shared HTTP client.

pub mod headers;

use bytes::Bytes;
use reqwest::{Client, header};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, ProxyConfig};
use crate::config::defaults::DEFAULT_MANIFEST_CONTENT_TYPE;
use crate::errors::{AppError, AppResult, ProxyError, ProxyResult};
use crate::streaming::{ManifestRewriter, is_playlist_content_type};

/// Body of a successfully relayed upstream resource
pub enum ProxiedBody {
    /// Playlist text after reference rewriting
    Manifest(String),
    /// Fully buffered media segment
    Buffered(Bytes),
    /// Large media segment relayed chunk by chunk
    Streamed(reqwest::Response),
}

impl std::fmt::Debug for ProxiedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manifest(text) => f.debug_tuple("Manifest").field(&text.len()).finish(),
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Streamed(resp) => f.debug_tuple("Streamed").field(&resp.url().as_str()).finish(),
        }
    }
}

#[derive(Debug)]
pub struct ProxiedResponse {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: ProxiedBody,
}

impl ProxiedResponse {
    pub fn is_manifest(&self) -> bool {
        matches!(self.body, ProxiedBody::Manifest(_))
    }
}

#[derive(Debug, Clone)]
pub struct StreamProxy {
    client: Client,
    upstream_base: String,
    rewriter: ManifestRewriter,
    settings: ProxyConfig,
}

impl StreamProxy {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(config.upstream.user_agent())
            .timeout(config.upstream.request_timeout)
            .connect_timeout(config.upstream.request_timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| AppError::configuration(format!("failed to build upstream client: {e}")))?;

        Ok(Self::with_client(
            client,
            config.upstream.normalized_base_url(),
            ManifestRewriter::from_config(config)?,
            config.proxy.clone(),
        ))
    }

    pub fn with_client(
        client: Client,
        upstream_base: impl Into<String>,
        rewriter: ManifestRewriter,
        settings: ProxyConfig,
    ) -> Self {
        Self {
            client,
            upstream_base: upstream_base.into().trim_end_matches('/').to_string(),
            rewriter,
            settings,
        }
    }

    pub fn settings(&self) -> &ProxyConfig {
        &self.settings
    }

    pub fn upstream_base(&self) -> &str {
        &self.upstream_base
    }

    /// Join the upstream base with the raw inbound tail and query.
    ///
    /// The tail is used exactly as it arrived on the wire; nothing is decoded
    /// or re-encoded.
    pub fn upstream_target(&self, tail: &str, query: Option<&str>) -> ProxyResult<String> {
        let tail = tail.trim_start_matches('/');
        if tail.is_empty() {
            return Err(ProxyError::InvalidTarget {
                target: self.upstream_base.clone(),
                message: "no upstream path given".to_string(),
            });
        }

        let mut target = format!("{}/{}", self.upstream_base, tail);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }

        url::Url::parse(&target).map_err(|e| ProxyError::InvalidTarget {
            target: target.clone(),
            message: e.to_string(),
        })?;

        Ok(target)
    }

    /// Fetch an upstream resource and prepare it for relay
    pub async fn fetch(&self, tail: &str, query: Option<&str>) -> ProxyResult<ProxiedResponse> {
        let url = self.upstream_target(tail, query)?;
        debug!(url = %url, "Fetching upstream stream resource");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamRequest {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Upstream returned error status");
            return Err(ProxyError::UpstreamStatus {
                url,
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or(DEFAULT_MANIFEST_CONTENT_TYPE)
            .to_string();
        let content_length = resp.content_length();

        if is_playlist_content_type(&content_type) {
            let text = resp.text().await.map_err(|e| ProxyError::UpstreamBody {
                url: url.clone(),
                message: e.to_string(),
            })?;
            let (rewritten, references) = self.rewriter.rewrite_counted(&text);
            info!(
                url = %url,
                references,
                bytes = rewritten.len(),
                "Relaying rewritten manifest"
            );
            return Ok(ProxiedResponse {
                content_type,
                content_length: None,
                body: ProxiedBody::Manifest(rewritten),
            });
        }

        if self.should_stream(content_length) {
            debug!(url = %url, content_length = ?content_length, "Streaming media segment");
            return Ok(ProxiedResponse {
                content_type,
                content_length,
                body: ProxiedBody::Streamed(resp),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| ProxyError::UpstreamBody {
            url: url.clone(),
            message: e.to_string(),
        })?;
        debug!(url = %url, bytes = bytes.len(), "Relaying buffered media segment");

        Ok(ProxiedResponse {
            content_type,
            content_length: Some(bytes.len() as u64),
            body: ProxiedBody::Buffered(bytes),
        })
    }

    fn should_stream(&self, content_length: Option<u64>) -> bool {
        match content_length {
            Some(length) => length > self.settings.stream_threshold_bytes,
            None => self.settings.stream_unknown_length,
        }
    }
}
