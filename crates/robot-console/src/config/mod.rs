use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::AppError;
use crate::playback::LowLatencyConfig;
use defaults::*;

/// Environment variable overriding the upstream stream server address
pub const UPSTREAM_URL_ENV: &str = "ROBOT_CONSOLE_UPSTREAM_URL";
/// Environment variable carrying the chat backend API key
pub const CHAT_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the chat model
pub const CHAT_MODEL_ENV: &str = "OPENAI_MODEL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin the console is reachable at; proxied paths are resolved against it
    #[serde(default = "default_public_origin")]
    pub public_origin: String,
}

/// The robot's native stream server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,
    /// Identifying client header sent upstream (defaults to `<crate>/<version>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default = "default_upstream_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Cache lifetime advertised for media segments
    #[serde(default = "default_segment_max_age", with = "duration_serde::duration")]
    pub segment_max_age: Duration,
    /// Lifetime advertised for CORS preflight results
    #[serde(default = "default_preflight_max_age", with = "duration_serde::duration")]
    pub preflight_max_age: Duration,
    /// Pass upstream error statuses through instead of answering 500
    #[serde(default)]
    pub propagate_upstream_status: bool,
    /// Segments larger than this are relayed as a byte stream
    #[serde(default = "default_stream_threshold_bytes")]
    pub stream_threshold_bytes: u64,
    /// Stream segments whose upstream length is unknown
    #[serde(default)]
    pub stream_unknown_length: bool,
    /// Reference extensions rewritten inside manifests
    #[serde(default = "default_rewrite_extensions")]
    pub rewrite_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(
        default = "default_latency_sample_interval",
        with = "duration_serde::duration"
    )]
    pub latency_sample_interval: Duration,
    /// Measured latency above this re-anchors playback near the live edge
    #[serde(default = "default_drift_threshold", with = "duration_serde::duration")]
    pub drift_threshold: Duration,
    /// Distance behind the seekable end the playhead is moved to
    #[serde(default = "default_live_edge_margin", with = "duration_serde::duration")]
    pub live_edge_margin: Duration,
    #[serde(default = "default_retry_delay", with = "duration_serde::duration")]
    pub retry_delay: Duration,
    #[serde(default)]
    pub low_latency: LowLatencyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// API key for the chat completion backend; scripted replies are used without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_chat_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_chat_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_chat_temperature")]
    pub temperature: f32,
    #[serde(default = "default_upstream_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Stream URL offered on first run
    #[serde(default = "default_stream_url")]
    pub default_stream_url: String,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_public_origin() -> String {
    DEFAULT_PUBLIC_ORIGIN.to_string()
}

// Upstream defaults
fn default_upstream_base_url() -> String {
    DEFAULT_UPSTREAM_BASE_URL.to_string()
}

fn default_upstream_timeout() -> Duration {
    Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS)
}

// Proxy defaults
fn default_segment_max_age() -> Duration {
    Duration::from_secs(DEFAULT_SEGMENT_MAX_AGE_SECS)
}

fn default_preflight_max_age() -> Duration {
    Duration::from_secs(DEFAULT_PREFLIGHT_MAX_AGE_SECS)
}

fn default_stream_threshold_bytes() -> u64 {
    DEFAULT_STREAM_THRESHOLD_BYTES
}

fn default_rewrite_extensions() -> Vec<String> {
    DEFAULT_REWRITE_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

// Playback defaults
fn default_latency_sample_interval() -> Duration {
    Duration::from_millis(DEFAULT_LATENCY_SAMPLE_INTERVAL_MS)
}

fn default_drift_threshold() -> Duration {
    Duration::from_millis(DEFAULT_DRIFT_THRESHOLD_MS)
}

fn default_live_edge_margin() -> Duration {
    Duration::from_millis(DEFAULT_LIVE_EDGE_MARGIN_MS)
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(DEFAULT_RETRY_DELAY_MS)
}

// Chat defaults
fn default_chat_api_base_url() -> String {
    DEFAULT_CHAT_API_BASE_URL.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_chat_max_tokens() -> u32 {
    DEFAULT_CHAT_MAX_TOKENS
}

fn default_chat_temperature() -> f32 {
    DEFAULT_CHAT_TEMPERATURE
}

// Storage defaults
fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_stream_url() -> String {
    DEFAULT_STREAM_URL.to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_origin: default_public_origin(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            user_agent: None,
            request_timeout: default_upstream_timeout(),
        }
    }
}

impl UpstreamConfig {
    /// Base URL without trailing slashes
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim().trim_end_matches('/').to_string()
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            segment_max_age: default_segment_max_age(),
            preflight_max_age: default_preflight_max_age(),
            propagate_upstream_status: false,
            stream_threshold_bytes: default_stream_threshold_bytes(),
            stream_unknown_length: false,
            rewrite_extensions: default_rewrite_extensions(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            latency_sample_interval: default_latency_sample_interval(),
            drift_threshold: default_drift_threshold(),
            live_edge_margin: default_live_edge_margin(),
            retry_delay: default_retry_delay(),
            low_latency: LowLatencyConfig::default(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: default_chat_api_base_url(),
            model: default_chat_model(),
            max_tokens: default_chat_max_tokens(),
            temperature: default_chat_temperature(),
            request_timeout: default_upstream_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            default_stream_url: default_stream_url(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment-level settings win over the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(upstream) = std::env::var(UPSTREAM_URL_ENV) {
            if !upstream.trim().is_empty() {
                self.upstream.base_url = upstream;
            }
        }
        if let Ok(api_key) = std::env::var(CHAT_API_KEY_ENV) {
            if !api_key.trim().is_empty() {
                self.chat.api_key = Some(api_key);
            }
        }
        if let Ok(model) = std::env::var(CHAT_MODEL_ENV) {
            if !model.trim().is_empty() {
                self.chat.model = model;
            }
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let upstream = url::Url::parse(&self.upstream.normalized_base_url()).map_err(|e| {
            AppError::configuration(format!(
                "upstream.base_url '{}' is not a valid URL: {e}",
                self.upstream.base_url
            ))
        })?;
        if !matches!(upstream.scheme(), "http" | "https") {
            return Err(AppError::configuration(format!(
                "upstream.base_url must use http or https, got '{}'",
                upstream.scheme()
            )));
        }
        if upstream.query().is_some() || upstream.fragment().is_some() {
            return Err(AppError::configuration(
                "upstream.base_url must not carry a query or fragment",
            ));
        }

        url::Url::parse(&self.web.public_origin).map_err(|e| {
            AppError::configuration(format!(
                "web.public_origin '{}' is not a valid URL: {e}",
                self.web.public_origin
            ))
        })?;

        if self.proxy.rewrite_extensions.is_empty() {
            return Err(AppError::configuration(
                "proxy.rewrite_extensions must list at least one extension",
            ));
        }
        if self.playback.latency_sample_interval.is_zero() {
            return Err(AppError::configuration(
                "playback.latency_sample_interval must be greater than zero",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.proxy.segment_max_age, Duration::from_secs(3600));
        assert_eq!(config.playback.retry_delay, Duration::from_millis(100));
        assert_eq!(config.playback.drift_threshold, Duration::from_secs(3));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[upstream]
base_url = "http://10.0.0.7:8000/"

[playback]
retry_delay = "250ms"
"#,
        )
        .unwrap();

        assert_eq!(config.upstream.normalized_base_url(), "http://10.0.0.7:8000");
        assert_eq!(config.playback.retry_delay, Duration::from_millis(250));
        assert_eq!(config.web.port, DEFAULT_PORT);
        assert_eq!(config.playback.low_latency.max_load_retries, 1);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.upstream.base_url, DEFAULT_UPSTREAM_BASE_URL);
        assert_eq!(
            parsed.playback.low_latency.fragment_load_timeout,
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_rejects_non_http_upstream() {
        let mut config = Config::default();
        config.upstream.base_url = "rtsp://10.0.0.7:554".to_string();
        assert!(matches!(
            config.validate(),
            Err(AppError::Configuration { .. })
        ));

        config.upstream.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_user_agent_defaults_to_crate_identity() {
        let upstream = UpstreamConfig::default();
        assert!(upstream.user_agent().starts_with("robot-console/"));
    }

    #[test]
    fn test_load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_str().unwrap();

        let config = Config::load_from_file(path_str).unwrap();
        assert!(path.exists());
        assert_eq!(config.web.port, DEFAULT_PORT);
    }
}
