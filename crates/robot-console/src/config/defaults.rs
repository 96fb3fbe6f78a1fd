/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PUBLIC_ORIGIN: &str = "http://127.0.0.1:8080";

// Upstream stream server defaults
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;

// Stream proxy defaults
/// Same-origin path prefix under which upstream resources are re-exposed
pub const PROXY_BASE_PATH: &str = "/api/stream";
pub const DEFAULT_MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const DEFAULT_SEGMENT_MAX_AGE_SECS: u64 = 3600;
pub const DEFAULT_PREFLIGHT_MAX_AGE_SECS: u64 = 86400;
pub const DEFAULT_STREAM_THRESHOLD_BYTES: u64 = 8 * 1024 * 1024; // 8MB
pub const DEFAULT_REWRITE_EXTENSIONS: &[&str] = &["ts", "m4s", "mp4", "m3u8"];

// Playback defaults
pub const DEFAULT_LATENCY_SAMPLE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_DRIFT_THRESHOLD_MS: u64 = 3000;
pub const DEFAULT_LIVE_EDGE_MARGIN_MS: u64 = 1000;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

// Low-latency adaptive client defaults
pub const DEFAULT_MAX_BUFFER_LENGTH_MS: u64 = 4000;
pub const DEFAULT_MAX_MAX_BUFFER_LENGTH_MS: u64 = 8000;
pub const DEFAULT_MAX_BUFFER_HOLE_MS: u64 = 500;
pub const DEFAULT_LIVE_SYNC_DURATION_COUNT: u32 = 1;
pub const DEFAULT_LIVE_MAX_LATENCY_DURATION_COUNT: u32 = 3;
pub const DEFAULT_FRAGMENT_LOAD_TIMEOUT_MS: u64 = 4000;
pub const DEFAULT_MANIFEST_LOAD_TIMEOUT_MS: u64 = 4000;
pub const DEFAULT_MAX_LOAD_RETRIES: u32 = 1;

// Chat defaults
pub const DEFAULT_CHAT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CHAT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_CHAT_TEMPERATURE: f32 = 0.7;

// Storage defaults
pub const DEFAULT_STATE_FILE: &str = "./data/console-state.json";
pub const DEFAULT_STREAM_URL: &str = "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8";
