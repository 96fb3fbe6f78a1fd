//! Fallback adaptive-streaming client contracts
//!
//! When the media element cannot play HLS playlists itself, an adaptive client
//! fetches the playlist and feeds segments into the element's buffer. Clients
//! are built by a capability-checked factory that answers with a value instead
//! of failing, and are owned exclusively through a [`ClientSlot`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::media::BufferSink;
use crate::config::defaults::*;
use crate::config::duration_serde;
use crate::errors::PlaybackResult;

/// Identifies one connection attempt; events from older attempts are stale
pub type SessionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEventKind {
    /// Native path: the media element loaded stream metadata
    MetadataLoaded,
    /// Native path: the media element failed to load the source
    MediaError(String),
    /// Fallback path: the client parsed the manifest
    ManifestParsed { variants: usize },
    /// Fallback path: the client hit a fault
    ClientError { fatal: bool, details: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEvent {
    pub session: SessionId,
    pub kind: PlayerEventKind,
}

/// Event callback handed to media elements and clients for one session
#[derive(Debug, Clone)]
pub struct PlayerEventSender {
    session: SessionId,
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlayerEventSender {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Returns false once the controller has gone away
    pub fn send(&self, kind: PlayerEventKind) -> bool {
        self.tx
            .send(PlayerEvent {
                session: self.session,
                kind,
            })
            .is_ok()
    }
}

pub fn player_event_channel() -> (
    mpsc::UnboundedSender<PlayerEvent>,
    mpsc::UnboundedReceiver<PlayerEvent>,
) {
    mpsc::unbounded_channel()
}

/// Adaptive client tuning for low-latency live playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowLatencyConfig {
    /// Forward buffer the client tries to keep
    #[serde(default = "default_max_buffer_length", with = "duration_serde::duration")]
    pub max_buffer_length: Duration,
    /// Hard ceiling for the forward buffer
    #[serde(
        default = "default_max_max_buffer_length",
        with = "duration_serde::duration"
    )]
    pub max_max_buffer_length: Duration,
    /// Largest gap between buffered ranges played through without stalling
    #[serde(default = "default_max_buffer_hole", with = "duration_serde::duration")]
    pub max_buffer_hole: Duration,
    /// Segments from the live edge playback starts at
    #[serde(default = "default_live_sync_duration_count")]
    pub live_sync_duration_count: u32,
    /// Segments behind the live edge after which the client jumps forward
    #[serde(default = "default_live_max_latency_duration_count")]
    pub live_max_latency_duration_count: u32,
    #[serde(
        default = "default_fragment_load_timeout",
        with = "duration_serde::duration"
    )]
    pub fragment_load_timeout: Duration,
    #[serde(
        default = "default_manifest_load_timeout",
        with = "duration_serde::duration"
    )]
    pub manifest_load_timeout: Duration,
    /// Retries for a failed segment or playlist fetch
    #[serde(default = "default_max_load_retries")]
    pub max_load_retries: u32,
    #[serde(default)]
    pub start_with_bandwidth_estimate: bool,
    /// Played media kept behind the playhead
    #[serde(default, with = "duration_serde::duration")]
    pub back_buffer_length: Duration,
    #[serde(default = "default_true")]
    pub low_latency_mode: bool,
}

fn default_max_buffer_length() -> Duration {
    Duration::from_millis(DEFAULT_MAX_BUFFER_LENGTH_MS)
}

fn default_max_max_buffer_length() -> Duration {
    Duration::from_millis(DEFAULT_MAX_MAX_BUFFER_LENGTH_MS)
}

fn default_max_buffer_hole() -> Duration {
    Duration::from_millis(DEFAULT_MAX_BUFFER_HOLE_MS)
}

fn default_live_sync_duration_count() -> u32 {
    DEFAULT_LIVE_SYNC_DURATION_COUNT
}

fn default_live_max_latency_duration_count() -> u32 {
    DEFAULT_LIVE_MAX_LATENCY_DURATION_COUNT
}

fn default_fragment_load_timeout() -> Duration {
    Duration::from_millis(DEFAULT_FRAGMENT_LOAD_TIMEOUT_MS)
}

fn default_manifest_load_timeout() -> Duration {
    Duration::from_millis(DEFAULT_MANIFEST_LOAD_TIMEOUT_MS)
}

fn default_max_load_retries() -> u32 {
    DEFAULT_MAX_LOAD_RETRIES
}

fn default_true() -> bool {
    true
}

impl Default for LowLatencyConfig {
    fn default() -> Self {
        Self {
            max_buffer_length: default_max_buffer_length(),
            max_max_buffer_length: default_max_max_buffer_length(),
            max_buffer_hole: default_max_buffer_hole(),
            live_sync_duration_count: default_live_sync_duration_count(),
            live_max_latency_duration_count: default_live_max_latency_duration_count(),
            fragment_load_timeout: default_fragment_load_timeout(),
            manifest_load_timeout: default_manifest_load_timeout(),
            max_load_retries: default_max_load_retries(),
            start_with_bandwidth_estimate: false,
            back_buffer_length: Duration::ZERO,
            low_latency_mode: true,
        }
    }
}

pub trait AdaptiveClient: Send {
    /// Start loading the playlist at `url`
    fn load_source(&mut self, url: &str) -> PlaybackResult<()>;

    /// Bind the client to the media element's buffer
    fn attach_media(&mut self, sink: BufferSink) -> PlaybackResult<()>;

    /// Best-effort recovery from a non-fatal media fault
    fn recover_media_error(&mut self) -> PlaybackResult<()>;

    /// Abort in-flight work and detach from the media element
    fn destroy(&mut self);
}

/// Result of asking a factory for a client
pub enum ClientAvailability {
    Available(Box<dyn AdaptiveClient>),
    Unavailable { reason: String },
}

impl std::fmt::Debug for ClientAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(_) => f.write_str("Available"),
            Self::Unavailable { reason } => {
                f.debug_struct("Unavailable").field("reason", reason).finish()
            }
        }
    }
}

pub trait AdaptiveClientFactory: Send + Sync {
    fn create(&self, config: &LowLatencyConfig, events: PlayerEventSender) -> ClientAvailability;
}

/// Factory for runtimes without any fallback client
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFallbackClient;

impl AdaptiveClientFactory for NoFallbackClient {
    fn create(&self, _config: &LowLatencyConfig, _events: PlayerEventSender) -> ClientAvailability {
        ClientAvailability::Unavailable {
            reason: "no adaptive streaming client is available".to_string(),
        }
    }
}

/// Single-owner holder of the active fallback client.
///
/// Attaching always releases the previous client first, and a client is
/// destroyed exactly once.
#[derive(Default)]
pub struct ClientSlot {
    client: Option<Box<dyn AdaptiveClient>>,
}

impl ClientSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, client: Box<dyn AdaptiveClient>) {
        self.release();
        self.client = Some(client);
    }

    /// Destroy the held client; returns whether there was one
    pub fn release(&mut self) -> bool {
        match self.client.take() {
            Some(mut client) => {
                client.destroy();
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.client.is_some()
    }

    pub fn get_mut(&mut self) -> Option<&mut (dyn AdaptiveClient + 'static)> {
        self.client.as_deref_mut()
    }
}

impl Drop for ClientSlot {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ClientSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}
