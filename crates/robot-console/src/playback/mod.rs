//! Live video playback control
//!
//! [`PlaybackController`] drives a [`MediaElement`] through
//! `disconnected → connecting → live → error`, choosing between native
//! playlist playback and a fallback [`AdaptiveClient`], and keeps latency low
//! by re-anchoring near the live edge. [`spawn_playback`] runs it on a single
//! task.

pub mod client;
pub mod controller;
pub mod driver;
pub mod hls_client;
pub mod latency;
pub mod media;
pub mod state;

pub use client::{
    AdaptiveClient, AdaptiveClientFactory, ClientAvailability, ClientSlot, LowLatencyConfig,
    NoFallbackClient, PlayerEvent, PlayerEventKind, PlayerEventSender, SessionId,
    player_event_channel,
};
pub use controller::{NATIVE_LOAD_ERROR_MESSAGE, PlaybackController, StreamUrlStore};
pub use driver::{PlaybackCommand, PlaybackHandle, spawn_playback};
pub use hls_client::{HlsClientFactory, HlsLiveClient};
pub use latency::{LatencyCorrection, LiveEdgeCorrector, estimated_latency};
pub use media::{BufferSink, HeadlessMedia, MediaElement, PlaybackTimeline};
pub use state::{ConnectionState, LatencyReading, PlaybackPath, PlaybackSnapshot};
