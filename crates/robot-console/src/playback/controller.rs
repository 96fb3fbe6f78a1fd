//! Playback controller state machine
//!
//! ```text
//! disconnected|error --connect--> connecting --success--> live
//!                                 connecting|live --fatal--> error
//! any --disconnect--> disconnected
//! error --retry--> disconnected --(retry delay)--> connecting
//! ```
//!
//! Every public operation converts failures into the `error` state; nothing
//! here panics or leaves the controller half-updated.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::client::{
    AdaptiveClientFactory, ClientAvailability, ClientSlot, PlayerEvent, PlayerEventKind,
    PlayerEventSender, SessionId,
};
use super::latency::{LiveEdgeCorrector, estimated_latency};
use super::media::MediaElement;
use super::state::{ConnectionState, PlaybackPath, PlaybackSnapshot};
use crate::config::PlaybackConfig;
use crate::errors::{AppResult, PlaybackError, PlaybackResult};
use crate::streaming::{HLS_MIME, StreamUrlRewriter};

pub const NATIVE_LOAD_ERROR_MESSAGE: &str = "Failed to load stream. Please check the URL.";

/// Where the controller remembers the stream URL it connected to
#[async_trait]
pub trait StreamUrlStore: Send + Sync {
    async fn save_stream_url(&self, url: &str) -> AppResult<()>;
}

pub struct PlaybackController {
    settings: PlaybackConfig,
    rewriter: StreamUrlRewriter,
    corrector: LiveEdgeCorrector,
    media: Box<dyn MediaElement>,
    factory: Arc<dyn AdaptiveClientFactory>,
    slot: ClientSlot,
    store: Option<Arc<dyn StreamUrlStore>>,
    events_tx: mpsc::UnboundedSender<PlayerEvent>,
    session: SessionId,
    snapshot: PlaybackSnapshot,
    snapshots: watch::Sender<PlaybackSnapshot>,
}

impl PlaybackController {
    pub fn new(
        settings: PlaybackConfig,
        rewriter: StreamUrlRewriter,
        media: Box<dyn MediaElement>,
        factory: Arc<dyn AdaptiveClientFactory>,
        events_tx: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Self {
        let corrector = LiveEdgeCorrector::new(settings.drift_threshold, settings.live_edge_margin);
        let (snapshots, _) = watch::channel(PlaybackSnapshot::default());
        Self {
            settings,
            rewriter,
            corrector,
            media,
            factory,
            slot: ClientSlot::new(),
            store: None,
            events_tx,
            session: 0,
            snapshot: PlaybackSnapshot::default(),
            snapshots,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn StreamUrlStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settings(&self) -> &PlaybackConfig {
        &self.settings
    }

    pub fn state(&self) -> ConnectionState {
        self.snapshot.state
    }

    pub fn snapshot(&self) -> &PlaybackSnapshot {
        &self.snapshot
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn has_client(&self) -> bool {
        self.slot.is_attached()
    }

    pub fn media(&self) -> &dyn MediaElement {
        self.media.as_ref()
    }

    /// Start a connection attempt to `url`.
    ///
    /// Blank URLs and calls outside `disconnected`/`error` are rejected
    /// without touching state. Setup failures after that point land in the
    /// `error` state and still return `Ok`.
    pub async fn connect(&mut self, url: &str) -> PlaybackResult<()> {
        let url = url.trim();
        if url.is_empty() {
            debug!("Ignoring connect with empty stream URL");
            return Err(PlaybackError::EmptyUrl);
        }
        if !self.state().accepts_connect() {
            return Err(PlaybackError::InvalidTransition {
                action: "connect",
                state: self.state(),
            });
        }

        let proxied = self.rewriter.to_proxied(url);
        if proxied != url {
            persist_url(self.store.clone(), &proxied).await;
        }

        self.teardown();
        self.session += 1;
        self.snapshot = PlaybackSnapshot {
            state: ConnectionState::Connecting,
            error_message: None,
            latency: None,
            path: None,
            stream_url: proxied.clone(),
        };
        self.publish();
        info!(session = self.session, url = %proxied, "Connecting to stream");

        let events = PlayerEventSender::new(self.session, self.events_tx.clone());
        if let Err(e) = self.start_playback(&proxied, events) {
            self.fail(e.to_string());
        }
        Ok(())
    }

    fn start_playback(&mut self, url: &str, events: PlayerEventSender) -> PlaybackResult<()> {
        if self.media.can_play_type(HLS_MIME) {
            self.snapshot.path = Some(PlaybackPath::Native);
            self.publish();
            return self.media.set_source(url, events);
        }

        match self.factory.create(&self.settings.low_latency, events) {
            ClientAvailability::Available(client) => {
                self.snapshot.path = Some(PlaybackPath::Fallback);
                self.publish();
                self.slot.attach(client);
                let sink = self.media.buffer_sink();
                let client = self.slot.get_mut().ok_or(PlaybackError::ClientDestroyed)?;
                client.attach_media(sink)?;
                client.load_source(url)
            }
            ClientAvailability::Unavailable { reason } => {
                Err(PlaybackError::Unsupported { reason })
            }
        }
    }

    /// Apply a player event from the media element or the adaptive client
    pub fn handle_event(&mut self, event: PlayerEvent) {
        if event.session != self.session {
            debug!(
                event_session = event.session,
                session = self.session,
                "Discarding stale player event"
            );
            return;
        }
        let state = self.state();
        if !matches!(state, ConnectionState::Connecting | ConnectionState::Live) {
            debug!(state = %state, event = ?event.kind, "Ignoring player event");
            return;
        }

        match event.kind {
            PlayerEventKind::MetadataLoaded | PlayerEventKind::ManifestParsed { .. } => {
                if state == ConnectionState::Connecting {
                    self.snapshot.state = ConnectionState::Live;
                    self.publish();
                    info!(session = self.session, path = ?self.snapshot.path, "Stream is live");
                }
            }
            PlayerEventKind::MediaError(details) => {
                warn!(session = self.session, details = %details, "Media element error");
                self.fail(NATIVE_LOAD_ERROR_MESSAGE.to_string());
            }
            PlayerEventKind::ClientError {
                fatal: true,
                details,
            } => {
                self.fail(format!("HLS error: {details}"));
            }
            PlayerEventKind::ClientError {
                fatal: false,
                details,
            } => {
                debug!(details = %details, "Recovering from non-fatal client error");
                if let Some(client) = self.slot.get_mut() {
                    if let Err(e) = client.recover_media_error() {
                        warn!(error = %e, "Media error recovery failed");
                    }
                }
            }
        }
    }

    /// Take one latency sample and re-anchor near the live edge when drifting
    pub fn sample_latency(&mut self) {
        if self.state() != ConnectionState::Live {
            return;
        }

        let reading = match self.media.timeline() {
            Some(timeline) => {
                let correction = self.corrector.evaluate(timeline);
                if let Some(target) = correction.seek_to {
                    info!(
                        latency_ms = correction.latency.as_millis() as u64,
                        seek_to_ms = target.as_millis() as u64,
                        "Latency drifted, seeking towards live edge"
                    );
                    self.media.seek(target);
                }
                correction.reading()
            }
            None => estimated_latency(),
        };

        if self.snapshot.latency != Some(reading) {
            self.snapshot.latency = Some(reading);
            self.publish();
        }
    }

    /// Return to `disconnected` from any state
    pub fn disconnect(&mut self) {
        self.session += 1;
        self.teardown();
        if self.snapshot.state == ConnectionState::Disconnected && self.snapshot.error_message.is_none()
        {
            return;
        }

        self.snapshot.state = ConnectionState::Disconnected;
        self.snapshot.error_message = None;
        self.snapshot.latency = None;
        self.snapshot.path = None;
        self.publish();
        info!(session = self.session, "Disconnected from stream");
    }

    /// First half of a retry: reset to `disconnected` and hand back the URL
    /// to reconnect to once the retry delay has passed.
    pub fn prepare_retry(&mut self) -> PlaybackResult<String> {
        if self.state() != ConnectionState::Error {
            return Err(PlaybackError::InvalidTransition {
                action: "retry",
                state: self.state(),
            });
        }
        let url = self.snapshot.stream_url.clone();
        self.disconnect();
        Ok(url)
    }

    /// Reset and reconnect after the configured retry delay
    pub async fn retry(&mut self) -> PlaybackResult<()> {
        let url = self.prepare_retry()?;
        tokio::time::sleep(self.settings.retry_delay).await;
        self.connect(&url).await
    }

    fn teardown(&mut self) {
        if self.slot.release() {
            debug!("Released adaptive client");
        }
        self.media.clear_source();
    }

    fn fail(&mut self, message: String) {
        warn!(session = self.session, error = %message, "Stream entered error state");
        self.snapshot.state = ConnectionState::Error;
        self.snapshot.error_message = Some(message);
        self.snapshot.latency = None;
        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot.clone());
    }
}

// Owns the store handle: the connect future must stay Send
async fn persist_url(store: Option<Arc<dyn StreamUrlStore>>, url: &str) {
    if let Some(store) = store {
        if let Err(e) = store.save_stream_url(url).await {
            warn!(error = %e, "Failed to persist stream URL");
        }
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("session", &self.session)
            .field("snapshot", &self.snapshot)
            .field("slot", &self.slot)
            .finish()
    }
}
