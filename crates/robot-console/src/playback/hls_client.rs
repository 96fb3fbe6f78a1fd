//! Headless adaptive client that follows a live HLS stream over HTTP
//!
//! The client resolves the stream reference against the console origin, loads
//! the manifest (following the first variant of a master playlist), then polls
//! the media playlist and appends newly published segments to the attached
//! buffer. Segment failures are reported as non-fatal; a playlist that keeps
//! failing past the retry budget is fatal.

use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::client::{
    AdaptiveClient, AdaptiveClientFactory, ClientAvailability, LowLatencyConfig, PlayerEventKind,
    PlayerEventSender,
};
use super::media::BufferSink;
use crate::config::Config;
use crate::errors::{AppError, AppResult, PlaybackError, PlaybackResult};
use crate::streaming::playlist::{MediaPlaylist, Playlist, parse_playlist};

/// Builds [`HlsLiveClient`]s sharing one HTTP client
#[derive(Debug, Clone)]
pub struct HlsClientFactory {
    http: Client,
    origin: Url,
}

impl HlsClientFactory {
    pub fn new(config: &Config) -> AppResult<Self> {
        let origin = Url::parse(&config.web.public_origin).map_err(|e| {
            AppError::configuration(format!("invalid public origin: {e}"))
        })?;
        let http = Client::builder()
            .user_agent(config.upstream.user_agent())
            .build()
            .map_err(|e| AppError::configuration(format!("failed to build HLS client: {e}")))?;
        Ok(Self::with_client(http, origin))
    }

    pub fn with_client(http: Client, origin: Url) -> Self {
        Self { http, origin }
    }
}

impl AdaptiveClientFactory for HlsClientFactory {
    fn create(&self, config: &LowLatencyConfig, events: PlayerEventSender) -> ClientAvailability {
        if tokio::runtime::Handle::try_current().is_err() {
            return ClientAvailability::Unavailable {
                reason: "no async runtime to drive the HLS client".to_string(),
            };
        }
        ClientAvailability::Available(Box::new(HlsLiveClient::new(
            self.http.clone(),
            self.origin.clone(),
            config.clone(),
            events,
        )))
    }
}

pub struct HlsLiveClient {
    http: Client,
    origin: Url,
    config: LowLatencyConfig,
    events: PlayerEventSender,
    sink: Option<BufferSink>,
    cancellation_token: CancellationToken,
    loader: Option<JoinHandle<()>>,
    destroyed: bool,
}

impl HlsLiveClient {
    pub fn new(
        http: Client,
        origin: Url,
        config: LowLatencyConfig,
        events: PlayerEventSender,
    ) -> Self {
        Self {
            http,
            origin,
            config,
            events,
            sink: None,
            cancellation_token: CancellationToken::new(),
            loader: None,
            destroyed: false,
        }
    }

    fn stop_loader(&mut self) {
        self.cancellation_token.cancel();
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        self.cancellation_token = CancellationToken::new();
    }
}

impl AdaptiveClient for HlsLiveClient {
    fn load_source(&mut self, url: &str) -> PlaybackResult<()> {
        if self.destroyed {
            return Err(PlaybackError::ClientDestroyed);
        }
        self.stop_loader();

        let manifest_url = match self.origin.join(url) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.events.send(PlayerEventKind::ClientError {
                    fatal: true,
                    details: format!("manifestLoadError: invalid URL '{url}': {e}"),
                });
                return Ok(());
            }
        };

        let loader = Loader {
            http: self.http.clone(),
            config: self.config.clone(),
            events: self.events.clone(),
            sink: self.sink.clone(),
            cancellation_token: self.cancellation_token.clone(),
        };
        self.loader = Some(tokio::spawn(loader.run(manifest_url)));
        Ok(())
    }

    fn attach_media(&mut self, sink: BufferSink) -> PlaybackResult<()> {
        if self.destroyed {
            return Err(PlaybackError::ClientDestroyed);
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn recover_media_error(&mut self) -> PlaybackResult<()> {
        if self.destroyed {
            return Err(PlaybackError::ClientDestroyed);
        }
        // Drop what is buffered so the loader re-anchors on the next segment
        match &self.sink {
            Some(sink) => {
                sink.clear();
                Ok(())
            }
            None => Err(PlaybackError::Recovery {
                message: "no media attached".to_string(),
            }),
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.stop_loader();
        self.sink = None;
        debug!(session = self.events.session(), "HLS client destroyed");
    }
}

impl Drop for HlsLiveClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

struct Loader {
    http: Client,
    config: LowLatencyConfig,
    events: PlayerEventSender,
    sink: Option<BufferSink>,
    cancellation_token: CancellationToken,
}

enum Fetch<T> {
    Done(T),
    Failed(String),
    Cancelled,
}

impl Loader {
    async fn run(self, manifest_url: Url) {
        let Some((playlist_url, mut playlist, variants)) = self.load_manifest(manifest_url).await
        else {
            return;
        };

        if !self.events.send(PlayerEventKind::ManifestParsed { variants }) {
            return;
        }
        info!(url = %playlist_url, variants, "HLS manifest parsed");

        // Media timeline position of the next segment to append
        let mut timeline = Duration::ZERO;
        let mut next_sequence = live_start_sequence(&playlist, self.config.live_sync_duration_count);
        let mut playlist_failures = 0u32;

        loop {
            next_sequence = self.skip_to_live_edge(&playlist, next_sequence, &mut timeline);

            let start = next_sequence;
            for segment in playlist.segments.iter().filter(|s| s.sequence >= start) {
                if self.buffer_full() {
                    break;
                }
                let Ok(segment_url) = playlist_url.join(&segment.uri) else {
                    warn!(uri = %segment.uri, "Skipping unresolvable segment URI");
                    timeline = timeline.saturating_add(segment.duration);
                    next_sequence = segment.sequence.saturating_add(1);
                    continue;
                };

                match self
                    .fetch_with_retries(&segment_url, self.config.fragment_load_timeout)
                    .await
                {
                    Fetch::Done(bytes) => {
                        debug!(sequence = segment.sequence, bytes = bytes.len(), "Appended segment");
                        if let Some(sink) = &self.sink {
                            sink.append(timeline, segment.duration);
                        }
                    }
                    Fetch::Failed(message) => {
                        self.events.send(PlayerEventKind::ClientError {
                            fatal: false,
                            details: format!("fragLoadError: {message}"),
                        });
                    }
                    Fetch::Cancelled => return,
                }
                timeline = timeline.saturating_add(segment.duration);
                next_sequence = segment.sequence.saturating_add(1);
            }

            if playlist.ended && next_sequence >= playlist.next_sequence() {
                debug!(url = %playlist_url, "Playlist ended");
                return;
            }

            let wait = (playlist.target_duration / 2).max(Duration::from_millis(250));
            if !self.pause(wait).await {
                return;
            }

            match self.fetch_media_playlist(&playlist_url).await {
                Fetch::Done(refreshed) => {
                    playlist_failures = 0;
                    playlist = refreshed;
                }
                Fetch::Failed(message) => {
                    playlist_failures += 1;
                    if playlist_failures > self.config.max_load_retries {
                        self.events.send(PlayerEventKind::ClientError {
                            fatal: true,
                            details: format!("levelLoadError: {message}"),
                        });
                        return;
                    }
                    warn!(url = %playlist_url, error = %message, "Playlist refresh failed");
                }
                Fetch::Cancelled => return,
            }
        }
    }

    /// Resolve the manifest down to a media playlist
    async fn load_manifest(&self, manifest_url: Url) -> Option<(Url, MediaPlaylist, usize)> {
        let text = match self
            .fetch_text_with_retries(&manifest_url, self.config.manifest_load_timeout)
            .await
        {
            Fetch::Done(text) => text,
            Fetch::Failed(message) => {
                self.fatal(format!("manifestLoadError: {message}"));
                return None;
            }
            Fetch::Cancelled => return None,
        };

        match parse_playlist(&text) {
            Ok(Playlist::Media(media)) => Some((manifest_url, media, 1)),
            Ok(Playlist::Master { variants }) => {
                let count = variants.len();
                let variant_url = match variants.first().map(|v| manifest_url.join(v)) {
                    Some(Ok(url)) => url,
                    _ => {
                        self.fatal("manifestParsingError: unresolvable variant".to_string());
                        return None;
                    }
                };
                match self.fetch_media_playlist(&variant_url).await {
                    Fetch::Done(media) => Some((variant_url, media, count)),
                    Fetch::Failed(message) => {
                        self.fatal(format!("levelLoadError: {message}"));
                        None
                    }
                    Fetch::Cancelled => None,
                }
            }
            Err(e) => {
                self.fatal(format!("manifestParsingError: {e}"));
                None
            }
        }
    }

    async fn fetch_media_playlist(&self, url: &Url) -> Fetch<MediaPlaylist> {
        match self
            .fetch_text_with_retries(url, self.config.manifest_load_timeout)
            .await
        {
            Fetch::Done(text) => match parse_playlist(&text) {
                Ok(Playlist::Media(media)) => Fetch::Done(media),
                Ok(Playlist::Master { .. }) => {
                    Fetch::Failed("expected a media playlist, got a master playlist".to_string())
                }
                Err(e) => Fetch::Failed(e.to_string()),
            },
            Fetch::Failed(message) => Fetch::Failed(message),
            Fetch::Cancelled => Fetch::Cancelled,
        }
    }

    /// Re-anchor `next_sequence` against a freshly loaded playlist.
    ///
    /// Jumps forward when playback fell too far behind the live edge, and back
    /// to the edge when the upstream restarted its sequence numbering. The
    /// media timeline only ever moves forward.
    fn skip_to_live_edge(
        &self,
        playlist: &MediaPlaylist,
        next_sequence: u64,
        timeline: &mut Duration,
    ) -> u64 {
        let edge = live_start_sequence(playlist, self.config.live_sync_duration_count);

        if next_sequence > playlist.next_sequence() {
            warn!(
                expected = next_sequence,
                playlist_end = playlist.next_sequence(),
                "Media sequence went backwards, re-anchoring at live edge"
            );
            return edge;
        }

        let behind = playlist.next_sequence().saturating_sub(next_sequence);
        // Segments that already rolled off the playlist
        let missing = playlist.media_sequence.saturating_sub(next_sequence);
        let missing_time = playlist
            .target_duration
            .saturating_mul(u32::try_from(missing).unwrap_or(u32::MAX));

        if behind <= u64::from(self.config.live_max_latency_duration_count) || edge <= next_sequence
        {
            *timeline = timeline.saturating_add(missing_time);
            return next_sequence.max(playlist.media_sequence);
        }

        let skipped = playlist
            .segments
            .iter()
            .filter(|s| s.sequence >= next_sequence && s.sequence < edge)
            .fold(Duration::ZERO, |total, s| total.saturating_add(s.duration));
        *timeline = timeline.saturating_add(skipped.saturating_add(missing_time));
        debug!(from = next_sequence, to = edge, "Skipping to live edge");
        edge
    }

    fn buffer_full(&self) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|sink| sink.buffered_ahead() >= self.config.max_buffer_length)
    }

    fn fatal(&self, details: String) {
        warn!(details = %details, "HLS client fatal error");
        self.events.send(PlayerEventKind::ClientError {
            fatal: true,
            details,
        });
    }

    async fn pause(&self, wait: Duration) -> bool {
        tokio::select! {
            _ = self.cancellation_token.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }

    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            _ = self.cancellation_token.cancelled() => None,
            output = fut => Some(output),
        }
    }

    async fn fetch_text_with_retries(&self, url: &Url, timeout: Duration) -> Fetch<String> {
        match self.fetch_with_retries(url, timeout).await {
            Fetch::Done(bytes) => Fetch::Done(String::from_utf8_lossy(&bytes).into_owned()),
            Fetch::Failed(message) => Fetch::Failed(message),
            Fetch::Cancelled => Fetch::Cancelled,
        }
    }

    async fn fetch_with_retries(&self, url: &Url, timeout: Duration) -> Fetch<bytes::Bytes> {
        let mut last_error = String::new();
        for attempt in 0..=self.config.max_load_retries {
            match self.cancellable(fetch_bytes(&self.http, url, timeout)).await {
                None => return Fetch::Cancelled,
                Some(Ok(bytes)) => return Fetch::Done(bytes),
                Some(Err(e)) => {
                    debug!(url = %url, attempt, error = %e, "Fetch attempt failed");
                    last_error = e;
                }
            }
        }
        Fetch::Failed(last_error)
    }
}

/// Sequence number playback starts at, `sync_count` segments from the edge
fn live_start_sequence(playlist: &MediaPlaylist, sync_count: u32) -> u64 {
    if playlist.ended {
        return playlist.media_sequence;
    }
    playlist
        .next_sequence()
        .saturating_sub(u64::from(sync_count.max(1)))
        .max(playlist.media_sequence)
}

async fn fetch_bytes(http: &Client, url: &Url, timeout: Duration) -> Result<bytes::Bytes, String> {
    let resp = http
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !resp.status().is_success() {
        return Err(format!("HTTP {} for {}", resp.status(), url));
    }

    resp.bytes().await.map_err(|e| e.to_string())
}
