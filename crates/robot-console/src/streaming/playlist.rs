//! Minimal HLS playlist reader used by the headless adaptive client
//!
//! Only the tags needed to follow a live stream are understood:
//!   - EXT-X-STREAM-INF (variant URIs of a master playlist)
//!   - EXT-X-TARGETDURATION
//!   - EXT-X-MEDIA-SEQUENCE
//!   - EXTINF
//!   - EXT-X-ENDLIST
//!
//! Everything else is skipped.

use std::time::Duration;

/// Longest segment or target duration accepted from a playlist
pub const MAX_SEGMENT_DURATION: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq)]
pub enum Playlist {
    Master { variants: Vec<String> },
    Media(MediaPlaylist),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    pub target_duration: Duration,
    pub media_sequence: u64,
    pub segments: Vec<MediaSegment>,
    pub ended: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaSegment {
    pub sequence: u64,
    pub duration: Duration,
    pub uri: String,
}

impl MediaPlaylist {
    /// Sequence number one past the newest listed segment
    pub fn next_sequence(&self) -> u64 {
        self.media_sequence
            .saturating_add(self.segments.len() as u64)
    }

    pub fn total_duration(&self) -> Duration {
        self.segments
            .iter()
            .fold(Duration::ZERO, |total, s| total.saturating_add(s.duration))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaylistError {
    #[error("no EXTM3U delimiter")]
    MissingHeader,
    #[error("master playlist lists no variants")]
    NoVariants,
}

pub fn parse_playlist(text: &str) -> Result<Playlist, PlaylistError> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("#EXTM3U") {
        return Err(PlaylistError::MissingHeader);
    }

    if text.contains("#EXT-X-STREAM-INF") {
        let variants = parse_variants(text);
        if variants.is_empty() {
            return Err(PlaylistError::NoVariants);
        }
        return Ok(Playlist::Master { variants });
    }

    Ok(Playlist::Media(parse_media_playlist(text)))
}

fn parse_variants(text: &str) -> Vec<String> {
    let mut variants = Vec::new();
    let mut expecting_uri = false;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("#EXT-X-STREAM-INF") {
            expecting_uri = true;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        if expecting_uri {
            variants.push(line.to_string());
            expecting_uri = false;
        }
    }
    variants
}

fn parse_media_playlist(text: &str) -> MediaPlaylist {
    let mut target_duration = None;
    let mut media_sequence = 0u64;
    let mut pending_duration: Option<Duration> = None;
    let mut uris: Vec<(Duration, String)> = Vec::new();
    let mut ended = false;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            target_duration = parse_seconds(value).filter(|d| !d.is_zero());
            continue;
        }
        if let Some(value) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            media_sequence = value.trim().parse().unwrap_or(0);
            continue;
        }
        if let Some(value) = line.strip_prefix("#EXTINF:") {
            let seconds = value.split(',').next().unwrap_or_default();
            pending_duration = parse_seconds(seconds);
            continue;
        }
        if line == "#EXT-X-ENDLIST" {
            ended = true;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        uris.push((pending_duration.take().unwrap_or_default(), line.to_string()));
    }

    let target_duration = target_duration
        .or_else(|| uris.iter().map(|(d, _)| *d).filter(|d| !d.is_zero()).max())
        .unwrap_or(Duration::from_secs(2));

    // Keep every listed segment's sequence number representable
    let media_sequence = media_sequence.min(u64::MAX - uris.len() as u64);

    let segments = uris
        .into_iter()
        .enumerate()
        .map(|(index, (duration, uri))| MediaSegment {
            sequence: media_sequence + index as u64,
            duration: if duration.is_zero() { target_duration } else { duration },
            uri,
        })
        .collect();

    MediaPlaylist {
        target_duration,
        media_sequence,
        segments,
        ended,
    }
}

fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .filter(|duration| *duration <= MAX_SEGMENT_DURATION)
}
