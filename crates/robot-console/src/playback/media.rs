//! Media element abstraction and the headless buffer timeline

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::client::{PlayerEventKind, PlayerEventSender};
use crate::errors::PlaybackResult;

/// Playhead position and live edge, both on the media timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTimeline {
    pub current_time: Duration,
    pub seekable_end: Duration,
}

/// The platform player the controller drives
pub trait MediaElement: Send {
    /// Whether the element plays `mime` without help
    fn can_play_type(&self, mime: &str) -> bool;

    /// Native path: play `url` directly, reporting through `events`
    fn set_source(&mut self, url: &str, events: PlayerEventSender) -> PlaybackResult<()>;

    /// Drop the current source and any buffered media
    fn clear_source(&mut self);

    fn source(&self) -> Option<&str>;

    /// `None` when no seekable range is exposed
    fn timeline(&self) -> Option<PlaybackTimeline>;

    fn seek(&mut self, position: Duration);

    /// Buffer an adaptive client appends segments to
    fn buffer_sink(&self) -> BufferSink;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferedRange {
    start: Duration,
    end: Duration,
}

#[derive(Debug)]
struct BufferState {
    ranges: Vec<BufferedRange>,
    position: Duration,
    last_tick: Instant,
    max_hole: Duration,
    back_buffer: Duration,
}

impl BufferState {
    fn range_containing(&self, position: Duration) -> Option<usize> {
        self.ranges
            .iter()
            .position(|r| r.start <= position && position < r.end)
    }

    /// Move the playhead forward by elapsed wall-clock time
    fn advance(&mut self, now: Instant) {
        let mut remaining = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        while !remaining.is_zero() {
            match self.range_containing(self.position) {
                Some(index) => {
                    let end = self.ranges[index].end;
                    let room = end - self.position;
                    if remaining < room {
                        self.position += remaining;
                        break;
                    }
                    self.position = end;
                    remaining -= room;
                }
                None => {
                    // Bridge small holes, stall on anything larger
                    let position = self.position;
                    match self.ranges.iter().find(|r| r.start > position) {
                        Some(next) if next.start - position <= self.max_hole => {
                            self.position = next.start;
                        }
                        _ => break,
                    }
                }
            }
        }

        self.trim_back_buffer();
    }

    fn trim_back_buffer(&mut self) {
        let keep_from = self.position.saturating_sub(self.back_buffer);
        if self.ranges.len() > 1 {
            let last = self.ranges.len() - 1;
            let mut index = 0;
            self.ranges.retain(|r| {
                let keep = index == last || r.end > keep_from;
                index += 1;
                keep
            });
        }
    }

    fn seekable_end(&self) -> Option<Duration> {
        self.ranges.last().map(|r| r.end)
    }

    fn buffered_ahead(&self) -> Duration {
        self.seekable_end()
            .map(|end| end.saturating_sub(self.position))
            .unwrap_or_default()
    }
}

/// Shared handle on a media element's buffered timeline.
///
/// Appended segments extend the seekable range; the playhead advances with
/// wall-clock time through the buffered media.
#[derive(Debug, Clone)]
pub struct BufferSink {
    state: Arc<Mutex<BufferState>>,
}

impl BufferSink {
    pub fn new(max_hole: Duration, back_buffer: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(BufferState {
                ranges: Vec::new(),
                position: Duration::ZERO,
                last_tick: Instant::now(),
                max_hole,
                back_buffer,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `duration` of media starting at `start` on the media timeline
    pub fn append(&self, start: Duration, duration: Duration) {
        let now = Instant::now();
        let mut state = self.lock();
        if state.ranges.is_empty() {
            state.position = start;
            state.last_tick = now;
        } else {
            state.advance(now);
        }

        let end = start.saturating_add(duration);
        match state.ranges.last_mut() {
            Some(last) if start <= last.end && start >= last.start => {
                last.end = last.end.max(end);
            }
            _ => state.ranges.push(BufferedRange { start, end }),
        }
    }

    pub fn timeline(&self) -> Option<PlaybackTimeline> {
        let mut state = self.lock();
        state.advance(Instant::now());
        state.seekable_end().map(|seekable_end| PlaybackTimeline {
            current_time: state.position,
            seekable_end,
        })
    }

    /// Media buffered ahead of the playhead
    pub fn buffered_ahead(&self) -> Duration {
        let mut state = self.lock();
        state.advance(Instant::now());
        state.buffered_ahead()
    }

    pub fn seek(&self, position: Duration) {
        let now = Instant::now();
        let mut state = self.lock();
        let start = state.ranges.first().map(|r| r.start).unwrap_or_default();
        let end = state.seekable_end().unwrap_or_default();
        state.position = position.clamp(start, end.max(start));
        state.last_tick = now;
        state.trim_back_buffer();
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.ranges.clear();
        state.position = Duration::ZERO;
        state.last_tick = Instant::now();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ranges.is_empty()
    }

    /// Number of disjoint buffered ranges
    pub fn range_count(&self) -> usize {
        self.lock().ranges.len()
    }
}

/// Media element without native HLS support, for headless operation
#[derive(Debug)]
pub struct HeadlessMedia {
    sink: BufferSink,
    source: Option<String>,
}

impl HeadlessMedia {
    pub fn new(max_hole: Duration, back_buffer: Duration) -> Self {
        Self {
            sink: BufferSink::new(max_hole, back_buffer),
            source: None,
        }
    }
}

impl MediaElement for HeadlessMedia {
    fn can_play_type(&self, _mime: &str) -> bool {
        false
    }

    fn set_source(&mut self, url: &str, events: PlayerEventSender) -> PlaybackResult<()> {
        self.source = Some(url.to_string());
        events.send(PlayerEventKind::MediaError(
            "headless media cannot demux playlists natively".to_string(),
        ));
        Ok(())
    }

    fn clear_source(&mut self) {
        if self.source.take().is_some() || !self.sink.is_empty() {
            debug!("Cleared headless media source");
        }
        self.sink.clear();
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn timeline(&self) -> Option<PlaybackTimeline> {
        self.sink.timeline()
    }

    fn seek(&mut self, position: Duration) {
        self.sink.seek(position);
    }

    fn buffer_sink(&self) -> BufferSink {
        self.sink.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[tokio::test(start_paused = true)]
    async fn test_playhead_advances_through_buffer() {
        let sink = BufferSink::new(Duration::from_millis(500), Duration::ZERO);
        assert!(sink.timeline().is_none());

        sink.append(secs(10), secs(2));
        sink.append(secs(12), secs(2));
        let timeline = sink.timeline().unwrap();
        assert_eq!(timeline.current_time, secs(10));
        assert_eq!(timeline.seekable_end, secs(14));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(sink.timeline().unwrap().current_time, Duration::from_millis(11500));
        assert_eq!(sink.buffered_ahead(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playhead_stalls_at_buffer_end() {
        let sink = BufferSink::new(Duration::from_millis(500), Duration::ZERO);
        sink.append(Duration::ZERO, secs(2));

        tokio::time::advance(secs(5)).await;
        let timeline = sink.timeline().unwrap();
        assert_eq!(timeline.current_time, secs(2));
        assert_eq!(timeline.seekable_end, secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_holes_are_bridged_large_holes_stall() {
        let sink = BufferSink::new(Duration::from_millis(500), secs(60));
        sink.append(Duration::ZERO, secs(2));
        sink.append(Duration::from_millis(2300), secs(2));
        sink.append(secs(10), secs(2));
        assert_eq!(sink.range_count(), 3);

        tokio::time::advance(secs(3)).await;
        assert_eq!(
            sink.timeline().unwrap().current_time,
            Duration::from_millis(3300)
        );

        tokio::time::advance(secs(5)).await;
        assert_eq!(
            sink.timeline().unwrap().current_time,
            Duration::from_millis(4300)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_clamps_and_trims_back_buffer() {
        let sink = BufferSink::new(Duration::from_millis(500), Duration::ZERO);
        sink.append(Duration::ZERO, secs(2));
        sink.append(secs(5), secs(2));

        sink.seek(secs(6));
        assert_eq!(sink.timeline().unwrap().current_time, secs(6));
        assert_eq!(sink.range_count(), 1);

        sink.seek(secs(60));
        assert_eq!(sink.timeline().unwrap().current_time, secs(7));
    }

    #[tokio::test]
    async fn test_headless_media_clear_source() {
        let mut media = HeadlessMedia::new(Duration::from_millis(500), Duration::ZERO);
        assert!(!media.can_play_type(crate::streaming::HLS_MIME));

        media.buffer_sink().append(Duration::ZERO, secs(2));
        assert!(media.timeline().is_some());

        media.clear_source();
        assert!(media.timeline().is_none());
        assert!(media.source().is_none());
    }
}
