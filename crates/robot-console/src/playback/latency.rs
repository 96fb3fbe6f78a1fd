//! Live-edge correction
//!
//! Measured latency is the distance between the seekable end and the
//! playhead. When it drifts past the threshold the playhead is moved back
//! towards the live edge. The randomized estimate shown when no seekable range
//! exists lives in [`estimated_latency`] and never feeds into correction.

use rand::Rng;
use std::time::Duration;

use super::media::PlaybackTimeline;
use super::state::LatencyReading;

const ESTIMATE_MIN_MS: u64 = 120;
const ESTIMATE_MAX_MS: u64 = 220;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyCorrection {
    pub latency: Duration,
    /// Position to seek to, when latency drifted past the threshold
    pub seek_to: Option<Duration>,
}

impl LatencyCorrection {
    pub fn reading(&self) -> LatencyReading {
        LatencyReading::Measured(self.latency.as_millis() as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveEdgeCorrector {
    drift_threshold: Duration,
    live_edge_margin: Duration,
}

impl LiveEdgeCorrector {
    pub fn new(drift_threshold: Duration, live_edge_margin: Duration) -> Self {
        Self {
            drift_threshold,
            live_edge_margin,
        }
    }

    pub fn evaluate(&self, timeline: PlaybackTimeline) -> LatencyCorrection {
        let latency = timeline.seekable_end.saturating_sub(timeline.current_time);
        let seek_to = (latency > self.drift_threshold)
            .then(|| timeline.seekable_end.saturating_sub(self.live_edge_margin));

        LatencyCorrection { latency, seek_to }
    }
}

/// Display-only latency used when the player exposes no seekable range
pub fn estimated_latency() -> LatencyReading {
    LatencyReading::Estimated(rand::rng().random_range(ESTIMATE_MIN_MS..ESTIMATE_MAX_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn corrector() -> LiveEdgeCorrector {
        LiveEdgeCorrector::new(Duration::from_secs(3), Duration::from_secs(1))
    }

    #[rstest]
    #[case(10_000, 11_000, None)]
    #[case(10_000, 13_000, None)]
    #[case(10_000, 13_001, Some(12_001))]
    #[case(2_000, 20_000, Some(19_000))]
    fn test_drift_correction(
        #[case] current_ms: u64,
        #[case] end_ms: u64,
        #[case] expected_seek_ms: Option<u64>,
    ) {
        let correction = corrector().evaluate(PlaybackTimeline {
            current_time: Duration::from_millis(current_ms),
            seekable_end: Duration::from_millis(end_ms),
        });
        assert_eq!(
            correction.latency,
            Duration::from_millis(end_ms - current_ms)
        );
        assert_eq!(correction.seek_to, expected_seek_ms.map(Duration::from_millis));
    }

    #[test]
    fn test_playhead_past_end_reads_zero() {
        let correction = corrector().evaluate(PlaybackTimeline {
            current_time: Duration::from_secs(5),
            seekable_end: Duration::from_secs(4),
        });
        assert_eq!(correction.latency, Duration::ZERO);
        assert_eq!(correction.reading(), LatencyReading::Measured(0));
    }

    #[test]
    fn test_estimate_range() {
        for _ in 0..200 {
            let reading = estimated_latency();
            assert!(reading.is_estimate());
            assert!((ESTIMATE_MIN_MS..ESTIMATE_MAX_MS).contains(&reading.millis()));
        }
    }
}
