use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{AsRefStr, Display, EnumString};

/// Connection lifecycle of the video feed
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Live,
    Error,
}

impl ConnectionState {
    /// States from which a new connection attempt may start
    pub fn accepts_connect(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

/// Which playback mechanism carries the current connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlaybackPath {
    /// The media element plays the playlist itself
    Native,
    /// An adaptive client feeds the media element
    Fallback,
}

/// Latency shown to the operator while live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ms", rename_all = "lowercase")]
pub enum LatencyReading {
    /// Seekable end minus current playback time
    Measured(u64),
    /// Display-only placeholder when no seekable range is exposed
    Estimated(u64),
}

impl LatencyReading {
    pub fn millis(self) -> u64 {
        match self {
            Self::Measured(ms) | Self::Estimated(ms) => ms,
        }
    }

    pub fn is_estimate(self) -> bool {
        matches!(self, Self::Estimated(_))
    }
}

impl fmt::Display for LatencyReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured(ms) => write!(f, "{ms} ms"),
            Self::Estimated(ms) => write!(f, "~{ms} ms (est.)"),
        }
    }
}

/// Everything a renderer needs, published on every change
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PlaybackPath>,
    pub stream_url: String,
}

impl PlaybackSnapshot {
    pub fn is_live(&self) -> bool {
        self.state == ConnectionState::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_state_string_forms() {
        assert_eq!(ConnectionState::Live.to_string(), "live");
        assert_eq!(ConnectionState::Disconnected.as_ref(), "disconnected");
        assert_eq!(
            ConnectionState::from_str("connecting").unwrap(),
            ConnectionState::Connecting
        );
        assert_eq!(
            serde_json::to_string(&ConnectionState::Error).unwrap(),
            "\"error\""
        );
    }

    #[test]
    fn test_connect_acceptance() {
        assert!(ConnectionState::Disconnected.accepts_connect());
        assert!(ConnectionState::Error.accepts_connect());
        assert!(!ConnectionState::Connecting.accepts_connect());
        assert!(!ConnectionState::Live.accepts_connect());
    }

    #[test]
    fn test_latency_display() {
        assert_eq!(LatencyReading::Measured(1800).to_string(), "1800 ms");
        assert_eq!(LatencyReading::Estimated(150).to_string(), "~150 ms (est.)");
        assert!(LatencyReading::Estimated(150).is_estimate());
        assert_eq!(LatencyReading::Measured(42).millis(), 42);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = PlaybackSnapshot {
            state: ConnectionState::Live,
            latency: Some(LatencyReading::Measured(900)),
            path: Some(PlaybackPath::Fallback),
            stream_url: "/api/stream/live/index.m3u8".to_string(),
            ..PlaybackSnapshot::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "live");
        assert_eq!(json["latency"]["kind"], "measured");
        assert_eq!(json["latency"]["ms"], 900);
        assert_eq!(json["path"], "fallback");
        assert!(json.get("error_message").is_none());
    }
}
