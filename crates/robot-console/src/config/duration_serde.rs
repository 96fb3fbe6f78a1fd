//! Serde helpers for human-readable durations in configuration.
//!
//! Durations are written as humantime strings (`"100ms"`, `"4s"`, `"1h"`) and
//! also accepted as plain integer seconds.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

/// Custom serde functions for Duration that support human-readable strings
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a duration as seconds (number) or human-readable string (e.g., '100ms', '4s', '1h')",
                )
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| de::Error::custom(format!("Negative duration: {seconds}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value)
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "super::duration")]
        value: Duration,
    }

    #[test]
    fn test_parses_humantime_strings() {
        let holder: Holder = toml::from_str("value = \"100ms\"").unwrap();
        assert_eq!(holder.value, Duration::from_millis(100));

        let holder: Holder = toml::from_str("value = \"1h\"").unwrap();
        assert_eq!(holder.value, Duration::from_secs(3600));
    }

    #[test]
    fn test_parses_integer_seconds() {
        let holder: Holder = toml::from_str("value = 4").unwrap();
        assert_eq!(holder.value, Duration::from_secs(4));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(toml::from_str::<Holder>("value = \"soon\"").is_err());
        assert!(toml::from_str::<Holder>("value = -3").is_err());
    }

    #[test]
    fn test_serializes_as_humantime() {
        let holder = Holder {
            value: Duration::from_millis(1500),
        };
        let text = toml::to_string(&holder).unwrap();
        assert_eq!(text.trim(), "value = \"1s 500ms\"");
    }
}
