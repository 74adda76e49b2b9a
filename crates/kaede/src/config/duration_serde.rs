//! Common serde utilities for human-readable durations across configuration.

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
                    "a duration as seconds (number) or human-readable string (e.g., '10s', '3m', '1h30m')",
                )
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            // TOML integers arrive as i64
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

/// Signed offsets in whole seconds, written either as a number or as a
/// human-readable string with an optional leading `-` (e.g. `"3m"`, `"-30s"`).
pub mod signed_seconds {
    use super::*;

    pub fn serialize<S>(seconds: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = humantime::format_duration(Duration::from_secs(seconds.unsigned_abs()));
        if *seconds < 0 {
            serializer.serialize_str(&format!("-{formatted}"))
        } else {
            serializer.serialize_str(&formatted.to_string())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SignedSecondsVisitor;

        impl<'de> Visitor<'de> for SignedSecondsVisitor {
            type Value = i64;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an offset as seconds (number) or a string such as '3m' or '-30s'")
            }

            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(seconds)
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                i64::try_from(seconds)
                    .map_err(|_| de::Error::custom(format!("Offset {seconds} is too large")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let (sign, magnitude) = match value.trim().strip_prefix('-') {
                    Some(rest) => (-1, rest),
                    None => (1, value.trim().trim_start_matches('+')),
                };
                let duration = humantime::parse_duration(magnitude)
                    .map_err(|e| de::Error::custom(format!("Invalid offset '{value}': {e}")))?;
                i64::try_from(duration.as_secs())
                    .map(|secs| sign * secs)
                    .map_err(|_| de::Error::custom(format!("Offset '{value}' is too large")))
            }
        }

        deserializer.deserialize_any(SignedSecondsVisitor)
    }
}
