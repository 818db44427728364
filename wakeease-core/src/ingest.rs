// Copyright 2025 WakeEase Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Topic-conditional payload parsing and document shaping.
//!
//! This is the only place where message content is interpreted. Everything here
//! is pure: no I/O, no shared state, one call per message.
//!
//! # Payload Format
//!
//! Timing topics carry an informal sentence such as
//! `"Button pressed after 8.56 seconds."`. The value is always the
//! second-to-last whitespace-separated token. Payloads that do not fit that
//! shape are rejected with a [`ParseError`]; there is no partial extraction.
//!
//! # Examples
//!
//! ```rust
//! use wakeease_core::ingest::{Ingestor, LocalClock};
//! use chrono::{TimeZone, Utc};
//!
//! let ingestor = Ingestor::new(LocalClock::new(chrono_tz::Asia::Kuala_Lumpur));
//! let received_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//!
//! let document = ingestor
//!     .ingest("led_duration", "Button pressed after 8.56 seconds.", received_at)
//!     .unwrap();
//! assert_eq!(document.timing(), Some(8.56));
//!
//! let document = ingestor.ingest("notification", "Wake up!", received_at).unwrap();
//! assert_eq!(document.data(), Some("Wake up!"));
//!
//! assert!(ingestor.ingest("response_time", "bad payload", received_at).is_err());
//! ```

use crate::document::{GenericDocument, SensorDocument, TimingDocument};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::num::ParseFloatError;
use std::str::Utf8Error;
use thiserror::Error;

/// Topic for free-form notifications.
pub const NOTIFICATION_TOPIC: &str = "notification";

/// Topics whose payloads encode a numeric duration.
pub const TIMING_TOPICS: [&str; 4] = [
    "led_duration",
    "fan_duration",
    "sleep_duration",
    "response_time",
];

/// Every topic the bridge subscribes to, in subscription order.
pub const SUBSCRIBED_TOPICS: [&str; 5] = [
    NOTIFICATION_TOPIC,
    "led_duration",
    "fan_duration",
    "sleep_duration",
    "response_time",
];

/// Timezone used when none is configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Kuala_Lumpur;

/// Errors raised while turning a payload into a document.
///
/// All variants are terminal for the message: it is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Fewer than two whitespace-separated tokens.
    #[error("Failed to parse timing from payload: {payload:?} (no value token)")]
    MissingValue {
        /// The offending payload
        payload: String,
    },

    /// The second-to-last token is not a number.
    #[error("Failed to parse timing from payload: {payload:?} ({token:?} is not a number)")]
    InvalidNumber {
        /// The offending payload
        payload: String,
        /// The token that failed to parse
        token: String,
        /// Underlying float parse error
        #[source]
        source: ParseFloatError,
    },

    /// The raw payload is not valid UTF-8.
    #[error("Payload on topic '{topic}' is not valid UTF-8")]
    InvalidUtf8 {
        /// Topic the payload arrived on
        topic: String,
        /// Underlying decode error
        #[source]
        source: Utf8Error,
    },
}

impl ParseError {
    /// Returns a short reason label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingValue { .. } => "missing_value",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::InvalidUtf8 { .. } => "invalid_utf8",
        }
    }
}

/// Returns true if `topic` is one of [`TIMING_TOPICS`].
#[inline]
#[must_use]
pub fn is_timing_topic(topic: &str) -> bool {
    TIMING_TOPICS.contains(&topic)
}

/// Extracts the timing value from a payload.
///
/// Splits on whitespace and parses the second-to-last token as `f64`.
///
/// # Errors
///
/// - [`ParseError::MissingValue`] if there are fewer than two tokens
/// - [`ParseError::InvalidNumber`] if the token is not a valid number
///
/// # Examples
///
/// ```rust
/// use wakeease_core::ingest::parse_timing;
///
/// assert_eq!(parse_timing("Fan ran for 120.5 seconds.").unwrap(), 120.5);
/// assert!(parse_timing("seconds.").is_err());
/// ```
pub fn parse_timing(payload: &str) -> Result<f64, ParseError> {
    let tokens: Vec<&str> = payload.split_whitespace().collect();

    let Some(token) = tokens.len().checked_sub(2).map(|i| tokens[i]) else {
        return Err(ParseError::MissingValue {
            payload: payload.to_string(),
        });
    };

    token
        .parse::<f64>()
        .map_err(|source| ParseError::InvalidNumber {
            payload: payload.to_string(),
            token: token.to_string(),
            source,
        })
}

/// Decodes a raw payload as strict UTF-8.
///
/// # Errors
///
/// Returns [`ParseError::InvalidUtf8`] if the bytes are not valid UTF-8.
pub fn decode_payload(topic: &str, payload: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(payload)
        .map(str::to_owned)
        .map_err(|source| ParseError::InvalidUtf8 {
            topic: topic.to_string(),
            source,
        })
}

/// Local date and time strings for one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStamp {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
}

impl LocalStamp {
    /// Returns `{date}T{time}Z`.
    ///
    /// The `Z` is kept for compatibility with stored data even though the
    /// value is local time.
    #[must_use]
    pub fn timestamp(&self) -> String {
        format!("{}T{}Z", self.date, self.time)
    }
}

/// Renders UTC instants in a fixed local timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    timezone: Tz,
}

impl LocalClock {
    /// Creates a clock for the given timezone.
    #[must_use]
    pub const fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Returns the configured timezone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Converts `instant` to local time and formats date and time.
    #[must_use]
    pub fn stamp(&self, instant: DateTime<Utc>) -> LocalStamp {
        let local = instant.with_timezone(&self.timezone);
        LocalStamp {
            date: local.format("%Y-%m-%d").to_string(),
            time: local.format("%H:%M:%S").to_string(),
        }
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

/// Turns `(topic, payload, received_at)` into a [`SensorDocument`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Ingestor {
    clock: LocalClock,
}

impl Ingestor {
    /// Creates an ingestor using `clock` for timestamps.
    #[must_use]
    pub const fn new(clock: LocalClock) -> Self {
        Self { clock }
    }

    /// Returns the clock used for timestamps.
    #[must_use]
    pub const fn clock(&self) -> &LocalClock {
        &self.clock
    }

    /// Builds the document for one message.
    ///
    /// Timing topics produce a [`TimingDocument`]; every other topic produces
    /// a [`GenericDocument`] holding the payload unmodified. Calling this twice
    /// with the same input yields two equal but independent documents.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if `topic` is a timing topic and the payload
    /// does not carry a number in second-to-last position.
    pub fn ingest(
        &self,
        topic: &str,
        payload: &str,
        received_at: DateTime<Utc>,
    ) -> Result<SensorDocument, ParseError> {
        let stamp = self.clock.stamp(received_at);

        if is_timing_topic(topic) {
            let timing = parse_timing(payload)?;
            return Ok(SensorDocument::Timing(TimingDocument {
                date: stamp.date,
                time: stamp.time,
                timing,
            }));
        }

        Ok(SensorDocument::Generic(GenericDocument {
            timestamp: stamp.timestamp(),
            data: payload.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_timing_sentence() {
        assert_eq!(
            parse_timing("Button pressed after 8.56 seconds.").unwrap(),
            8.56
        );
    }

    #[test]
    fn test_parse_timing_any_prefix() {
        assert_eq!(parse_timing("3 seconds.").unwrap(), 3.0);
        assert_eq!(parse_timing("a b c d e -0.25 seconds.").unwrap(), -0.25);
        assert_eq!(parse_timing("took 1e3 ms").unwrap(), 1000.0);
    }

    #[test]
    fn test_parse_timing_ignores_extra_whitespace() {
        assert_eq!(parse_timing("  slept   for\t42\nseconds.  ").unwrap(), 42.0);
    }

    #[test]
    fn test_parse_timing_missing_value() {
        for payload in ["", "   ", "seconds."] {
            let err = parse_timing(payload).unwrap_err();
            assert_eq!(
                err,
                ParseError::MissingValue {
                    payload: payload.to_string()
                }
            );
            assert_eq!(err.reason(), "missing_value");
        }
    }

    #[test]
    fn test_parse_timing_invalid_number() {
        let err = parse_timing("bad payload").unwrap_err();
        match &err {
            ParseError::InvalidNumber { payload, token, .. } => {
                assert_eq!(payload, "bad payload");
                assert_eq!(token, "bad");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.reason(), "invalid_number");
        assert!(err.to_string().contains("bad payload"));
    }

    #[test]
    fn test_parse_timing_value_must_be_second_to_last() {
        // Number in last position is not picked up.
        assert!(parse_timing("Button pressed after 8.56").is_err());
    }

    #[test]
    fn test_is_timing_topic() {
        for topic in TIMING_TOPICS {
            assert!(is_timing_topic(topic));
        }
        assert!(!is_timing_topic(NOTIFICATION_TOPIC));
        assert!(!is_timing_topic("LED_DURATION"));
        assert!(!is_timing_topic(""));
    }

    #[test]
    fn test_subscribed_topics_cover_timing_topics() {
        assert_eq!(SUBSCRIBED_TOPICS[0], NOTIFICATION_TOPIC);
        for topic in TIMING_TOPICS {
            assert!(SUBSCRIBED_TOPICS.contains(&topic));
        }
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload("notification", b"Wake up!").unwrap(), "Wake up!");

        let err = decode_payload("notification", &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidUtf8 { ref topic, .. } if topic == "notification"));
        assert_eq!(err.reason(), "invalid_utf8");
    }

    #[test]
    fn test_local_clock_uses_timezone() {
        let clock = LocalClock::new(chrono_tz::Asia::Kuala_Lumpur);
        let stamp = clock.stamp(new_year());
        assert_eq!(stamp.date, "2024-01-01");
        assert_eq!(stamp.time, "08:00:00");
        assert_eq!(stamp.timestamp(), "2024-01-01T08:00:00Z");
    }

    #[test]
    fn test_local_clock_crosses_date_boundary() {
        let clock = LocalClock::new(chrono_tz::America::New_York);
        let stamp = clock.stamp(new_year());
        assert_eq!(stamp.date, "2023-12-31");
        assert_eq!(stamp.time, "19:00:00");
    }

    #[test]
    fn test_default_clock() {
        assert_eq!(LocalClock::default().timezone(), DEFAULT_TIMEZONE);
    }

    #[test]
    fn test_ingest_timing_topic() {
        let ingestor = Ingestor::default();
        let document = ingestor
            .ingest("led_duration", "Button pressed after 8.56 seconds.", new_year())
            .unwrap();

        assert_eq!(
            document,
            SensorDocument::Timing(TimingDocument {
                date: "2024-01-01".to_string(),
                time: "08:00:00".to_string(),
                timing: 8.56,
            })
        );
    }

    #[test]
    fn test_ingest_generic_topic() {
        let ingestor = Ingestor::default();
        let document = ingestor.ingest("notification", "Wake up!", new_year()).unwrap();

        assert_eq!(
            document,
            SensorDocument::Generic(GenericDocument {
                timestamp: "2024-01-01T08:00:00Z".to_string(),
                data: "Wake up!".to_string(),
            })
        );
    }

    #[test]
    fn test_ingest_generic_never_parses() {
        let ingestor = Ingestor::default();
        for payload in ["", "bad payload", "  spaced  out  "] {
            let document = ingestor.ingest("some/other", payload, new_year()).unwrap();
            assert_eq!(document.data(), Some(payload));
        }
    }

    #[test]
    fn test_ingest_timing_parse_failure() {
        let ingestor = Ingestor::default();
        let err = ingestor
            .ingest("response_time", "bad payload", new_year())
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));
    }

    #[test]
    fn test_ingest_not_deduplicated() {
        let ingestor = Ingestor::default();
        let first = ingestor.ingest("notification", "ping", new_year()).unwrap();
        let second = ingestor.ingest("notification", "ping", new_year()).unwrap();
        assert_eq!(first, second);
    }
}
