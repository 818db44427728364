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

//! Documents persisted by the bridge.
//!
//! Every inbound message becomes exactly one [`SensorDocument`], stored in the
//! collection named after the message topic. Two shapes exist:
//!
//! - [`TimingDocument`] for the timing topics (`led_duration`, `fan_duration`,
//!   `sleep_duration`, `response_time`)
//! - [`GenericDocument`] for everything else (e.g. `notification`)
//!
//! # Examples
//!
//! ```rust
//! use wakeease_core::document::{SensorDocument, TimingDocument};
//! use bson::doc;
//!
//! let document = SensorDocument::Timing(TimingDocument {
//!     date: "2024-01-01".to_string(),
//!     time: "08:00:00".to_string(),
//!     timing: 8.56,
//! });
//!
//! assert!(document.is_timing());
//! assert_eq!(
//!     document.to_bson(),
//!     doc! { "date": "2024-01-01", "time": "08:00:00", "timing": 8.56 }
//! );
//! ```

use bson::{doc, Document};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document shape for the timing topics.
///
/// `date` and `time` are rendered in the configured local timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingDocument {
    /// Local calendar date of receipt, `YYYY-MM-DD`
    pub date: String,

    /// Local time of receipt, `HH:MM:SS`
    pub time: String,

    /// Numeric value extracted from the payload
    pub timing: f64,
}

/// Document shape for every non-timing topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericDocument {
    /// Local timestamp, `YYYY-MM-DDTHH:MM:SSZ`.
    ///
    /// The trailing `Z` is a literal suffix; the value is local time, not UTC.
    pub timestamp: String,

    /// Raw payload, unparsed
    pub data: String,
}

/// A document ready to be inserted into a per-topic collection.
///
/// Serializes untagged, so the stored record only carries the fields of the
/// inner shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorDocument {
    /// Timing topic document
    Timing(TimingDocument),

    /// Any other topic
    Generic(GenericDocument),
}

/// Which of the two shapes a [`SensorDocument`] has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// [`TimingDocument`]
    Timing,
    /// [`GenericDocument`]
    Generic,
}

impl DocumentKind {
    /// Returns the kind as a static string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timing => "timing",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SensorDocument {
    /// Returns the shape of this document.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> DocumentKind {
        match self {
            Self::Timing(_) => DocumentKind::Timing,
            Self::Generic(_) => DocumentKind::Generic,
        }
    }

    /// Returns true for a timing document.
    #[inline]
    #[must_use]
    pub const fn is_timing(&self) -> bool {
        matches!(self, Self::Timing(_))
    }

    /// Returns true for a generic document.
    #[inline]
    #[must_use]
    pub const fn is_generic(&self) -> bool {
        matches!(self, Self::Generic(_))
    }

    /// Returns the extracted timing value, if this is a timing document.
    #[must_use]
    pub fn timing(&self) -> Option<f64> {
        match self {
            Self::Timing(doc) => Some(doc.timing),
            Self::Generic(_) => None,
        }
    }

    /// Returns the raw payload, if this is a generic document.
    #[must_use]
    pub fn data(&self) -> Option<&str> {
        match self {
            Self::Timing(_) => None,
            Self::Generic(doc) => Some(&doc.data),
        }
    }

    /// Converts the document to BSON.
    ///
    /// Field order matches the stored layout: `date, time, timing` or
    /// `timestamp, data`. No `_id` is set; the store assigns one on insert.
    #[must_use]
    pub fn to_bson(&self) -> Document {
        Document::from(self)
    }
}

impl From<&SensorDocument> for Document {
    fn from(document: &SensorDocument) -> Self {
        match document {
            SensorDocument::Timing(t) => doc! {
                "date": &t.date,
                "time": &t.time,
                "timing": t.timing,
            },
            SensorDocument::Generic(g) => doc! {
                "timestamp": &g.timestamp,
                "data": &g.data,
            },
        }
    }
}

impl From<TimingDocument> for SensorDocument {
    fn from(document: TimingDocument) -> Self {
        Self::Timing(document)
    }
}

impl From<GenericDocument> for SensorDocument {
    fn from(document: GenericDocument) -> Self {
        Self::Generic(document)
    }
}
