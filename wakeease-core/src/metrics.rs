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

//! Metrics instrumentation for the bridge.
//!
//! Uses the `metrics` crate facade; nothing is recorded unless the binary
//! installs a recorder (e.g. the Prometheus exporter).
//!
//! # Naming Conventions
//!
//! All metrics follow Prometheus naming conventions:
//! - Prefix with application name (wakeease\_)
//! - Include unit suffix (\_seconds, \_total)
//! - Counter metrics end with \_total
//!
//! # Labels
//!
//! - **topic** / **collection**: one of the subscribed topics (very low cardinality)
//! - **kind**: `timing` or `generic`
//! - **reason**: parse failure reason
//! - **sink\_type**: sink identifier such as `mongodb`
//!
//! Payloads and timestamps are never used as labels.
//!
//! # Examples
//!
//! ```rust
//! use wakeease_core::metrics;
//!
//! metrics::increment_messages_received("notification");
//! metrics::increment_parse_failures("response_time", "invalid_number");
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric name prefix for all WakeEase metrics.
#[doc(hidden)]
pub const METRIC_PREFIX: &str = "wakeease";

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Total number of messages delivered by the Message Bus.
///
/// Type: Counter
/// Labels: topic
#[doc(hidden)]
pub const MESSAGES_RECEIVED_TOTAL: &str = "wakeease_messages_received_total";

/// Total number of documents inserted into the sink.
///
/// Type: Counter
/// Labels: collection, kind
#[doc(hidden)]
pub const DOCUMENTS_INSERTED_TOTAL: &str = "wakeease_documents_inserted_total";

/// Total number of messages dropped because their payload did not parse.
///
/// Type: Counter
/// Labels: topic, reason
#[doc(hidden)]
pub const PARSE_FAILURES_TOTAL: &str = "wakeease_parse_failures_total";

/// Total number of failed sink writes.
///
/// Type: Counter
/// Labels: sink_type, error_type
const SINK_WRITE_ERRORS_TOTAL: &str = "wakeease_sink_write_errors_total";

/// Time taken for a single sink insert.
///
/// Type: Histogram
/// Labels: sink_type
/// Unit: seconds
#[doc(hidden)]
pub const SINK_WRITE_DURATION_SECONDS: &str = "wakeease_sink_write_duration_seconds";

/// Current bridge status (0=stopped, 1=running, 2=error).
///
/// Type: Gauge
const BRIDGE_STATUS: &str = "wakeease_bridge_status";

// ============================================================================
// Initialization
// ============================================================================

/// Registers metric descriptions.
///
/// Call once at startup, after installing a recorder.
pub fn init_metrics() {
    describe_counter!(
        MESSAGES_RECEIVED_TOTAL,
        "Total number of messages received from the MQTT broker"
    );

    describe_counter!(
        DOCUMENTS_INSERTED_TOTAL,
        "Total number of documents inserted into per-topic collections"
    );

    describe_counter!(
        PARSE_FAILURES_TOTAL,
        "Total number of messages dropped because the payload could not be parsed"
    );

    describe_counter!(
        SINK_WRITE_ERRORS_TOTAL,
        "Total number of failed sink inserts"
    );

    describe_histogram!(
        SINK_WRITE_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time taken for a single sink insert"
    );

    describe_gauge!(
        BRIDGE_STATUS,
        "Current bridge status: 0=stopped, 1=running, 2=error"
    );
}

// ============================================================================
// Counter Metrics
// ============================================================================

/// Increments the count of received messages.
pub fn increment_messages_received(topic: &str) {
    counter!(MESSAGES_RECEIVED_TOTAL, "topic" => topic.to_string()).increment(1);
}

/// Increments the count of inserted documents.
///
/// # Arguments
///
/// * `collection` - Collection the document was inserted into
/// * `kind` - Document shape, `"timing"` or `"generic"`
pub fn increment_documents_inserted(collection: &str, kind: &'static str) {
    counter!(DOCUMENTS_INSERTED_TOTAL, "collection" => collection.to_string(), "kind" => kind)
        .increment(1);
}

/// Increments the count of dropped, unparsable messages.
pub fn increment_parse_failures(topic: &str, reason: &'static str) {
    counter!(PARSE_FAILURES_TOTAL, "topic" => topic.to_string(), "reason" => reason).increment(1);
}

/// Increments the count of sink write errors.
pub fn increment_sink_errors(sink_type: &str, error_type: &'static str) {
    counter!(
        SINK_WRITE_ERRORS_TOTAL,
        "sink_type" => sink_type.to_string(),
        "error_type" => error_type
    )
    .increment(1);
}

// ============================================================================
// Histogram Metrics
// ============================================================================

/// Records the duration of a sink insert.
///
/// # Examples
///
/// ```rust
/// use wakeease_core::metrics;
/// use std::time::Instant;
///
/// let start = Instant::now();
/// // ... insert ...
/// metrics::record_sink_write_duration(start.elapsed(), "mongodb");
/// ```
pub fn record_sink_write_duration(duration: Duration, sink_type: &str) {
    histogram!(SINK_WRITE_DURATION_SECONDS, "sink_type" => sink_type.to_string())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Gauge Metrics
// ============================================================================

/// Sets the bridge status gauge.
pub fn set_bridge_status(status: BridgeStatus) {
    gauge!(BRIDGE_STATUS).set(f64::from(status as u8));
}

/// Bridge status values for the status gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BridgeStatus {
    /// Bridge is stopped.
    Stopped = 0,
    /// Bridge is running normally.
    Running = 1,
    /// Bridge stopped because of a fatal error.
    Error = 2,
}

// ============================================================================
// Metric Helper Utilities
// ============================================================================

/// Records the elapsed time through a callback when dropped.
///
/// # Examples
///
/// ```rust
/// use wakeease_core::metrics::{self, Timer};
///
/// {
///     let _timer = Timer::new("mongodb", |duration, sink_type| {
///         metrics::record_sink_write_duration(duration, sink_type);
///     });
///     // ... insert ...
/// }
/// ```
pub struct Timer<F>
where
    F: FnOnce(Duration, &str),
{
    start: std::time::Instant,
    label: String,
    record_fn: Option<F>,
}

impl<F> Timer<F>
where
    F: FnOnce(Duration, &str),
{
    /// Creates a new timer that will record the duration when dropped.
    pub fn new(label: impl Into<String>, record_fn: F) -> Self {
        Self {
            start: std::time::Instant::now(),
            label: label.into(),
            record_fn: Some(record_fn),
        }
    }
}

impl<F> Drop for Timer<F>
where
    F: FnOnce(Duration, &str),
{
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        if let Some(record_fn) = self.record_fn.take() {
            record_fn(duration, &self.label);
        }
    }
}
