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

//! WakeEase Core - MQTT to MongoDB bridge
//!
//! This crate contains everything the bridge does between receiving an MQTT
//! message and handing a document to storage.
//!
//! # Key Components
//!
//! - **Documents**: [`document`] defines the two stored document shapes
//! - **Ingestion**: [`ingest`] parses payloads and shapes documents (pure)
//! - **Sources**: [`source`] delivers inbound messages (MQTT or channel)
//! - **Sinks**: [`sink`] defines the storage trait and an in-memory mock
//! - **Bridge**: [`bridge`] runs the receive-ingest-insert loop
//! - **Metrics**: [`metrics`] counters and histograms for observability
//!
//! # Example
//!
//! ```rust
//! use wakeease_core::ingest::Ingestor;
//! use chrono::Utc;
//!
//! let ingestor = Ingestor::default();
//! let document = ingestor
//!     .ingest("fan_duration", "Fan ran for 12.5 seconds.", Utc::now())
//!     .unwrap();
//!
//! assert_eq!(document.timing(), Some(12.5));
//! ```

#![warn(clippy::all)]

pub mod bridge;
pub mod document;
pub mod ingest;
pub mod metrics;
pub mod sink;
pub mod source;

pub use bridge::{Bridge, BridgeConfig, BridgeError, BridgeStats, Outcome};
pub use document::{DocumentKind, GenericDocument, SensorDocument, TimingDocument};
pub use ingest::{Ingestor, LocalClock, ParseError};
pub use sink::{DocumentSink, MockSink, SinkError, SinkMetadata};
pub use source::{ChannelSource, InboundMessage, MessageSource, MqttConfig, MqttSource, SourceError};
