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

//! The connect-subscribe-insert loop.
//!
//! A [`Bridge`] owns one [`MessageSource`] and one [`DocumentSink`] and moves
//! messages between them one at a time:
//!
//! ```text
//! MessageSource ──► decode ──► Ingestor::ingest ──► DocumentSink::insert(topic, doc)
//!                     │               │
//!                     └── ParseError ─┴──► warn + drop, continue with next message
//! ```
//!
//! There is no batching, retry or buffering. A parse failure drops the message;
//! a sink failure stops the bridge and is returned to the caller.
//!
//! # Example
//!
//! ```rust
//! use wakeease_core::bridge::{Bridge, BridgeConfig};
//! use wakeease_core::sink::MockSink;
//! use wakeease_core::source::{ChannelSource, InboundMessage};
//! use tokio::sync::broadcast;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::builder()
//!     .timezone_name("Asia/Kuala_Lumpur")
//!     .build()?;
//!
//! let (tx, source) = ChannelSource::new(16);
//! let mut bridge = Bridge::new(config, source, MockSink::new());
//!
//! tx.send(InboundMessage::new("led_duration", "Button pressed after 8.56 seconds.")).await?;
//! drop(tx);
//!
//! let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//! bridge.run(shutdown_rx).await?;
//!
//! assert_eq!(bridge.sink().collection("led_duration").len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::document::DocumentKind;
use crate::document::SensorDocument;
use crate::ingest::{decode_payload, Ingestor, LocalClock, ParseError, DEFAULT_TIMEZONE};
use crate::metrics::{self, BridgeStatus, Timer};
use crate::sink::{DocumentSink, SinkError, SinkMetadata};
use crate::source::{InboundMessage, MessageSource, SourceError};
use chrono_tz::Tz;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Timezone used for document dates and times
    pub timezone: Tz,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
        }
    }
}

impl BridgeConfig {
    /// Creates a new builder for `BridgeConfig`.
    #[must_use]
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }
}

/// Builder for `BridgeConfig`.
#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    timezone: Option<Tz>,
    timezone_name: Option<String>,
}

impl BridgeConfigBuilder {
    /// Sets the timezone.
    #[must_use]
    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    /// Sets the timezone from an IANA identifier such as `Asia/Kuala_Lumpur`.
    ///
    /// Takes precedence over [`timezone`](Self::timezone).
    #[must_use]
    pub fn timezone_name(mut self, name: impl Into<String>) -> Self {
        self.timezone_name = Some(name.into());
        self
    }

    /// Builds the `BridgeConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the timezone name is unknown.
    pub fn build(self) -> Result<BridgeConfig, BridgeError> {
        let timezone = match self.timezone_name {
            Some(name) => name.parse::<Tz>().map_err(|e| {
                BridgeError::Configuration(format!("invalid timezone '{name}': {e}"))
            })?,
            None => self.timezone.unwrap_or(DEFAULT_TIMEZONE),
        };

        Ok(BridgeConfig { timezone })
    }
}

/// Bridge statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Messages delivered by the source
    pub messages_received: u64,

    /// Documents inserted into the sink
    pub documents_inserted: u64,

    /// Messages dropped because their payload did not parse
    pub parse_failures: u64,
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A document was inserted into `collection`.
    Inserted {
        /// Collection the document was written to
        collection: String,
        /// Shape of the inserted document
        kind: DocumentKind,
    },

    /// The payload did not parse; nothing was inserted.
    Dropped(ParseError),
}

/// Moves messages from a source to a sink.
pub struct Bridge<S: MessageSource, K: DocumentSink> {
    source: S,
    sink: K,
    sink_metadata: SinkMetadata,
    ingestor: Ingestor,
    stats: BridgeStats,
}

impl<S: MessageSource, K: DocumentSink> Bridge<S, K> {
    /// Creates a bridge. Both handles are owned for the bridge's lifetime.
    pub fn new(config: BridgeConfig, source: S, sink: K) -> Self {
        let sink_metadata = sink.metadata();

        info!(
            timezone = %config.timezone,
            sink = %sink_metadata.name,
            "Creating bridge"
        );

        Self {
            source,
            sink,
            sink_metadata,
            ingestor: Ingestor::new(LocalClock::new(config.timezone)),
            stats: BridgeStats::default(),
        }
    }

    /// Processes a single message: decode, build the document, insert it.
    ///
    /// Parse failures are logged, counted and reported as
    /// [`Outcome::Dropped`]; they are not errors.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Sink`] if the insert fails.
    #[instrument(skip(self, message), fields(topic = %message.topic))]
    pub async fn handle_message(
        &mut self,
        message: &InboundMessage,
    ) -> Result<Outcome, BridgeError> {
        self.stats.messages_received += 1;
        metrics::increment_messages_received(&message.topic);

        let payload = match decode_payload(&message.topic, &message.payload) {
            Ok(payload) => payload,
            Err(e) => return Ok(self.drop_message(&message.topic, e)),
        };

        info!(payload = %payload, "Received message");

        let document = match self
            .ingestor
            .ingest(&message.topic, &payload, message.received_at)
        {
            Ok(document) => document,
            Err(e) => return Ok(self.drop_message(&message.topic, e)),
        };

        self.insert(&message.topic, &document).await?;

        Ok(Outcome::Inserted {
            collection: message.topic.clone(),
            kind: document.kind(),
        })
    }

    fn drop_message(&mut self, topic: &str, err: ParseError) -> Outcome {
        warn!(error = %err, "Dropping message");
        self.stats.parse_failures += 1;
        metrics::increment_parse_failures(topic, err.reason());
        Outcome::Dropped(err)
    }

    async fn insert(
        &mut self,
        collection: &str,
        document: &SensorDocument,
    ) -> Result<(), BridgeError> {
        let result = {
            let _timer = Timer::new(self.sink_metadata.sink_type.as_str(), |duration, sink_type| {
                metrics::record_sink_write_duration(duration, sink_type);
            });
            self.sink.insert(collection, document).await
        };

        if let Err(e) = result {
            error!(
                collection,
                error = %e,
                category = e.category(),
                retryable = e.is_retryable(),
                "Failed to insert document"
            );
            metrics::increment_sink_errors(&self.sink_metadata.sink_type, e.category());
            return Err(BridgeError::Sink(e));
        }

        self.stats.documents_inserted += 1;
        metrics::increment_documents_inserted(collection, document.kind().as_str());
        info!(
            collection,
            kind = %document.kind(),
            sink = %self.sink_metadata.name,
            "Document inserted"
        );

        Ok(())
    }

    /// Runs until shutdown, source exhaustion, or a fatal error.
    ///
    /// Messages are handled strictly one after another. The sink is closed
    /// before returning in every case. If every shutdown sender is dropped
    /// the bridge keeps running until the source ends.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Source`] if the source fails permanently and
    /// [`BridgeError::Sink`] if an insert fails.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), BridgeError> {
        info!("Bridge event loop started");
        metrics::set_bridge_status(BridgeStatus::Running);

        let mut shutdown_open = true;

        let result = loop {
            tokio::select! {
                signal = shutdown_rx.recv(), if shutdown_open => {
                    if let Err(broadcast::error::RecvError::Closed) = signal {
                        // No sender left, so no shutdown can be requested
                        warn!("Shutdown channel closed, running until the source ends");
                        shutdown_open = false;
                        continue;
                    }
                    info!("Received shutdown signal");
                    break Ok(());
                }

                next = self.source.recv() => {
                    match next {
                        Ok(Some(message)) => {
                            if let Err(e) = self.handle_message(&message).await {
                                break Err(e);
                            }
                        }
                        Ok(None) => {
                            warn!("Message source closed");
                            break Ok(());
                        }
                        Err(e) => {
                            error!(error = %e, category = e.category(), "Message source failed");
                            break Err(BridgeError::Source(e));
                        }
                    }
                }
            }
        };

        if let Err(e) = self.sink.close().await {
            warn!(error = %e, "Failed to close sink");
        }

        metrics::set_bridge_status(if result.is_ok() {
            BridgeStatus::Stopped
        } else {
            BridgeStatus::Error
        });

        info!(
            messages_received = self.stats.messages_received,
            documents_inserted = self.stats.documents_inserted,
            parse_failures = self.stats.parse_failures,
            "Bridge stopped"
        );
        debug!(?result, "Bridge exit result");

        result
    }

    /// Returns the current statistics.
    #[must_use]
    pub const fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Returns the sink.
    #[must_use]
    pub const fn sink(&self) -> &K {
        &self.sink
    }
}

/// Bridge errors.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Sink write failed
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Message source failed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}
