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

//! Message Bus sources.
//!
//! A [`MessageSource`] yields one [`InboundMessage`] at a time. Two
//! implementations are provided:
//!
//! - [`MqttSource`]: a `rumqttc` client subscribed to the WakeEase topics
//! - [`ChannelSource`]: an in-process channel, for tests and embedding
//!
//! # Subscription Flow
//!
//! ```text
//! ┌──────────────┐  CONNACK   ┌────────────┐  SUBSCRIBE (all topics, QoS 0)
//! │ MQTT broker  │──────────► │ MqttSource │──────────────────────────────►
//! └──────────────┘            └─────┬──────┘
//!        │ PUBLISH                  │ InboundMessage
//!        └─────────────────────────►▼
//!                             ┌────────────┐
//!                             │   Bridge   │
//!                             └────────────┘
//! ```
//!
//! The subscription is re-issued on every successful CONNACK, so a
//! reconnect (performed by `rumqttc` on the next poll after an error)
//! restores it without help from the caller.
//!
//! # Example
//!
//! ```rust,no_run
//! use wakeease_core::source::{MessageSource, MqttConfig, MqttSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MqttConfig::builder()
//!     .host("broker.local")
//!     .port(1883)
//!     .build()?;
//!
//! let mut source = MqttSource::new(config);
//! while let Some(message) = source.recv().await? {
//!     println!("{}: {:?}", message.topic, message.payload);
//! }
//! # Ok(())
//! # }
//! ```

use crate::ingest::SUBSCRIBED_TOPICS;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter,
    SubscribeReasonCode,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Errors that can occur while receiving messages.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The subscribe request could not be issued
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// Maximum reconnection attempts exceeded
    #[error("Max reconnection attempts ({0}) exceeded")]
    MaxReconnectAttemptsExceeded(u32),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SourceError {
    /// Returns the error category for logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "subscribe",
            Self::MaxReconnectAttemptsExceeded(_) => "max_retries",
            Self::Configuration(_) => "configuration",
        }
    }
}

/// A message delivered by the Message Bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String,

    /// Raw payload bytes
    pub payload: Vec<u8>,

    /// Instant the bridge received the message
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Creates a message stamped with the current time.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::with_received_at(topic, payload, Utc::now())
    }

    /// Creates a message with an explicit receipt time.
    pub fn with_received_at(
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at,
        }
    }
}

/// Delivers inbound messages one at a time.
#[async_trait]
pub trait MessageSource: Send {
    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` once the source is closed and no more messages
    /// will arrive.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the source fails permanently.
    async fn recv(&mut self) -> Result<Option<InboundMessage>, SourceError>;
}

/// Configuration for [`MqttSource`].
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker host name or address
    pub host: String,

    /// Broker port (1883, unencrypted)
    pub port: u16,

    /// MQTT client identifier
    pub client_id: String,

    /// Keep-alive interval
    pub keep_alive: Duration,

    /// Topics to subscribe to, all at QoS 0
    pub topics: Vec<String>,

    /// Start a clean session on every connect
    pub clean_session: bool,

    /// Capacity of the client request channel
    pub channel_capacity: usize,

    /// Initial reconnect backoff in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum reconnect backoff in milliseconds
    pub max_backoff_ms: u64,

    /// Maximum consecutive failed polls before giving up (0 = infinite)
    pub max_reconnect_attempts: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            client_id: "wakeease-bridge".to_string(),
            keep_alive: Duration::from_secs(60),
            topics: SUBSCRIBED_TOPICS.iter().map(ToString::to_string).collect(),
            clean_session: true,
            channel_capacity: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 30_000,
            max_reconnect_attempts: 0,
        }
    }
}

impl MqttConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> MqttConfigBuilder {
        MqttConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Configuration`] if:
    /// - `host` or `client_id` is empty
    /// - `topics` is empty
    /// - `channel_capacity` is 0
    /// - `keep_alive` is between zero and one second
    /// - `initial_backoff_ms` is 0 or larger than `max_backoff_ms`
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.host.is_empty() {
            return Err(SourceError::Configuration(
                "host cannot be empty".to_string(),
            ));
        }

        if self.client_id.is_empty() {
            return Err(SourceError::Configuration(
                "client_id cannot be empty".to_string(),
            ));
        }

        if self.topics.is_empty() {
            return Err(SourceError::Configuration(
                "at least one topic is required".to_string(),
            ));
        }

        if self.channel_capacity == 0 {
            return Err(SourceError::Configuration(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }

        // rumqttc panics on sub-second keep-alive values other than zero
        if !self.keep_alive.is_zero() && self.keep_alive < Duration::from_secs(1) {
            return Err(SourceError::Configuration(format!(
                "keep_alive ({:?}) must be zero or at least one second",
                self.keep_alive
            )));
        }

        if self.initial_backoff_ms == 0 {
            return Err(SourceError::Configuration(
                "initial_backoff_ms must be greater than 0".to_string(),
            ));
        }

        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(SourceError::Configuration(format!(
                "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }

        Ok(())
    }

    /// Exponential backoff for the given attempt: `initial_ms * 2^(attempt-1)`,
    /// capped at `max_backoff_ms`.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(63);
        let base_ms = self
            .initial_backoff_ms
            .saturating_mul(1_u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(base_ms)
    }

    /// Converts this config to `rumqttc` options.
    fn to_mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(self.clean_session);
        options
    }

    fn subscribe_filters(&self) -> Vec<SubscribeFilter> {
        self.topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtMostOnce))
            .collect()
    }
}

/// Builder for [`MqttConfig`].
#[derive(Debug, Default)]
pub struct MqttConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    client_id: Option<String>,
    keep_alive: Option<Duration>,
    topics: Option<Vec<String>>,
    clean_session: Option<bool>,
    channel_capacity: Option<usize>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
}

impl MqttConfigBuilder {
    /// Sets the broker host (required).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the client identifier (default: `wakeease-bridge`).
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the keep-alive interval (default: 60s).
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Overrides the subscribed topics.
    #[must_use]
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Sets whether to start a clean session (default: true).
    #[must_use]
    pub fn clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = Some(clean_session);
        self
    }

    /// Sets the client request channel capacity (default: 10).
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    /// Sets the initial reconnect backoff in milliseconds (default: 100).
    #[must_use]
    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = Some(ms);
        self
    }

    /// Sets the maximum reconnect backoff in milliseconds (default: 30000).
    #[must_use]
    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.max_backoff_ms = Some(ms);
        self
    }

    /// Sets the maximum consecutive failed polls (default: 0, retry forever).
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Configuration`] if the host is missing or any
    /// value is invalid.
    pub fn build(self) -> Result<MqttConfig, SourceError> {
        let defaults = MqttConfig::default();

        let host = self
            .host
            .ok_or_else(|| SourceError::Configuration("host is required".to_string()))?;

        let config = MqttConfig {
            host,
            port: self.port.unwrap_or(defaults.port),
            client_id: self.client_id.unwrap_or(defaults.client_id),
            keep_alive: self.keep_alive.unwrap_or(defaults.keep_alive),
            topics: self.topics.unwrap_or(defaults.topics),
            clean_session: self.clean_session.unwrap_or(defaults.clean_session),
            channel_capacity: self
                .channel_capacity
                .filter(|c| *c > 0)
                .unwrap_or(defaults.channel_capacity),
            initial_backoff_ms: self
                .initial_backoff_ms
                .unwrap_or(defaults.initial_backoff_ms),
            max_backoff_ms: self.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .unwrap_or(defaults.max_reconnect_attempts),
        };

        config.validate()?;
        Ok(config)
    }
}

/// MQTT subscriber backed by `rumqttc`.
///
/// The connection is established lazily by the first [`recv`](MessageSource::recv)
/// call and held until the source is dropped.
pub struct MqttSource {
    client: AsyncClient,
    eventloop: EventLoop,
    config: MqttConfig,
    failed_polls: u32,
}

impl MqttSource {
    /// Creates the client. No network I/O happens until the first `recv`.
    #[must_use]
    pub fn new(config: MqttConfig) -> Self {
        info!(
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            keep_alive = ?config.keep_alive,
            "Creating MQTT source"
        );

        let (client, eventloop) =
            AsyncClient::new(config.to_mqtt_options(), config.channel_capacity);

        Self {
            client,
            eventloop,
            config,
            failed_polls: 0,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    /// Subscribes to every configured topic in a single request.
    fn subscribe_all(&self) -> Result<(), SourceError> {
        self.client
            .try_subscribe_many(self.config.subscribe_filters())
            .map_err(|e| SourceError::Subscribe(e.to_string()))?;

        info!(topics = ?self.config.topics, "Subscribed to topics");
        Ok(())
    }

    /// Records a failed poll and sleeps for the backoff period.
    async fn backoff(&mut self, err: rumqttc::ConnectionError) -> Result<(), SourceError> {
        self.failed_polls = self.failed_polls.saturating_add(1);

        let max = self.config.max_reconnect_attempts;
        if max > 0 && self.failed_polls > max {
            error!(attempts = self.failed_polls, error = %err, "Giving up on MQTT broker");
            return Err(SourceError::MaxReconnectAttemptsExceeded(max));
        }

        let delay = self.config.calculate_backoff(self.failed_polls);
        if let rumqttc::ConnectionError::ConnectionRefused(code) = &err {
            // rumqttc reports a non-success CONNACK here; no subscription is sent
            warn!(
                attempt = self.failed_polls,
                delay_ms = delay.as_millis(),
                code = ?code,
                "MQTT broker refused connection, reconnecting"
            );
        } else {
            warn!(
                attempt = self.failed_polls,
                delay_ms = delay.as_millis(),
                error = %err,
                "MQTT connection error, reconnecting"
            );
        }
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

#[async_trait]
impl MessageSource for MqttSource {
    async fn recv(&mut self) -> Result<Option<InboundMessage>, SourceError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        info!(
                            host = %self.config.host,
                            session_present = ack.session_present,
                            "Successfully connected to MQTT broker"
                        );
                        self.failed_polls = 0;
                        self.subscribe_all()?;
                    } else {
                        warn!(code = ?ack.code, "MQTT broker refused connection");
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    let rejected = ack
                        .return_codes
                        .iter()
                        .filter(|code| matches!(code, SubscribeReasonCode::Failure))
                        .count();
                    if rejected > 0 {
                        warn!(rejected, "Broker rejected some topic subscriptions");
                    } else {
                        debug!(pkid = ack.pkid, "Subscription acknowledged");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(Some(InboundMessage::new(
                        publish.topic,
                        publish.payload.to_vec(),
                    )));
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("MQTT broker sent DISCONNECT");
                }
                Ok(_) => {}
                Err(e) => self.backoff(e).await?,
            }
        }
    }
}

/// Channel-backed source for tests and in-process producers.
///
/// # Examples
///
/// ```rust
/// use wakeease_core::source::{ChannelSource, InboundMessage, MessageSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (tx, mut source) = ChannelSource::new(8);
/// tx.send(InboundMessage::new("notification", "Wake up!")).await?;
/// drop(tx);
///
/// let message = source.recv().await?.unwrap();
/// assert_eq!(message.topic, "notification");
/// assert!(source.recv().await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<InboundMessage>,
}

impl ChannelSource {
    /// Creates a bounded channel and returns its sending half with the source.
    #[must_use]
    pub fn new(capacity: usize) -> (mpsc::Sender<InboundMessage>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self { receiver })
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn recv(&mut self) -> Result<Option<InboundMessage>, SourceError> {
        Ok(self.receiver.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MqttConfig::default();
        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive, Duration::from_secs(60));
        assert_eq!(config.client_id, "wakeease-bridge");
        assert_eq!(
            config.topics,
            vec![
                "notification",
                "led_duration",
                "fan_duration",
                "sleep_duration",
                "response_time"
            ]
        );
        assert_eq!(config.max_reconnect_attempts, 0);
    }

    #[test]
    fn test_config_builder() {
        let config = MqttConfig::builder()
            .host("10.0.0.5")
            .port(1884)
            .client_id("bridge-2")
            .keep_alive(Duration::from_secs(30))
            .max_reconnect_attempts(3)
            .build()
            .unwrap();

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 1884);
        assert_eq!(config.client_id, "bridge-2");
        assert_eq!(config.keep_alive, Duration::from_secs(30));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.topics.len(), 5);
    }

    #[test]
    fn test_config_requires_host() {
        let err = MqttConfig::builder().build().unwrap_err();
        assert!(matches!(err, SourceError::Configuration(_)));

        let err = MqttConfig::builder().host("").build().unwrap_err();
        assert!(err.to_string().contains("host cannot be empty"));
    }

    #[test]
    fn test_config_rejects_empty_topics() {
        let err = MqttConfig::builder()
            .host("localhost")
            .topics(vec![])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("topic"));
    }

    #[test]
    fn test_config_rejects_bad_backoff() {
        assert!(MqttConfig::builder()
            .host("localhost")
            .initial_backoff_ms(0)
            .build()
            .is_err());

        assert!(MqttConfig::builder()
            .host("localhost")
            .initial_backoff_ms(5_000)
            .max_backoff_ms(1_000)
            .build()
            .is_err());
    }

    #[test]
    fn test_zero_channel_capacity_falls_back_to_default() {
        let config = MqttConfig::builder()
            .host("localhost")
            .channel_capacity(0)
            .build()
            .unwrap();
        assert_eq!(config.channel_capacity, 10);
    }

    #[test]
    fn test_validate_rejects_zero_channel_capacity() {
        let config = MqttConfig {
            host: "localhost".to_string(),
            channel_capacity: 0,
            ..MqttConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, SourceError::Configuration(_)));
        assert!(err.to_string().contains("channel_capacity"));
    }

    #[test]
    fn test_calculate_backoff() {
        let config = MqttConfig::builder()
            .host("localhost")
            .initial_backoff_ms(100)
            .max_backoff_ms(1_000)
            .build()
            .unwrap();

        assert_eq!(config.calculate_backoff(1), Duration::from_millis(100));
        assert_eq!(config.calculate_backoff(2), Duration::from_millis(200));
        assert_eq!(config.calculate_backoff(3), Duration::from_millis(400));
        assert_eq!(config.calculate_backoff(5), Duration::from_millis(1_000));
        assert_eq!(config.calculate_backoff(200), Duration::from_millis(1_000));
    }

    #[test]
    fn test_subscribe_filters_use_qos0() {
        let config = MqttConfig::builder().host("localhost").build().unwrap();
        let filters = config.subscribe_filters();
        assert_eq!(filters.len(), 5);
        assert!(filters.iter().all(|f| f.qos == QoS::AtMostOnce));
        assert_eq!(filters[0].path, "notification");
    }

    #[test]
    fn test_inbound_message_constructors() {
        let at = Utc::now();
        let message = InboundMessage::with_received_at("led_duration", "x 1 s", at);
        assert_eq!(message.topic, "led_duration");
        assert_eq!(message.payload, b"x 1 s".to_vec());
        assert_eq!(message.received_at, at);
    }

    #[tokio::test]
    async fn test_channel_source_preserves_order() {
        let (tx, mut source) = ChannelSource::new(4);
        tx.send(InboundMessage::new("a", "1")).await.unwrap();
        tx.send(InboundMessage::new("b", "2")).await.unwrap();
        drop(tx);

        assert_eq!(source.recv().await.unwrap().unwrap().topic, "a");
        assert_eq!(source.recv().await.unwrap().unwrap().topic, "b");
        assert!(source.recv().await.unwrap().is_none());
    }

    #[test]
    fn test_source_error_category() {
        assert_eq!(
            SourceError::MaxReconnectAttemptsExceeded(3).category(),
            "max_retries"
        );
        assert_eq!(SourceError::Subscribe("x".into()).category(), "subscribe");
        assert_eq!(
            SourceError::MaxReconnectAttemptsExceeded(3).to_string(),
            "Max reconnection attempts (3) exceeded"
        );
    }
}
