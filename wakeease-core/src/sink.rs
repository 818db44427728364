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

//! Storage Sink trait and error types.
//!
//! A [`DocumentSink`] is the last stage of the bridge: it receives one
//! [`SensorDocument`] per message and stores it in the collection named after
//! the message topic. Sinks are append-only; nothing is ever updated or deleted.
//!
//! # Implementing a Sink
//!
//! ```rust
//! use wakeease_core::document::SensorDocument;
//! use wakeease_core::sink::{DocumentSink, SinkError, SinkMetadata};
//! use async_trait::async_trait;
//!
//! /// Prints documents instead of storing them.
//! struct ConsoleSink;
//!
//! #[async_trait]
//! impl DocumentSink for ConsoleSink {
//!     async fn insert(
//!         &mut self,
//!         collection: &str,
//!         document: &SensorDocument,
//!     ) -> Result<(), SinkError> {
//!         println!("{collection}: {document:?}");
//!         Ok(())
//!     }
//!
//!     fn metadata(&self) -> SinkMetadata {
//!         SinkMetadata::new("Console", "console")
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! [`SinkError`] classifies failures so callers can decide what to do:
//! - [`SinkError::ConnectionError`]: network failures (retryable)
//! - [`SinkError::SerializationError`]: document could not be encoded (non-retryable)
//! - [`SinkError::WriteError`]: the store rejected the write (may be retryable)
//! - [`SinkError::ConfigurationError`]: invalid configuration (non-retryable)
//!
//! The bridge itself never retries; any sink error stops it.

use crate::document::SensorDocument;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when writing to a sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Connection to the store failed.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Human-readable error message
        message: String,
        /// The underlying connection error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The document could not be encoded for the store.
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
        /// The underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The store rejected the write.
    #[error("Write error: {message}")]
    WriteError {
        /// Human-readable error message
        message: String,
        /// Whether this specific write error is retryable
        retryable: bool,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid sink configuration.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Human-readable error message
        message: String,
        /// Configuration parameter name if applicable
        parameter: Option<String>,
    },
}

impl SinkError {
    /// Creates a connection error from any error type.
    #[must_use]
    pub fn connection(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::ConnectionError {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a serialization error from any error type.
    #[must_use]
    pub fn serialization(
        source: impl std::error::Error + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a write error with retryability information.
    #[must_use]
    pub fn write(source: impl std::error::Error + Send + Sync + 'static, retryable: bool) -> Self {
        Self::WriteError {
            message: source.to_string(),
            retryable,
            source: Some(Box::new(source)),
        }
    }

    /// Creates a write error with a custom message.
    #[must_use]
    pub fn write_msg(message: impl Into<String>, retryable: bool) -> Self {
        Self::WriteError {
            message: message.into(),
            retryable,
            source: None,
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>, parameter: Option<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            parameter,
        }
    }

    /// Returns whether this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError { .. } => true,
            Self::SerializationError { .. } | Self::ConfigurationError { .. } => false,
            Self::WriteError { retryable, .. } => *retryable,
        }
    }

    /// Returns the error category for metrics and logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::ConnectionError { .. } => "connection",
            Self::SerializationError { .. } => "serialization",
            Self::WriteError { .. } => "write",
            Self::ConfigurationError { .. } => "configuration",
        }
    }
}

/// Describes a sink for logs and metric labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkMetadata {
    /// Human-readable sink name (e.g., "`MongoDB`")
    pub name: String,

    /// Sink type identifier (e.g., "mongodb")
    pub sink_type: String,
}

impl SinkMetadata {
    /// Creates new metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, sink_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink_type: sink_type.into(),
        }
    }
}

/// A store that accepts one document per message.
///
/// Implementations must be `Send` so the bridge can run on any tokio worker.
/// They need not be `Sync`: the bridge owns its sink exclusively.
#[async_trait]
pub trait DocumentSink: Send {
    /// Inserts a single document into `collection`.
    ///
    /// Exactly one insert is issued per call. There is no deduplication:
    /// inserting the same document twice stores it twice.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the store cannot be reached or rejects the write.
    async fn insert(&mut self, collection: &str, document: &SensorDocument)
        -> Result<(), SinkError>;

    /// Releases resources held by the sink.
    ///
    /// The default implementation does nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if shutdown fails.
    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Returns metadata describing this sink.
    fn metadata(&self) -> SinkMetadata;
}

#[async_trait]
impl<T: DocumentSink + ?Sized> DocumentSink for Box<T> {
    async fn insert(
        &mut self,
        collection: &str,
        document: &SensorDocument,
    ) -> Result<(), SinkError> {
        (**self).insert(collection, document).await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        (**self).close().await
    }

    fn metadata(&self) -> SinkMetadata {
        (**self).metadata()
    }
}

/// An in-memory sink for tests.
///
/// Records every `(collection, document)` pair in insertion order.
///
/// # Examples
///
/// ```rust
/// use wakeease_core::document::{GenericDocument, SensorDocument};
/// use wakeease_core::sink::{DocumentSink, MockSink};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut sink = MockSink::new();
/// let document = SensorDocument::Generic(GenericDocument {
///     timestamp: "2024-01-01T08:00:00Z".to_string(),
///     data: "Wake up!".to_string(),
/// });
///
/// sink.insert("notification", &document).await?;
///
/// assert_eq!(sink.total_inserted(), 1);
/// assert_eq!(sink.collection("notification").len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockSink {
    /// Every insert, in order
    inserted: Vec<(String, SensorDocument)>,
    /// Number of times close was called
    close_count: usize,
    /// Whether to simulate failures
    fail_writes: bool,
}

impl MockSink {
    /// Creates a new mock sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mock to fail all inserts.
    #[must_use]
    pub const fn with_write_failures(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Returns every insert, in order.
    #[must_use]
    pub fn inserted(&self) -> &[(String, SensorDocument)] {
        &self.inserted
    }

    /// Returns the documents inserted into `collection`, in order.
    #[must_use]
    pub fn collection(&self, collection: &str) -> Vec<&SensorDocument> {
        self.inserted
            .iter()
            .filter(|(name, _)| name == collection)
            .map(|(_, document)| document)
            .collect()
    }

    /// Returns the total number of documents inserted.
    #[must_use]
    pub fn total_inserted(&self) -> usize {
        self.inserted.len()
    }

    /// Returns the number of times close was called.
    #[must_use]
    pub const fn close_count(&self) -> usize {
        self.close_count
    }
}

#[async_trait]
impl DocumentSink for MockSink {
    async fn insert(
        &mut self,
        collection: &str,
        document: &SensorDocument,
    ) -> Result<(), SinkError> {
        if self.fail_writes {
            return Err(SinkError::write_msg("Simulated write failure", true));
        }

        self.inserted
            .push((collection.to_string(), document.clone()));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.close_count += 1;
        Ok(())
    }

    fn metadata(&self) -> SinkMetadata {
        SinkMetadata::new("MockSink", "mock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{GenericDocument, TimingDocument};

    fn timing_document(timing: f64) -> SensorDocument {
        SensorDocument::Timing(TimingDocument {
            date: "2024-01-01".to_string(),
            time: "08:00:00".to_string(),
            timing,
        })
    }

    fn generic_document(data: &str) -> SensorDocument {
        SensorDocument::Generic(GenericDocument {
            timestamp: "2024-01-01T08:00:00Z".to_string(),
            data: data.to_string(),
        })
    }

    #[tokio::test]
    async fn test_mock_sink_insert() {
        let mut sink = MockSink::new();

        sink.insert("led_duration", &timing_document(8.56))
            .await
            .unwrap();
        sink.insert("notification", &generic_document("Wake up!"))
            .await
            .unwrap();

        assert_eq!(sink.total_inserted(), 2);
        assert_eq!(sink.collection("led_duration").len(), 1);
        assert_eq!(sink.collection("notification").len(), 1);
        assert!(sink.collection("fan_duration").is_empty());
        assert_eq!(sink.inserted()[0].0, "led_duration");
    }

    #[tokio::test]
    async fn test_mock_sink_keeps_duplicates() {
        let mut sink = MockSink::new();
        let document = generic_document("ping");

        sink.insert("notification", &document).await.unwrap();
        sink.insert("notification", &document).await.unwrap();

        assert_eq!(sink.collection("notification").len(), 2);
    }

    #[tokio::test]
    async fn test_mock_sink_write_failures() {
        let mut sink = MockSink::new().with_write_failures();

        let err = sink
            .insert("notification", &generic_document("x"))
            .await
            .unwrap_err();

        assert!(matches!(err, SinkError::WriteError { .. }));
        assert!(err.is_retryable());
        assert_eq!(sink.total_inserted(), 0);
    }

    #[tokio::test]
    async fn test_mock_sink_close_keeps_documents() {
        let mut sink = MockSink::new();
        sink.insert("notification", &generic_document("x"))
            .await
            .unwrap();
        sink.close().await.unwrap();
        assert_eq!(sink.close_count(), 1);

        assert_eq!(sink.total_inserted(), 1);
    }

    #[tokio::test]
    async fn test_boxed_sink_delegates() {
        let mut sink: Box<dyn DocumentSink> = Box::new(MockSink::new());
        sink.insert("notification", &generic_document("x"))
            .await
            .unwrap();
        assert_eq!(sink.metadata().sink_type, "mock");
    }

    #[test]
    fn test_error_classification() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = SinkError::connection(io);
        assert!(err.is_retryable());
        assert_eq!(err.category(), "connection");
        assert!(err.to_string().contains("refused"));

        let err = SinkError::configuration("database is empty", Some("database".into()));
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "configuration");

        let err = SinkError::write_msg("duplicate key", false);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_metadata() {
        let metadata = SinkMetadata::new("MongoDB", "mongodb");
        assert_eq!(metadata.name, "MongoDB");
        assert_eq!(metadata.sink_type, "mongodb");
    }
}
