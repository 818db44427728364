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

//! MongoDB sink implementation.

use crate::mongo::config::MongoConfig;
use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::error::{Error as MongoError, ErrorKind as MongoErrorKind};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::{debug, info};
use wakeease_core::document::SensorDocument;
use wakeease_core::sink::{DocumentSink, SinkError, SinkMetadata};

/// Writes documents to MongoDB, one collection per topic.
///
/// The client is created once and reused for every insert. The driver keeps
/// its own connection pool and reconnects on its own; this type adds no retry.
///
/// # Examples
///
/// ```rust,no_run
/// use wakeease_sinks::mongo::{MongoConfig, MongoSink};
/// use wakeease_core::document::{GenericDocument, SensorDocument};
/// use wakeease_core::sink::DocumentSink;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut sink = MongoSink::new(MongoConfig::default()).await?;
/// sink.ping().await?;
///
/// let document = SensorDocument::Generic(GenericDocument {
///     timestamp: "2024-01-01T08:00:00Z".to_string(),
///     data: "Wake up!".to_string(),
/// });
/// sink.insert("notification", &document).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MongoSink {
    database: Database,
    config: MongoConfig,
}

impl MongoSink {
    /// Creates the client and selects the database.
    ///
    /// The driver connects lazily; use [`ping`](Self::ping) to fail fast on
    /// an unreachable server.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ConfigurationError`] if the connection string
    /// cannot be parsed, or [`SinkError::ConnectionError`] if the client cannot
    /// be created.
    pub async fn new(config: MongoConfig) -> Result<Self, SinkError> {
        info!(database = %config.database, "Initializing MongoDB sink");

        let mut options = ClientOptions::parse(&config.uri).await.map_err(|e| {
            SinkError::configuration(
                format!("invalid MongoDB connection string: {e}"),
                Some("uri".to_string()),
            )
        })?;

        if let Some(app_name) = &config.app_name {
            options.app_name = Some(app_name.clone());
        }

        let client = Client::with_options(options).map_err(SinkError::connection)?;
        let database = client.database(&config.database);

        info!(database = %config.database, "MongoDB sink initialized");

        Ok(Self {
            database,
            config,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Sends a `ping` command to verify the server is reachable.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the server cannot be reached.
    pub async fn ping(&self) -> Result<(), SinkError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(classify_error)?;

        debug!(database = %self.config.database, "MongoDB ping succeeded");
        Ok(())
    }
}

/// Maps driver errors onto [`SinkError`] variants.
fn classify_error(err: MongoError) -> SinkError {
    let is_connection = matches!(
        *err.kind,
        MongoErrorKind::Io(_)
            | MongoErrorKind::ServerSelection { .. }
            | MongoErrorKind::ConnectionPoolCleared { .. }
    );

    if is_connection {
        return SinkError::connection(err);
    }

    if matches!(*err.kind, MongoErrorKind::BsonSerialization(_)) {
        return SinkError::serialization(err, "Failed to encode document as BSON");
    }

    let retryable = err.contains_label("RetryableWriteError");
    SinkError::write(err, retryable)
}

#[async_trait]
impl DocumentSink for MongoSink {
    async fn insert(
        &mut self,
        collection: &str,
        document: &SensorDocument,
    ) -> Result<(), SinkError> {
        let result = self
            .database
            .collection::<Document>(collection)
            .insert_one(document.to_bson())
            .await
            .map_err(classify_error)?;

        debug!(
            database = %self.config.database,
            collection,
            inserted_id = %result.inserted_id,
            "Inserted document"
        );

        Ok(())
    }

    fn metadata(&self) -> SinkMetadata {
        SinkMetadata::new("MongoDB", "mongodb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_does_not_require_server() {
        let config = MongoConfig::builder()
            .uri("mongodb://127.0.0.1:1/")
            .database("WakeEase")
            .build()
            .unwrap();

        let sink = MongoSink::new(config).await.unwrap();
        assert_eq!(sink.config().database, "WakeEase");

        let metadata = sink.metadata();
        assert_eq!(metadata.name, "MongoDB");
        assert_eq!(metadata.sink_type, "mongodb");
    }

    #[tokio::test]
    async fn test_unparsable_uri_is_configuration_error() {
        let config = MongoConfig {
            uri: "mongodb://".to_string(),
            ..MongoConfig::default()
        };

        let err = MongoSink::new(config).await.unwrap_err();
        assert_eq!(err.category(), "configuration");
    }
}
