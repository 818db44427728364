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

//! MongoDB sink configuration.

use thiserror::Error;

/// Default connection string.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017/";

/// Default database name.
pub const DEFAULT_DATABASE: &str = "WakeEase";

/// Characters MongoDB does not allow in database names.
const INVALID_DATABASE_CHARS: [char; 7] = ['/', '\\', '.', ' ', '"', '$', '\0'];

/// Maximum database name length in bytes.
const MAX_DATABASE_NAME_LEN: usize = 63;

/// Errors raised when building a [`MongoConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MongoConfigError {
    /// A required value is empty.
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// The connection string does not use a MongoDB scheme.
    #[error("uri must start with mongodb:// or mongodb+srv://, got '{0}'")]
    InvalidUri(String),

    /// The database name is not accepted by MongoDB.
    #[error("invalid database name '{name}': {reason}")]
    InvalidDatabase {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Configuration for [`MongoSink`](crate::mongo::MongoSink).
///
/// # Examples
///
/// ```rust
/// use wakeease_sinks::mongo::MongoConfig;
///
/// let config = MongoConfig::builder()
///     .uri("mongodb://db.internal:27017/")
///     .database("WakeEase")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.database, "WakeEase");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    /// MongoDB connection string.
    pub uri: String,

    /// Database holding the per-topic collections.
    pub database: String,

    /// Application name reported to the server (shows up in server logs).
    pub app_name: Option<String>,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            app_name: None,
        }
    }
}

impl MongoConfig {
    /// Creates a new builder for `MongoConfig`.
    #[must_use]
    pub fn builder() -> MongoConfigBuilder {
        MongoConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URI or database name is unusable.
    pub fn validate(&self) -> Result<(), MongoConfigError> {
        if self.uri.is_empty() {
            return Err(MongoConfigError::Empty("uri"));
        }

        if !(self.uri.starts_with("mongodb://") || self.uri.starts_with("mongodb+srv://")) {
            return Err(MongoConfigError::InvalidUri(self.uri.clone()));
        }

        if self.database.is_empty() {
            return Err(MongoConfigError::Empty("database"));
        }

        if self.database.len() > MAX_DATABASE_NAME_LEN {
            return Err(MongoConfigError::InvalidDatabase {
                name: self.database.clone(),
                reason: format!("longer than {MAX_DATABASE_NAME_LEN} bytes"),
            });
        }

        if let Some(c) = self
            .database
            .chars()
            .find(|c| INVALID_DATABASE_CHARS.contains(c))
        {
            return Err(MongoConfigError::InvalidDatabase {
                name: self.database.clone(),
                reason: format!("contains {c:?}"),
            });
        }

        Ok(())
    }
}

/// Builder for `MongoConfig`.
#[derive(Debug, Default)]
pub struct MongoConfigBuilder {
    uri: Option<String>,
    database: Option<String>,
    app_name: Option<String>,
}

impl MongoConfigBuilder {
    /// Sets the connection string (default: `mongodb://localhost:27017/`).
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Sets the database name (default: `WakeEase`).
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the application name reported to the server.
    #[must_use]
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// Builds the `MongoConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails; see [`MongoConfig::validate`].
    pub fn build(self) -> Result<MongoConfig, MongoConfigError> {
        let defaults = MongoConfig::default();
        let config = MongoConfig {
            uri: self.uri.unwrap_or(defaults.uri),
            database: self.database.unwrap_or(defaults.database),
            app_name: self.app_name,
        };

        config.validate()?;
        Ok(config)
    }
}
