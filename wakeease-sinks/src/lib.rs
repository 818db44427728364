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

//! WakeEase Sinks - Storage Sink Implementations
//!
//! This crate provides [`DocumentSink`](wakeease_core::sink::DocumentSink)
//! implementations for the WakeEase bridge.
//!
//! # Available Sinks
//!
//! - **MongoDB** (`mongo` feature, default): one collection per topic in a
//!   single database
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wakeease_sinks::mongo::{MongoConfig, MongoSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MongoConfig::builder()
//!     .uri("mongodb://localhost:27017/")
//!     .database("WakeEase")
//!     .build()?;
//!
//! let sink = MongoSink::new(config).await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "mongo")]
pub mod mongo;
