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

//! MongoDB sink.
//!
//! Stores each document with a single `insertOne` into the collection named
//! after the message topic. Collections are created by MongoDB on first insert.
//!
//! ```text
//! WakeEase (database)
//! ├── notification     { timestamp, data }
//! ├── led_duration     { date, time, timing }
//! ├── fan_duration     { date, time, timing }
//! ├── sleep_duration   { date, time, timing }
//! └── response_time    { date, time, timing }
//! ```

pub mod config;
mod sink;

pub use config::{MongoConfig, MongoConfigBuilder, MongoConfigError};
pub use sink::MongoSink;
