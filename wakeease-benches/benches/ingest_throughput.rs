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

//! Ingestion path benchmarks.
//!
//! Measures the per-message cost of the bridge without any network I/O:
//! - payload parsing for timing topics
//! - document construction including timezone conversion
//! - the full `handle_message` path against an in-memory sink
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench --package wakeease-benches --bench ingest_throughput
//! ```

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use wakeease_core::bridge::{Bridge, BridgeConfig};
use wakeease_core::ingest::{parse_timing, Ingestor, LocalClock, SUBSCRIBED_TOPICS};
use wakeease_core::sink::MockSink;
use wakeease_core::source::{ChannelSource, InboundMessage};

fn payload_for(topic: &str, i: usize) -> String {
    match topic {
        "notification" => format!("Alarm {i} triggered"),
        _ => format!("Button pressed after {}.{:02} seconds.", i % 60, i % 100),
    }
}

/// Messages cycling over all subscribed topics.
fn create_messages(count: usize) -> Vec<InboundMessage> {
    let received_at = Utc.with_ymd_and_hms(2024, 3, 1, 23, 15, 42).unwrap();
    (0..count)
        .map(|i| {
            let topic = SUBSCRIBED_TOPICS[i % SUBSCRIBED_TOPICS.len()];
            InboundMessage::with_received_at(topic, payload_for(topic, i), received_at)
        })
        .collect()
}

fn bench_parse_timing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_timing");

    let payloads = [
        ("short", "8.56 s".to_string()),
        ("sentence", "Button pressed after 8.56 seconds.".to_string()),
        ("long", format!("{} 8.56 seconds.", "word ".repeat(200))),
    ];

    for (name, payload) in &payloads {
        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), payload, |b, payload| {
            b.iter(|| parse_timing(black_box(payload)));
        });
    }

    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    let received_at = Utc.with_ymd_and_hms(2024, 3, 1, 23, 15, 42).unwrap();

    for tz in [Tz::UTC, Tz::Asia__Kuala_Lumpur, Tz::America__New_York] {
        let ingestor = Ingestor::new(LocalClock::new(tz));

        group.bench_with_input(BenchmarkId::new("timing", tz.name()), &ingestor, |b, ingestor| {
            b.iter(|| {
                ingestor.ingest(
                    black_box("led_duration"),
                    black_box("Button pressed after 8.56 seconds."),
                    received_at,
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("generic", tz.name()), &ingestor, |b, ingestor| {
            b.iter(|| {
                ingestor.ingest(
                    black_box("notification"),
                    black_box("Wake up!"),
                    received_at,
                )
            });
        });
    }

    group.finish();
}

fn bench_handle_message(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("handle_message");

    for count in [10, 100, 1000] {
        let messages = create_messages(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &messages, |b, messages| {
            b.to_async(&runtime).iter(|| async {
                let (_tx, source) = ChannelSource::new(1);
                let mut bridge = Bridge::new(BridgeConfig::default(), source, MockSink::new());

                for message in messages {
                    bridge.handle_message(message).await.unwrap();
                }

                black_box(bridge.stats());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse_timing, bench_ingest, bench_handle_message);
criterion_main!(benches);
