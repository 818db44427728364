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

//! WakeEase MQTT-to-MongoDB bridge.
//!
//! Subscribes to the five WakeEase topics and stores every message as one
//! document in the collection named after its topic.
//!
//! ```bash
//! WAKEEASE_BROKER_HOST=192.168.1.20 \
//! MONGODB_URI=mongodb://localhost:27017/ \
//!     wakeease-bridge --metrics-addr 0.0.0.0:9000
//! ```

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use wakeease_core::bridge::{Bridge, BridgeConfig};
use wakeease_core::metrics;
use wakeease_core::source::{MqttConfig, MqttSource};
use wakeease_sinks::mongo::{MongoConfig, MongoSink};

/// Command-line options. Every flag also reads from the environment.
#[derive(Debug, Parser)]
#[command(name = "wakeease-bridge", version, about)]
struct Cli {
    /// MQTT broker host name or address
    #[arg(long, env = "WAKEEASE_BROKER_HOST")]
    broker_host: String,

    /// MQTT broker port
    #[arg(long, env = "WAKEEASE_BROKER_PORT", default_value_t = 1883)]
    broker_port: u16,

    /// MQTT keep-alive interval in seconds
    #[arg(long, env = "WAKEEASE_KEEP_ALIVE_SECS", default_value_t = 60)]
    keep_alive_secs: u64,

    /// MQTT client identifier
    #[arg(long, env = "WAKEEASE_CLIENT_ID", default_value = "wakeease-bridge")]
    client_id: String,

    /// MongoDB connection string
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017/")]
    mongodb_uri: String,

    /// Database holding the per-topic collections
    #[arg(long, env = "WAKEEASE_DATABASE", default_value = "WakeEase")]
    database: String,

    /// IANA timezone used for document dates and times
    #[arg(long, env = "WAKEEASE_TIMEZONE", default_value = "Asia/Kuala_Lumpur")]
    timezone: String,

    /// Address for the Prometheus exporter (disabled when unset)
    #[arg(long, env = "WAKEEASE_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    init_logging();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting WakeEase bridge");

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!(%addr, "Prometheus exporter listening");
    }
    metrics::init_metrics();

    let bridge_config = BridgeConfig::builder()
        .timezone_name(cli.timezone.as_str())
        .build()?;

    let mongo_config = MongoConfig::builder()
        .uri(cli.mongodb_uri.as_str())
        .database(cli.database.as_str())
        .app_name(cli.client_id.as_str())
        .build()?;

    let sink = MongoSink::new(mongo_config).await?;
    if let Err(e) = sink.ping().await {
        error!(error = %e, "MongoDB is unreachable");
        return Err(e.into());
    }
    info!(database = %cli.database, "Connected to MongoDB");

    let mqtt_config = MqttConfig::builder()
        .host(cli.broker_host.as_str())
        .port(cli.broker_port)
        .client_id(cli.client_id.as_str())
        .keep_alive(Duration::from_secs(cli.keep_alive_secs))
        .build()?;

    info!(
        host = %mqtt_config.host,
        port = mqtt_config.port,
        topics = ?mqtt_config.topics,
        "Subscribing to MQTT topics"
    );

    let source = MqttSource::new(mqtt_config);
    let mut bridge = Bridge::new(bridge_config, source, sink);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            // Dropping the sender leaves the bridge running
            error!(error = %e, "Failed to listen for Ctrl+C, graceful shutdown disabled");
            return;
        }
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    if let Err(e) = bridge.run(shutdown_rx).await {
        error!(error = %e, "Bridge stopped with a fatal error");
        return Err(e.into());
    }

    info!("WakeEase bridge stopped");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wakeease_core=info,wakeease_sinks=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .with_line_number(true)
        .init();
}
