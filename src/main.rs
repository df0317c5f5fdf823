use std::sync::Arc;

use clap::Parser;

use crosstalk_bus::BusSupervisor;
use crosstalk_core::AppConfig;
use crosstalk_relay::{InboundRelay, OutboundPublisher, RelayState};
use crosstalk_telemetry::{init_telemetry, TelemetryConfig};

/// Web chat to MQTT relay.
///
/// Configuration comes from the environment (MQTT_HOST, MQTT_PORT,
/// MQTT_TOPIC, CHAT_MAX, PORT, USERS_FILE, SESSION_TTL_SECS); flags
/// override it.
#[derive(Parser, Debug)]
#[command(name = "crosstalk", version, about)]
struct Cli {
    /// HTTP listen port.
    #[arg(long)]
    port: Option<u16>,

    /// MQTT broker host.
    #[arg(long)]
    bus_host: Option<String>,

    /// MQTT broker port.
    #[arg(long)]
    bus_port: Option<u16>,

    /// Topic to subscribe and publish on.
    #[arg(long)]
    topic: Option<String>,

    /// Path of the users file.
    #[arg(long)]
    users_file: Option<std::path::PathBuf>,

    /// Emit logs as newline-delimited JSON.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(self, mut config: AppConfig) -> AppConfig {
        if let Some(port) = self.port {
            config.http_port = port;
        }
        if let Some(host) = self.bus_host {
            config.bus.host = host;
        }
        if let Some(port) = self.bus_port {
            config.bus.port = port;
        }
        if let Some(topic) = self.topic {
            config.bus.topic = topic;
        }
        if let Some(path) = self.users_file {
            config.users_file = path;
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_logs = cli.json_logs;
    let config = cli.apply(AppConfig::from_env());

    let telemetry = init_telemetry(TelemetryConfig {
        json_logs,
        ..TelemetryConfig::default()
    });

    tracing::info!("Starting crosstalk relay");

    let accounts = Arc::new(
        crosstalk_accounts::AccountStore::open(&config.users_file)
            .expect("Failed to open users file"),
    );

    let relay = RelayState::new(config.history_capacity, telemetry.metrics());
    let inbound = InboundRelay::new(relay.clone(), config.bus.topic.clone());

    let supervisor = BusSupervisor::new(config.bus.clone(), relay.clone(), inbound);
    let (bus_publisher, bus_handle) = supervisor.start();

    let publisher = Arc::new(OutboundPublisher::new(
        relay.clone(),
        Arc::new(bus_publisher),
        config.bus.topic.clone(),
    ));

    let server_config = crosstalk_server::ServerConfig {
        port: config.http_port,
        session_ttl_secs: config.session_ttl.as_secs(),
        ..Default::default()
    };
    let port = server_config.port;
    let _server = crosstalk_server::start(
        server_config,
        relay,
        publisher,
        accounts,
        config.bus.topic.clone(),
    )
    .await
    .expect("Failed to start server");

    tracing::info!(
        port = port,
        broker = %config.bus.host,
        topic = %config.bus.topic,
        "crosstalk ready"
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
    bus_handle.shutdown().await;
}
