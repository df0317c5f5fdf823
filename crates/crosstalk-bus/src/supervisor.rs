use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crosstalk_core::{BusConfig, BusMessage, ConnectionState};
use crosstalk_relay::{InboundRelay, RelayState};

use crate::publisher::MqttPublisher;
use crate::reconnect::{ReconnectConfig, ReconnectPolicy};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Owns the single connection to the bus. Subscribes on connect, feeds
/// every delivery to the inbound relay, and retries lost connections
/// forever with backoff. HTTP traffic keeps flowing while disconnected;
/// only the relay's connection state changes.
pub struct BusSupervisor {
    config: BusConfig,
    state: RelayState,
    inbound: InboundRelay,
    reconnect: ReconnectConfig,
}

/// Handle to the running supervisor task.
pub struct BusHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl BusHandle {
    /// Stop the supervisor and wait for its task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

impl BusSupervisor {
    pub fn new(config: BusConfig, state: RelayState, inbound: InboundRelay) -> Self {
        Self::with_reconnect(config, state, inbound, ReconnectConfig::default())
    }

    pub fn with_reconnect(
        config: BusConfig,
        state: RelayState,
        inbound: InboundRelay,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            config,
            state,
            inbound,
            reconnect,
        }
    }

    /// Spawn the supervisor task. Returns the publisher handle for the
    /// outbound path and a handle for shutdown.
    pub fn start(self) -> (MqttPublisher, BusHandle) {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(KEEP_ALIVE);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let publisher = MqttPublisher::new(client.clone(), self.config.publish_timeout);

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(self.run(client, eventloop, task_cancel));

        (publisher, BusHandle { cancel, task })
    }

    async fn run(self, client: AsyncClient, mut eventloop: EventLoop, cancel: CancellationToken) {
        let mut policy = ReconnectPolicy::new(self.reconnect.clone());
        self.state.set_connection_state(ConnectionState::Connecting);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("bus supervisor stopping");
                    let _ = client.disconnect().await;
                    break;
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(
                            host = %self.config.host,
                            port = self.config.port,
                            topic = %self.config.topic,
                            "connected to bus"
                        );
                        self.state.set_connection_state(ConnectionState::Connected);
                        self.state.metrics().gauge_set("bus.connected", &[], 1.0);
                        policy.reset();
                        // Subscriptions do not survive a reconnect.
                        let subscribed =
                            client.subscribe(&self.config.topic, QoS::AtMostOnce).await;
                        if let Err(e) = subscribed {
                            warn!(
                                error = %e,
                                topic = %self.config.topic,
                                "subscribe request failed"
                            );
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.inbound
                            .process(BusMessage::new(publish.topic, publish.payload));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.state.set_connection_state(ConnectionState::Disconnected);
                        self.state.metrics().gauge_set("bus.connected", &[], 0.0);
                        self.state.metrics().counter_inc("bus.reconnects.total", &[], 1);
                        let delay = policy.next_delay();
                        warn!(
                            error = %e,
                            attempt = policy.attempt(),
                            delay_ms = delay.as_millis() as u64,
                            "bus connection lost; retrying"
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        self.state.set_connection_state(ConnectionState::Connecting);
                    }
                }
            }
        }

        self.state.set_connection_state(ConnectionState::Disconnected);
        self.state.metrics().gauge_set("bus.connected", &[], 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crosstalk_core::{BusPublisher, RelayError};
    use crosstalk_telemetry::MetricsRecorder;

    fn unreachable_config() -> BusConfig {
        BusConfig {
            host: "127.0.0.1".into(),
            // Nothing listens on port 1.
            port: 1,
            topic: "iot/demo".into(),
            client_id: "crosstalk-test".into(),
            publish_timeout: Duration::from_millis(250),
        }
    }

    fn fast_reconnect() -> ReconnectConfig {
        ReconnectConfig {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(50),
            jitter_factor: 0.0,
        }
    }

    fn setup() -> (RelayState, BusSupervisor) {
        let state = RelayState::new(100, Arc::new(MetricsRecorder::new()));
        let inbound = InboundRelay::new(state.clone(), "iot/demo");
        let supervisor = BusSupervisor::with_reconnect(
            unreachable_config(),
            state.clone(),
            inbound,
            fast_reconnect(),
        );
        (state, supervisor)
    }

    #[tokio::test]
    async fn retries_unreachable_broker_and_shuts_down_cleanly() {
        let (state, supervisor) = setup();
        let (_publisher, handle) = supervisor.start();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(state.metrics().counter_get("bus.reconnects.total", &[]) >= 1);
        assert!(!state.connection_state().is_connected());

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown should not hang");
        assert_eq!(state.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn publish_after_shutdown_reports_disconnected() {
        let (_state, supervisor) = setup();
        let (publisher, handle) = supervisor.start();
        handle.shutdown().await;

        let err = publisher.publish("iot/demo", "hello").await.unwrap_err();
        assert!(matches!(err, RelayError::Disconnected));
    }

    #[tokio::test]
    async fn failed_connection_leaves_chat_state_untouched() {
        let (state, supervisor) = setup();
        let (_publisher, handle) = supervisor.start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(state.snapshot().is_empty());
        assert!(state.last_seen().is_none());

        handle.shutdown().await;
    }
}
