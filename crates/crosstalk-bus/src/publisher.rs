use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};

use crosstalk_core::{BusPublisher, RelayError};

/// `BusPublisher` backed by the live MQTT client. The client handle only
/// enqueues onto the event loop owned by the supervisor task; delivery is
/// fire-and-forget at QoS 0.
pub struct MqttPublisher {
    client: AsyncClient,
    timeout: Duration,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl BusPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), RelayError> {
        let request = self.client.publish(topic, QoS::AtMostOnce, false, payload);
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(())) => Ok(()),
            // The request channel only errors once the event loop is gone.
            Ok(Err(_)) => Err(RelayError::Disconnected),
            Err(_) => Err(RelayError::PublishTimeout(self.timeout)),
        }
    }
}
