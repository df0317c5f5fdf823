use async_trait::async_trait;

use crate::errors::RelayError;

/// Outbound side of the bus. Implemented by the real MQTT client and by
/// test doubles; the relay core only ever sees this trait.
#[async_trait]
pub trait BusPublisher: Send + Sync {
    /// Publish a raw text payload to a topic. Implementations apply their
    /// own bounded timeout; a slow broker surfaces as `PublishTimeout`.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), RelayError>;
}
