use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crosstalk_core::{BusPublisher, HistoryEntry, RelayError};

use crate::commands::is_control_command;
use crate::state::RelayState;

/// Relays a validated web-originated message: records it locally, arms the
/// echo guard with the exact text that goes on the wire, then publishes.
///
/// Local history is authoritative. A publish failure is logged and the
/// call still succeeds; nothing rolls back and delivery is best-effort.
pub struct OutboundPublisher {
    state: RelayState,
    bus: Arc<dyn BusPublisher>,
    topic: String,
}

impl OutboundPublisher {
    pub fn new(state: RelayState, bus: Arc<dyn BusPublisher>, topic: impl Into<String>) -> Self {
        Self {
            state,
            bus,
            topic: topic.into(),
        }
    }

    /// Send `text` on behalf of `actor`. Returns the transmitted text.
    pub async fn send(&self, actor: &str, text: &str) -> Result<String, RelayError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RelayError::EmptyMessage);
        }

        // Record and arm under one lock; the publish happens outside it.
        self.state.with_chat(|chat| {
            if is_control_command(trimmed) {
                self.state
                    .metrics()
                    .counter_inc("outbound.commands.total", &[], 1);
            } else {
                chat.history
                    .append(HistoryEntry::user(actor, trimmed, self.topic.as_str()));
            }
            chat.echo.arm(trimmed);
        });
        self.state.metrics().counter_inc("outbound.sent.total", &[], 1);

        let started = Instant::now();
        let published = self.bus.publish(&self.topic, trimmed).await;
        self.state.metrics().histogram_observe(
            "publish.duration_ms",
            &[],
            started.elapsed().as_secs_f64() * 1000.0,
        );
        if let Err(e) = published {
            self.state
                .metrics()
                .counter_inc("outbound.publish_failures.total", &[], 1);
            warn!(
                error = %e,
                kind = e.kind(),
                topic = %self.topic,
                "bus publish failed; local history kept"
            );
        }

        Ok(trimmed.to_string())
    }
}
