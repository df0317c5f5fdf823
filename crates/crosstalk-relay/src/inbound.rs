use serde_json::Value;
use tracing::{debug, info};

use crosstalk_core::{BusMessage, HistoryEntry, LastSeen};

use crate::commands::is_control_command;
use crate::state::RelayState;

/// Handles every message delivered by the bus subscription, in delivery
/// order, one at a time (the supervisor task is the only caller).
///
/// Pipeline per message: echo suppression, command filtering, last-seen
/// capture, topic check, then history append with display extraction.
pub struct InboundRelay {
    state: RelayState,
    topic: String,
}

impl InboundRelay {
    pub fn new(state: RelayState, topic: impl Into<String>) -> Self {
        Self {
            state,
            topic: topic.into(),
        }
    }

    /// Classify one delivery and record it where the pipeline says so.
    pub fn process(&self, msg: BusMessage) {
        let raw = msg.text();
        self.state.metrics().counter_inc("inbound.total", &[], 1);

        self.state.with_chat(|chat| {
            // A consumed echo is our own publish coming back: it must not
            // reach history, last-seen, or the command filter.
            if chat.echo.check_and_consume(&raw) {
                debug!(topic = %msg.topic, "suppressed echo of own publish");
                self.state
                    .metrics()
                    .counter_inc("inbound.suppressed.total", &[], 1);
                return;
            }

            if is_control_command(&raw) {
                info!(topic = %msg.topic, payload = %raw, "control command kept out of history");
                self.state
                    .metrics()
                    .counter_inc("inbound.commands.total", &[], 1);
                return;
            }

            chat.last_seen = Some(LastSeen::observed(&msg.topic, &raw, msg.received_at));

            if msg.topic != self.topic {
                debug!(
                    topic = %msg.topic,
                    subscribed = %self.topic,
                    "off-topic message retained as last-seen only"
                );
                self.state
                    .metrics()
                    .counter_inc("inbound.off_topic.total", &[], 1);
                return;
            }

            let (text, actor) = extract_display(&raw);
            chat.history.append(HistoryEntry::device(
                actor,
                text,
                msg.topic.clone(),
                msg.received_at,
            ));
            self.state
                .metrics()
                .counter_inc("inbound.recorded.total", &[], 1);
        });
    }
}

/// Display text and optional actor for a device payload. Only a JSON
/// object with a string `msg` field is unwrapped; everything else shows
/// as the raw text.
fn extract_display(raw: &str) -> (String, Option<String>) {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
        if let Some(text) = map.get("msg").and_then(Value::as_str) {
            let actor = map.get("user").and_then(Value::as_str).map(str::to_owned);
            return (text.to_owned(), actor);
        }
    }
    (raw.to_owned(), None)
}
