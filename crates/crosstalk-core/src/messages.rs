use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the bridge a history entry came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Device,
}

/// One entry in the shared chat history. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "from")]
    pub origin: Origin,
    #[serde(rename = "username", skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub text: String,
    pub topic: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Entry for a message a web user submitted.
    pub fn user(
        actor: impl Into<String>,
        text: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            origin: Origin::User,
            actor: Some(actor.into()),
            text: text.into(),
            topic: topic.into(),
            timestamp: Utc::now(),
        }
    }

    /// Entry for a message that arrived from the bus, stamped with its
    /// delivery time rather than the append time.
    pub fn device(
        actor: Option<String>,
        text: impl Into<String>,
        topic: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            origin: Origin::Device,
            actor,
            text: text.into(),
            topic: topic.into(),
            timestamp: at,
        }
    }
}

/// A raw message as delivered by the bus. Transient: consumed by the
/// inbound relay and not kept.
#[derive(Clone, Debug)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Bytes,
    pub received_at: DateTime<Utc>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }

    /// Payload decoded as text. Malformed UTF-8 is replaced, not rejected.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Cache of the most recent bus message, as shown by `/iot/latest`.
/// `payload` is the parsed JSON value when the raw text parses, otherwise
/// the raw string itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LastSeen {
    pub topic: String,
    pub payload: serde_json::Value,
    pub raw: String,
    pub timestamp: DateTime<Utc>,
}

impl LastSeen {
    pub fn observed(topic: impl Into<String>, raw: impl Into<String>, at: DateTime<Utc>) -> Self {
        let raw = raw.into();
        let payload = serde_json::from_str(&raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
        Self {
            topic: topic.into(),
            payload,
            raw,
            timestamp: at,
        }
    }
}
