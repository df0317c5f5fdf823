use async_trait::async_trait;
use parking_lot::Mutex;

use crosstalk_core::{BusPublisher, RelayError};

/// In-memory publisher for tests and offline development. Records every
/// publish and can be switched into a failure mode.
#[derive(Default)]
pub struct MockBus {
    published: Mutex<Vec<(String, String)>>,
    fail_with: Mutex<Option<RelayError>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(topic, payload)` pairs published so far, in order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    /// Make every subsequent publish fail with `err`.
    pub fn fail_with(&self, err: RelayError) {
        *self.fail_with.lock() = Some(err);
    }

    /// Return to the success mode.
    pub fn succeed(&self) {
        *self.fail_with.lock() = None;
    }
}

#[async_trait]
impl BusPublisher for MockBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), RelayError> {
        if let Some(err) = self.fail_with.lock().clone() {
            return Err(err);
        }
        self.published
            .lock()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}
