use std::sync::Arc;

use parking_lot::Mutex;

use crosstalk_core::{ConnectionState, HistoryEntry, LastSeen};
use crosstalk_telemetry::MetricsRecorder;

use crate::echo::EchoGuard;
use crate::history::HistoryStore;

/// Everything the chat paths mutate, behind one lock so interleaved
/// inbound/outbound activity cannot break FIFO eviction or the
/// single-shot echo slot.
pub struct ChatState {
    pub history: HistoryStore,
    pub echo: EchoGuard,
    pub last_seen: Option<LastSeen>,
}

/// Shared relay state, injected into both the HTTP path and the bus
/// supervisor task. Clones are cheap handles to the same state.
#[derive(Clone)]
pub struct RelayState {
    chat: Arc<Mutex<ChatState>>,
    connection: Arc<Mutex<ConnectionState>>,
    metrics: Arc<MetricsRecorder>,
}

impl RelayState {
    pub fn new(history_capacity: usize, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            chat: Arc::new(Mutex::new(ChatState {
                history: HistoryStore::new(history_capacity),
                echo: EchoGuard::new(),
                last_seen: None,
            })),
            connection: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            metrics,
        }
    }

    /// Run `f` with the chat state locked. All multi-step transitions
    /// (classify + record + arm) go through here so they are atomic with
    /// respect to the other path.
    pub(crate) fn with_chat<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> R {
        let mut chat = self.chat.lock();
        f(&mut chat)
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.chat.lock().history.snapshot()
    }

    pub fn history_len(&self) -> usize {
        self.chat.lock().history.len()
    }

    pub fn last_seen(&self) -> Option<LastSeen> {
        self.chat.lock().last_seen.clone()
    }

    pub fn is_echo_armed(&self) -> bool {
        self.chat.lock().echo.is_armed()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.lock()
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        *self.connection.lock() = state;
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        Arc::clone(&self.metrics)
    }
}
