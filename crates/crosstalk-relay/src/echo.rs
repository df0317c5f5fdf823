/// Tracks the most recent payload this process published, so the one echo
/// the shared topic delivers back can be recognized and dropped.
///
/// Single slot, single shot: arming overwrites any unconsumed value, and a
/// match clears the slot, so a later identical payload is treated as a real
/// device message. Two publishes in flight at once means the earlier echo
/// can no longer be suppressed; that is a known limit of payload-equality
/// dedup on a bus with no message identity.
#[derive(Debug, Default)]
pub struct EchoGuard {
    pending: Option<String>,
}

impl EchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `payload` as awaiting its echo, replacing any previous value.
    pub fn arm(&mut self, payload: impl Into<String>) {
        self.pending = Some(payload.into());
    }

    /// True (and the slot is cleared) iff `payload` equals the armed value.
    /// False otherwise, without touching the slot.
    pub fn check_and_consume(&mut self, payload: &str) -> bool {
        if self.pending.as_deref() == Some(payload) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}
