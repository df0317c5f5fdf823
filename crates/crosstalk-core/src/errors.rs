use std::time::Duration;

/// Typed errors for the relay core. Classifies errors as client mistakes
/// (surfaced to the caller) or bus-side transients (logged, never surfaced
/// to request handlers; the supervisor retries on its own).
#[derive(Clone, Debug, thiserror::Error)]
pub enum RelayError {
    // Client errors
    #[error("message is empty")]
    EmptyMessage,

    // Bus errors, all transient
    #[error("bus publish failed: {0}")]
    PublishFailed(String),
    #[error("bus publish timed out after {0:?}")]
    PublishTimeout(Duration),
    #[error("bus disconnected")]
    Disconnected,
}

impl RelayError {
    /// True for errors the sender caused and should see as a 4xx.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyMessage)
    }

    /// True for bus-side failures the supervisor will heal on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PublishFailed(_) | Self::PublishTimeout(_) | Self::Disconnected
        )
    }

    /// Stable label for log fields and metric series.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "empty_message",
            Self::PublishFailed(_) => "publish_failed",
            Self::PublishTimeout(_) => "publish_timeout",
            Self::Disconnected => "disconnected",
        }
    }
}
