//! Tunables for the requestor side.

use std::time::Duration;

/// Default time a requestor waits for a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Requestor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestorConfig {
    /// How long to wait for the matching reply before giving up.
    pub reply_timeout: Duration,
}

impl RequestorConfig {
    /// Configuration with a custom reply timeout.
    #[must_use]
    pub fn with_timeout(reply_timeout: Duration) -> Self {
        Self { reply_timeout }
    }
}

impl Default for RequestorConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}
