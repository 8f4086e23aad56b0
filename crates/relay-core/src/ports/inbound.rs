//! Inbound Ports (Driving Ports)
//!
//! API offered to callers that need a reply for a unit of work.

use async_trait::async_trait;

use crate::domain::ReplyOutcome;
use crate::error::FatalError;

/// Send one request and wait for its correlated reply.
#[async_trait]
pub trait RequestApi: Send + Sync {
    /// Issue `text` as a request and classify the reply.
    ///
    /// Receive-side anomalies come back as `Ok` outcomes.
    ///
    /// # Errors
    ///
    /// `FatalError` when the request cannot be published or the session is
    /// gone.
    async fn request(&self, text: &str) -> Result<ReplyOutcome, FatalError>;
}
