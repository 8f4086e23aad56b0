//! # Sequential Requestor
//!
//! Sends one correlated request at a time over a private temporary reply
//! destination and waits a bounded interval for the reply that answers it.
//!
//! ```text
//! IDLE -> SENT -> { DELIVERED | TIMED_OUT | MISMATCHED | MISSING | UNEXPECTED_TYPE } -> IDLE
//! ```
//!
//! Replies carrying some other request's token are strays (typically a late
//! answer to a request that already timed out). They are discarded and the
//! wait continues until the deadline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::adapters::REQUESTS_SEND;
use crate::domain::{
    CorrelationToken, Destination, Message, OutboundMessage, ReplyOutcome, RequestorConfig,
};
use crate::error::FatalError;
use crate::ports::{DestinationDirectory, RequestApi, TransportSession};

/// Requestor statistics.
#[derive(Debug, Default)]
pub struct RequestorStats {
    pub sent: AtomicU64,
    pub delivered: AtomicU64,
    pub timed_out: AtomicU64,
    pub missing_correlation: AtomicU64,
    pub mismatched_correlation: AtomicU64,
    pub unexpected_type: AtomicU64,
    /// Stray replies discarded while waiting.
    pub strays_discarded: AtomicU64,
    /// Empty inputs answered without a round trip.
    pub passthrough: AtomicU64,
}

impl RequestorStats {
    pub(crate) fn record(&self, outcome: &ReplyOutcome) {
        let counter = match outcome {
            ReplyOutcome::Delivered(_) => &self.delivered,
            ReplyOutcome::TimedOut => &self.timed_out,
            ReplyOutcome::MissingCorrelation => &self.missing_correlation,
            ReplyOutcome::MismatchedCorrelation { .. } => &self.mismatched_correlation,
            ReplyOutcome::UnexpectedType => &self.unexpected_type,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// How one received reply relates to the request being waited on.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Classification {
    /// Ends the wait.
    Final(ReplyOutcome),
    /// Belongs to another request; carries its raw token.
    Stray(String),
}

/// Classify `reply` against the token of the request in flight.
pub(crate) fn classify(expected: &CorrelationToken, reply: &Message) -> Classification {
    match reply.correlation_token() {
        None => Classification::Final(ReplyOutcome::MissingCorrelation),
        Some(raw) if !expected.matches(raw) => Classification::Stray(raw.to_string()),
        Some(_) => Classification::Final(matched_outcome(reply)),
    }
}

/// Outcome for a reply already known to answer the request.
pub(crate) fn matched_outcome(reply: &Message) -> ReplyOutcome {
    match reply.text() {
        Some(text) => ReplyOutcome::Delivered(text.to_string()),
        None => ReplyOutcome::UnexpectedType,
    }
}

/// Sequential request/reply client.
///
/// Holds one temporary reply destination for its whole life. Concurrent
/// callers are serialized: each request cycle completes before the next
/// starts.
pub struct Requestor {
    session: Arc<dyn TransportSession>,
    request_destination: Destination,
    reply_destination: Destination,
    config: RequestorConfig,
    cycle: Mutex<()>,
    stats: RequestorStats,
}

impl Requestor {
    /// Create the reply destination and get ready to send to
    /// `request_destination`.
    ///
    /// # Errors
    ///
    /// `FatalError::Transport` if the temporary destination cannot be created.
    pub async fn start(
        session: Arc<dyn TransportSession>,
        request_destination: Destination,
        config: RequestorConfig,
    ) -> Result<Self, FatalError> {
        let reply_destination = session.open_temporary().await?;
        info!(
            requests = %request_destination,
            reply_to = %reply_destination,
            timeout_ms = config.reply_timeout.as_millis(),
            "Requestor ready"
        );
        Ok(Self {
            session,
            request_destination,
            reply_destination,
            config,
            cycle: Mutex::new(()),
            stats: RequestorStats::default(),
        })
    }

    /// Resolve the request topic through `directory`, then [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// `FatalError::Directory` if the request name is unbound,
    /// `FatalError::Transport` if the topic does not exist.
    pub async fn from_directory(
        directory: &dyn DestinationDirectory,
        session: Arc<dyn TransportSession>,
        config: RequestorConfig,
    ) -> Result<Self, FatalError> {
        let physical = directory.resolve(REQUESTS_SEND)?;
        let request_destination = session.open_durable(&physical).await?;
        Self::start(session, request_destination, config).await
    }

    /// Send `text` and wait for its reply.
    ///
    /// Empty input is never sent; it comes back as an empty delivery.
    ///
    /// # Errors
    ///
    /// `FatalError::Transport` if the send fails or the session breaks while
    /// waiting.
    pub async fn request(&self, text: &str) -> Result<ReplyOutcome, FatalError> {
        if text.is_empty() {
            self.stats.passthrough.fetch_add(1, Ordering::Relaxed);
            return Ok(ReplyOutcome::Delivered(String::new()));
        }

        let _cycle = self.cycle.lock().await;

        let token = CorrelationToken::mint();
        let request = token.attach(
            OutboundMessage::text(text).with_reply_to(self.reply_destination.clone()),
        );
        let native_id = self
            .session
            .send(&self.request_destination, request)
            .await?;
        let deadline = Instant::now() + self.config.reply_timeout;
        self.stats.sent.fetch_add(1, Ordering::Relaxed);

        debug!(
            token = %token,
            native_id = %native_id,
            destination = %self.request_destination,
            "Request sent, waiting for reply"
        );

        let outcome = self.await_reply(&token, deadline).await?;
        self.stats.record(&outcome);
        debug!(token = %token, outcome = outcome.label(), "Request cycle finished");
        Ok(outcome)
    }

    async fn await_reply(
        &self,
        token: &CorrelationToken,
        deadline: Instant,
    ) -> Result<ReplyOutcome, FatalError> {
        let mut last_stray = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(reply) = self
                .session
                .receive(&self.reply_destination, remaining)
                .await?
            else {
                break;
            };

            match classify(token, &reply) {
                Classification::Final(outcome) => return Ok(outcome),
                Classification::Stray(actual) => {
                    self.stats.strays_discarded.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        expected = %token,
                        actual = %actual,
                        "Discarding reply for another request"
                    );
                    last_stray = Some(actual);
                }
            }
        }

        Ok(match last_stray {
            Some(actual) => ReplyOutcome::MismatchedCorrelation {
                expected: token.clone(),
                actual,
            },
            None => ReplyOutcome::TimedOut,
        })
    }

    #[must_use]
    pub fn reply_destination(&self) -> &Destination {
        &self.reply_destination
    }

    #[must_use]
    pub fn request_destination(&self) -> &Destination {
        &self.request_destination
    }

    #[must_use]
    pub fn stats(&self) -> &RequestorStats {
        &self.stats
    }

    /// Close the underlying session.
    pub async fn close(&self) {
        self.session.close().await;
    }
}

#[async_trait]
impl RequestApi for Requestor {
    async fn request(&self, text: &str) -> Result<ReplyOutcome, FatalError> {
        Requestor::request(self, text).await
    }
}
