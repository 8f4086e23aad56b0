//! # Concurrent Requestor
//!
//! Many outstanding requests share one temporary reply destination. A
//! dispatcher task drains the reply destination and hands each reply to the
//! waiter registered under its token in a [`PendingReplyTable`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{Destination, OutboundMessage, ReplyOutcome, RequestorConfig};
use crate::error::{FatalError, TransportError};
use crate::ports::{RequestApi, TransportSession};
use crate::service::pending::{cleanup_task, PendingReplyTable};
use crate::service::requestor::{matched_outcome, RequestorStats};

/// How long one dispatcher receive waits before re-arming.
const DISPATCH_POLL: Duration = Duration::from_secs(1);

/// Interval between sweeps of abandoned waiters.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5);

/// Replies the dispatcher could not route.
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Replies without a correlation token.
    pub missing_correlation: AtomicU64,
    /// Replies whose token had no waiter (late or foreign).
    pub unroutable: AtomicU64,
}

/// Request/reply client allowing many requests in flight at once.
pub struct ConcurrentRequestor {
    session: Arc<dyn TransportSession>,
    request_destination: Destination,
    reply_destination: Destination,
    config: RequestorConfig,
    pending: Arc<PendingReplyTable>,
    stats: RequestorStats,
    dispatch_stats: Arc<DispatchStats>,
    dispatcher: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

impl ConcurrentRequestor {
    /// Create the shared reply destination and start routing replies.
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
        let pending = Arc::new(PendingReplyTable::new(config.reply_timeout));
        let dispatch_stats = Arc::new(DispatchStats::default());

        let dispatcher = tokio::spawn(dispatch_replies(
            Arc::clone(&session),
            reply_destination.clone(),
            Arc::clone(&pending),
            Arc::clone(&dispatch_stats),
        ));
        let cleanup = tokio::spawn(cleanup_task(Arc::clone(&pending), CLEANUP_INTERVAL));

        info!(
            requests = %request_destination,
            reply_to = %reply_destination,
            timeout_ms = config.reply_timeout.as_millis(),
            "Concurrent requestor ready"
        );

        Ok(Self {
            session,
            request_destination,
            reply_destination,
            config,
            pending,
            stats: RequestorStats::default(),
            dispatch_stats,
            dispatcher,
            cleanup,
        })
    }

    /// Send `text` and wait for its reply. Safe to call from many tasks.
    ///
    /// # Errors
    ///
    /// `FatalError::Transport` if the send fails.
    pub async fn request(&self, text: &str) -> Result<ReplyOutcome, FatalError> {
        if text.is_empty() {
            self.stats.passthrough.fetch_add(1, Ordering::Relaxed);
            return Ok(ReplyOutcome::Delivered(String::new()));
        }

        let timeout = self.config.reply_timeout;
        let (token, waiter) = self.pending.register(Some(timeout));
        let request = token.attach(
            OutboundMessage::text(text).with_reply_to(self.reply_destination.clone()),
        );

        if let Err(e) = self.session.send(&self.request_destination, request).await {
            self.pending.cancel(&token);
            return Err(e.into());
        }
        let deadline = self
            .pending
            .arm(&token)
            .unwrap_or_else(|| std::time::Instant::now() + timeout);
        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        debug!(token = %token, in_flight = self.pending.pending_count(), "Request sent");

        let deadline = tokio::time::Instant::from_std(deadline);
        let outcome = match tokio::time::timeout_at(deadline, waiter).await {
            Ok(Ok(reply)) => matched_outcome(&reply),
            // Swept by cleanup before the reply came.
            Ok(Err(_)) => ReplyOutcome::TimedOut,
            Err(_) => {
                self.pending.cancel(&token);
                ReplyOutcome::TimedOut
            }
        };

        self.stats.record(&outcome);
        debug!(token = %token, outcome = outcome.label(), "Request cycle finished");
        Ok(outcome)
    }

    /// Requests currently waiting for a reply.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.pending_count()
    }

    #[must_use]
    pub fn reply_destination(&self) -> &Destination {
        &self.reply_destination
    }

    #[must_use]
    pub fn stats(&self) -> &RequestorStats {
        &self.stats
    }

    #[must_use]
    pub fn dispatch_stats(&self) -> &DispatchStats {
        &self.dispatch_stats
    }

    #[must_use]
    pub fn pending(&self) -> &PendingReplyTable {
        &self.pending
    }

    /// Stop routing replies and close the session.
    pub async fn close(&self) {
        self.dispatcher.abort();
        self.cleanup.abort();
        self.session.close().await;
    }
}

impl Drop for ConcurrentRequestor {
    fn drop(&mut self) {
        self.dispatcher.abort();
        self.cleanup.abort();
    }
}

#[async_trait]
impl RequestApi for ConcurrentRequestor {
    async fn request(&self, text: &str) -> Result<ReplyOutcome, FatalError> {
        ConcurrentRequestor::request(self, text).await
    }
}

async fn dispatch_replies(
    session: Arc<dyn TransportSession>,
    reply_destination: Destination,
    pending: Arc<PendingReplyTable>,
    stats: Arc<DispatchStats>,
) {
    loop {
        match session.receive(&reply_destination, DISPATCH_POLL).await {
            Ok(Some(reply)) => {
                let Some(raw) = reply.correlation_token().map(str::to_owned) else {
                    stats.missing_correlation.fetch_add(1, Ordering::Relaxed);
                    warn!(native_id = reply.native_id(), "Dropping reply without correlation token");
                    continue;
                };
                if !pending.complete(&raw, reply) {
                    stats.unroutable.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(None) => {}
            Err(TransportError::SessionClosed) => {
                debug!(reply_to = %reply_destination, "Session closed, reply dispatcher stopping");
                break;
            }
            Err(e) => {
                warn!(error = %e, reply_to = %reply_destination, "Reply dispatcher stopping");
                break;
            }
        }
    }
}
