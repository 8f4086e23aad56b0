//! # Replier
//!
//! Subscribes to the shared request topic and answers every request
//! asynchronously:
//!
//! ```text
//! RECEIVED -> PROCESSED -> REPLIED | DROPPED
//! ```
//!
//! Each arrival runs in its own task, so a slow processor call never holds up
//! reception of the next request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::adapters::REQUESTS_RECEIVE;
use crate::domain::{Destination, Message, OutboundMessage};
use crate::error::{FatalError, HandlerError};
use crate::ports::{
    DestinationDirectory, MessageHandler, Subscription, TransportSession, WorkProcessor,
};
use crate::service::shutdown::ShutdownSignal;

/// Replier statistics.
#[derive(Debug, Default)]
pub struct ReplierStats {
    pub received: AtomicU64,
    pub replied: AtomicU64,
    pub dropped: AtomicU64,
}

/// Per-message handler: validate, process, reply.
pub struct RequestHandler {
    session: Arc<dyn TransportSession>,
    processor: Arc<dyn WorkProcessor>,
    stats: Arc<ReplierStats>,
}

impl RequestHandler {
    pub fn new(
        session: Arc<dyn TransportSession>,
        processor: Arc<dyn WorkProcessor>,
        stats: Arc<ReplierStats>,
    ) -> Self {
        Self {
            session,
            processor,
            stats,
        }
    }

    fn drop_request(&self, message: &Message, reason: &'static str) {
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(native_id = message.native_id(), reason = reason, "Request dropped");
    }
}

/// Token a reply to `request` must carry: the request's own token, or its
/// native id when the requestor did not set one.
#[must_use]
pub fn reply_token(request: &Message) -> &str {
    request
        .correlation_token()
        .unwrap_or_else(|| request.native_id())
}

#[async_trait]
impl MessageHandler for RequestHandler {
    async fn on_message(&self, message: Message) -> Result<(), HandlerError> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let Some(text) = message.text() else {
            self.drop_request(&message, "non-text body");
            return Ok(());
        };
        let Some(reply_to) = message.reply_to() else {
            self.drop_request(&message, "no reply-to destination");
            return Ok(());
        };

        let result = match self.processor.process(text).await {
            Ok(result) => result,
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(e.into());
            }
        };

        let token = reply_token(&message);
        let reply = OutboundMessage::text(result).with_correlation_token(token);
        if let Err(e) = self.session.send(reply_to, reply).await {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(e.into());
        }

        self.stats.replied.fetch_add(1, Ordering::Relaxed);
        debug!(token = token, reply_to = %reply_to, "Reply sent");
        Ok(())
    }
}

/// Long-running responder on a durable request topic.
pub struct Replier {
    session: Arc<dyn TransportSession>,
    request_destination: Destination,
    subscription: Option<Subscription>,
    stats: Arc<ReplierStats>,
}

impl Replier {
    /// Subscribe to `request_destination` and start answering.
    ///
    /// # Errors
    ///
    /// `FatalError::Transport` if the subscription cannot be established.
    pub async fn start(
        session: Arc<dyn TransportSession>,
        request_destination: Destination,
        processor: Arc<dyn WorkProcessor>,
    ) -> Result<Self, FatalError> {
        let stats = Arc::new(ReplierStats::default());
        let handler = Arc::new(RequestHandler::new(
            Arc::clone(&session),
            processor,
            Arc::clone(&stats),
        ));
        let subscription = session.subscribe(&request_destination, handler).await?;

        info!(requests = %request_destination, "Replier listening");
        Ok(Self {
            session,
            request_destination,
            subscription: Some(subscription),
            stats,
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
        processor: Arc<dyn WorkProcessor>,
    ) -> Result<Self, FatalError> {
        let physical = directory.resolve(REQUESTS_RECEIVE)?;
        let request_destination = session.open_durable(&physical).await?;
        Self::start(session, request_destination, processor).await
    }

    /// Answer requests until `shutdown` fires, then stop.
    pub async fn run_until(self, shutdown: ShutdownSignal) {
        shutdown.wait().await;
        self.stop().await;
    }

    /// Unsubscribe and close the session. The durable topic is left alone.
    pub async fn stop(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.session.close().await;
        info!(
            requests = %self.request_destination,
            received = self.stats.received.load(Ordering::Relaxed),
            replied = self.stats.replied.load(Ordering::Relaxed),
            dropped = self.stats.dropped.load(Ordering::Relaxed),
            "Replier stopped"
        );
    }

    /// Shared handle to the counters, usable after the replier is consumed.
    #[must_use]
    pub fn stats(&self) -> Arc<ReplierStats> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn request_destination(&self) -> &Destination {
        &self.request_destination
    }
}
