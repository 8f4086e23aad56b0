//! Pending Reply Table - routes replies on a shared reply destination to the
//! request that is waiting for them.
//!
//! Maps correlation tokens to oneshot waiters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::domain::{CorrelationToken, Message};

/// A request waiting for its reply.
struct PendingReply {
    sender: oneshot::Sender<Message>,
    created_at: Instant,
    timeout: Duration,
}

/// Statistics for the pending reply table.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Tokens registered
    pub total_registered: AtomicU64,
    /// Replies handed to their waiter
    pub total_completed: AtomicU64,
    /// Entries removed by expiry
    pub total_timeouts: AtomicU64,
    /// Entries cancelled, or whose waiter was gone when the reply arrived
    pub total_cancelled: AtomicU64,
    /// Replies for tokens nobody was waiting on
    pub total_unknown: AtomicU64,
}

/// Token-to-waiter table.
///
/// Flow:
/// 1. Caller calls `register()` to mint a token and get a oneshot receiver
/// 2. Caller sends the request carrying the token, then calls `arm()`
/// 3. The reply dispatcher calls `complete()` with the token found on a reply
/// 4. Caller awaits the receiver or times out and calls `cancel()`
pub struct PendingReplyTable {
    pending: DashMap<CorrelationToken, PendingReply>,
    default_timeout: Duration,
    stats: Arc<PendingStats>,
}

impl PendingReplyTable {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            default_timeout,
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Mint a token and register a waiter for it.
    pub fn register(
        &self,
        timeout: Option<Duration>,
    ) -> (CorrelationToken, oneshot::Receiver<Message>) {
        let token = CorrelationToken::mint();
        let (tx, rx) = oneshot::channel();

        self.pending.insert(
            token.clone(),
            PendingReply {
                sender: tx,
                created_at: Instant::now(),
                timeout: timeout.unwrap_or(self.default_timeout),
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(token = %token, "Registered pending reply");
        (token, rx)
    }

    /// Restart the clock of a registered waiter once its request is on the
    /// wire, and return the deadline expiry will use for it.
    ///
    /// Callers wait until exactly this instant, so the cleanup sweep can
    /// never evict an entry whose caller is still inside its wait.
    pub fn arm(&self, token: &CorrelationToken) -> Option<Instant> {
        let mut entry = self.pending.get_mut(token)?;
        entry.created_at = Instant::now();
        Some(entry.created_at + entry.timeout)
    }

    /// Hand `reply` to the waiter registered under `raw_token`.
    ///
    /// The token is normalized first. Returns false if nobody is waiting.
    pub fn complete(&self, raw_token: &str, reply: Message) -> bool {
        let token = CorrelationToken::normalize(raw_token);
        let Some((_, pending)) = self.pending.remove(&token) else {
            self.stats.total_unknown.fetch_add(1, Ordering::Relaxed);
            warn!(token = %token, "Reply for unknown or expired token");
            return false;
        };

        let elapsed = pending.created_at.elapsed();
        match pending.sender.send(reply) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    token = %token,
                    response_time_ms = elapsed.as_millis(),
                    "Completed pending reply"
                );
                true
            }
            Err(_) => {
                // Waiter gave up between lookup and send.
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(token = %token, "Pending reply waiter dropped");
                false
            }
        }
    }

    /// Remove entries older than their timeout. Returns how many were removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|token, pending| {
            let elapsed = now.duration_since(pending.created_at);
            if elapsed > pending.timeout {
                debug!(
                    token = %token,
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = pending.timeout.as_millis(),
                    "Removing expired pending reply"
                );
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    /// Forget a waiter. Returns false if it was not pending.
    pub fn cancel(&self, token: &CorrelationToken) -> bool {
        if self.pending.remove(token).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self, token: &CorrelationToken) -> bool {
        self.pending.contains_key(token)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

/// Periodically drop waiters whose callers never collected them.
pub async fn cleanup_task(table: Arc<PendingReplyTable>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = table.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired pending replies");
        }
    }
}
