//! # Correlation Across the Broker
//!
//! Replies produced by a provider-style peer that decorates tokens with the
//! `ID:` marker, interleaves strays, or omits the token entirely.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use proptest::prelude::*;

    use relay_core::adapters::{InMemoryBroker, DEFAULT_ENDPOINT};
    use relay_core::domain::{
        CorrelationToken, Destination, Message, OutboundMessage, ReplyOutcome, RequestorConfig,
    };
    use relay_core::error::HandlerError;
    use relay_core::ports::{
        Connector, Credentials, MessageHandler, Subscription, TransportSession,
    };
    use relay_core::service::Requestor;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const REQUESTS: &str = "requests";

    /// How the peer answers each request.
    #[derive(Clone, Copy)]
    enum Peer {
        /// Reply with `ID:<token>`.
        Prefixed,
        /// Send one reply with a foreign token, then the real one.
        StrayFirst,
        /// Reply without any token.
        Tokenless,
        /// Reply with bytes instead of text.
        Binary,
    }

    struct PeerHandler {
        session: Arc<dyn TransportSession>,
        peer: Peer,
    }

    #[async_trait]
    impl MessageHandler for PeerHandler {
        async fn on_message(&self, message: Message) -> Result<(), HandlerError> {
            let reply_to = message.reply_to().cloned().expect("reply-to");
            let token = message.correlation_token().unwrap_or_default().to_string();
            let text = message.text().unwrap_or_default().to_uppercase();

            let replies = match self.peer {
                Peer::Prefixed => vec![
                    OutboundMessage::text(text).with_correlation_token(format!("ID:{token}"))
                ],
                Peer::StrayFirst => vec![
                    OutboundMessage::text("stray").with_correlation_token("someone-else"),
                    OutboundMessage::text(text).with_correlation_token(token),
                ],
                Peer::Tokenless => vec![OutboundMessage::text(text)],
                Peer::Binary => {
                    vec![OutboundMessage::bytes(vec![0xde, 0xad]).with_correlation_token(token)]
                }
            };
            for reply in replies {
                self.session.send(&reply_to, reply).await?;
            }
            Ok(())
        }
    }

    async fn session(broker: &InMemoryBroker) -> Arc<dyn TransportSession> {
        Arc::new(
            broker
                .connect(DEFAULT_ENDPOINT, &Credentials::anonymous())
                .await
                .unwrap(),
        )
    }

    async fn setup(peer: Peer, reply_timeout: Duration) -> (Requestor, Subscription) {
        let broker = InMemoryBroker::new();
        broker.declare_topic(REQUESTS);

        let peer_session = session(&broker).await;
        let requests = peer_session.open_durable(REQUESTS).await.unwrap();
        let handler = Arc::new(PeerHandler {
            session: Arc::clone(&peer_session),
            peer,
        });
        let subscription = peer_session.subscribe(&requests, handler).await.unwrap();

        let requestor = Requestor::start(
            session(&broker).await,
            Destination::durable(REQUESTS),
            RequestorConfig::with_timeout(reply_timeout),
        )
        .await
        .unwrap();
        (requestor, subscription)
    }

    // =============================================================================
    // INTEGRATION TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_provider_prefixed_token_matches() {
        let (requestor, _peer) = setup(Peer::Prefixed, Duration::from_secs(2)).await;

        let outcome = requestor.request("hello").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::Delivered("HELLO".into()));
    }

    #[tokio::test]
    async fn test_stray_reply_discarded_before_match() {
        let (requestor, _peer) = setup(Peer::StrayFirst, Duration::from_secs(2)).await;

        let outcome = requestor.request("hello").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::Delivered("HELLO".into()));
        assert_eq!(
            requestor
                .stats()
                .strays_discarded
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_tokenless_reply_is_missing_correlation() {
        let (requestor, _peer) = setup(Peer::Tokenless, Duration::from_secs(2)).await;

        let outcome = requestor.request("hello").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::MissingCorrelation);
    }

    #[tokio::test]
    async fn test_binary_reply_is_unexpected_type() {
        let (requestor, _peer) = setup(Peer::Binary, Duration::from_secs(2)).await;

        let outcome = requestor.request("hello").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::UnexpectedType);
    }

    #[tokio::test]
    async fn test_unsubscribed_peer_times_out() {
        let (requestor, peer) = setup(Peer::Prefixed, Duration::from_millis(100)).await;
        peer.unsubscribe();

        let outcome = requestor.request("hello").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::TimedOut);
    }

    // =============================================================================
    // PROPERTY TESTS
    // =============================================================================

    proptest! {
        #[test]
        fn prop_any_prefix_depth_matches(depth in 0usize..4) {
            let token = CorrelationToken::mint();
            let raw = format!("{}{}", "ID:".repeat(depth), token.as_str());
            prop_assert!(token.matches(&raw));
        }

        #[test]
        fn prop_distinct_tokens_never_match(depth in 0usize..4) {
            let token = CorrelationToken::mint();
            let other = CorrelationToken::mint();
            let raw = format!("{}{}", "ID:".repeat(depth), other.as_str());
            prop_assert!(!token.matches(&raw));
        }
    }
}
