//! # Request/Reply Flows
//!
//! Requestor and replier on separate sessions of one broker, talking only
//! through topics.
//!
//! ## Flows Tested:
//!
//! 1. **Requestor → Replier → Requestor**: a line is translated and the reply
//!    matched by token
//! 2. **Concurrent requestors**: one replier serves both, replies never cross
//! 3. **Processor failure**: request dropped, requestor times out, replier
//!    keeps serving
//! 4. **Batch**: stdin-style lines with blank lines preserved

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use tokio::time::timeout;

    use relay_core::adapters::{
        GlossaryTranslator, InMemoryBroker, StaticDirectory, TranslationDirection,
        DEFAULT_ENDPOINT,
    };
    use relay_core::domain::{ReplyOutcome, RequestorConfig, TIMED_OUT_SENTINEL};
    use relay_core::error::ProcessorError;
    use relay_core::ports::{Connector, Credentials, TransportSession, WorkProcessor};
    use relay_core::service::{
        translate_lines, ConcurrentRequestor, Replier, Requestor, ShutdownSignal,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const REQUESTS: &str = "nlp/translation/requests";

    fn directory() -> StaticDirectory {
        StaticDirectory::for_topic(REQUESTS, DEFAULT_ENDPOINT)
    }

    async fn session(broker: &InMemoryBroker) -> Arc<dyn TransportSession> {
        Arc::new(
            broker
                .connect(DEFAULT_ENDPOINT, &Credentials::anonymous())
                .await
                .unwrap(),
        )
    }

    /// Sleeps for a per-input latency, then answers "{input}!".
    struct DelayedProcessor;

    #[async_trait]
    impl WorkProcessor for DelayedProcessor {
        async fn process(&self, text: &str) -> Result<String, ProcessorError> {
            let latency = match text {
                "slow" => Duration::from_millis(300),
                "fail" => return Err(ProcessorError::Failed("refused".into())),
                _ => Duration::from_millis(20),
            };
            tokio::time::sleep(latency).await;
            Ok(format!("{text}!"))
        }
    }

    struct Relay {
        broker: InMemoryBroker,
        shutdown: ShutdownSignal,
        replier: tokio::task::JoinHandle<()>,
        replier_stats: Arc<relay_core::service::ReplierStats>,
    }

    async fn start_relay(processor: Arc<dyn WorkProcessor>) -> Relay {
        let broker = InMemoryBroker::new();
        broker.declare_topic(REQUESTS);

        let replier = Replier::from_directory(&directory(), session(&broker).await, processor)
            .await
            .unwrap();
        let replier_stats = replier.stats();
        let shutdown = ShutdownSignal::new();
        let replier = tokio::spawn(replier.run_until(shutdown.clone()));

        Relay {
            broker,
            shutdown,
            replier,
            replier_stats,
        }
    }

    async fn requestor(relay: &Relay, reply_timeout: Duration) -> Arc<Requestor> {
        Arc::new(
            Requestor::from_directory(
                &directory(),
                session(&relay.broker).await,
                RequestorConfig::with_timeout(reply_timeout),
            )
            .await
            .unwrap(),
        )
    }

    async fn stop(relay: Relay) {
        relay.shutdown.trigger();
        timeout(Duration::from_secs(1), relay.replier)
            .await
            .expect("replier stops")
            .unwrap();
    }

    // =============================================================================
    // INTEGRATION TESTS: SINGLE ROUND TRIP
    // =============================================================================

    #[tokio::test]
    async fn test_hello_translated() {
        let translator = GlossaryTranslator::new(TranslationDirection::EnglishToChinese)
            .with_entry("hello", "你好");
        let relay = start_relay(Arc::new(translator)).await;
        let requestor = requestor(&relay, Duration::from_secs(2)).await;

        let outcome = requestor.request("hello").await.unwrap();

        assert_eq!(outcome, ReplyOutcome::Delivered("你好".into()));
        assert_eq!(relay.replier_stats.replied.load(Ordering::Relaxed), 1);
        stop(relay).await;
    }

    #[tokio::test]
    async fn test_processor_failure_times_out_and_replier_survives() {
        let relay = start_relay(Arc::new(DelayedProcessor)).await;
        let requestor = requestor(&relay, Duration::from_millis(200)).await;

        assert_eq!(
            requestor.request("fail").await.unwrap(),
            ReplyOutcome::TimedOut
        );
        assert_eq!(
            requestor.request("again").await.unwrap(),
            ReplyOutcome::Delivered("again!".into())
        );
        assert_eq!(relay.replier_stats.dropped.load(Ordering::Relaxed), 1);
        stop(relay).await;
    }

    #[tokio::test]
    async fn test_no_replier_times_out() {
        let broker = InMemoryBroker::new();
        broker.declare_topic(REQUESTS);
        let requestor = Requestor::from_directory(
            &directory(),
            session(&broker).await,
            RequestorConfig::with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        let started = Instant::now();
        let outcome = requestor.request("hello").await.unwrap();

        assert_eq!(outcome.into_text(), TIMED_OUT_SENTINEL);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(broker.stats().dropped.load(Ordering::Relaxed), 1);
    }

    // =============================================================================
    // INTEGRATION TESTS: CONCURRENCY
    // =============================================================================

    /// Two requestors with different processing latencies share one replier.
    /// The fast one must not wait behind the slow one, and neither may see the
    /// other's reply.
    #[tokio::test]
    async fn test_concurrent_requestors_isolated() {
        let relay = start_relay(Arc::new(DelayedProcessor)).await;
        let slow_requestor = requestor(&relay, Duration::from_secs(2)).await;
        let fast_requestor = requestor(&relay, Duration::from_secs(2)).await;

        let started = Instant::now();
        let slow = tokio::spawn(async move {
            let outcome = slow_requestor.request("slow").await.unwrap();
            (outcome, started.elapsed())
        });
        // Make sure the slow request is in the replier first.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let fast = tokio::spawn(async move {
            let outcome = fast_requestor.request("fast").await.unwrap();
            (outcome, started.elapsed())
        });

        let (slow_outcome, slow_elapsed) = slow.await.unwrap();
        let (fast_outcome, fast_elapsed) = fast.await.unwrap();

        assert_eq!(slow_outcome, ReplyOutcome::Delivered("slow!".into()));
        assert_eq!(fast_outcome, ReplyOutcome::Delivered("fast!".into()));
        assert!(fast_elapsed < slow_elapsed);
        stop(relay).await;
    }

    #[tokio::test]
    async fn test_concurrent_requestor_many_in_flight() {
        let relay = start_relay(Arc::new(DelayedProcessor)).await;
        let requests = session(&relay.broker)
            .await
            .open_durable(REQUESTS)
            .await
            .unwrap();
        let requestor = Arc::new(
            ConcurrentRequestor::start(
                session(&relay.broker).await,
                requests,
                RequestorConfig::with_timeout(Duration::from_secs(2)),
            )
            .await
            .unwrap(),
        );

        let inputs = ["slow", "a", "b", "c"];
        let handles: Vec<_> = inputs
            .iter()
            .map(|&text| {
                let requestor = Arc::clone(&requestor);
                tokio::spawn(async move { requestor.request(text).await.unwrap() })
            })
            .collect();

        for (text, handle) in inputs.iter().zip(handles) {
            assert_eq!(
                handle.await.unwrap(),
                ReplyOutcome::Delivered(format!("{text}!"))
            );
        }
        assert_eq!(requestor.in_flight(), 0);
        stop(relay).await;
    }

    // =============================================================================
    // INTEGRATION TESTS: BATCH
    // =============================================================================

    #[tokio::test]
    async fn test_batch_translation_preserves_blank_lines() {
        let translator = GlossaryTranslator::new(TranslationDirection::EnglishToChinese)
            .with_entry("hello", "你好")
            .with_entry("thank you", "谢谢");
        let relay = start_relay(Arc::new(translator)).await;
        let requestor = requestor(&relay, Duration::from_secs(2)).await;

        let input: &[u8] = "hello\n\nthank you\n".as_bytes();
        let mut output = Vec::new();
        let summary = translate_lines(requestor.as_ref(), input, &mut output)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "hello\t->\t你好\n\nthank you\t->\t谢谢\n"
        );
        assert_eq!(summary.requested, 2);
        assert_eq!(summary.blank, 1);
        assert_eq!(requestor.stats().sent.load(Ordering::Relaxed), 2);
        stop(relay).await;
    }
}
