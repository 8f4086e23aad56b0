//! # Relay Runtime
//!
//! Wires one process together:
//!
//! 1. Resolve the broker endpoint and request topics from the directory
//! 2. Start the embedded broker and declare the request topics
//! 3. Connect the replier on its own session and start answering
//! 4. Connect the requestor on its own session
//!
//! Shutdown stops the replier first, then closes the requestor session.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use relay_core::adapters::{
    EchoProcessor, GlossaryTranslator, InMemoryBroker, SimulatedTranslator, CONNECTION_FACTORY,
    REQUESTS_RECEIVE, REQUESTS_SEND,
};
use relay_core::ports::{Connector, DestinationDirectory, RequestApi, TransportSession};
use relay_core::service::{
    translate_lines, BatchSummary, ConcurrentRequestor, Replier, Requestor, ShutdownSignal,
};
use relay_core::{FatalError, WorkProcessor};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{ProcessorMode, RelayConfig, RequestorMode};

/// Input used to check the processor before accepting traffic.
const SELF_TEST_INPUT: &str = "hello";

/// Build the processor selected by `[processor]`.
#[must_use]
pub fn build_processor(config: &RelayConfig) -> Arc<dyn WorkProcessor> {
    let section = &config.processor;
    match section.mode {
        ProcessorMode::Simulated => Arc::new(SimulatedTranslator::new(section.direction)),
        ProcessorMode::Glossary => Arc::new(
            GlossaryTranslator::new(section.direction).with_entries(section.glossary.clone()),
        ),
        ProcessorMode::Echo => Arc::new(EchoProcessor),
    }
}

/// A started relay: broker, replier task and requestor.
pub struct RelayRuntime {
    broker: InMemoryBroker,
    requestor: Arc<dyn RequestApi>,
    requestor_session: Arc<dyn TransportSession>,
    shutdown: ShutdownSignal,
    replier: JoinHandle<()>,
}

impl RelayRuntime {
    /// Bring everything up.
    ///
    /// # Errors
    ///
    /// Any directory, connection, processor self-test or subscription failure.
    pub async fn start(config: &RelayConfig) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let directory = config.directory();

        let endpoint = directory
            .resolve(CONNECTION_FACTORY)
            .context("Failed to resolve connection factory")?;
        info!(label = CONNECTION_FACTORY, endpoint = %endpoint, "Looked up connection factory");

        let broker = if config.connection.username.is_some() {
            InMemoryBroker::with_credentials(endpoint.clone(), config.credentials())
        } else {
            InMemoryBroker::with_endpoint(endpoint.clone())
        };
        for label in [REQUESTS_SEND, REQUESTS_RECEIVE] {
            let topic = directory
                .resolve(label)
                .with_context(|| format!("Failed to resolve {label}"))?;
            broker.declare_topic(topic);
        }

        let processor = build_processor(config);
        processor
            .process(SELF_TEST_INPUT)
            .await
            .context("Work processor self-test failed")?;
        info!(mode = ?config.processor.mode, direction = %config.processor.direction, "Work processor ready");

        // Replier
        let replier_session: Arc<dyn TransportSession> = Arc::new(
            broker
                .connect(&endpoint, &config.credentials())
                .await
                .context("Replier could not connect to the broker")?,
        );
        let replier = Replier::from_directory(&directory, replier_session, processor)
            .await
            .context("Failed to start replier")?;
        let shutdown = ShutdownSignal::new();
        let replier = tokio::spawn(replier.run_until(shutdown.clone()));

        // Requestor
        let requestor_session: Arc<dyn TransportSession> = Arc::new(
            broker
                .connect(&endpoint, &config.credentials())
                .await
                .context("Requestor could not connect to the broker")?,
        );
        let requestor: Arc<dyn RequestApi> = match config.requestor.mode {
            RequestorMode::Sequential => Arc::new(
                Requestor::from_directory(
                    &directory,
                    Arc::clone(&requestor_session),
                    config.requestor_config(),
                )
                .await
                .context("Failed to start requestor")?,
            ),
            RequestorMode::Concurrent => {
                let physical = directory.resolve(REQUESTS_SEND)?;
                let requests = requestor_session.open_durable(&physical).await?;
                Arc::new(
                    ConcurrentRequestor::start(
                        Arc::clone(&requestor_session),
                        requests,
                        config.requestor_config(),
                    )
                    .await
                    .context("Failed to start requestor")?,
                )
            }
        };

        info!("Relay ready");
        Ok(Self {
            broker,
            requestor,
            requestor_session,
            shutdown,
            replier,
        })
    }

    /// Requestor handle for issuing requests.
    #[must_use]
    pub fn requestor(&self) -> Arc<dyn RequestApi> {
        Arc::clone(&self.requestor)
    }

    #[must_use]
    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    /// Signal that stops the replier. Firing it early is fine.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Translate `input` line by line into `output` until the input ends or
    /// `interrupted` resolves, then shut down.
    ///
    /// Returns the batch summary, or `None` when interrupted.
    ///
    /// # Errors
    ///
    /// `FatalError` if a request could not be sent or the output failed. The
    /// relay is shut down in that case too.
    pub async fn serve<R, W, F>(
        self,
        input: R,
        output: W,
        interrupted: F,
    ) -> Result<Option<BatchSummary>, FatalError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let requestor = self.requestor();
        let result = tokio::select! {
            result = translate_lines(requestor.as_ref(), input, output) => {
                result.map(|summary| {
                    info!(
                        requested = summary.requested,
                        delivered = summary.delivered,
                        blank = summary.blank,
                        "Input finished"
                    );
                    Some(summary)
                })
            }
            () = interrupted => {
                info!("Interrupted");
                Ok(None)
            }
        };

        self.shutdown().await;
        result
    }

    /// Stop the replier, then close the requestor session.
    pub async fn shutdown(self) {
        info!("Initiating shutdown...");
        self.shutdown.trigger();
        if let Err(e) = self.replier.await {
            warn!(error = %e, "Replier task ended abnormally");
        }
        self.requestor_session.close().await;

        let stats = self.broker.stats();
        info!(
            published = stats.published.load(Ordering::Relaxed),
            delivered = stats.delivered.load(Ordering::Relaxed),
            dropped = stats.dropped.load(Ordering::Relaxed),
            "Shutdown complete"
        );
    }
}
