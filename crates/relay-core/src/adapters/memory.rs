//! # In-Memory Broker
//!
//! Topic-based broker living inside the process. Every consumer of a topic
//! gets its own unbounded channel, so a publish fans out to all current
//! consumers. A publish with no consumer is dropped (non-persistent delivery).
//!
//! Temporary topics are owned by the session that created them: only that
//! session may consume from them, and they are deleted when it closes. Any
//! session may publish to them.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{Destination, DestinationKind, Message, OutboundMessage, PROVIDER_ID_PREFIX};
use crate::error::TransportError;
use crate::ports::{Connector, Credentials, MessageHandler, Subscription, TransportSession};

/// Endpoint the in-memory broker answers to unless configured otherwise.
pub const DEFAULT_ENDPOINT: &str = "memory://local";

type SessionId = u64;
type ConsumerId = u64;

/// Broker statistics.
#[derive(Debug, Default)]
pub struct BrokerStats {
    /// Messages accepted for publishing.
    pub published: AtomicU64,
    /// Individual deliveries to consumers (one publish may fan out).
    pub delivered: AtomicU64,
    /// Messages accepted but dropped because nobody was consuming.
    pub dropped: AtomicU64,
}

struct Consumer {
    id: ConsumerId,
    session: SessionId,
    sender: mpsc::UnboundedSender<Message>,
}

struct Topic {
    kind: DestinationKind,
    owner: Option<SessionId>,
    consumers: Vec<Consumer>,
}

impl Topic {
    fn durable() -> Self {
        Self {
            kind: DestinationKind::Durable,
            owner: None,
            consumers: Vec::new(),
        }
    }

    fn temporary(owner: SessionId) -> Self {
        Self {
            kind: DestinationKind::Temporary,
            owner: Some(owner),
            consumers: Vec::new(),
        }
    }
}

struct BrokerInner {
    endpoint: String,
    credentials: Option<Credentials>,
    online: AtomicBool,
    topics: RwLock<HashMap<String, Topic>>,
    next_session: AtomicU64,
    next_consumer: AtomicU64,
    stats: BrokerStats,
}

impl BrokerInner {
    fn ensure_online(&self) -> Result<(), TransportError> {
        if self.online.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TransportError::ConnectionError(format!(
                "broker at {} is unreachable",
                self.endpoint
            )))
        }
    }

    fn publish(&self, message: Message) -> Result<usize, TransportError> {
        self.ensure_online()?;
        let name = message.destination().name().to_string();

        let mut topics = self.topics.write();
        let topic = topics
            .get_mut(&name)
            .ok_or_else(|| TransportError::DestinationNotFound(name.clone()))?;

        self.stats.published.fetch_add(1, Ordering::Relaxed);

        // Consumers whose receiver is gone are pruned here.
        topic
            .consumers
            .retain(|consumer| consumer.sender.send(message.clone()).is_ok());
        let receivers = topic.consumers.len();

        if receivers == 0 {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(
                destination = %message.destination(),
                native_id = message.native_id(),
                "Message dropped (no consumers)"
            );
        } else {
            self.stats
                .delivered
                .fetch_add(receivers as u64, Ordering::Relaxed);
            debug!(
                destination = %message.destination(),
                native_id = message.native_id(),
                receivers = receivers,
                "Message published"
            );
        }

        Ok(receivers)
    }

    fn add_consumer(
        &self,
        destination: &Destination,
        session: SessionId,
    ) -> Result<(ConsumerId, mpsc::UnboundedReceiver<Message>), TransportError> {
        self.ensure_online()?;
        let mut topics = self.topics.write();
        let topic = topics
            .get_mut(destination.name())
            .ok_or_else(|| TransportError::DestinationNotFound(destination.name().to_string()))?;

        if let Some(owner) = topic.owner {
            if owner != session {
                return Err(TransportError::NotOwner(destination.name().to_string()));
            }
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_consumer.fetch_add(1, Ordering::Relaxed);
        topic.consumers.push(Consumer {
            id,
            session,
            sender,
        });
        Ok((id, receiver))
    }

    fn remove_consumer(&self, name: &str, id: ConsumerId) {
        if let Some(topic) = self.topics.write().get_mut(name) {
            topic.consumers.retain(|consumer| consumer.id != id);
        }
    }

    fn release_session(&self, session: SessionId) -> usize {
        let mut topics = self.topics.write();
        let before = topics.len();
        topics.retain(|_, topic| topic.owner != Some(session));
        let removed = before - topics.len();
        for topic in topics.values_mut() {
            topic.consumers.retain(|consumer| consumer.session != session);
        }
        removed
    }
}

/// In-process broker. Cheap to clone; clones share the same topics.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Broker answering on [`DEFAULT_ENDPOINT`], accepting any credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::build(DEFAULT_ENDPOINT.to_string(), None)
    }

    /// Broker answering on a custom endpoint, accepting any credentials.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self::build(endpoint.into(), None)
    }

    /// Broker that only accepts connections presenting `credentials`.
    pub fn with_credentials(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self::build(endpoint.into(), Some(credentials))
    }

    fn build(endpoint: String, credentials: Option<Credentials>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                endpoint,
                credentials,
                online: AtomicBool::new(true),
                topics: RwLock::new(HashMap::new()),
                next_session: AtomicU64::new(1),
                next_consumer: AtomicU64::new(1),
                stats: BrokerStats::default(),
            }),
        }
    }

    /// Declare a durable topic. Declaring an existing topic is a no-op.
    pub fn declare_topic(&self, name: impl Into<String>) {
        let name = name.into();
        let mut topics = self.inner.topics.write();
        if !topics.contains_key(&name) {
            debug!(topic = %name, "Durable topic declared");
            topics.insert(name, Topic::durable());
        }
    }

    /// Open a session directly, bypassing endpoint and credential checks.
    ///
    /// # Errors
    ///
    /// `TransportError::ConnectionError` if the broker has been shut down.
    pub fn open_session(&self) -> Result<InMemorySession, TransportError> {
        self.inner.ensure_online()?;
        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, "Session opened");
        Ok(InMemorySession::new(id, Arc::clone(&self.inner)))
    }

    /// Take the broker offline. Connected sessions lose their consumers and
    /// further operations fail with `ConnectionError`.
    pub fn shutdown(&self) {
        self.inner.online.store(false, Ordering::Release);
        let mut topics = self.inner.topics.write();
        for topic in topics.values_mut() {
            topic.consumers.clear();
        }
        topics.retain(|_, topic| topic.kind == DestinationKind::Durable);
        info!(endpoint = %self.inner.endpoint, "Broker shut down");
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn stats(&self) -> &BrokerStats {
        &self.inner.stats
    }

    /// Whether a topic with this physical name exists.
    #[must_use]
    pub fn has_topic(&self, name: &str) -> bool {
        self.inner.topics.read().contains_key(name)
    }

    /// Number of consumers currently attached to a topic.
    #[must_use]
    pub fn consumer_count(&self, name: &str) -> usize {
        self.inner
            .topics
            .read()
            .get(name)
            .map_or(0, |topic| topic.consumers.len())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    type Session = InMemorySession;

    async fn connect(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<InMemorySession, TransportError> {
        if endpoint != self.inner.endpoint {
            return Err(TransportError::ConnectionError(format!(
                "no broker listening at {endpoint}"
            )));
        }
        if let Some(required) = &self.inner.credentials {
            if required != credentials {
                warn!(endpoint = endpoint, "Broker rejected credentials");
                return Err(TransportError::ConnectionError(
                    "authentication failed".into(),
                ));
            }
        }
        self.open_session()
    }
}

type SharedReceiver = Arc<AsyncMutex<mpsc::UnboundedReceiver<Message>>>;

/// Session on an [`InMemoryBroker`].
pub struct InMemorySession {
    id: SessionId,
    broker: Arc<BrokerInner>,
    /// Synchronous consumers, keyed by topic name.
    consumers: Mutex<HashMap<String, (ConsumerId, SharedReceiver)>>,
    dispatchers: Mutex<Vec<AbortHandle>>,
    closed: AtomicBool,
}

impl InMemorySession {
    fn new(id: SessionId, broker: Arc<BrokerInner>) -> Self {
        Self {
            id,
            broker,
            consumers: Mutex::new(HashMap::new()),
            dispatchers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::SessionClosed);
        }
        self.broker.ensure_online()
    }

    fn consumer_for(&self, destination: &Destination) -> Result<SharedReceiver, TransportError> {
        let mut consumers = self.consumers.lock();
        if let Some((_, receiver)) = consumers.get(destination.name()) {
            return Ok(Arc::clone(receiver));
        }
        let (id, receiver) = self.broker.add_consumer(destination, self.id)?;
        let receiver = Arc::new(AsyncMutex::new(receiver));
        consumers.insert(
            destination.name().to_string(),
            (id, Arc::clone(&receiver)),
        );
        Ok(receiver)
    }

    fn release(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for dispatcher in self.dispatchers.lock().drain(..) {
            dispatcher.abort();
        }
        let consumers: Vec<_> = self.consumers.lock().drain().collect();
        for (name, (id, _)) in &consumers {
            self.broker.remove_consumer(name, *id);
        }
        let temporaries = self.broker.release_session(self.id);
        debug!(
            session = self.id,
            temporaries = temporaries,
            "Session resources released"
        );
    }
}

async fn dispatch(handler: Arc<dyn MessageHandler>, message: Message) {
    let native_id = message.native_id().to_string();
    match AssertUnwindSafe(handler.on_message(message))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(native_id = %native_id, error = %e, "Message handler failed");
        }
        Err(_) => {
            error!(native_id = %native_id, "Message handler panicked");
        }
    }
}

#[async_trait]
impl TransportSession for InMemorySession {
    async fn open_durable(&self, name: &str) -> Result<Destination, TransportError> {
        self.ensure_open()?;
        match self.broker.topics.read().get(name) {
            Some(topic) if topic.kind == DestinationKind::Durable => {
                Ok(Destination::durable(name))
            }
            _ => Err(TransportError::DestinationNotFound(name.to_string())),
        }
    }

    async fn open_temporary(&self) -> Result<Destination, TransportError> {
        self.ensure_open()?;
        let name = format!("tmp-{}-{}", self.id, Uuid::new_v4().simple());
        self.broker
            .topics
            .write()
            .insert(name.clone(), Topic::temporary(self.id));
        let destination = Destination::temporary(name);
        // Consume right away so replies sent before the first receive queue up.
        self.consumer_for(&destination)?;
        debug!(session = self.id, destination = %destination, "Temporary topic created");
        Ok(destination)
    }

    async fn send(
        &self,
        destination: &Destination,
        message: OutboundMessage,
    ) -> Result<String, TransportError> {
        self.ensure_open()?;
        let native_id = format!("{}{}", PROVIDER_ID_PREFIX, Uuid::new_v4());
        let message = Message::new(native_id.clone(), destination.clone(), message);
        self.broker.publish(message)?;
        Ok(native_id)
    }

    async fn receive(
        &self,
        destination: &Destination,
        timeout: Duration,
    ) -> Result<Option<Message>, TransportError> {
        self.ensure_open()?;
        let receiver = self.consumer_for(destination)?;
        let mut receiver = receiver.lock().await;

        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) if self.is_closed() => Err(TransportError::SessionClosed),
            Ok(None) => Err(TransportError::ConnectionError(
                "consumer detached by broker".into(),
            )),
            Err(_) => Ok(None),
        }
    }

    async fn subscribe(
        &self,
        destination: &Destination,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, TransportError> {
        self.ensure_open()?;
        let (consumer_id, mut receiver) = self.broker.add_consumer(destination, self.id)?;

        let topic = destination.clone();
        let dispatcher = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                tokio::spawn(dispatch(Arc::clone(&handler), message));
            }
            debug!(destination = %topic, consumer = consumer_id, "Dispatcher stopped");
        });
        {
            let mut dispatchers = self.dispatchers.lock();
            dispatchers.retain(|handle| !handle.is_finished());
            dispatchers.push(dispatcher.abort_handle());
        }

        debug!(session = self.id, destination = %destination, "Subscribed");
        Ok(Subscription::new(destination.clone(), dispatcher))
    }

    async fn close(&self) {
        self.release();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.release();
    }
}
