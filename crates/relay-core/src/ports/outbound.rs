//! Outbound Ports (Driven Ports)
//!
//! Collaborators the request/reply core depends on: the transport session,
//! the destination directory and the work processor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{Destination, Message, OutboundMessage};
use crate::error::{DirectoryError, HandlerError, ProcessorError, TransportError};

/// Credentials presented when connecting to a broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    /// Anonymous connection.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Username/password pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }
}

/// Opens sessions against a broker endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: TransportSession + 'static;

    /// Connect to `endpoint` and open a session.
    ///
    /// # Errors
    ///
    /// `TransportError::ConnectionError` if the broker is unreachable or
    /// rejects the credentials.
    async fn connect(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<Self::Session, TransportError>;
}

/// Handler invoked for every message arriving on a subscription.
///
/// Invocations may run in parallel with each other; implementations must not
/// assume mutual exclusion.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn on_message(&self, message: Message) -> Result<(), HandlerError>;
}

/// A session on a publish/subscribe broker.
///
/// Sessions are shared between concurrent handlers, so every method takes
/// `&self` and implementations serialize internally where needed.
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Resolve a durable topic by physical name.
    async fn open_durable(&self, name: &str) -> Result<Destination, TransportError>;

    /// Allocate a temporary topic owned by this session.
    async fn open_temporary(&self) -> Result<Destination, TransportError>;

    /// Publish with non-persistent delivery, default priority and no expiry.
    ///
    /// Returns the native id assigned by the transport once the broker has
    /// accepted the message.
    async fn send(
        &self,
        destination: &Destination,
        message: OutboundMessage,
    ) -> Result<String, TransportError>;

    /// Wait up to `timeout` for the next message on `destination`.
    ///
    /// `Ok(None)` means the timeout elapsed.
    async fn receive(
        &self,
        destination: &Destination,
        timeout: Duration,
    ) -> Result<Option<Message>, TransportError>;

    /// Run `handler` for every arrival on `destination`.
    ///
    /// Handler failures and panics are caught and logged at the subscription
    /// boundary; they never end the subscription.
    async fn subscribe(
        &self,
        destination: &Destination,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, TransportError>;

    /// Release every destination and consumer owned by this session.
    /// Idempotent.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Handle to an asynchronous subscription.
///
/// Dropping the handle cancels the subscription. Handler invocations already
/// in flight run to completion.
#[derive(Debug)]
pub struct Subscription {
    destination: Destination,
    dispatcher: JoinHandle<()>,
}

impl Subscription {
    /// Wrap the task that dispatches arrivals to the handler.
    pub fn new(destination: Destination, dispatcher: JoinHandle<()>) -> Self {
        Self {
            destination,
            dispatcher,
        }
    }

    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Whether the dispatcher is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.dispatcher.is_finished()
    }

    /// Stop dispatching new arrivals.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispatcher.abort();
        debug!(destination = %self.destination, "Subscription dropped");
    }
}

/// Maps well-known logical names to physical destination names or endpoints.
pub trait DestinationDirectory: Send + Sync {
    /// # Errors
    ///
    /// `DirectoryError::NameNotFound` if the label is unknown.
    fn resolve(&self, name: &str) -> Result<String, DirectoryError>;
}

/// External unit of work invoked by the replier for each request.
#[async_trait]
pub trait WorkProcessor: Send + Sync + 'static {
    async fn process(&self, text: &str) -> Result<String, ProcessorError>;
}
