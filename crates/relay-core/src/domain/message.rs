//! # Message Envelope
//!
//! The application builds an [`OutboundMessage`] draft; the transport stamps it
//! into an immutable [`Message`] when it accepts the send. Nothing mutates a
//! `Message` after that point.

use std::fmt;
use std::time::SystemTime;

/// Kind of publish/subscribe address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    /// Named, shared across processes, owned by whoever declared it.
    Durable,
    /// Broker-allocated, private to the creating session.
    Temporary,
}

/// Reference to a named or temporary topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    name: String,
    kind: DestinationKind,
}

impl Destination {
    /// Reference a durable topic by its physical name.
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DestinationKind::Durable,
        }
    }

    /// Reference a temporary topic by its broker-assigned name.
    pub fn temporary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DestinationKind::Temporary,
        }
    }

    /// Physical name on the broker.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.kind == DestinationKind::Temporary
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DestinationKind::Durable => write!(f, "topic://{}", self.name),
            DestinationKind::Temporary => write!(f, "temp-topic://{}", self.name),
        }
    }
}

/// Message payload.
///
/// Only `Text` is meaningful to requestors and repliers; `Bytes` exists so
/// that uncoordinated peers can be detected and rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// UTF-8 text.
    Text(String),
    /// Opaque binary payload.
    Bytes(Vec<u8>),
}

impl Body {
    /// Text content, if this is a text body.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            Body::Bytes(_) => None,
        }
    }
}

/// Delivery mode. Only non-persistent delivery is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    NonPersistent,
}

/// Default message priority (middle of the 0-9 range).
pub const DEFAULT_PRIORITY: u8 = 4;

/// Message as built by the application, before the transport accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    body: Body,
    reply_to: Option<Destination>,
    correlation_token: Option<String>,
    delivery_mode: DeliveryMode,
    priority: u8,
}

impl OutboundMessage {
    /// New text message with no reply-to and no correlation token.
    pub fn text(body: impl Into<String>) -> Self {
        Self::with_body(Body::Text(body.into()))
    }

    /// New binary message.
    pub fn bytes(body: Vec<u8>) -> Self {
        Self::with_body(Body::Bytes(body))
    }

    fn with_body(body: Body) -> Self {
        Self {
            body,
            reply_to: None,
            correlation_token: None,
            delivery_mode: DeliveryMode::NonPersistent,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Copy with the reply-to destination set.
    #[must_use]
    pub fn with_reply_to(mut self, destination: Destination) -> Self {
        self.reply_to = Some(destination);
        self
    }

    /// Copy with the correlation token set.
    #[must_use]
    pub fn with_correlation_token(mut self, token: impl Into<String>) -> Self {
        self.correlation_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn reply_to(&self) -> Option<&Destination> {
        self.reply_to.as_ref()
    }

    #[must_use]
    pub fn correlation_token(&self) -> Option<&str> {
        self.correlation_token.as_deref()
    }

    #[must_use]
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }
}

/// Message as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    native_id: String,
    destination: Destination,
    body: Body,
    reply_to: Option<Destination>,
    correlation_token: Option<String>,
    delivery_mode: DeliveryMode,
    priority: u8,
    timestamp: SystemTime,
}

impl Message {
    /// Stamp a draft with the transport-assigned id and its destination.
    ///
    /// Transports call this when they accept a send.
    pub fn new(
        native_id: impl Into<String>,
        destination: Destination,
        outbound: OutboundMessage,
    ) -> Self {
        Self {
            native_id: native_id.into(),
            destination,
            body: outbound.body,
            reply_to: outbound.reply_to,
            correlation_token: outbound.correlation_token,
            delivery_mode: outbound.delivery_mode,
            priority: outbound.priority,
            timestamp: SystemTime::now(),
        }
    }

    /// Transport-assigned identifier.
    #[must_use]
    pub fn native_id(&self) -> &str {
        &self.native_id
    }

    /// Destination the message was published to.
    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Text content, if this is a text message.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.body.as_text()
    }

    #[must_use]
    pub fn reply_to(&self) -> Option<&Destination> {
        self.reply_to.as_ref()
    }

    /// Raw correlation token as carried on the wire (may still hold a
    /// provider prefix).
    #[must_use]
    pub fn correlation_token(&self) -> Option<&str> {
        self.correlation_token.as_deref()
    }

    #[must_use]
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Time at which the transport accepted the message.
    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}
