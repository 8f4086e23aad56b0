//! # Relay Core - Request/Reply Correlation over Topics
//!
//! Lets a caller send a request over a publish/subscribe transport and get
//! back, matched and timed, the one reply that answers it, even though every
//! message travels through the same uncorrelated stream.
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────┐  request + token + reply-to   ┌─────────────┐
//! │  Requestor  │ ────────────────────────────▶ │   Broker    │
//! │             │                               │  (topics)   │
//! │ temp topic  │ ◀──────────────────────────── │             │
//! └─────────────┘       reply + same token      └──────┬──────┘
//!                                                      │ subscribe()
//!                                               ┌──────▼──────┐
//!                                               │   Replier   │
//!                                               │ (handler per│
//!                                               │   message)  │
//!                                               └──────┬──────┘
//!                                                      ▼
//!                                                WorkProcessor
//! ```
//!
//! ## Layers
//!
//! - `domain` - message envelope, destinations, tokens, outcomes
//! - `ports` - transport, directory and processor traits
//! - `adapters` - in-memory broker, directories, processors
//! - `service` - requestor and replier state machines

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
#![deny(unsafe_code)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

// Re-export main types
pub use adapters::{
    InMemoryBroker, InMemorySession, StaticDirectory, TomlDirectory, CONNECTION_FACTORY,
    REQUESTS_RECEIVE, REQUESTS_SEND,
};
pub use domain::{
    CorrelationToken, Destination, Message, OutboundMessage, ReplyOutcome, RequestorConfig,
};
pub use error::{DirectoryError, FatalError, HandlerError, ProcessorError, TransportError};
pub use ports::{
    Connector, Credentials, DestinationDirectory, MessageHandler, RequestApi, Subscription,
    TransportSession, WorkProcessor,
};
pub use service::{
    translate_lines, ConcurrentRequestor, Replier, RequestHandler, Requestor, ShutdownSignal,
};
