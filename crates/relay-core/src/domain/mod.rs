//! Domain Layer
//!
//! Pure types: message envelope, destinations, correlation tokens and reply
//! outcomes. No I/O.

pub mod config;
pub mod correlation;
pub mod message;
pub mod outcome;

pub use config::{RequestorConfig, DEFAULT_REPLY_TIMEOUT};
pub use correlation::{CorrelationToken, PROVIDER_ID_PREFIX};
pub use message::{
    Body, DeliveryMode, Destination, DestinationKind, Message, OutboundMessage, DEFAULT_PRIORITY,
};
pub use outcome::{
    ReplyOutcome, INCORRECT_TYPE_SENTINEL, MISMATCHED_ID_SENTINEL, MISSING_ID_SENTINEL,
    TIMED_OUT_SENTINEL,
};
