//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API for callers issuing requests
//! - Driven Ports (outbound) - Transport, directory and processor

pub mod inbound;
pub mod outbound;

pub use inbound::RequestApi;
pub use outbound::{
    Connector, Credentials, DestinationDirectory, MessageHandler, Subscription, TransportSession,
    WorkProcessor,
};
