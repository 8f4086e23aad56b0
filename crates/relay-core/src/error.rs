//! Error types for the relay core.
//!
//! Receive-side anomalies (timeout, missing or mismatched token, wrong payload
//! type) are not errors: they are reported as
//! [`ReplyOutcome`](crate::domain::ReplyOutcome) values. The types here cover
//! transport failures, handler failures on the replier side, and the fatal
//! conditions that end a process.

use thiserror::Error;

/// Errors raised by a transport session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Destination not found: {0}")]
    DestinationNotFound(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Temporary destination {0} belongs to another session")]
    NotOwner(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Errors from destination directory lookups.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Could not find the label '{0}' in the directory")]
    NameNotFound(String),

    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse directory: {0}")]
    Parse(String),
}

/// Errors from a work processor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("Processing failed: {0}")]
    Failed(String),

    #[error("Processor unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by an asynchronous message handler.
///
/// These stop at the subscription boundary, where they are logged.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Conditions that terminate the host process.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("Directory lookup failed: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
