//! Correlation token for request/reply matching.
//!
//! Uses UUID v4 (128 random bits) rendered in canonical hyphenated form.

use std::fmt;
use uuid::Uuid;

use crate::domain::message::OutboundMessage;

/// Marker some providers prepend to message and correlation ids.
pub const PROVIDER_ID_PREFIX: &str = "ID:";

/// Opaque token linking a reply to the request that caused it.
///
/// A token is minted once per request and never reused. Comparison against a
/// received token always goes through [`CorrelationToken::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Mint a fresh, globally-unique token.
    #[must_use]
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Strip leading provider markers so tokens compare equal across
    /// transport implementations.
    ///
    /// Total and idempotent: `normalize(normalize(x)) == normalize(x)`.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        let mut token = raw;
        while let Some(rest) = token.strip_prefix(PROVIDER_ID_PREFIX) {
            token = rest;
        }
        Self(token.to_string())
    }

    /// Copy of `message` carrying this token.
    #[must_use]
    pub fn attach(&self, message: OutboundMessage) -> OutboundMessage {
        message.with_correlation_token(self.0.clone())
    }

    /// Whether a raw token received from the transport answers this one.
    #[must_use]
    pub fn matches(&self, received_raw: &str) -> bool {
        Self::normalize(received_raw) == *self
    }

    /// Token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for CorrelationToken {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl AsRef<str> for CorrelationToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
