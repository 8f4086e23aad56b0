//! Classification of a single reply wait.

use std::fmt;

use crate::domain::correlation::CorrelationToken;

/// Sentinel returned when no reply arrived before the deadline.
pub const TIMED_OUT_SENTINEL: &str = "[No translation response. Timed Out.]";
/// Sentinel returned when the reply carried no correlation token.
pub const MISSING_ID_SENTINEL: &str = "[No translation response. Missing ID.]";
/// Sentinel returned when only replies for other requests arrived.
pub const MISMATCHED_ID_SENTINEL: &str = "[No translation response. Mismatched ID.]";
/// Sentinel returned when the matching reply was not a text message.
pub const INCORRECT_TYPE_SENTINEL: &str = "[No translation response. Incorrect type.]";

/// Result of one receive attempt. Exactly one variant applies per attempt and
/// every variant is terminal for that attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Matching text reply.
    Delivered(String),
    /// Nothing arrived before the deadline.
    TimedOut,
    /// A reply arrived without a correlation token.
    MissingCorrelation,
    /// A reply arrived for some other request.
    MismatchedCorrelation {
        expected: CorrelationToken,
        actual: String,
    },
    /// The matching reply was not a text message.
    UnexpectedType,
}

impl ReplyOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, ReplyOutcome::Delivered(_))
    }

    /// Delivered text, or the sentinel describing why there is none.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            ReplyOutcome::Delivered(text) => text,
            other => other.sentinel().to_string(),
        }
    }

    /// Sentinel string for non-delivered outcomes. Empty for `Delivered`.
    #[must_use]
    pub fn sentinel(&self) -> &'static str {
        match self {
            ReplyOutcome::Delivered(_) => "",
            ReplyOutcome::TimedOut => TIMED_OUT_SENTINEL,
            ReplyOutcome::MissingCorrelation => MISSING_ID_SENTINEL,
            ReplyOutcome::MismatchedCorrelation { .. } => MISMATCHED_ID_SENTINEL,
            ReplyOutcome::UnexpectedType => INCORRECT_TYPE_SENTINEL,
        }
    }

    /// Short label used in logs and statistics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ReplyOutcome::Delivered(_) => "delivered",
            ReplyOutcome::TimedOut => "timed_out",
            ReplyOutcome::MissingCorrelation => "missing_correlation",
            ReplyOutcome::MismatchedCorrelation { .. } => "mismatched_correlation",
            ReplyOutcome::UnexpectedType => "unexpected_type",
        }
    }
}

impl fmt::Display for ReplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyOutcome::Delivered(text) => f.write_str(text),
            other => f.write_str(other.sentinel()),
        }
    }
}
