//! Service Layer
//!
//! Requestor and replier state machines built on the ports.

pub mod batch;
pub mod concurrent;
pub mod pending;
pub mod replier;
pub mod requestor;
pub mod shutdown;

pub use batch::{translate_lines, BatchSummary};
pub use concurrent::{ConcurrentRequestor, DispatchStats};
pub use pending::{PendingReplyTable, PendingStats};
pub use replier::{reply_token, Replier, ReplierStats, RequestHandler};
pub use requestor::{Requestor, RequestorStats};
pub use shutdown::ShutdownSignal;
