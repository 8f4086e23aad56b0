//! Cross-component integration flows.

pub mod correlation;
pub mod request_reply;
pub mod runtime_flow;
