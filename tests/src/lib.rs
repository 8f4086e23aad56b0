//! # Relay Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # Requestor ↔ broker ↔ replier flows
//! │   ├── request_reply.rs
//! │   ├── correlation.rs
//! │   └── runtime_flow.rs
//! └── benches/           # Token and round-trip benchmarks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p relay-tests
//! cargo test -p relay-tests integration::request_reply
//! cargo bench -p relay-tests
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod integration;
