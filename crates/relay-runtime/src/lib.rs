//! # Relay Runtime
//!
//! Process-level wiring for the relay: configuration loading and the
//! embedded broker, replier and requestor that the `relay-runtime` binary
//! runs.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then environment, then command line)
//! 2. Initialise logging
//! 3. Resolve directory names, start the broker, self-test the processor
//! 4. Start the replier and the requestor on separate sessions
//! 5. Translate stdin line by line until EOF or Ctrl+C

pub mod config;
pub mod input;
pub mod runtime;

pub use config::{ConfigError, ProcessorMode, RelayConfig, RequestorMode};
pub use input::{detached_reader, stdin_reader};
pub use runtime::{build_processor, RelayRuntime};
