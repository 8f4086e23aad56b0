//! # Relay Telemetry
//!
//! Structured logging for the relay processes, built on `tracing`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `RELAY_JSON_LOGS` | `false` | JSON output |
//! | `RELAY_SERVICE_NAME` | `relay` | Service name in logs |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}
