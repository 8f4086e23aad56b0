//! # Relay Configuration
//!
//! Loaded from a TOML file, then overridden from the environment, then
//! validated before anything connects.
//!
//! ```toml
//! [directory]
//! "nlp-translation-requests-send" = "nlp/translation/requests"
//! "nlp-translation-requests-receive" = "nlp/translation/requests"
//! ConnectionFactory = "memory://local"
//!
//! [connection]
//! username = "relay"
//! password = "secret"
//!
//! [requestor]
//! reply_timeout_ms = 10000
//! mode = "sequential"
//!
//! [processor]
//! mode = "simulated"
//! direction = "en-zh"
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use relay_core::adapters::{
    StaticDirectory, TranslationDirection, CONNECTION_FACTORY, DEFAULT_ENDPOINT, REQUESTS_RECEIVE,
    REQUESTS_SEND,
};
use relay_core::domain::{RequestorConfig, DEFAULT_REPLY_TIMEOUT};
use relay_core::Credentials;
use serde::Deserialize;
use thiserror::Error;

/// Physical request topic used when no directory is configured.
pub const DEFAULT_REQUEST_TOPIC: &str = "nlp/translation/requests";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {name}")]
    EnvVar { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete process configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Logical name to physical name bindings.
    pub directory: HashMap<String, String>,
    pub connection: ConnectionConfig,
    pub requestor: RequestorSection,
    pub processor: ProcessorConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let directory = [
            (REQUESTS_SEND, DEFAULT_REQUEST_TOPIC),
            (REQUESTS_RECEIVE, DEFAULT_REQUEST_TOPIC),
            (CONNECTION_FACTORY, DEFAULT_ENDPOINT),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            directory,
            connection: ConnectionConfig::default(),
            requestor: RequestorSection::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

/// Broker credentials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// How requests are issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestorMode {
    /// One request in flight at a time.
    #[default]
    Sequential,
    /// Many requests share one reply destination.
    Concurrent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequestorSection {
    pub reply_timeout_ms: u64,
    pub mode: RequestorMode,
}

impl Default for RequestorSection {
    fn default() -> Self {
        Self {
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT.as_millis() as u64,
            mode: RequestorMode::default(),
        }
    }
}

/// Which work processor the replier runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorMode {
    /// Fixed phrase per direction.
    #[default]
    Simulated,
    /// Phrase table from `[processor.glossary]`.
    Glossary,
    /// Return the input.
    Echo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub mode: ProcessorMode,
    pub direction: TranslationDirection,
    pub glossary: HashMap<String, String>,
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing sections take their
    /// defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `RELAY_REPLY_TIMEOUT_MS`, `RELAY_USERNAME` and `RELAY_PASSWORD`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with a custom variable source.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RELAY_REPLY_TIMEOUT_MS") {
            self.requestor.reply_timeout_ms =
                value.trim().parse().map_err(|_| ConfigError::EnvVar {
                    name: "RELAY_REPLY_TIMEOUT_MS".into(),
                    value,
                })?;
        }
        if let Some(username) = lookup("RELAY_USERNAME") {
            self.connection.username = Some(username);
        }
        if let Some(password) = lookup("RELAY_PASSWORD") {
            self.connection.password = Some(password);
        }
        Ok(())
    }

    /// Reject settings the process cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.requestor.reply_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "requestor.reply_timeout_ms must be greater than zero".into(),
            ));
        }

        let missing = self.directory().missing_well_known();
        if !missing.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "directory is missing {}",
                missing.join(", ")
            )));
        }

        if self.connection.password.is_some() && self.connection.username.is_none() {
            return Err(ConfigError::Invalid(
                "connection.password is set without connection.username".into(),
            ));
        }

        if self.processor.mode == ProcessorMode::Glossary && self.processor.glossary.is_empty() {
            return Err(ConfigError::Invalid(
                "processor.mode = \"glossary\" needs a [processor.glossary] table".into(),
            ));
        }

        Ok(())
    }

    /// Directory built from the `[directory]` table.
    #[must_use]
    pub fn directory(&self) -> StaticDirectory {
        StaticDirectory::from(self.directory.clone())
    }

    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.requestor.reply_timeout_ms)
    }

    #[must_use]
    pub fn requestor_config(&self) -> RequestorConfig {
        RequestorConfig::with_timeout(self.reply_timeout())
    }

    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.connection.username.clone(),
            password: self.connection.password.clone(),
        }
    }
}
