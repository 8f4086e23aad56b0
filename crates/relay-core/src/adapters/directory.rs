use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::DirectoryError;
use crate::ports::DestinationDirectory;

/// Logical name the requestor resolves to find the request topic.
pub const REQUESTS_SEND: &str = "nlp-translation-requests-send";
/// Logical name the replier resolves to find the request topic.
pub const REQUESTS_RECEIVE: &str = "nlp-translation-requests-receive";
/// Logical name resolving to the broker endpoint.
pub const CONNECTION_FACTORY: &str = "ConnectionFactory";

/// Names every deployment must be able to resolve.
pub const WELL_KNOWN_NAMES: [&str; 3] = [REQUESTS_SEND, REQUESTS_RECEIVE, CONNECTION_FACTORY];

// ============================================================================
// StaticDirectory - In-code map for tests and embedded deployments
// ============================================================================

/// Directory backed by an in-code map.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: HashMap<String, String>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a binding.
    #[must_use]
    pub fn with_entry(mut self, name: impl Into<String>, physical: impl Into<String>) -> Self {
        self.entries.insert(name.into(), physical.into());
        self
    }

    /// Both request names bound to `topic`, connection factory bound to
    /// `endpoint`.
    pub fn for_topic(topic: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let topic = topic.into();
        Self::new()
            .with_entry(REQUESTS_SEND, topic.clone())
            .with_entry(REQUESTS_RECEIVE, topic)
            .with_entry(CONNECTION_FACTORY, endpoint)
    }

    /// Well-known names with no binding.
    #[must_use]
    pub fn missing_well_known(&self) -> Vec<&'static str> {
        WELL_KNOWN_NAMES
            .into_iter()
            .filter(|name| !self.entries.contains_key(*name))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, String>> for StaticDirectory {
    fn from(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

impl DestinationDirectory for StaticDirectory {
    fn resolve(&self, name: &str) -> Result<String, DirectoryError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryError::NameNotFound(name.to_string()))
    }
}

// ============================================================================
// TomlDirectory - Bindings loaded from a [directory] table
// ============================================================================

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    directory: HashMap<String, String>,
}

/// Directory loaded from the `[directory]` table of a TOML file.
///
/// ```toml
/// [directory]
/// "nlp-translation-requests-send" = "nlp/translation/requests"
/// "nlp-translation-requests-receive" = "nlp/translation/requests"
/// ConnectionFactory = "memory://local"
/// ```
#[derive(Debug, Clone)]
pub struct TomlDirectory {
    inner: StaticDirectory,
}

impl TomlDirectory {
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| DirectoryError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse bindings from a TOML string. Other tables are ignored.
    pub fn parse(content: &str) -> Result<Self, DirectoryError> {
        let file: DirectoryFile =
            toml::from_str(content).map_err(|e| DirectoryError::Parse(e.to_string()))?;
        Ok(Self {
            inner: file.directory.into(),
        })
    }

    /// Underlying map.
    #[must_use]
    pub fn as_static(&self) -> &StaticDirectory {
        &self.inner
    }
}

impl DestinationDirectory for TomlDirectory {
    fn resolve(&self, name: &str) -> Result<String, DirectoryError> {
        self.inner.resolve(name)
    }
}
