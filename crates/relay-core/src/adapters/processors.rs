//! Work processors the replier can be wired to.
//!
//! None of these talk to a real translation service; they stand in for one in
//! embedded deployments and tests.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProcessorError;
use crate::ports::WorkProcessor;

/// Reply produced by [`SimulatedTranslator`] for English to Chinese.
pub const SIMULATED_CHINESE: &str = "测试消息";
/// Reply produced by [`SimulatedTranslator`] for Chinese to English.
pub const SIMULATED_ENGLISH: &str = "Test Message";

/// Language pair a translator works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationDirection {
    #[default]
    #[serde(alias = "en-zh")]
    EnglishToChinese,
    #[serde(alias = "zh-en")]
    ChineseToEnglish,
}

impl TranslationDirection {
    /// Source and target language codes.
    #[must_use]
    pub fn languages(self) -> (&'static str, &'static str) {
        match self {
            TranslationDirection::EnglishToChinese => ("en", "zh"),
            TranslationDirection::ChineseToEnglish => ("zh", "en"),
        }
    }
}

impl fmt::Display for TranslationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (source, target) = self.languages();
        write!(f, "{source}->{target}")
    }
}

impl FromStr for TranslationDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en-zh" | "en->zh" | "english-to-chinese" => Ok(Self::EnglishToChinese),
            "zh-en" | "zh->en" | "chinese-to-english" => Ok(Self::ChineseToEnglish),
            other => Err(format!("unknown translation direction '{other}'")),
        }
    }
}

/// One translation call. Built fresh for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest<'a> {
    pub direction: TranslationDirection,
    pub source_text: &'a str,
}

impl<'a> TranslationRequest<'a> {
    #[must_use]
    pub fn new(direction: TranslationDirection, source_text: &'a str) -> Self {
        Self {
            direction,
            source_text,
        }
    }
}

/// Translator in simulation mode: answers every request with a fixed phrase in
/// the target language.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedTranslator {
    direction: TranslationDirection,
}

impl SimulatedTranslator {
    #[must_use]
    pub fn new(direction: TranslationDirection) -> Self {
        Self { direction }
    }

    fn translate(request: &TranslationRequest<'_>) -> &'static str {
        match request.direction {
            TranslationDirection::EnglishToChinese => SIMULATED_CHINESE,
            TranslationDirection::ChineseToEnglish => SIMULATED_ENGLISH,
        }
    }
}

#[async_trait]
impl WorkProcessor for SimulatedTranslator {
    async fn process(&self, text: &str) -> Result<String, ProcessorError> {
        let request = TranslationRequest::new(self.direction, text);
        Ok(Self::translate(&request).to_string())
    }
}

/// Translator backed by a fixed phrase table. Unknown phrases fail.
#[derive(Debug, Clone, Default)]
pub struct GlossaryTranslator {
    direction: TranslationDirection,
    entries: HashMap<String, String>,
}

impl GlossaryTranslator {
    #[must_use]
    pub fn new(direction: TranslationDirection) -> Self {
        Self {
            direction,
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_entry(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.entries.insert(source.into(), target.into());
        self
    }

    #[must_use]
    pub fn with_entries(mut self, entries: HashMap<String, String>) -> Self {
        self.entries.extend(entries);
        self
    }

    fn translate(&self, request: &TranslationRequest<'_>) -> Result<String, ProcessorError> {
        self.entries
            .get(request.source_text.trim())
            .cloned()
            .ok_or_else(|| {
                ProcessorError::Failed(format!(
                    "no {} translation for '{}'",
                    request.direction, request.source_text
                ))
            })
    }
}

#[async_trait]
impl WorkProcessor for GlossaryTranslator {
    async fn process(&self, text: &str) -> Result<String, ProcessorError> {
        self.translate(&TranslationRequest::new(self.direction, text))
    }
}

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProcessor;

#[async_trait]
impl WorkProcessor for EchoProcessor {
    async fn process(&self, text: &str) -> Result<String, ProcessorError> {
        Ok(text.to_string())
    }
}
