//! Conversation modes and the system prompt catalog.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Whether the model reasons in a separate channel before answering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    General,
    #[default]
    DeepThinking,
}

impl ConversationMode {
    pub fn key(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::DeepThinking => "deep_thinking",
        }
    }

    pub fn thinking_enabled(self) -> bool {
        matches!(self, Self::DeepThinking)
    }

    pub fn from_thinking(enabled: bool) -> Self {
        if enabled {
            Self::DeepThinking
        } else {
            Self::General
        }
    }
}

impl fmt::Display for ConversationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ConversationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "general" => Ok(Self::General),
            "deep_thinking" | "thinking" => Ok(Self::DeepThinking),
            other => Err(format!("unknown conversation mode: {other}")),
        }
    }
}

/// Source of system prompts, keyed by conversation mode.
pub trait PromptCatalog: Send + Sync {
    fn lookup(&self, key: &str) -> Option<&str>;
}

/// In-memory catalog, usually built from `ClientConfig::prompts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPromptCatalog {
    prompts: BTreeMap<String, String>,
}

impl StaticPromptCatalog {
    pub fn new(prompts: BTreeMap<String, String>) -> Self {
        Self { prompts }
    }

    pub fn with_prompt(mut self, key: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.prompts.insert(key.into(), prompt.into());
        self
    }
}

impl PromptCatalog for StaticPromptCatalog {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.prompts.get(key).map(String::as_str)
    }
}
