use serde::{Deserialize, Serialize};

use super::messages::{Message, Role};

// ============================================================================
// Chat Completions request (streaming)
// ============================================================================

/// Streaming chat completion request body.
///
/// Borrows the conversation so the history does not have to be cloned to
/// build each request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    /// ID of the model to use
    pub model: &'a str,

    /// Full conversation, oldest message first
    pub messages: &'a [Message],

    /// Always `true`; responses are consumed as server-sent events
    pub stream: bool,

    /// Whether the model should emit a separate reasoning channel
    pub thinking: ThinkingConfig,

    /// Sampling temperature, between 0 and 2
    pub temperature: f32,
}

impl<'a> ChatCompletionRequest<'a> {
    pub const MIN_TEMPERATURE: f32 = 0.0;
    pub const MAX_TEMPERATURE: f32 = 2.0;

    pub fn streaming(
        model: &'a str,
        messages: &'a [Message],
        thinking: bool,
        temperature: f32,
    ) -> Self {
        Self {
            model,
            messages,
            stream: true,
            thinking: ThinkingConfig::from_enabled(thinking),
            temperature,
        }
    }

    /// Check request invariants before anything is sent.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        if self.messages.is_empty() {
            return Err("messages must not be empty".to_string());
        }
        if !(Self::MIN_TEMPERATURE..=Self::MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between {} and {}, got {}",
                Self::MIN_TEMPERATURE,
                Self::MAX_TEMPERATURE,
                self.temperature
            ));
        }
        Ok(())
    }
}

/// Reasoning channel toggle: `{"type": "enabled" | "disabled"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    #[serde(rename = "type")]
    pub kind: ThinkingType,
}

impl ThinkingConfig {
    pub fn from_enabled(enabled: bool) -> Self {
        let kind = if enabled {
            ThinkingType::Enabled
        } else {
            ThinkingType::Disabled
        };
        Self { kind }
    }

    pub fn is_enabled(&self) -> bool {
        self.kind == ThinkingType::Enabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingType {
    Enabled,
    Disabled,
}

// ============================================================================
// Streaming response chunks
// ============================================================================

/// One `data:` payload of a streamed chat completion.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Delta of the first choice, which is the only one requested.
    pub fn first_delta(&self) -> Option<&ChunkDelta> {
        self.choices.first().map(|choice| &choice.delta)
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

/// Incremental text for the answer and reasoning channels.
///
/// Providers send `null` or omit either field when a chunk only advances the
/// other channel.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    pub role: Option<Role>,
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
}

impl ChunkDelta {
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn reasoning_content(&self) -> &str {
        self.reasoning_content.as_deref().unwrap_or_default()
    }
}
