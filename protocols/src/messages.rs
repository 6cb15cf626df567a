//! Chat message definitions shared by requests and conversation history.
//!
//! Messages follow the OpenAI-compatible chat layout: a role plus either a
//! plain string or an ordered list of typed content parts. Part order is
//! significant and is serialized exactly as constructed.

use serde::{Deserialize, Serialize};

// ============================================================================
// Messages
// ============================================================================

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author
    pub role: Role,

    /// The message body
    pub content: MessageContent,
}

impl Message {
    /// System message carrying a plain-string prompt.
    pub fn system(prompt: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(prompt.into()),
        }
    }

    /// User message built from ordered content parts.
    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }

    /// Assistant message wrapping a single text part.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Parts(vec![ContentPart::text(text)]),
        }
    }

    /// Concatenation of every text segment in the message, in order.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts.iter().filter_map(ContentPart::as_text).collect(),
        }
    }

    /// Content parts of the message; a plain-string body has none.
    pub fn parts(&self) -> &[ContentPart] {
        match &self.content {
            MessageContent::Text(_) => &[],
            MessageContent::Parts(parts) => parts,
        }
    }
}

/// Role of a message author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message body: a plain string or an ordered list of content parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

// ============================================================================
// Content Parts
// ============================================================================

/// A typed content segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text segment
    Text { text: String },
    /// Image segment, usually an inline `data:` URL
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Inline JPEG image from an already base64-armored payload.
    pub fn jpeg_base64(payload: &str, detail: ImageDetail) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:image/jpeg;base64,{payload}"),
                detail: Some(detail),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ImageUrl { .. } => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::ImageUrl { .. })
    }
}

/// Image reference inside an `image_url` part
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Remote URL or `data:<mime>;base64,<payload>` URL
    pub url: String,

    /// Fidelity hint for the vision encoder
    pub detail: Option<ImageDetail>,
}

impl ImageUrl {
    /// Base64 payload of a `data:` URL, if this is one.
    pub fn base64_payload(&self) -> Option<&str> {
        let rest = self.url.strip_prefix("data:")?;
        let (meta, payload) = rest.split_once(',')?;
        meta.ends_with(";base64").then_some(payload)
    }
}

/// Image fidelity hint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    #[default]
    Auto,
    Low,
    High,
}
