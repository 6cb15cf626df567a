//! Chat client error types.

use llm_multimodal::MultiModalError;
use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media processing failed: {0}")]
    Media(#[from] MultiModalError),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Failed to connect after {attempts} attempts: {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream returned {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Stream read error: {0}")]
    StreamRead(#[source] reqwest::Error),

    #[error("Malformed stream event: {0}")]
    StreamDecode(String),

    #[error("Stream buffer exceeded maximum size ({0} bytes)")]
    StreamBufferOverflow(usize),

    #[error("Request cancelled before the stream started")]
    Cancelled,

    #[error("Message construction task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ChatError {
    /// Errors raised before any network I/O, caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::InvalidRequest(_) | Self::Config(_) | Self::PromptNotFound(_) => true,
            Self::Media(e) => e.is_validation(),
            _ => false,
        }
    }

    /// Errors that ended an already established stream.
    pub fn is_mid_stream(&self) -> bool {
        matches!(
            self,
            Self::StreamRead(_) | Self::StreamDecode(_) | Self::StreamBufferOverflow(_)
        )
    }
}
