pub mod capture;
pub mod client;
pub mod config;
pub mod conversation;
pub mod display;
pub mod error;
pub mod logging;
pub mod message;
pub mod prompts;

pub use capture::{CaptureBuffer, CaptureCursor};
pub use client::{ChatClient, RetryPolicy, SnapshotStream, StreamSnapshot};
pub use config::ClientConfig;
pub use conversation::{drain_turn, Conversation, HistorySnapshot, TurnStream, TurnUpdate};
pub use display::{split_thinking, DisplayError, DisplayPayload};
pub use error::{ChatError, ChatResult};
pub use logging::{init_logging, LoggingConfig};
pub use message::{MessageBuilder, TurnInput};
pub use prompts::{ConversationMode, PromptCatalog, StaticPromptCatalog};
// Re-export the protocol and media crates used in public signatures
pub use chat_protocol;
pub use llm_multimodal;
