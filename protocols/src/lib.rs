//! OpenAI-compatible chat completion protocol types.

pub mod completion;
pub mod messages;

pub use completion::{
    ChatCompletionChunk, ChatCompletionRequest, ChunkChoice, ChunkDelta, ThinkingConfig,
    ThinkingType,
};
pub use messages::{ContentPart, ImageDetail, ImageUrl, Message, MessageContent, Role};
