//! One conversational turn, end to end.
//!
//! The caller owns the history: each turn takes the previous history and
//! yields snapshots that already include the in-progress assistant reply.
//! The last snapshot is the history to pass into the next turn.

use std::sync::Arc;

use chat_protocol::{ChatCompletionRequest, Message};
use futures::{stream::BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    client::{ChatClient, StreamSnapshot},
    config::ClientConfig,
    display::DisplayPayload,
    error::{ChatError, ChatResult},
    message::{MessageBuilder, TurnInput},
    prompts::{ConversationMode, StaticPromptCatalog},
};

/// Conversation history as of one snapshot: the committed prefix (previous
/// history plus this turn's new messages) and the current assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    prefix: Arc<[Message]>,
    assistant: Message,
}

impl HistorySnapshot {
    pub fn len(&self) -> usize {
        self.prefix.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Previous history followed by this turn's new messages.
    pub fn prefix(&self) -> &[Message] {
        &self.prefix
    }

    pub fn assistant(&self) -> &Message {
        &self.assistant
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.prefix.iter().chain(std::iter::once(&self.assistant))
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.iter().cloned().collect()
    }
}

impl From<HistorySnapshot> for Vec<Message> {
    fn from(snapshot: HistorySnapshot) -> Self {
        let mut messages = Vec::with_capacity(snapshot.len());
        messages.extend_from_slice(&snapshot.prefix);
        messages.push(snapshot.assistant);
        messages
    }
}

/// One yielded state of a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnUpdate {
    pub display: DisplayPayload,
    pub history: HistorySnapshot,
}

pub type TurnStream = BoxStream<'static, ChatResult<TurnUpdate>>;

#[derive(Debug, Clone)]
pub struct Conversation {
    client: ChatClient,
    builder: MessageBuilder,
}

impl Conversation {
    pub fn new(client: ChatClient, builder: MessageBuilder) -> Self {
        Self { client, builder }
    }

    /// Client and message builder from a validated config with a resolved
    /// API key.
    pub fn from_config(config: &ClientConfig) -> ChatResult<Self> {
        let client = ChatClient::new(config)?;
        let prompts = Arc::new(StaticPromptCatalog::new(config.prompts.clone()));
        let builder = MessageBuilder::new(config.vision.clone(), config.image_detail, prompts);
        Ok(Self::new(client, builder))
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// Run one turn.
    ///
    /// Messages are built and the connection is established before this
    /// returns, so validation, media and transport errors come back as `Err`
    /// and leave the caller's history untouched. `history` of `None` starts a
    /// new conversation.
    pub async fn turn(
        &self,
        input: TurnInput,
        history: Option<Vec<Message>>,
        mode: ConversationMode,
        temperature: f32,
        cancel: CancellationToken,
    ) -> ChatResult<TurnStream> {
        if !(ChatCompletionRequest::MIN_TEMPERATURE..=ChatCompletionRequest::MAX_TEMPERATURE)
            .contains(&temperature)
        {
            return Err(ChatError::InvalidRequest(format!(
                "temperature must be between {} and {}, got {temperature}",
                ChatCompletionRequest::MIN_TEMPERATURE,
                ChatCompletionRequest::MAX_TEMPERATURE,
            )));
        }

        let builder = self.builder.clone();
        let new_messages = tokio::task::spawn_blocking(move || builder.build(&input, mode))
            .await
            .map_err(|e| ChatError::Task(e.to_string()))??;

        let mut updated = history.unwrap_or_default();
        let previous = updated.len();
        updated.extend(new_messages);
        let prefix: Arc<[Message]> = updated.into();
        debug!(
            previous,
            new = prefix.len() - previous,
            %mode,
            "Starting conversation turn"
        );

        let thinking = mode.thinking_enabled();
        let snapshots = self
            .client
            .stream(&prefix, thinking, temperature, cancel)
            .await?;

        Ok(snapshots
            .map(move |item| item.map(|snapshot| to_update(&prefix, snapshot, thinking)))
            .boxed())
    }
}

fn to_update(prefix: &Arc<[Message]>, snapshot: StreamSnapshot, thinking: bool) -> TurnUpdate {
    let display = DisplayPayload::new(snapshot.answer, snapshot.reasoning, thinking);
    let assistant = Message::assistant_text(display.render());
    TurnUpdate {
        display,
        history: HistorySnapshot {
            prefix: Arc::clone(prefix),
            assistant,
        },
    }
}

/// Drain a turn, returning its final update (`None` if nothing was yielded).
pub async fn drain_turn(mut stream: TurnStream) -> ChatResult<Option<TurnUpdate>> {
    let mut last = None;
    while let Some(update) = stream.next().await {
        last = Some(update?);
    }
    Ok(last)
}
