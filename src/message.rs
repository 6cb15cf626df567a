//! Builds the messages for one user turn from raw multimodal input.

use std::sync::Arc;

use chat_protocol::{ContentPart, ImageDetail, Message};
use llm_multimodal::{
    load_video, sequence_label, timestamp_label, FfmpegDecoder, MediaEncoder, MediaInput,
    MediaKind, VideoDecoder, VisionConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{ChatError, ChatResult},
    prompts::{ConversationMode, PromptCatalog},
};

/// Raw input of one user turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnInput {
    /// Free text appended after all media
    #[serde(default)]
    pub text: String,

    /// Media files in presentation order
    #[serde(default)]
    pub media: Vec<MediaInput>,

    /// Capture position of this turn when it carries no capture frame. A
    /// capture frame in `media` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_index: Option<u64>,
}

impl TurnInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_media(mut self, media: MediaInput) -> Self {
        self.media.push(media);
        self
    }

    pub fn with_streaming_index(mut self, index: u64) -> Self {
        self.streaming_index = Some(index);
        self
    }

    /// Sequence number of the turn's live-capture position: the last capture
    /// frame's number (its position in `media` if it has none), else
    /// `streaming_index`.
    pub fn resolved_streaming_index(&self) -> Option<u64> {
        self.media
            .iter()
            .enumerate()
            .filter(|(_, media)| media.kind == MediaKind::CaptureFrame)
            .map(|(position, media)| media.capture_sequence_number.unwrap_or(position as u64))
            .last()
            .or(self.streaming_index)
    }
}

/// Turns a [`TurnInput`] into a user message, preceded by a system message
/// when the turn opens a live-capture session (streaming index 0).
#[derive(Clone)]
pub struct MessageBuilder {
    vision: VisionConfig,
    detail: ImageDetail,
    decoder: Arc<dyn VideoDecoder>,
    prompts: Arc<dyn PromptCatalog>,
}

impl std::fmt::Debug for MessageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBuilder")
            .field("vision", &self.vision)
            .field("detail", &self.detail)
            .field("decoder", &self.decoder.name())
            .finish()
    }
}

impl MessageBuilder {
    pub fn new(vision: VisionConfig, detail: ImageDetail, prompts: Arc<dyn PromptCatalog>) -> Self {
        Self {
            vision,
            detail,
            decoder: Arc::new(FfmpegDecoder::default()),
            prompts,
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn VideoDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn vision(&self) -> &VisionConfig {
        &self.vision
    }

    /// Build the new messages for `input`. History is not touched; the caller
    /// appends the result. Any media failure aborts the whole turn.
    pub fn build(&self, input: &TurnInput, mode: ConversationMode) -> ChatResult<Vec<Message>> {
        let encoder = MediaEncoder::new(self.vision.solver(), self.vision.jpeg_quality);
        let mut parts = Vec::new();

        for (position, media) in input.media.iter().enumerate() {
            match media.kind {
                MediaKind::Video => {
                    let frames = load_video(&media.path, &self.vision, self.decoder.as_ref())?;
                    for frame in frames {
                        if let Some(seconds) = frame.timestamp {
                            parts.push(ContentPart::text(timestamp_label(seconds)));
                        }
                        parts.push(ContentPart::jpeg_base64(&frame.image.data, self.detail));
                    }
                }
                MediaKind::Image => {
                    let image = encoder.encode_file(&media.path, self.vision.image_budget())?;
                    debug!(
                        path = %media.path.display(),
                        width = image.width,
                        height = image.height,
                        "Encoded image"
                    );
                    parts.push(ContentPart::jpeg_base64(&image.data, self.detail));
                }
                MediaKind::CaptureFrame => {
                    let sequence = media.capture_sequence_number.unwrap_or(position as u64);
                    let image = encoder.encode_file(&media.path, self.vision.capture_budget())?;
                    debug!(
                        path = %media.path.display(),
                        sequence,
                        width = image.width,
                        height = image.height,
                        "Encoded capture frame"
                    );
                    parts.push(ContentPart::text(sequence_label(sequence)));
                    parts.push(ContentPart::jpeg_base64(&image.data, self.detail));
                }
            }
        }

        if !input.text.is_empty() {
            parts.push(ContentPart::text(input.text.clone()));
        }
        if parts.is_empty() {
            return Err(ChatError::InvalidRequest(
                "turn has neither text nor media".to_string(),
            ));
        }

        let images = parts.iter().filter(|part| part.is_image()).count();
        let mut messages = vec![Message::user(parts)];

        let streaming_index = input.resolved_streaming_index();
        if streaming_index == Some(0) {
            let prompt = self
                .prompts
                .lookup(mode.key())
                .ok_or_else(|| ChatError::PromptNotFound(mode.key().to_string()))?;
            messages.insert(0, Message::system(prompt));
        }

        info!(
            media = input.media.len(),
            images,
            streaming_index,
            system_prompt = messages.len() > 1,
            "Built turn messages"
        );
        Ok(messages)
    }
}
