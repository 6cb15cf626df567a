//! Streaming chat completion client.
//!
//! A request is sent once the connection is up (with bounded retries); the
//! response body is then decoded line by line into cumulative answer and
//! reasoning text. Nothing is retried once streaming has begun.

mod retry;
mod sse;

use std::collections::VecDeque;

use bytes::Bytes;
use chat_protocol::{ChatCompletionRequest, Message};
use futures::{stream::BoxStream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use self::{
    retry::{RetryError, RetryPolicy},
    sse::{SseEvent, SseLineDecoder},
};
use crate::{
    config::ClientConfig,
    error::{ChatError, ChatResult},
};

/// Accumulated text of both channels after a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub answer: String,
    pub reasoning: String,
}

/// Lazy, finite sequence of snapshots for one request.
pub type SnapshotStream = BoxStream<'static, ChatResult<StreamSnapshot>>;

/// Upper bound on the error body kept from a non-2xx response.
const MAX_ERROR_BODY_CHARS: usize = 2048;

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ChatClient {
    /// Build a client from a validated config whose API key is resolved.
    pub fn new(config: &ClientConfig) -> ChatResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ChatError::Config("api_key is not set".to_string()))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_http_client(
            http,
            config.base_url.clone(),
            config.model_id.clone(),
            api_key,
            config.retry_policy(),
        ))
    }

    pub fn with_http_client(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            retry,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `messages` and return the snapshot stream.
    ///
    /// Validation, transport and status errors surface here, before any
    /// snapshot. Mid-stream failures end the stream with one `Err` item.
    /// Cancelling `cancel` drops the response body, closing the connection,
    /// and ends the stream quietly.
    pub async fn stream(
        &self,
        messages: &[Message],
        thinking: bool,
        temperature: f32,
        cancel: CancellationToken,
    ) -> ChatResult<SnapshotStream> {
        let request = ChatCompletionRequest::streaming(&self.model, messages, thinking, temperature);
        request.validate().map_err(ChatError::InvalidRequest)?;
        let body = Bytes::from(
            serde_json::to_vec(&request)
                .map_err(|e| ChatError::InvalidRequest(format!("unserializable request: {e}")))?,
        );

        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            messages = messages.len(),
            thinking,
            temperature,
            body_bytes = body.len(),
            "Sending chat completion request"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            result = self.connect(body) => result?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            warn!(%status, body = %body, "Upstream rejected chat completion request");
            return Err(ChatError::UpstreamStatus { status, body });
        }

        let state = StreamState {
            body: response.bytes_stream().boxed(),
            decoder: SseLineDecoder::default(),
            pending: VecDeque::new(),
            snapshot: StreamSnapshot::default(),
            cancel,
            failure: None,
            closed: false,
            finished: false,
            deltas: 0,
        };
        Ok(futures::stream::unfold(state, next_snapshot).boxed())
    }

    async fn connect(&self, body: Bytes) -> ChatResult<reqwest::Response> {
        let result = self
            .retry
            .run(
                &self.endpoint,
                |attempt| {
                    debug!(attempt, "Connecting to chat completion endpoint");
                    self.http
                        .post(&self.endpoint)
                        .bearer_auth(&self.api_key)
                        .header(CONTENT_TYPE, "application/json")
                        .header(ACCEPT, "text/event-stream")
                        .body(body.clone())
                        .send()
                },
                |e: &reqwest::Error| !e.is_builder(),
            )
            .await;

        result.map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => ChatError::Connect {
                attempts,
                source: last,
            },
            RetryError::Fatal(e) => ChatError::Http(e),
        })
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseLineDecoder,
    pending: VecDeque<SseEvent>,
    snapshot: StreamSnapshot,
    cancel: CancellationToken,
    /// Decode failure reported once `pending` is drained
    failure: Option<ChatError>,
    /// Body exhausted; only `pending` remains
    closed: bool,
    /// Nothing more will be yielded
    finished: bool,
    deltas: usize,
}

impl StreamState {
    fn fail(mut self, error: ChatError) -> Option<(ChatResult<StreamSnapshot>, Self)> {
        warn!(error = %error, deltas = self.deltas, "Chat completion stream failed");
        self.finished = true;
        Some((Err(error), self))
    }
}

async fn next_snapshot(mut state: StreamState) -> Option<(ChatResult<StreamSnapshot>, StreamState)> {
    loop {
        if state.finished {
            return None;
        }

        if let Some(event) = state.pending.pop_front() {
            match event {
                SseEvent::Done => {
                    debug!(deltas = state.deltas, "Stream reached [DONE]");
                    state.finished = true;
                    return None;
                }
                SseEvent::Chunk(chunk) => {
                    let Some(delta) = chunk.first_delta() else {
                        continue;
                    };
                    state.snapshot.answer.push_str(delta.content());
                    state.snapshot.reasoning.push_str(delta.reasoning_content());
                    state.deltas += 1;
                    let snapshot = state.snapshot.clone();
                    return Some((Ok(snapshot), state));
                }
            }
        }

        if let Some(error) = state.failure.take() {
            return state.fail(error);
        }

        if state.closed {
            debug!(deltas = state.deltas, "Stream closed without [DONE]");
            state.finished = true;
            return None;
        }

        let next = tokio::select! {
            biased;
            _ = state.cancel.cancelled() => {
                info!(deltas = state.deltas, "Stream cancelled, closing connection");
                state.finished = true;
                return None;
            }
            next = state.body.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                let (events, failure) = state.decoder.push(&bytes);
                state.pending.extend(events);
                state.failure = failure;
            }
            Some(Err(e)) => return state.fail(ChatError::StreamRead(e)),
            None => {
                state.closed = true;
                match state.decoder.finish() {
                    Ok(Some(event)) => state.pending.push_back(event),
                    Ok(None) => {}
                    Err(e) => return state.fail(e),
                }
            }
        }
    }
}
