#![allow(dead_code)]

use std::{path::Path, sync::Arc};

use chat_protocol::ImageDetail;
use image::{Rgb, RgbImage};
use llm_multimodal::VisionConfig;
use mm_chat::{ChatClient, Conversation, MessageBuilder, RetryPolicy, StaticPromptCatalog};
use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const MODEL: &str = "test-model";
pub const API_KEY: &str = "test-key";
pub const CHAT_PATH: &str = "/v1/chat/completions";
pub const GENERAL_PROMPT: &str = "Answer briefly.";
pub const THINKING_PROMPT: &str = "Think first.";

/// One `chat.completion.chunk` payload with optional answer and reasoning
/// deltas.
pub fn chunk(content: Option<&str>, reasoning: Option<&str>) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion.chunk",
        "model": MODEL,
        "choices": [{
            "index": 0,
            "delta": {"content": content, "reasoning_content": reasoning},
            "finish_reason": null,
        }],
    })
}

/// SSE body carrying `events` followed by the `[DONE]` terminator.
pub fn sse_body(events: &[Value]) -> String {
    let mut body = sse_events(events);
    body.push_str("data: [DONE]\n\n");
    body
}

/// SSE body carrying `events` with no terminator.
pub fn sse_events(events: &[Value]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect()
}

/// Server answering every authorized chat completion request with `body`.
pub async fn chat_server(body: String) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", format!("Bearer {API_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;
    server
}

pub fn endpoint(server: &MockServer) -> String {
    format!("{}{CHAT_PATH}", server.uri())
}

pub fn client(endpoint: &str) -> ChatClient {
    ChatClient::with_http_client(
        reqwest::Client::new(),
        endpoint,
        MODEL,
        API_KEY,
        RetryPolicy::default(),
    )
}

pub fn prompts() -> Arc<StaticPromptCatalog> {
    Arc::new(
        StaticPromptCatalog::default()
            .with_prompt("general", GENERAL_PROMPT)
            .with_prompt("deep_thinking", THINKING_PROMPT),
    )
}

pub fn builder() -> MessageBuilder {
    MessageBuilder::new(VisionConfig::default(), ImageDetail::High, prompts())
}

pub fn conversation(endpoint: &str) -> Conversation {
    Conversation::new(client(endpoint), builder())
}

/// Request bodies the server has received, oldest first.
#[expect(
    clippy::expect_used,
    reason = "test helper: panic on failure is intentional"
)]
pub async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .iter()
        .map(|request| request.body_json().expect("request body is JSON"))
        .collect()
}

#[expect(
    clippy::expect_used,
    reason = "test helper: panic on failure is intentional"
)]
pub fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
        .save(path)
        .expect("write png");
}
