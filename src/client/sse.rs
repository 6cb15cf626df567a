//! Line decoder for the chat completion event stream.
//!
//! Payload lines look like `data: {"choices":[{"delta":{...}}]}` and the
//! stream ends with `data: [DONE]`. Other lines (`event:`, `id:`, comments,
//! keep-alives) carry nothing and are skipped.

use chat_protocol::ChatCompletionChunk;

use crate::error::{ChatError, ChatResult};

/// Maximum size (1 MB) of an unterminated line held in the buffer.
pub(crate) const MAX_SSE_BUFFER_SIZE: usize = 1024 * 1024;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Chunk(ChatCompletionChunk),
    Done,
}

/// Splits raw body bytes into lines and decodes the `data:` ones.
///
/// Bytes are buffered rather than text so a multi-byte character split
/// across network chunks is reassembled before decoding.
#[derive(Debug)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    max_buffer: usize,
}

impl Default for SseLineDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_SSE_BUFFER_SIZE)
    }
}

impl SseLineDecoder {
    pub fn with_limit(max_buffer: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer,
        }
    }

    /// Feed one network chunk.
    ///
    /// Returns the events of every line it completed. A malformed line stops
    /// decoding: the events before it are still returned, together with the
    /// error.
    pub fn push(&mut self, chunk: &[u8]) -> (Vec<SseEvent>, Option<ChatError>) {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            match parse_line(&line) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => return (events, Some(e)),
            }
        }

        if self.buffer.len() > self.max_buffer {
            return (events, Some(ChatError::StreamBufferOverflow(self.max_buffer)));
        }
        (events, None)
    }

    /// Decode whatever is left once the body has ended.
    pub fn finish(&mut self) -> ChatResult<Option<SseEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> ChatResult<Option<SseEvent>> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim_start();
    if data == DONE_SENTINEL {
        return Ok(Some(SseEvent::Done));
    }
    serde_json::from_str(data)
        .map(|chunk| Some(SseEvent::Chunk(chunk)))
        .map_err(|e| ChatError::StreamDecode(format!("{e}: {}", truncate(data, 200))))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
