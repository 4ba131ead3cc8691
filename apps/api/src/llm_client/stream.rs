//! Incremental decoding of upstream streaming responses.
//!
//! Upstream bytes arrive in arbitrary chunks. `LineDecoder` reassembles them into
//! complete lines (a line is only released once its terminating `\n` has arrived,
//! so multi-byte UTF-8 sequences are never split), and `StreamFraming` turns each
//! line into a `LineOutcome` according to the backend's wire protocol.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::llm_client::LlmError;

/// Terminal payload of the delta-stream protocol.
pub const DELTA_DONE_SENTINEL: &str = "[DONE]";

/// A source of raw upstream chunks. `Ok(None)` is a clean end-of-input.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, LlmError>;
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, LlmError> {
        self.chunk()
            .await
            .map_err(|e| LlmError::UpstreamStreamFailure(e.to_string()))
    }
}

/// An opened upstream stream together with the framing needed to decode it.
pub struct UpstreamStream {
    pub source: Box<dyn ChunkSource>,
    pub framing: StreamFraming,
}

/// Wire framing of a streaming backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFraming {
    /// Every line is a JSON object with a nested `message.content` fragment.
    ChatLines,
    /// Lines are `data: <json>` with `choices[0].delta.content`; `data: [DONE]` ends the stream.
    DeltaEvents,
}

/// Result of decoding one upstream line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Fragment(String),
    /// Last fragment of the stream; nothing after it is relayed.
    FinalFragment(String),
    Skip,
    End,
    Failed(String),
}

impl StreamFraming {
    pub fn decode_line(&self, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Skip;
        }
        match self {
            StreamFraming::ChatLines => decode_chat_line(line),
            StreamFraming::DeltaEvents => decode_delta_line(line),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

fn decode_chat_line(line: &str) -> LineOutcome {
    if !line.starts_with('{') {
        return LineOutcome::Skip;
    }
    let Ok(parsed) = serde_json::from_str::<ChatLine>(line) else {
        return LineOutcome::Skip;
    };
    if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
        return LineOutcome::Failed(error);
    }
    let content = parsed.message.map(|m| m.content).unwrap_or_default();
    match (content.is_empty(), parsed.done) {
        (false, true) => LineOutcome::FinalFragment(content),
        (false, false) => LineOutcome::Fragment(content),
        (true, true) => LineOutcome::End,
        (true, false) => LineOutcome::Skip,
    }
}

#[derive(Debug, Deserialize)]
struct DeltaEvent {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
    #[serde(default)]
    error: Option<DeltaError>,
}

#[derive(Debug, Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaError {
    message: String,
}

fn decode_delta_line(line: &str) -> LineOutcome {
    // SSE comments and non-data fields carry no tokens.
    let Some(payload) = line.strip_prefix("data:") else {
        return LineOutcome::Skip;
    };
    let payload = payload.trim();
    if payload == DELTA_DONE_SENTINEL {
        return LineOutcome::End;
    }
    let Ok(event) = serde_json::from_str::<DeltaEvent>(payload) else {
        return LineOutcome::Skip;
    };
    if let Some(error) = event.error {
        return LineOutcome::Failed(error.message);
    }
    match event
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
    {
        Some(content) if !content.is_empty() => LineOutcome::Fragment(content),
        _ => LineOutcome::Skip,
    }
}

/// Longest line `LineDecoder` will hold while waiting for its `\n`.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Reassembles byte chunks into complete lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no `\n`.
    scanned: usize,
}

impl LineDecoder {
    /// Appends a chunk and returns every line it completed, without the trailing `\n`/`\r\n`.
    /// Fails once a pending line exceeds `MAX_LINE_BYTES`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, LlmError> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            let mut line = &self.buffer[start..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            lines.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
            from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > MAX_LINE_BYTES {
            return Err(LlmError::UpstreamStreamFailure(format!(
                "upstream line exceeded {MAX_LINE_BYTES} bytes without a newline"
            )));
        }
        Ok(lines)
    }

    /// Releases whatever is left after end-of-input, if anything.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}
