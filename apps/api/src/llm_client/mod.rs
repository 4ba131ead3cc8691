/// LLM Client: the single point of entry for all model calls in EduSphere.
///
/// ARCHITECTURAL RULE: No other module may talk to a model backend directly.
/// All LLM interactions MUST go through `LlmClient`, which dispatches to the
/// configured `ChatBackend` adapter (chat-style or delta-stream).
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub mod ollama;
pub mod openai;
pub mod prompts;
pub mod stream;
mod transport;

#[cfg(test)]
pub mod testing;

use crate::llm_client::stream::UpstreamStream;

/// Context window requested for structured (JSON) generations.
pub const STRUCTURED_CONTEXT_WINDOW: u32 = 4096;
/// Output cap for structured generations.
pub const STRUCTURED_MAX_TOKENS: u32 = 512;
/// Low temperature keeps structured output close to the requested schema.
pub const STRUCTURED_TEMPERATURE: f32 = 0.4;
/// Response previews in logs never exceed this many characters.
const LOG_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Model backend unreachable: {0}")]
    BackendUnreachable(#[from] reqwest::Error),

    #[error("Model backend returned status {status}: {body}")]
    BackendError { status: u16, body: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Model reported an error: {message}")]
    ModelError { message: String },

    #[error("Upstream stream failed: {0}")]
    UpstreamStreamFailure(String),

    #[error("Model backend misconfigured: {0}")]
    Misconfigured(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Conversation model
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Lenient role parsing: anything unrecognized is treated as `user`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Backend-neutral generation knobs. Each adapter maps them onto its own wire names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub context_window: Option<u32>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerationOptions {
    /// Deterministic decoding bias used whenever structured data is requested.
    pub fn structured() -> Self {
        Self {
            context_window: Some(STRUCTURED_CONTEXT_WINDOW),
            max_tokens: Some(STRUCTURED_MAX_TOKENS),
            temperature: Some(STRUCTURED_TEMPERATURE),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.context_window.is_none() && self.max_tokens.is_none() && self.temperature.is_none()
    }
}

/// One logical model call. Whether it streams is decided by the operation
/// it is passed to (`complete` vs `stream`), not by a flag on the request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Ask the backend to constrain output to JSON.
    pub force_json: bool,
    pub options: GenerationOptions,
}

// ────────────────────────────────────────────────────────────────────────────
// Backend configuration + capability trait
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local inference server speaking the chat-style protocol (`/api/chat`, NDJSON streaming).
    Ollama,
    /// Hosted completions API speaking the delta-stream protocol (`data: ` framed SSE).
    OpenAi,
}

impl BackendKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(BackendKind::Ollama),
            "openai" => Some(BackendKind::OpenAi),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::OpenAi => "openai",
        }
    }
}

/// Explicit client configuration, built once at startup and owned by the backend adapter.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: BackendKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Hard timeout for synchronous completions. Streams only bound the connect phase.
    pub timeout: Duration,
    pub max_retries: u32,
}

/// Capability interface implemented once per wire protocol.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Default model id for requests built by `LlmClient::request`.
    fn model(&self) -> &str;

    /// Non-streaming call returning the assistant's full text.
    async fn complete(&self, request: &ModelRequest) -> Result<String, LlmError>;

    /// Opens a streaming call. The returned stream carries raw upstream bytes
    /// plus the framing needed to decode them.
    async fn stream(&self, request: &ModelRequest) -> Result<UpstreamStream, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Facade
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by all services in EduSphere.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn ChatBackend>,
}

impl LlmClient {
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let backend: Arc<dyn ChatBackend> = match config.backend {
            BackendKind::Ollama => Arc::new(ollama::OllamaBackend::new(config)?),
            BackendKind::OpenAi => Arc::new(openai::OpenAiBackend::new(config)?),
        };
        Ok(Self { backend })
    }

    pub fn with_backend(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Plain conversational request against the configured model.
    pub fn request(&self, messages: Vec<ChatMessage>) -> ModelRequest {
        ModelRequest {
            model: self.model().to_string(),
            messages,
            force_json: false,
            options: GenerationOptions::default(),
        }
    }

    /// Request for structured JSON output with the deterministic decoding bias applied.
    pub fn structured_request(&self, messages: Vec<ChatMessage>) -> ModelRequest {
        ModelRequest {
            model: self.model().to_string(),
            messages,
            force_json: true,
            options: GenerationOptions::structured(),
        }
    }

    /// Synchronous completion. Logs a bounded preview of the reply, never the full payload.
    pub async fn complete(&self, request: &ModelRequest) -> Result<String, LlmError> {
        info!(
            backend = self.backend.name(),
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let content = self.backend.complete(request).await?;

        info!(
            backend = self.backend.name(),
            model = %request.model,
            "Model response (first {LOG_PREVIEW_CHARS} chars): {}",
            truncate_for_log(&content, LOG_PREVIEW_CHARS)
        );
        Ok(content)
    }

    pub async fn stream(&self, request: &ModelRequest) -> Result<UpstreamStream, LlmError> {
        info!(
            backend = self.backend.name(),
            model = %request.model,
            messages = request.messages.len(),
            "Opening streaming request"
        );
        self.backend.stream(request).await
    }
}

/// Char-boundary-safe truncation for log output.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...(truncated)", &text[..idx]),
        None => text.to_string(),
    }
}
