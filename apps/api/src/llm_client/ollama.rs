//! Chat-style backend adapter (local inference server, `POST {base}/api/chat`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm_client::stream::{StreamFraming, UpstreamStream};
use crate::llm_client::transport::{build_client, post_json, PostTarget};
use crate::llm_client::{ChatBackend, ChatMessage, LlmConfig, LlmError, ModelRequest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaBackend {
    client: Client,
    config: LlmConfig,
    chat_url: String,
}

impl OllamaBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let chat_url = format!("{}/api/chat", config.base_url.trim_end_matches('/'));
        Ok(Self {
            client: build_client(CONNECT_TIMEOUT)?,
            config,
            chat_url,
        })
    }

    fn body<'a>(&self, request: &'a ModelRequest, stream: bool) -> OllamaChatRequest<'a> {
        let options = (!request.options.is_empty()).then(|| OllamaOptions {
            num_ctx: request.options.context_window,
            num_predict: request.options.max_tokens,
            temperature: request.options.temperature,
        });
        OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream,
            format: request.force_json.then_some("json"),
            options,
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String, LlmError> {
        let target = PostTarget {
            url: &self.chat_url,
            bearer: None,
            timeout: Some(self.config.timeout),
            max_retries: self.config.max_retries,
        };
        let response = post_json(&self.client, &target, &self.body(request, false)).await?;
        let text = response.text().await?;

        let parsed: OllamaChatResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::MalformedResponse(format!("invalid chat envelope: {e}")))?;

        if let Some(message) = parsed.error.filter(|e| !e.is_empty()) {
            return Err(LlmError::ModelError { message });
        }

        parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| LlmError::MalformedResponse("chat envelope has no message".to_string()))
    }

    async fn stream(&self, request: &ModelRequest) -> Result<UpstreamStream, LlmError> {
        let target = PostTarget {
            url: &self.chat_url,
            bearer: None,
            timeout: None,
            max_retries: self.config.max_retries,
        };
        let response = post_json(&self.client, &target, &self.body(request, true)).await?;
        Ok(UpstreamStream {
            source: Box::new(response),
            framing: StreamFraming::ChatLines,
        })
    }
}
