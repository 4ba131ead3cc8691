//! Delta-stream backend adapter (hosted API, `POST {base}/chat/completions` with bearer auth).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm_client::stream::{StreamFraming, UpstreamStream};
use crate::llm_client::transport::{build_client, post_json, PostTarget};
use crate::llm_client::{ChatBackend, ChatMessage, LlmConfig, LlmError, ModelRequest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct OpenAiBackend {
    client: Client,
    config: LlmConfig,
    api_key: String,
    completions_url: String,
}

impl OpenAiBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Misconfigured("delta-stream backend requires an API key".to_string())
            })?;
        let completions_url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        Ok(Self {
            client: build_client(CONNECT_TIMEOUT)?,
            config,
            api_key,
            completions_url,
        })
    }

    fn body<'a>(&self, request: &'a ModelRequest, stream: bool) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            stream,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            // JSON mode constrains output to an object; the normalizer unwraps it.
            response_format: request.force_json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }

    fn target(&self, timeout: Option<Duration>) -> PostTarget<'_> {
        PostTarget {
            url: &self.completions_url,
            bearer: Some(&self.api_key),
            timeout,
            max_retries: self.config.max_retries,
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String, LlmError> {
        let target = self.target(Some(self.config.timeout));
        let response = post_json(&self.client, &target, &self.body(request, false)).await?;
        let text = response.text().await?;

        let parsed: CompletionResponse = serde_json::from_str(&text).map_err(|e| {
            LlmError::MalformedResponse(format!("invalid completion envelope: {e}"))
        })?;

        if let Some(error) = parsed.error {
            return Err(LlmError::ModelError {
                message: error.message,
            });
        }

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::MalformedResponse("completion has no choices".to_string()))
    }

    async fn stream(&self, request: &ModelRequest) -> Result<UpstreamStream, LlmError> {
        let target = self.target(None);
        let response = post_json(&self.client, &target, &self.body(request, true)).await?;
        Ok(UpstreamStream {
            source: Box::new(response),
            framing: StreamFraming::DeltaEvents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::stream::{LineDecoder, LineOutcome};
    use crate::llm_client::{BackendKind, GenerationOptions};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            backend: BackendKind::OpenAi,
            base_url,
            model: "gpt-4o-mini".to_string(),
            api_key: api_key.map(String::from),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        }
    }

    fn structured(model: &str) -> ModelRequest {
        ModelRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::system("json only"), ChatMessage::user("go")],
            force_json: true,
            options: GenerationOptions::structured(),
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        assert!(OpenAiBackend::new(config("http://x".to_string(), None)).is_err());
        assert!(OpenAiBackend::new(config("http://x".to_string(), Some("  "))).is_err());
        assert!(OpenAiBackend::new(config("http://x".to_string(), Some("sk-test"))).is_ok());
    }

    #[tokio::test]
    async fn test_complete_uses_bearer_auth_and_json_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "stream": false,
                "max_tokens": 512,
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "{\"courses\":[]}"},
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(config(server.uri(), Some("sk-test"))).unwrap();
        let out = backend.complete(&structured("gpt-4o-mini")).await.unwrap();
        assert_eq!(out, "{\"courses\":[]}");
    }

    #[tokio::test]
    async fn test_complete_without_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(config(server.uri(), Some("sk-test"))).unwrap();
        let err = backend.complete(&structured("m")).await.unwrap_err();
        assert!(matches!(err, LlmError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_complete_unauthorized_surfaces_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(config(server.uri(), Some("sk-bad"))).unwrap();
        match backend.complete(&structured("m")).await.unwrap_err() {
            LlmError::BackendError { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(2)
            .mount(&server)
            .await;

        let mut cfg = config(server.uri(), Some("sk-test"));
        cfg.max_retries = 1;
        let backend = OpenAiBackend::new(cfg).unwrap();
        let err = backend.complete(&structured("m")).await.unwrap_err();
        assert!(matches!(err, LlmError::BackendError { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_stream_returns_delta_framing() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(config(server.uri(), Some("sk-test"))).unwrap();
        let mut upstream = backend.stream(&structured("m")).await.unwrap();
        assert_eq!(upstream.framing, StreamFraming::DeltaEvents);

        let mut decoder = LineDecoder::default();
        let mut outcomes = Vec::new();
        while let Some(chunk) = upstream.source.next_chunk().await.unwrap() {
            for line in decoder.push(&chunk).unwrap() {
                outcomes.push(upstream.framing.decode_line(&line));
            }
        }
        assert!(outcomes.contains(&LineOutcome::Fragment("Hi".to_string())));
        assert!(outcomes.contains(&LineOutcome::End));
    }
}
