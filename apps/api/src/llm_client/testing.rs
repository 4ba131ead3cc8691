//! Scripted doubles for code that sits on top of `LlmClient`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::llm_client::stream::{ChunkSource, StreamFraming, UpstreamStream};
use crate::llm_client::{ChatBackend, LlmClient, LlmError, ModelRequest};

/// Replays a fixed list of chunk results, then reports end-of-input.
pub struct ScriptedChunks {
    chunks: VecDeque<Result<Bytes, LlmError>>,
}

impl ScriptedChunks {
    pub fn new(chunks: Vec<Result<Bytes, LlmError>>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }

    pub fn from_strs(chunks: &[&str]) -> Self {
        Self::new(
            chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                .collect(),
        )
    }
}

#[async_trait]
impl ChunkSource for ScriptedChunks {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, LlmError> {
        match self.chunks.pop_front() {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Yields its chunks, then never returns. Stands in for an upstream that stays open.
pub struct StalledChunks {
    pub chunks: VecDeque<Bytes>,
    /// Set when the source is dropped, i.e. the upstream connection is released.
    pub released: Arc<Mutex<bool>>,
}

#[async_trait]
impl ChunkSource for StalledChunks {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, LlmError> {
        match self.chunks.pop_front() {
            Some(bytes) => Ok(Some(bytes)),
            None => std::future::pending().await,
        }
    }
}

impl Drop for StalledChunks {
    fn drop(&mut self) {
        *self.released.lock().unwrap() = true;
    }
}

type StreamFactory = Box<dyn Fn() -> Result<UpstreamStream, LlmError> + Send + Sync>;

/// A `ChatBackend` returning canned replies and recording every request it sees.
pub struct ScriptedBackend {
    reply: Mutex<Option<Result<String, LlmError>>>,
    stream: Option<StreamFactory>,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Mutex::new(Some(Ok(reply.into()))),
            stream: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: LlmError) -> Self {
        Self {
            reply: Mutex::new(Some(Err(error))),
            stream: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Streams `chunks` with the given framing on every `stream` call.
    pub fn streaming(framing: StreamFraming, chunks: &[&str]) -> Self {
        let chunks: Vec<String> = chunks.iter().map(|c| c.to_string()).collect();
        Self::streaming_with(move || {
            let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
            Ok(UpstreamStream {
                source: Box::new(ScriptedChunks::from_strs(&refs)),
                framing,
            })
        })
    }

    pub fn streaming_with(
        factory: impl Fn() -> Result<UpstreamStream, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            reply: Mutex::new(None),
            stream: Some(Box::new(factory)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn into_client(self) -> (LlmClient, Arc<ScriptedBackend>) {
        let backend = Arc::new(self);
        (LlmClient::with_backend(backend.clone()), backend)
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.reply.lock().unwrap().take() {
            Some(reply) => reply,
            None => Err(LlmError::MalformedResponse("no scripted reply left".into())),
        }
    }

    async fn stream(&self, request: &ModelRequest) -> Result<UpstreamStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.stream {
            Some(factory) => factory(),
            None => Err(LlmError::UpstreamStreamFailure("no scripted stream".into())),
        }
    }
}
