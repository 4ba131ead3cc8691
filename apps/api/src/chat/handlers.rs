//! Axum route handlers for the Chat API.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::chat::conversation::{prepare_conversation, ChatRequest};
use crate::chat::relay::{RelayEvent, StreamRelay};
use crate::errors::AppError;
use crate::state::AppState;

/// Buffered events between the relay task and the response body.
const RELAY_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

/// POST /api/v1/chat
///
/// One-shot completion of the conversation.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let messages = prepare_conversation(&request.messages)?;
    let model_request = state.llm.request(messages);
    let reply = state.llm.complete(&model_request).await?;
    Ok(Json(ChatReply {
        reply: reply.trim().to_string(),
    }))
}

/// POST /api/v1/chat/stream
///
/// Streams the reply as SSE: one `data:` event per fragment, then `data: [DONE]`.
/// Validation errors are returned before the stream is committed; anything after
/// that arrives as an `event: error` frame.
pub async fn handle_chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let messages = prepare_conversation(&request.messages)?;
    let model_request = state.llm.request(messages);

    let (tx, rx) = mpsc::channel::<RelayEvent>(RELAY_CHANNEL_CAPACITY);
    let relay = StreamRelay::new(state.llm.clone(), model_request, tx);
    let span = info_span!("chat_relay", request_id = %Uuid::new_v4());
    tokio::spawn(relay.run().instrument(span));

    let events = ReceiverStream::new(rx).map(|event| Ok(event.into_sse_event()));
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.stream_keepalive)))
}
