//! Stream relay: pumps an upstream streaming completion into downstream SSE events.
//!
//! States: `Connecting → Relaying → Done | Failed`, plus `Cancelled` when the
//! downstream consumer goes away. Every extracted fragment is sent as soon as its
//! line is complete. Failures after the response has been committed are reported
//! in-band as a terminal `error` event.

use std::ops::ControlFlow;

use axum::response::sse::Event;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::llm_client::stream::{LineDecoder, LineOutcome, StreamFraming, UpstreamStream};
use crate::llm_client::{LlmClient, LlmError, ModelRequest};

/// Payload of the terminal "stream complete" event.
pub const DONE_PAYLOAD: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// One text fragment, already escaped for line framing.
    Token(String),
    Done,
    Error(String),
}

impl RelayEvent {
    pub fn token(fragment: &str) -> Self {
        RelayEvent::Token(escape_fragment(fragment))
    }

    pub fn error(message: &str) -> Self {
        RelayEvent::Error(escape_fragment(message))
    }

    /// The exact bytes this event occupies on the wire.
    pub fn to_frame(&self) -> String {
        match self {
            RelayEvent::Token(text) => format!("data: {text}\n\n"),
            RelayEvent::Done => format!("data: {DONE_PAYLOAD}\n\n"),
            RelayEvent::Error(message) => format!("event: error\ndata: {message}\n\n"),
        }
    }

    pub fn into_sse_event(self) -> Event {
        match self {
            RelayEvent::Token(text) => Event::default().data(text),
            RelayEvent::Done => Event::default().data(DONE_PAYLOAD),
            RelayEvent::Error(message) => Event::default().event("error").data(message),
        }
    }
}

/// Escapes line breaks so a fragment always fits on one `data:` line.
pub fn escape_fragment(text: &str) -> String {
    text.replace('\r', "\\r").replace('\n', "\\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Connecting,
    Relaying,
    Done,
    Failed,
    Cancelled,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayState::Done | RelayState::Failed | RelayState::Cancelled)
    }
}

/// One relay per streaming request. Consumed by `run`.
pub struct StreamRelay {
    llm: LlmClient,
    request: ModelRequest,
    events: mpsc::Sender<RelayEvent>,
    state: RelayState,
    fragments: usize,
}

impl StreamRelay {
    pub fn new(llm: LlmClient, request: ModelRequest, events: mpsc::Sender<RelayEvent>) -> Self {
        Self {
            llm,
            request,
            events,
            state: RelayState::Connecting,
            fragments: 0,
        }
    }

    /// Drives the relay to a terminal state and returns it.
    /// The upstream connection is dropped before this returns.
    pub async fn run(mut self) -> RelayState {
        let opened = tokio::select! {
            biased;
            _ = self.events.closed() => None,
            opened = self.llm.stream(&self.request) => Some(opened),
        };

        match opened {
            None => self.transition(RelayState::Cancelled),
            Some(Err(e)) => self.fail(e).await,
            Some(Ok(upstream)) => {
                self.transition(RelayState::Relaying);
                self.pump(upstream).await;
            }
        }

        info!(
            state = ?self.state,
            fragments = self.fragments,
            "Stream relay finished"
        );
        self.state
    }

    async fn pump(&mut self, upstream: UpstreamStream) {
        let UpstreamStream { mut source, framing } = upstream;
        let mut decoder = LineDecoder::default();

        while !self.state.is_terminal() {
            let next = tokio::select! {
                biased;
                _ = self.events.closed() => None,
                chunk = source.next_chunk() => Some(chunk),
            };

            match next {
                None => self.transition(RelayState::Cancelled),
                Some(Err(e)) => self.fail(e).await,
                Some(Ok(Some(bytes))) => match decoder.push(&bytes) {
                    Ok(lines) => {
                        for line in lines {
                            if self.handle_line(framing, &line).await.is_break() {
                                break;
                            }
                        }
                    }
                    Err(e) => self.fail(e).await,
                },
                Some(Ok(None)) => {
                    let tail = decoder.finish();
                    let flow = match tail {
                        Some(line) => self.handle_line(framing, &line).await,
                        None => ControlFlow::Continue(()),
                    };
                    if flow.is_continue() {
                        self.complete().await;
                    }
                }
            }
        }
    }

    async fn handle_line(&mut self, framing: StreamFraming, line: &str) -> ControlFlow<()> {
        match framing.decode_line(line) {
            LineOutcome::Fragment(text) => {
                if self.events.send(RelayEvent::token(&text)).await.is_err() {
                    self.transition(RelayState::Cancelled);
                    return ControlFlow::Break(());
                }
                self.fragments += 1;
                ControlFlow::Continue(())
            }
            LineOutcome::FinalFragment(text) => {
                if self.events.send(RelayEvent::token(&text)).await.is_err() {
                    self.transition(RelayState::Cancelled);
                    return ControlFlow::Break(());
                }
                self.fragments += 1;
                self.complete().await;
                ControlFlow::Break(())
            }
            LineOutcome::Skip => ControlFlow::Continue(()),
            LineOutcome::End => {
                self.complete().await;
                ControlFlow::Break(())
            }
            LineOutcome::Failed(message) => {
                self.fail(LlmError::UpstreamStreamFailure(message)).await;
                ControlFlow::Break(())
            }
        }
    }

    async fn complete(&mut self) {
        self.transition(RelayState::Done);
        // A consumer that left right at the end changes nothing.
        let _ = self.events.send(RelayEvent::Done).await;
    }

    async fn fail(&mut self, error: LlmError) {
        warn!("Stream relay failed: {error}");
        self.transition(RelayState::Failed);
        let _ = self.events.send(RelayEvent::error(&error.to_string())).await;
    }

    fn transition(&mut self, next: RelayState) {
        debug!(from = ?self.state, to = ?next, "Relay state transition");
        if next == RelayState::Cancelled {
            info!("Downstream consumer disconnected; releasing upstream stream");
        }
        self.state = next;
    }
}
