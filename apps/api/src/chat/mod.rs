// Advisor chat: one-shot and streamed replies.
// Streaming goes through relay::StreamRelay; all model calls go through llm_client.

pub mod conversation;
pub mod handlers;
pub mod prompts;
pub mod relay;
