//! Turns a client-supplied message list into the conversation sent upstream.

use serde::Deserialize;

use crate::chat::prompts::ADVISOR_SYSTEM_PROMPT;
use crate::errors::AppError;
use crate::llm_client::{ChatMessage, Role};

/// A message as the client sends it. Roles are free text until prepared.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

/// Coerces roles, drops blank messages and prepends the advisor system prompt.
///
/// Only `user` and `assistant` survive as-is; a client-supplied `system` role is
/// demoted to `user` like any other unknown role.
pub fn prepare_conversation(incoming: &[IncomingMessage]) -> Result<Vec<ChatMessage>, AppError> {
    let turns: Vec<ChatMessage> = incoming
        .iter()
        .filter_map(|m| {
            let content = m.content.trim();
            if content.is_empty() {
                return None;
            }
            let role = match Role::parse_lenient(&m.role) {
                Role::Assistant => Role::Assistant,
                Role::User | Role::System => Role::User,
            };
            Some(ChatMessage {
                role,
                content: content.to_string(),
            })
        })
        .collect();

    if turns.is_empty() {
        return Err(AppError::Validation(
            "messages must contain at least one non-empty message".to_string(),
        ));
    }

    let mut conversation = Vec::with_capacity(turns.len() + 1);
    conversation.push(ChatMessage::system(ADVISOR_SYSTEM_PROMPT));
    conversation.extend(turns);
    Ok(conversation)
}
