use tracing::debug;

use crate::protocol::anthropic::MessagesRequest;
use crate::protocol::mapping::{system_prompt_is_present, SYSTEM_ROLE};

use super::{ChatMessage, ChatRequest};

/// Encode a Messages request into the `OpenAI` Chat Completions wire format.
///
/// `upstream_model` is the already-resolved provider model name. Turns are
/// copied verbatim after an optional leading system turn; `top_k` has no
/// counterpart and is dropped.
#[must_use]
pub fn encode_chat_request(request: &MessagesRequest, upstream_model: &str) -> ChatRequest {
    let system = request
        .system
        .as_ref()
        .filter(|system| system_prompt_is_present(system));

    let mut messages: Vec<ChatMessage> =
        Vec::with_capacity(request.messages.len() + usize::from(system.is_some()));

    if let Some(system) = system {
        messages.push(ChatMessage {
            role: SYSTEM_ROLE.to_string(),
            content: system.clone(),
        });
    }

    for msg in &request.messages {
        messages.push(ChatMessage {
            role: msg.role.clone(),
            content: msg.content.clone(),
        });
    }

    if let Some(top_k) = &request.top_k {
        debug!(%top_k, "dropping top_k: not supported by chat completions upstream");
    }

    let stop = request
        .stop_sequences
        .as_ref()
        .filter(|stops| !stops.is_empty())
        .cloned();

    ChatRequest {
        model: upstream_model.to_string(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        stop,
        stream: request.stream,
    }
}
