use crate::error::GatewayError;
use crate::protocol::anthropic::{AnthropicContentBlock, AnthropicUsage, MessagesResponse};
use crate::protocol::mapping::{openai_finish_to_anthropic_stop, DEFAULT_FINISH_REASON};
use crate::protocol::openai_chat::ChatResponse;
use crate::util::next_generated_id;
use std::sync::atomic::AtomicU64;

static GENERATED_MSG_ID_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_generated_msg_id() -> String {
    next_generated_id("msg_", &GENERATED_MSG_ID_SEQ)
}

/// Encode a completed Chat Completions response into the Messages wire format.
///
/// `client_model` is the model name the caller sent, not the upstream name.
///
/// # Errors
///
/// Returns [`GatewayError::MalformedUpstreamResponse`] when the upstream
/// response has no choices.
pub fn encode_messages_response(
    upstream: &ChatResponse,
    client_model: &str,
) -> Result<MessagesResponse, GatewayError> {
    let Some(choice) = upstream.choices.first() else {
        return Err(GatewayError::MalformedUpstreamResponse(
            "upstream response contained no choices".to_string(),
        ));
    };

    let text = choice
        .message
        .as_ref()
        .and_then(|message| message.content.as_ref())
        .map(content_text)
        .unwrap_or_default();

    let finish_reason = choice
        .finish_reason
        .as_deref()
        .unwrap_or(DEFAULT_FINISH_REASON);
    let stop_reason = Some(openai_finish_to_anthropic_stop(finish_reason).to_string());

    let usage = upstream.usage.map(|usage| AnthropicUsage {
        input_tokens: usage.prompt_tokens.unwrap_or(0),
        output_tokens: usage.completion_tokens.unwrap_or(0),
    });

    let id = match upstream.id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => next_generated_msg_id(),
    };

    Ok(MessagesResponse {
        id,
        type_: "message".to_string(),
        role: "assistant".to_string(),
        content: vec![AnthropicContentBlock::Text { text }],
        model: client_model.to_string(),
        stop_reason,
        stop_sequence: None,
        usage,
    })
}

/// Flatten upstream message content into plain text.
fn content_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
            .collect(),
        _ => String::new(),
    }
}
