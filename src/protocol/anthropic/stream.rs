use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicDelta, AnthropicErrorBody, AnthropicMessageDeltaBody,
    AnthropicMessageStart, AnthropicStreamEvent, AnthropicUsage,
};
use crate::protocol::mapping::openai_finish_to_anthropic_stop;
use crate::stream::sse::anthropic_sse_frame;

/// Index of the single text block every translated stream carries.
pub const TEXT_BLOCK_INDEX: usize = 0;

/// Error type reported in-band when the upstream stream fails.
pub const STREAM_ERROR_TYPE: &str = "server_error";

#[must_use]
pub fn message_start_event(id: &str, model: &str) -> AnthropicStreamEvent {
    AnthropicStreamEvent::MessageStart {
        message: AnthropicMessageStart {
            id: id.to_string(),
            type_: "message".to_string(),
            role: "assistant".to_string(),
            content: Vec::new(),
            model: model.to_string(),
            stop_reason: None,
            stop_sequence: None,
            usage: AnthropicUsage::default(),
        },
    }
}

#[must_use]
pub fn text_block_start_event() -> AnthropicStreamEvent {
    AnthropicStreamEvent::ContentBlockStart {
        index: TEXT_BLOCK_INDEX,
        content_block: AnthropicContentBlock::Text {
            text: String::new(),
        },
    }
}

#[must_use]
pub fn text_delta_event(text: &str) -> AnthropicStreamEvent {
    AnthropicStreamEvent::ContentBlockDelta {
        index: TEXT_BLOCK_INDEX,
        delta: AnthropicDelta::TextDelta {
            text: text.to_string(),
        },
    }
}

#[must_use]
pub fn text_block_stop_event() -> AnthropicStreamEvent {
    AnthropicStreamEvent::ContentBlockStop {
        index: TEXT_BLOCK_INDEX,
    }
}

/// `message_delta` carrying the normalized stop reason and usage so far.
#[must_use]
pub fn message_delta_event(finish_reason: &str, usage: AnthropicUsage) -> AnthropicStreamEvent {
    AnthropicStreamEvent::MessageDelta {
        delta: AnthropicMessageDeltaBody {
            stop_reason: Some(openai_finish_to_anthropic_stop(finish_reason).to_string()),
            stop_sequence: None,
        },
        usage,
    }
}

#[must_use]
pub fn message_stop_event() -> AnthropicStreamEvent {
    AnthropicStreamEvent::MessageStop {}
}

#[must_use]
pub fn stream_error_event(message: &str) -> AnthropicStreamEvent {
    AnthropicStreamEvent::Error {
        error: AnthropicErrorBody {
            type_: STREAM_ERROR_TYPE.to_string(),
            message: message.to_string(),
        },
    }
}

/// Encode a stream event as an `event: <name>\ndata: <json>\n\n` frame.
///
/// # Errors
///
/// Returns the serializer error when the event cannot be encoded.
pub fn encode_anthropic_sse_frame(event: &AnthropicStreamEvent) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    Ok(anthropic_sse_frame(event.event_name(), &json))
}
