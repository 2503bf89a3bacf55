use crate::protocol::openai_chat::ChatStreamChunk;
use crate::util::{extract_sse_data_payload, SseData};

/// One classified line of an upstream Chat Completions stream.
#[derive(Debug)]
pub enum ChatStreamLine {
    /// `data: [DONE]`
    Done,
    /// A `data:` line whose payload decoded as a chunk.
    Chunk(ChatStreamChunk),
    /// Blank lines, comments, other fields and undecodable payloads.
    Ignored,
}

/// Parse one upstream SSE line.
#[must_use]
pub fn parse_chat_stream_line(line: &str) -> ChatStreamLine {
    match extract_sse_data_payload(line) {
        Some(SseData::Done) => ChatStreamLine::Done,
        Some(SseData::Json(payload)) => match serde_json::from_str(payload) {
            Ok(chunk) => ChatStreamLine::Chunk(chunk),
            Err(_) => ChatStreamLine::Ignored,
        },
        None => ChatStreamLine::Ignored,
    }
}

impl ChatStreamChunk {
    /// Text delta of the first choice, if non-empty.
    #[must_use]
    pub fn first_delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
            .filter(|text| !text.is_empty())
    }

    /// Finish reason of the first choice, if set.
    #[must_use]
    pub fn first_finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
    }

    /// Prompt token count, only when reported alongside a non-empty
    /// `choices` array.
    #[must_use]
    pub fn prompt_tokens_with_choices(&self) -> Option<u64> {
        if self.choices.is_empty() {
            return None;
        }
        self.usage
            .map(|usage| usage.prompt_tokens.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_and_finish() {
        let ChatStreamLine::Chunk(chunk) = parse_chat_stream_line(
            r#"data: {"choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#,
        ) else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.first_delta_text(), Some("Hi"));
        assert_eq!(chunk.first_finish_reason(), None);

        let ChatStreamLine::Chunk(chunk) =
            parse_chat_stream_line(r#"data:{"choices":[{"delta":{},"finish_reason":"stop"}]}"#)
        else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.first_delta_text(), None);
        assert_eq!(chunk.first_finish_reason(), Some("stop"));
    }

    #[test]
    fn done_and_ignored_lines() {
        assert!(matches!(parse_chat_stream_line("data: [DONE]"), ChatStreamLine::Done));
        assert!(matches!(parse_chat_stream_line(""), ChatStreamLine::Ignored));
        assert!(matches!(
            parse_chat_stream_line("data: {not json"),
            ChatStreamLine::Ignored
        ));
        assert!(matches!(
            parse_chat_stream_line("event: message"),
            ChatStreamLine::Ignored
        ));
    }

    #[test]
    fn usage_without_choices_is_not_captured() {
        let ChatStreamLine::Chunk(chunk) = parse_chat_stream_line(
            r#"data: {"choices":[],"usage":{"prompt_tokens":9,"completion_tokens":2}}"#,
        ) else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.prompt_tokens_with_choices(), None);

        let ChatStreamLine::Chunk(chunk) = parse_chat_stream_line(
            r#"data: {"choices":[{"delta":{"content":""}}],"usage":{"prompt_tokens":9}}"#,
        ) else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.prompt_tokens_with_choices(), Some(9));
    }
}
