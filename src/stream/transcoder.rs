use serde::Deserialize;
use smallvec::SmallVec;
use tracing::debug;

use crate::protocol::anthropic::stream::{
    message_delta_event, message_start_event, message_stop_event, stream_error_event,
    text_block_start_event, text_block_stop_event, text_delta_event,
};
use crate::protocol::anthropic::{AnthropicStreamEvent, AnthropicUsage};
use crate::protocol::openai_chat::stream::{parse_chat_stream_line, ChatStreamLine};
use crate::util::whitespace_piece_count;

/// Events produced by a single transition. Most transitions emit at most
/// three events, so they stay inline.
pub type StreamEvents = SmallVec<[AnthropicStreamEvent; 4]>;

/// Lifecycle of a translated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    NotStarted,
    Open,
    Closed,
}

/// Which upstream usage report supplies the input token count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageCapture {
    /// The first report wins.
    #[default]
    First,
    /// Later reports overwrite earlier ones.
    Last,
}

/// Call-local state of the stream translator.
///
/// Transitions consume the state and hand back the successor together with
/// the events to emit, see [`step`] and [`finish`].
#[derive(Debug, Clone)]
pub struct StreamState {
    phase: StreamPhase,
    block_open: bool,
    output_tokens: u64,
    input_tokens: Option<u64>,
    failed: bool,
    stop_reason: Option<String>,
    message_id: String,
    model: String,
    usage_capture: UsageCapture,
}

impl StreamState {
    /// `model` is echoed in `message_start`; it is the caller's model name.
    #[must_use]
    pub fn new(message_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            phase: StreamPhase::NotStarted,
            block_open: false,
            output_tokens: 0,
            input_tokens: None,
            failed: false,
            stop_reason: None,
            message_id: message_id.into(),
            model: model.into(),
            usage_capture: UsageCapture::First,
        }
    }

    #[must_use]
    pub fn with_usage_capture(mut self, usage_capture: UsageCapture) -> Self {
        self.usage_capture = usage_capture;
        self
    }

    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.phase == StreamPhase::Closed
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Whitespace-split piece count over all text deltas.
    #[must_use]
    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }

    /// Captured prompt token count, if the upstream ever reported one.
    #[must_use]
    pub fn input_tokens(&self) -> Option<u64> {
        self.input_tokens
    }

    /// Normalized stop reason seen on the finish-reason path.
    #[must_use]
    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    fn usage_so_far(&self) -> AnthropicUsage {
        AnthropicUsage {
            input_tokens: self.input_tokens.unwrap_or(0),
            output_tokens: self.output_tokens,
        }
    }

    fn open(&mut self, out: &mut StreamEvents) {
        out.push(message_start_event(&self.message_id, &self.model));
        out.push(text_block_start_event());
        self.block_open = true;
        self.phase = StreamPhase::Open;
    }

    fn close(&mut self, out: &mut StreamEvents) {
        if self.block_open {
            out.push(text_block_stop_event());
            self.block_open = false;
        }
        out.push(message_stop_event());
        self.phase = StreamPhase::Closed;
    }

    fn capture_input_tokens(&mut self, prompt_tokens: u64) {
        match self.usage_capture {
            UsageCapture::First => {
                if self.input_tokens.is_none() {
                    self.input_tokens = Some(prompt_tokens);
                }
            }
            UsageCapture::Last => self.input_tokens = Some(prompt_tokens),
        }
    }
}

/// Feed one upstream line.
///
/// The first line always opens the message, whatever it contains. Lines
/// arriving after the stream closed are ignored.
#[must_use]
pub fn step(mut state: StreamState, line: &str) -> (StreamState, StreamEvents) {
    let mut out = StreamEvents::new();
    match state.phase {
        StreamPhase::Closed => return (state, out),
        StreamPhase::NotStarted => state.open(&mut out),
        StreamPhase::Open => {}
    }

    match parse_chat_stream_line(line) {
        ChatStreamLine::Done => state.close(&mut out),
        ChatStreamLine::Chunk(chunk) => {
            if let Some(text) = chunk.first_delta_text() {
                state.output_tokens += whitespace_piece_count(text);
                out.push(text_delta_event(text));
            }
            if let Some(prompt_tokens) = chunk.prompt_tokens_with_choices() {
                state.capture_input_tokens(prompt_tokens);
            }
            if let Some(finish_reason) = chunk.first_finish_reason() {
                if state.block_open {
                    out.push(text_block_stop_event());
                    state.block_open = false;
                }
                let delta = message_delta_event(finish_reason, state.usage_so_far());
                if let AnthropicStreamEvent::MessageDelta { delta: body, .. } = &delta {
                    state.stop_reason.clone_from(&body.stop_reason);
                }
                out.push(delta);
                state.close(&mut out);
            }
        }
        ChatStreamLine::Ignored => {
            if !line.trim().is_empty() {
                debug!(line_len = line.len(), "skipping non-data or undecodable upstream line");
            }
        }
    }

    (state, out)
}

/// Close the stream at end of input or after an upstream failure.
///
/// With `error`, an in-band `error` event precedes the closing pair and the
/// state is marked failed. Calling this on a closed stream emits nothing.
#[must_use]
pub fn finish(mut state: StreamState, error: Option<&str>) -> (StreamState, StreamEvents) {
    let mut out = StreamEvents::new();
    match state.phase {
        StreamPhase::Closed => return (state, out),
        StreamPhase::NotStarted => state.open(&mut out),
        StreamPhase::Open => {}
    }

    if let Some(message) = error {
        state.failed = true;
        out.push(stream_error_event(message));
    }
    state.close(&mut out);
    (state, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(events: &[AnthropicStreamEvent]) -> Vec<&'static str> {
        events.iter().map(AnthropicStreamEvent::event_name).collect()
    }

    fn run(lines: &[&str]) -> (StreamState, Vec<AnthropicStreamEvent>) {
        let mut state = StreamState::new("msg_test", "claude-test");
        let mut all = Vec::new();
        for line in lines {
            if state.is_closed() {
                break;
            }
            let (next, events) = step(state, line);
            state = next;
            all.extend(events);
        }
        let (state, events) = finish(state, None);
        all.extend(events);
        (state, all)
    }

    #[test]
    fn text_deltas_then_done() {
        let (state, events) = run(&[
            r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":" there"}}]}"#,
            "data: [DONE]",
        ]);
        assert_eq!(
            names(&events),
            [
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "message_stop"
            ]
        );
        assert_eq!(events[2], text_delta_event("Hi"));
        assert_eq!(events[3], text_delta_event(" there"));
        assert_eq!(state.output_tokens(), 2);
        assert_eq!(state.input_tokens(), None);
        assert!(!state.is_failed());
    }

    #[test]
    fn finish_reason_emits_message_delta_between_closing_events() {
        let (state, events) = run(&[
            r#"data: {"choices":[{"delta":{"content":"a b"}}],"usage":{"prompt_tokens":7}}"#,
            r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "data: [DONE]",
        ]);
        assert_eq!(
            names(&events),
            [
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop"
            ]
        );
        let AnthropicStreamEvent::MessageDelta { delta, usage } = &events[4] else {
            panic!("expected message_delta");
        };
        assert_eq!(delta.stop_reason.as_deref(), Some("end_turn"));
        assert!(delta.stop_sequence.is_none());
        assert_eq!(usage.input_tokens, 7);
        assert_eq!(usage.output_tokens, 2);
        assert_eq!(state.stop_reason(), Some("end_turn"));
    }

    #[test]
    fn sentinel_only_stream() {
        let (_, events) = run(&["data: [DONE]"]);
        assert_eq!(
            names(&events),
            [
                "message_start",
                "content_block_start",
                "content_block_stop",
                "message_stop"
            ]
        );
    }

    #[test]
    fn empty_input_still_frames() {
        let (state, events) = run(&[]);
        assert_eq!(
            names(&events),
            [
                "message_start",
                "content_block_start",
                "content_block_stop",
                "message_stop"
            ]
        );
        assert_eq!(state.phase(), StreamPhase::Closed);
    }

    #[test]
    fn first_line_frames_even_when_ignored() {
        let state = StreamState::new("msg_test", "m");
        let (state, events) = step(state, ": keep-alive");
        assert_eq!(names(&events), ["message_start", "content_block_start"]);
        let (_, events) = step(state, "");
        assert!(events.is_empty());
    }

    #[test]
    fn malformed_and_foreign_lines_are_skipped() {
        let (_, events) = run(&[
            "event: ping",
            "data: {oops",
            "",
            r#"data: {"choices":[{"delta":{"content":""}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"ok"}}]}"#,
        ]);
        assert_eq!(
            names(&events),
            [
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_stop"
            ]
        );
    }

    #[test]
    fn lines_after_close_are_ignored() {
        let state = StreamState::new("msg_test", "m");
        let (state, _) = step(state, "data: [DONE]");
        let (state, events) = step(state, r#"data: {"choices":[{"delta":{"content":"late"}}]}"#);
        assert!(events.is_empty());
        let (_, events) = finish(state, Some("late failure"));
        assert!(events.is_empty());
    }

    #[test]
    fn error_before_closing_pair() {
        let state = StreamState::new("msg_test", "m");
        let (state, _) = step(state, r#"data: {"choices":[{"delta":{"content":"partial"}}]}"#);
        let (state, events) = finish(state, Some("connection reset"));
        assert_eq!(names(&events), ["error", "content_block_stop", "message_stop"]);
        assert!(state.is_failed());
        let AnthropicStreamEvent::Error { error } = &events[0] else {
            panic!("expected error event");
        };
        assert_eq!(error.type_, "server_error");
        assert_eq!(error.message, "connection reset");
    }

    #[test]
    fn error_before_any_line_still_frames() {
        let (state, events) = finish(StreamState::new("msg_test", "m"), Some("refused"));
        assert_eq!(
            names(&events),
            [
                "message_start",
                "content_block_start",
                "error",
                "content_block_stop",
                "message_stop"
            ]
        );
        assert!(state.is_failed());
    }

    #[test]
    fn output_tokens_count_whitespace_pieces() {
        let (state, _) = run(&[
            r#"data: {"choices":[{"delta":{"content":"a b"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"c"}}]}"#,
        ]);
        assert_eq!(state.output_tokens(), 3);
    }

    #[test]
    fn usage_capture_policies() {
        let lines = [
            r#"data: {"choices":[{"delta":{"content":"x"}}],"usage":{"prompt_tokens":3}}"#,
            r#"data: {"choices":[],"usage":{"prompt_tokens":99}}"#,
            r#"data: {"choices":[{"delta":{"content":"y"}}],"usage":{"prompt_tokens":5}}"#,
        ];

        let mut first = StreamState::new("msg_test", "m");
        let mut last = StreamState::new("msg_test", "m").with_usage_capture(UsageCapture::Last);
        for line in lines {
            first = step(first, line).0;
            last = step(last, line).0;
        }
        assert_eq!(first.input_tokens(), Some(3));
        assert_eq!(last.input_tokens(), Some(5));
    }

    #[test]
    fn message_start_carries_id_and_model() {
        let (_, events) = step(StreamState::new("msg_abc", "claude-x"), "data: [DONE]");
        let AnthropicStreamEvent::MessageStart { message } = &events[0] else {
            panic!("expected message_start");
        };
        assert_eq!(message.id, "msg_abc");
        assert_eq!(message.model, "claude-x");
        assert!(message.content.is_empty());
        assert_eq!(message.usage, AnthropicUsage::default());
    }
}
