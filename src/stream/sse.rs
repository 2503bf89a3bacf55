//! SSE line splitting and frame encoding.
//!
//! Upstream bodies are consumed line by line: the translator is defined over
//! single `data:` lines rather than assembled multi-line events.

use bytes::Bytes;
use futures_util::Stream;
use memchr::memchr_iter;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// SseLineSplitter: incremental line splitter
// ---------------------------------------------------------------------------

/// Incremental line splitter.
///
/// Feed it raw text chunks (potentially arriving in arbitrary byte
/// boundaries) and it yields complete lines without their terminator.
#[derive(Debug, Default)]
pub struct SseLineSplitter {
    buffer: String,
}

impl SseLineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw text and append complete lines into a caller-provided buffer.
    pub fn feed_into<E>(&mut self, chunk: &str, out: &mut VecDeque<Result<String, E>>) {
        self.buffer.push_str(chunk);
        let mut processed_up_to = 0;
        for line_end in memchr_iter(b'\n', self.buffer.as_bytes()) {
            let mut line = &self.buffer[processed_up_to..line_end];
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            out.push_back(Ok(line.to_string()));
            processed_up_to = line_end + 1;
        }
        if processed_up_to > 0 {
            self.buffer.drain(..processed_up_to);
        }
    }

    /// Take the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

/// Format an Anthropic-style SSE frame (with named event type).
#[must_use]
pub fn anthropic_sse_frame(event_type: &str, json: &str) -> String {
    let mut out = String::with_capacity(18 + event_type.len() + json.len());
    out.push_str("event: ");
    out.push_str(event_type);
    out.push('\n');
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

// ---------------------------------------------------------------------------
// Stream utility
// ---------------------------------------------------------------------------

struct LineStreamState<S, E> {
    inner: std::pin::Pin<Box<S>>,
    splitter: SseLineSplitter,
    remainder: Vec<u8>,
    pending: VecDeque<Result<String, E>>,
    exhausted: bool,
}

/// Split a byte stream into lines.
///
/// Bytes are decoded as UTF-8 with multi-byte sequences split across chunks
/// carried over to the next chunk. A transport error is yielded in order and
/// ends the stream. A trailing line without a newline is yielded at the end.
pub fn sse_line_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        LineStreamState {
            inner: Box::pin(byte_stream),
            splitter: SseLineSplitter::new(),
            remainder: Vec::new(),
            pending: VecDeque::new(),
            exhausted: false,
        },
        |mut st| async move {
            loop {
                if let Some(item) = st.pending.pop_front() {
                    return Some((item, st));
                }
                if st.exhausted {
                    return None;
                }

                match st.inner.as_mut().next().await {
                    Some(Ok(bytes)) => {
                        st.remainder.extend_from_slice(&bytes);
                        let checked = std::str::from_utf8(&st.remainder)
                            .map(str::len)
                            .map_err(|e| (e.valid_up_to(), e.error_len()));
                        let valid_up_to = match checked {
                            Ok(len) => len,
                            Err((valid_up_to, None)) => valid_up_to,
                            Err((_, Some(_))) => {
                                // Invalid bytes, not a truncated sequence.
                                let text = String::from_utf8_lossy(&st.remainder).into_owned();
                                st.remainder.clear();
                                st.splitter.feed_into(&text, &mut st.pending);
                                continue;
                            }
                        };
                        if let Ok(text) = std::str::from_utf8(&st.remainder[..valid_up_to]) {
                            st.splitter.feed_into(text, &mut st.pending);
                        }
                        st.remainder.drain(..valid_up_to);
                    }
                    Some(Err(err)) => {
                        st.exhausted = true;
                        st.pending.push_back(Err(err));
                    }
                    None => {
                        st.exhausted = true;
                        if !st.remainder.is_empty() {
                            let tail = String::from_utf8_lossy(&st.remainder).into_owned();
                            st.remainder.clear();
                            st.splitter.feed_into(&tail, &mut st.pending);
                        }
                        if let Some(line) = st.splitter.finish() {
                            st.pending.push_back(Ok(line));
                        }
                    }
                }
            }
        },
    )
}
