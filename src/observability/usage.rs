use std::time::Duration;
use tracing::info;

use crate::protocol::anthropic::MessagesResponse;
use crate::stream::transcoder::StreamState;

/// Token counts attributed to one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Exact counts reported by the upstream; zero when it sent none.
    #[must_use]
    pub fn from_response(response: &MessagesResponse) -> Self {
        response.usage.map_or_else(Self::default, |usage| Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        })
    }

    /// Approximate counts for a stream: the captured prompt count and the
    /// whitespace-split piece count of all text deltas.
    #[must_use]
    pub fn from_stream(state: &StreamState) -> Self {
        Self {
            input_tokens: state.input_tokens().unwrap_or(0),
            output_tokens: state.output_tokens(),
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// One finished gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogEntry {
    pub gateway_id: u64,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub model: String,
    pub usage: TokenUsage,
    pub duration: Duration,
    pub streamed: bool,
}

impl RequestLogEntry {
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.usage.total()
    }
}

/// Receives one entry per finished call. Implementations must not block.
pub trait RequestLogSink: Send + Sync {
    fn record(&self, entry: RequestLogEntry);
}

/// Default sink: one structured `info` event per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestLog;

impl RequestLogSink for TracingRequestLog {
    fn record(&self, entry: RequestLogEntry) {
        log_request_usage(&entry);
    }
}

/// Log token usage for a finished request.
pub fn log_request_usage(entry: &RequestLogEntry) {
    info!(
        gateway_id = entry.gateway_id,
        method = %entry.method,
        path = %entry.path,
        status = entry.status_code,
        model = %entry.model,
        streamed = entry.streamed,
        input_tokens = entry.usage.input_tokens,
        output_tokens = entry.usage.output_tokens,
        total_tokens = entry.total_tokens(),
        duration_ms = u64::try_from(entry.duration.as_millis()).unwrap_or(u64::MAX),
        "Request completed"
    );
}
