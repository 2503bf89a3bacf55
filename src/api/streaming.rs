use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;

use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;

use crate::api::CallContext;
use crate::error::GatewayError;
use crate::observability::TokenUsage;
use crate::protocol::anthropic::stream::encode_anthropic_sse_frame;
use crate::protocol::anthropic::AnthropicStreamEvent;
use crate::state::AppState;
use crate::stream::transcoder::{finish, step, StreamState};
use crate::transport::{LineStream, UpstreamTarget};

const STREAM_FAILED_STATUS: u16 = 500;

/// Build the SSE response for a streaming call.
///
/// The upstream request is only sent once the body is first polled, so
/// connection failures reach the caller as in-band `error` events.
pub(crate) fn stream_response(
    state: Arc<AppState>,
    ctx: CallContext,
    target: Arc<UpstreamTarget>,
    upstream_body: Bytes,
) -> Response {
    let request_seq = state.next_request_seq();
    let transcoder = StreamState::new(state.message_id(request_seq), ctx.model.clone())
        .with_usage_capture(state.usage_capture());
    let driver = StreamDriver {
        state,
        ctx,
        target,
        upstream_body: Some(upstream_body),
        lines: None,
        transcoder: Some(transcoder),
        pending: VecDeque::new(),
        done: false,
        logged: false,
    };

    let body_stream = futures_util::stream::unfold(driver, |mut driver| async move {
        loop {
            if let Some(frame) = driver.pending.pop_front() {
                return Some((Ok::<Bytes, Infallible>(frame), driver));
            }
            if driver.done {
                return None;
            }
            driver.pull().await;
        }
    });

    sse_ok_response(axum::body::Body::from_stream(body_stream))
}

fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}

/// Pull side of one translated stream.
///
/// Dropping the driver before the stream closed (caller went away) records
/// the call as failed.
struct StreamDriver {
    state: Arc<AppState>,
    ctx: CallContext,
    target: Arc<UpstreamTarget>,
    upstream_body: Option<Bytes>,
    lines: Option<LineStream>,
    transcoder: Option<StreamState>,
    pending: VecDeque<Bytes>,
    done: bool,
    logged: bool,
}

impl StreamDriver {
    /// Advance by at most one upstream line, queueing the resulting frames.
    async fn pull(&mut self) {
        if let Some(body) = self.upstream_body.take() {
            match self.state.transport().post_stream(&self.target, body).await {
                Ok(lines) => self.lines = Some(lines),
                Err(err) => {
                    self.close(Some(&err));
                    return;
                }
            }
        }

        let Some(lines) = self.lines.as_mut() else {
            self.close(None);
            return;
        };

        match lines.next().await {
            Some(Ok(line)) => {
                let Some(current) = self.transcoder.take() else {
                    self.done = true;
                    return;
                };
                let (next, events) = step(current, &line);
                self.queue(&events);
                let closed = next.is_closed();
                self.transcoder = Some(next);
                if closed {
                    self.lines = None;
                    self.complete();
                }
            }
            Some(Err(err)) => self.close(Some(&err)),
            None => self.close(None),
        }
    }

    fn close(&mut self, error: Option<&GatewayError>) {
        self.lines = None;
        if let Some(current) = self.transcoder.take() {
            let message = error.map(stream_error_message);
            let (next, events) = finish(current, message.as_deref());
            self.queue(&events);
            self.transcoder = Some(next);
        }
        self.complete();
    }

    fn complete(&mut self) {
        self.done = true;
        let failed = self.transcoder.as_ref().map_or(true, StreamState::is_failed);
        let status = if failed {
            STREAM_FAILED_STATUS
        } else {
            http::StatusCode::OK.as_u16()
        };
        self.record(status);
    }

    fn record(&mut self, status_code: u16) {
        if self.logged {
            return;
        }
        self.logged = true;
        let usage = self
            .transcoder
            .as_ref()
            .map(TokenUsage::from_stream)
            .unwrap_or_default();
        self.state
            .request_log()
            .record(self.ctx.log_entry(status_code, usage, true));
    }

    fn queue(&mut self, events: &[AnthropicStreamEvent]) {
        for event in events {
            match encode_anthropic_sse_frame(event) {
                Ok(frame) => self.pending.push_back(Bytes::from(frame)),
                Err(err) => {
                    tracing::warn!(event = event.event_name(), error = %err, "dropping unencodable stream event");
                }
            }
        }
    }
}

impl Drop for StreamDriver {
    fn drop(&mut self) {
        if !self.logged {
            tracing::info!(
                gateway_id = self.ctx.gateway_id,
                model = %self.ctx.model,
                "stream cancelled before completion"
            );
            self.record(STREAM_FAILED_STATUS);
        }
    }
}

/// Text for the in-band `error` event.
fn stream_error_message(err: &GatewayError) -> String {
    match (err.upstream_status(), err.upstream_detail()) {
        (Some(status), _) => format!("{err} (status {status})"),
        (None, Some(detail)) => format!("{err}: {detail}"),
        (None, None) => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_carries_status_or_detail() {
        let upstream = GatewayError::Upstream {
            status: 503,
            url: "http://u/v1/chat/completions".to_string(),
            message: "busy".to_string(),
        };
        assert_eq!(
            stream_error_message(&upstream),
            "Upstream provider returned an error (status 503)"
        );

        let transport = GatewayError::Transport {
            url: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(
            stream_error_message(&transport),
            "Could not reach upstream provider: connection refused"
        );
    }
}
