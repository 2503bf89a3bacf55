use std::sync::Arc;
use std::time::Instant;

use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::api::streaming::stream_response;
use crate::api::CallContext;
use crate::error::{format_error, GatewayError};
use crate::observability::TokenUsage;
use crate::protocol::anthropic::response_encoder::encode_messages_response;
use crate::protocol::anthropic::{MessagesRequest, MessagesResponse};
use crate::protocol::openai_chat::encoder::encode_chat_request;
use crate::protocol::openai_chat::ChatResponse;
use crate::state::{AppState, PreparedGateway};

/// `POST /gateway/{id}/v1/messages`.
///
/// Auth failures are answered before anything is logged; every call that
/// passes auth produces exactly one request log entry.
pub async fn handler(
    state: Arc<AppState>,
    gateway_id: u64,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let gateway = match state.authenticate(gateway_id, headers) {
        Ok(gateway) => gateway,
        Err(err) => return err.into_response(),
    };

    let mut ctx = CallContext {
        gateway_id,
        method: method.as_str().to_string(),
        path: path.to_string(),
        model: String::new(),
        started,
    };

    let request = match parse_messages_request(&body) {
        Ok(request) => request,
        Err(err) => return respond_with_error(&state, &ctx, &err),
    };
    ctx.model.clone_from(&request.model);

    if request.is_stream() {
        return match encode_upstream_body(gateway, &request, true) {
            Ok(upstream_body) => stream_response(
                Arc::clone(&state),
                ctx,
                Arc::clone(&gateway.target),
                upstream_body,
            ),
            Err(err) => respond_with_error(&state, &ctx, &err),
        };
    }

    match complete(&state, gateway, &request).await {
        Ok(response) => {
            let usage = TokenUsage::from_response(&response);
            state
                .request_log()
                .record(ctx.log_entry(http::StatusCode::OK.as_u16(), usage, false));
            axum::Json(response).into_response()
        }
        Err(err) => respond_with_error(&state, &ctx, &err),
    }
}

/// Decode the caller body and check the one required field.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for undecodable JSON and for a
/// missing or empty `model`.
pub fn parse_messages_request(body: &[u8]) -> Result<MessagesRequest, GatewayError> {
    let request: MessagesRequest = serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(error = %err, "rejecting undecodable request body");
        GatewayError::InvalidRequest("Invalid JSON body".to_string())
    })?;
    if request.model.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "Missing required parameter: model".to_string(),
        ));
    }
    Ok(request)
}

fn encode_upstream_body(
    gateway: &PreparedGateway,
    request: &MessagesRequest,
    stream: bool,
) -> Result<Bytes, GatewayError> {
    let upstream_model = gateway.resolver.resolve(&request.model);
    let mut chat = encode_chat_request(request, upstream_model);
    chat.stream = Some(stream);
    serde_json::to_vec(&chat)
        .map(Bytes::from)
        .map_err(|err| GatewayError::Internal(format!("failed to encode upstream request: {err}")))
}

async fn complete(
    state: &AppState,
    gateway: &PreparedGateway,
    request: &MessagesRequest,
) -> Result<MessagesResponse, GatewayError> {
    let upstream_body = encode_upstream_body(gateway, request, false)?;
    let response_bytes = state
        .transport()
        .post_json(&gateway.target, upstream_body)
        .await?;
    let upstream: ChatResponse = serde_json::from_slice(&response_bytes).map_err(|err| {
        GatewayError::MalformedUpstreamResponse(format!("undecodable response body: {err}"))
    })?;
    encode_messages_response(&upstream, &request.model)
}

fn respond_with_error(state: &AppState, ctx: &CallContext, err: &GatewayError) -> Response {
    let (status, body) = format_error(err);
    state
        .request_log()
        .record(ctx.log_entry(status.as_u16(), TokenUsage::default(), false));
    (status, axum::Json(body)).into_response()
}
