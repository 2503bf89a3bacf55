use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::{health, messages};
use crate::state::AppState;

const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
const GATEWAY_PREFIX: &str = "/gateway/";
const MESSAGES_SUFFIX: &str = "/v1/messages";

#[derive(Debug, PartialEq, Eq)]
enum RouteMatch {
    ServiceInfo,
    Health,
    Messages { gateway_id: u64 },
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let started = Instant::now();
    let (parts, body) = request.into_parts();
    let path = parts.uri.path();
    let route = match_route(&parts.method, path, base_path.as_ref());

    let response = match route {
        RouteMatch::ServiceInfo => health::service_info_handler(State(state)).into_response(),
        RouteMatch::Health => health::health_handler().into_response(),
        RouteMatch::Messages { gateway_id } => match read_request_body(body).await {
            Ok(body_bytes) => {
                messages::handler(
                    state,
                    gateway_id,
                    &parts.method,
                    path,
                    &parts.headers,
                    body_bytes,
                )
                .await
            }
            Err(response) => response,
        },
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    if is_gateway_path(path, base_path.as_ref()) {
        tracing::info!(
            "{} {} {} {}ms",
            parts.method,
            path,
            response.status().as_u16(),
            started.elapsed().as_millis()
        );
    }

    Ok(response)
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

async fn read_request_body(body: Body) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, DEFAULT_BODY_LIMIT_BYTES)
        .await
        .map_err(|_| {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large (max 2MiB)",
            )
                .into_response()
        })
}

fn is_gateway_path(path: &str, base_path: &str) -> bool {
    strip_base_path(path, base_path).is_some_and(|path| path.starts_with(GATEWAY_PREFIX))
}

fn match_route(method: &Method, path: &str, base_path: &str) -> RouteMatch {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };

    match path {
        "/" => {
            if method == Method::GET {
                RouteMatch::ServiceInfo
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/health" => {
            if method == Method::GET {
                RouteMatch::Health
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        _ => match parse_messages_path(path) {
            Some(gateway_id) => {
                if method == Method::POST {
                    RouteMatch::Messages { gateway_id }
                } else {
                    RouteMatch::MethodNotAllowed
                }
            }
            None => RouteMatch::NotFound,
        },
    }
}

/// `/gateway/{id}/v1/messages` -> `id`. Non-numeric ids do not match.
fn parse_messages_path(path: &str) -> Option<u64> {
    let id = path
        .strip_prefix(GATEWAY_PREFIX)?
        .strip_suffix(MESSAGES_SUFFIX)?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}
