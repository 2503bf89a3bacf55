use crate::error::GatewayError;
use http::header::{HeaderName, AUTHORIZATION};

const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// Extract the caller token from request headers.
///
/// `Authorization` wins when present and accepts `Bearer <t>`,
/// `x-api-key <t>` or a raw token. Otherwise `x-api-key: <t>` is used.
/// Empty values count as missing.
#[must_use]
pub fn extract_gateway_token(headers: &http::HeaderMap) -> Option<&str> {
    let token = match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) => value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("x-api-key "))
            .unwrap_or(value),
        None => headers.get(X_API_KEY).and_then(|v| v.to_str().ok())?,
    };
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Authenticate a gateway request.
///
/// The checks run in a fixed order: a missing token is rejected before the
/// gateway lookup, so unknown gateways are only revealed to callers that sent
/// some token.
///
/// # Errors
///
/// Returns [`GatewayError::Auth`] when the token is missing or does not match,
/// and [`GatewayError::NotFound`] when `expected_token` is `None` (unknown
/// gateway).
pub fn authenticate_gateway(
    headers: &http::HeaderMap,
    expected_token: Option<&str>,
) -> Result<(), GatewayError> {
    let Some(token) = extract_gateway_token(headers) else {
        return Err(GatewayError::Auth(
            "Missing Authorization or x-api-key header".to_string(),
        ));
    };
    let Some(expected) = expected_token else {
        return Err(GatewayError::NotFound("Gateway not found".to_string()));
    };
    if token == expected {
        Ok(())
    } else {
        Err(GatewayError::Auth("Invalid authentication token".to_string()))
    }
}
