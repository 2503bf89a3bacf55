use crate::protocol::error_shapes::anthropic_error_payload;

/// Error type shared by the translators, the transport and the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
    #[error("Upstream provider returned an error")]
    Upstream {
        status: u16,
        url: String,
        message: String,
    },
    #[error("Could not reach upstream provider")]
    Transport { url: Option<String>, message: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    NotFound,
    UpstreamFormat,
    UpstreamUnavailable,
    ServerError,
}

impl GatewayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            GatewayError::Auth(_) => ErrorCategory::Authentication,
            GatewayError::NotFound(_) => ErrorCategory::NotFound,
            GatewayError::MalformedUpstreamResponse(_) => ErrorCategory::UpstreamFormat,
            GatewayError::Upstream { .. } | GatewayError::Transport { .. } => {
                ErrorCategory::UpstreamUnavailable
            }
            GatewayError::Config(_) | GatewayError::Internal(_) => ErrorCategory::ServerError,
        }
    }

    /// Upstream HTTP status carried by the error, if any.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            GatewayError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Underlying upstream detail (response body or connection error), if any.
    #[must_use]
    pub fn upstream_detail(&self) -> Option<&str> {
        match self {
            GatewayError::Upstream { message, .. } | GatewayError::Transport { message, .. } => {
                Some(message)
            }
            _ => None,
        }
    }

    /// Upstream URL carried by the error, if any.
    #[must_use]
    pub fn upstream_url(&self) -> Option<&str> {
        match self {
            GatewayError::Upstream { url, .. } => Some(url),
            GatewayError::Transport { url, .. } => url.as_deref(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Category -> HTTP status code
// ---------------------------------------------------------------------------

#[must_use]
pub fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::NotFound => http::StatusCode::NOT_FOUND,
        ErrorCategory::UpstreamFormat | ErrorCategory::UpstreamUnavailable => {
            http::StatusCode::BAD_GATEWAY
        }
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as a Messages-dialect error document, returning
/// (`status_code`, JSON body).
#[must_use]
pub fn format_error(err: &GatewayError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = http_status_for_category(cat);
    let mut body = anthropic_error_payload(cat, &err.to_string());

    if let Some(inner) = body.get_mut("error").and_then(serde_json::Value::as_object_mut) {
        if let Some(upstream_status) = err.upstream_status() {
            inner.insert("upstream_status".to_string(), upstream_status.into());
        }
        if let Some(upstream_url) = err.upstream_url() {
            inner.insert("upstream_url".to_string(), upstream_url.into());
        }
        if let GatewayError::Transport { message, .. } = err {
            inner.insert("error".to_string(), message.as_str().into());
        }
    }

    (status, body)
}

// ---------------------------------------------------------------------------
// Axum integration
// ---------------------------------------------------------------------------

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}
