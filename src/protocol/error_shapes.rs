use crate::error::ErrorCategory;

pub(crate) fn anthropic_error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request_error",
        ErrorCategory::Authentication => "authentication_error",
        ErrorCategory::NotFound => "not_found_error",
        ErrorCategory::UpstreamFormat | ErrorCategory::UpstreamUnavailable => "upstream_error",
        ErrorCategory::ServerError => "api_error",
    }
}

#[must_use]
pub(crate) fn anthropic_error_payload(cat: ErrorCategory, message: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "error",
        "error": {
            "type": anthropic_error_type(cat),
            "message": message,
        }
    })
}
