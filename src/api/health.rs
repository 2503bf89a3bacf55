use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

const SERVICE_NAME: &str = "LLM Gateway";

/// Service info handler.
/// Returns JSON with status and config summary.
pub fn service_info_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "gateways_count": state.gateway_count(),
        "log_level": state.config.features.log_level,
    }))
}

/// Liveness probe.
pub fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
