// ---------------------------------------------------------------------------
// Stop reason mappings
// ---------------------------------------------------------------------------

/// Upstream finish reason used when a completed response omits it.
pub const DEFAULT_FINISH_REASON: &str = "stop";

/// Map an upstream `finish_reason` to the Messages `stop_reason`.
///
/// Only `"stop"` is renamed; every other value passes through.
#[must_use]
pub fn openai_finish_to_anthropic_stop(reason: &str) -> &str {
    match reason {
        "stop" => "end_turn",
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Role mappings
// ---------------------------------------------------------------------------

/// Role of the turn synthesized from a top-level system prompt.
pub const SYSTEM_ROLE: &str = "system";

/// Whether a top-level `system` value should become a turn.
///
/// Non-empty strings and non-empty arrays qualify; everything else is dropped.
#[must_use]
pub fn system_prompt_is_present(system: &serde_json::Value) -> bool {
    match system {
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(parts) => !parts.is_empty(),
        _ => false,
    }
}
