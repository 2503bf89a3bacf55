pub mod health;
pub mod messages;
pub(crate) mod streaming;

use std::time::{Duration, Instant};

use crate::observability::{RequestLogEntry, TokenUsage};

/// Per-call facts shared by the non-streaming and streaming pipelines.
#[derive(Debug, Clone)]
pub(crate) struct CallContext {
    pub(crate) gateway_id: u64,
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) model: String,
    pub(crate) started: Instant,
}

impl CallContext {
    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn log_entry(
        &self,
        status_code: u16,
        usage: TokenUsage,
        streamed: bool,
    ) -> RequestLogEntry {
        RequestLogEntry {
            gateway_id: self.gateway_id,
            method: self.method.clone(),
            path: self.path.clone(),
            status_code,
            model: self.model.clone(),
            usage,
            duration: self.elapsed(),
            streamed,
        }
    }
}
