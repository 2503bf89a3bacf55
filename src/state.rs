mod request_id;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::auth::authenticate_gateway;
use crate::config::{AppConfig, GatewayConfig};
use crate::error::GatewayError;
use crate::observability::{RequestLogSink, TracingRequestLog};
use crate::routing::ModelResolver;
use crate::stream::transcoder::UsageCapture;
use crate::transport::{HttpTransport, UpstreamTarget, UpstreamTransport};

use request_id::RequestIdGenerator;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// A gateway with its upstream URL parsed and its model table built.
#[derive(Debug, Clone)]
pub struct PreparedGateway {
    pub id: u64,
    pub target: Arc<UpstreamTarget>,
    pub resolver: ModelResolver,
    auth_token: Box<str>,
}

impl PreparedGateway {
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the upstream base URL cannot be
    /// turned into a chat completions URL.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let url = chat_completions_url(&config.upstream_base_url)?;
        Ok(Self {
            id: config.id,
            target: Arc::new(UpstreamTarget {
                url,
                api_key: config.upstream_api_key.clone(),
            }),
            resolver: ModelResolver::new(config),
            auth_token: config.auth_token.clone().into_boxed_str(),
        })
    }

    #[must_use]
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }
}

/// `{base}/v1/chat/completions`, tolerating a trailing slash on the base.
///
/// # Errors
///
/// Returns [`GatewayError::Config`] when the result is not a valid URL.
pub fn chat_completions_url(base_url: &str) -> Result<url::Url, GatewayError> {
    let base = base_url.trim().trim_end_matches('/');
    let mut joined = String::with_capacity(base.len() + CHAT_COMPLETIONS_PATH.len());
    joined.push_str(base);
    joined.push_str(CHAT_COMPLETIONS_PATH);
    url::Url::parse(&joined)
        .map_err(|err| GatewayError::Config(format!("invalid upstream URL '{joined}': {err}")))
}

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    transport: Arc<dyn UpstreamTransport>,
    request_log: Arc<dyn RequestLogSink>,
    gateways: FxHashMap<u64, PreparedGateway>,
    request_ids: RequestIdGenerator,
}

impl AppState {
    /// Build state with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when a gateway cannot be prepared.
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn UpstreamTransport>,
        request_log: Arc<dyn RequestLogSink>,
    ) -> Result<Self, GatewayError> {
        let mut gateways =
            FxHashMap::with_capacity_and_hasher(config.gateways.len(), Default::default());
        for gateway in &config.gateways {
            gateways.insert(gateway.id, PreparedGateway::new(gateway)?);
        }
        Ok(Self {
            config,
            transport,
            request_log,
            gateways,
            request_ids: RequestIdGenerator::new(),
        })
    }

    /// Build state with the `reqwest` transport and the tracing request log.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the HTTP client or a gateway
    /// cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self, GatewayError> {
        let transport = HttpTransport::new(&config.server)?;
        Self::new(config, Arc::new(transport), Arc::new(TracingRequestLog))
    }

    #[must_use]
    pub fn gateway(&self, id: u64) -> Option<&PreparedGateway> {
        self.gateways.get(&id)
    }

    #[must_use]
    pub fn gateway_count(&self) -> usize {
        self.gateways.len()
    }

    /// Authenticate a caller against gateway `id` and return the gateway.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Auth`] for a missing or wrong token and
    /// [`GatewayError::NotFound`] for an unknown gateway.
    pub fn authenticate(
        &self,
        id: u64,
        headers: &http::HeaderMap,
    ) -> Result<&PreparedGateway, GatewayError> {
        let gateway = self.gateway(id);
        authenticate_gateway(headers, gateway.map(PreparedGateway::auth_token))?;
        gateway.ok_or_else(|| GatewayError::NotFound("Gateway not found".to_string()))
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn UpstreamTransport> {
        &self.transport
    }

    #[must_use]
    pub fn request_log(&self) -> &Arc<dyn RequestLogSink> {
        &self.request_log
    }

    #[must_use]
    pub fn usage_capture(&self) -> UsageCapture {
        self.config.features.stream_usage_capture
    }

    pub fn next_request_seq(&self) -> u64 {
        self.request_ids.next_seq()
    }

    #[must_use]
    pub fn message_id(&self, request_seq: u64) -> String {
        self.request_ids.message_id(request_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_url_joins_base_with_and_without_slash() {
        assert_eq!(
            chat_completions_url("https://api.example.com/").unwrap().as_str(),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("http://127.0.0.1:9000").unwrap().as_str(),
            "http://127.0.0.1:9000/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("https://proxy.example.com/openai")
                .unwrap()
                .as_str(),
            "https://proxy.example.com/openai/v1/chat/completions"
        );
        assert!(chat_completions_url("not a url").is_err());
    }
}
