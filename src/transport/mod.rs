mod http_transport;

pub use http_transport::HttpTransport;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

use crate::error::GatewayError;

/// Upstream lines, in arrival order. An `Err` item ends the sequence.
pub type LineStream = BoxStream<'static, Result<String, GatewayError>>;

/// Where and how to reach one upstream Chat Completions endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    /// Full `.../v1/chat/completions` URL.
    pub url: url::Url,
    /// Sent as `Authorization: Bearer <api_key>`.
    pub api_key: String,
}

/// Outbound HTTP collaborator of the translation pipelines.
///
/// Non-2xx upstream statuses surface as [`GatewayError::Upstream`];
/// connection failures and timeouts as [`GatewayError::Transport`].
pub trait UpstreamTransport: Send + Sync {
    /// POST a JSON body and return the full response body.
    fn post_json<'a>(
        &'a self,
        target: &'a UpstreamTarget,
        body: Bytes,
    ) -> BoxFuture<'a, Result<Bytes, GatewayError>>;

    /// POST a JSON body and return the response body as a sequence of lines.
    fn post_stream<'a>(
        &'a self,
        target: &'a UpstreamTarget,
        body: Bytes,
    ) -> BoxFuture<'a, Result<LineStream, GatewayError>>;
}
