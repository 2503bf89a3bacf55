use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::config::ServerConfig;
use crate::error::GatewayError;
use crate::stream::sse::sse_line_stream;

use super::{LineStream, UpstreamTarget, UpstreamTransport};

const MAX_ERROR_BODY_CHARS: usize = 2048;

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    connect_timeout: Duration,
    use_env_proxy: bool,
) -> Result<reqwest::Client, GatewayError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::none());

    if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| GatewayError::Config(format!("Failed to build HTTP client: {err}")))
}

/// `reqwest`-backed [`UpstreamTransport`].
///
/// Completed requests are bounded by one overall timeout covering connect,
/// response head and body. Streams are bounded by the same timeout until the
/// response head arrives and then per body chunk, so long generations are not
/// cut off while data keeps flowing.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from server settings.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the HTTP client cannot be built.
    pub fn new(config: &ServerConfig) -> Result<Self, GatewayError> {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        let client = build_reqwest_client(
            config.http_pool_max_idle_per_host,
            pool_idle_timeout,
            Duration::from_secs(config.connect_timeout),
            config.http_use_env_proxy,
        )?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout),
        })
    }

    /// Send the request and turn a non-success status into an error. Not
    /// bounded on its own; callers wrap it in their timeout.
    async fn send(
        &self,
        target: &UpstreamTarget,
        body: Bytes,
        accept: &'static str,
    ) -> Result<reqwest::Response, GatewayError> {
        let request = self
            .client
            .post(target.url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", target.api_key))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept)
            .body(body);

        let response = request
            .send()
            .await
            .map_err(|err| transport_error(target, &err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.text().await {
            Ok(text) if !text.trim().is_empty() => truncate_chars(&text, MAX_ERROR_BODY_CHARS),
            _ => status
                .canonical_reason()
                .unwrap_or("upstream error")
                .to_string(),
        };
        tracing::warn!(
            status = status.as_u16(),
            url = %target.url,
            "upstream returned non-success status"
        );
        Err(GatewayError::Upstream {
            status: status.as_u16(),
            url: target.url.to_string(),
            message,
        })
    }
}

impl UpstreamTransport for HttpTransport {
    fn post_json<'a>(
        &'a self,
        target: &'a UpstreamTarget,
        body: Bytes,
    ) -> BoxFuture<'a, Result<Bytes, GatewayError>> {
        async move {
            let exchange = async {
                let response = self.send(target, body, "application/json").await?;
                response
                    .bytes()
                    .await
                    .map_err(|err| transport_error(target, &err.to_string()))
            };
            match tokio::time::timeout(self.timeout, exchange).await {
                Ok(result) => result,
                Err(_) => Err(timeout_error(target, self.timeout)),
            }
        }
        .boxed()
    }

    fn post_stream<'a>(
        &'a self,
        target: &'a UpstreamTarget,
        body: Bytes,
    ) -> BoxFuture<'a, Result<LineStream, GatewayError>> {
        async move {
            let response = match tokio::time::timeout(
                self.timeout,
                self.send(target, body, "text/event-stream"),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => return Err(timeout_error(target, self.timeout)),
            };
            let url = target.url.to_string();
            let idle_timeout = self.timeout;
            let chunks = futures_util::stream::unfold(
                Some(response.bytes_stream().boxed()),
                move |inner| {
                    let url = url.clone();
                    async move {
                        let mut inner = inner?;
                        match tokio::time::timeout(idle_timeout, inner.next()).await {
                            Ok(Some(Ok(bytes))) => Some((Ok(bytes), Some(inner))),
                            Ok(Some(Err(err))) => Some((
                                Err(GatewayError::Transport {
                                    url: Some(url),
                                    message: err.to_string(),
                                }),
                                None,
                            )),
                            Ok(None) => None,
                            Err(_) => Some((
                                Err(GatewayError::Transport {
                                    url: Some(url),
                                    message: format!(
                                        "upstream stream idle for more than {}s",
                                        idle_timeout.as_secs()
                                    ),
                                }),
                                None,
                            )),
                        }
                    }
                },
            );
            Ok(sse_line_stream(chunks).boxed())
        }
        .boxed()
    }
}

fn transport_error(target: &UpstreamTarget, message: &str) -> GatewayError {
    tracing::warn!(url = %target.url, error = %message, "upstream transport failure");
    GatewayError::Transport {
        url: Some(target.url.to_string()),
        message: message.to_string(),
    }
}

fn timeout_error(target: &UpstreamTarget, timeout: Duration) -> GatewayError {
    transport_error(
        target,
        &format!("upstream request timed out after {}s", timeout.as_secs()),
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
