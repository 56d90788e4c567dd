//! Traced HTTP transport.
//!
//! A thin wrapper around `reqwest::Client` that opens an `outgoing_http` span per request
//! and injects a `traceparent` header for distributed tracing.

use crate::http::trace;
use tracing::{field, Instrument, Level};

/// Transport shared by the request executor and the uploader.
#[derive(Clone)]
pub struct TracedClient {
    inner: reqwest::Client,
}

impl TracedClient {
    pub fn new(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// Client with a custom `User-Agent`; falls back to the default client if the
    /// builder rejects the configuration.
    pub fn with_user_agent(user_agent: &str) -> Self {
        match reqwest::Client::builder().user_agent(user_agent).build() {
            Ok(c) => Self::new(c),
            Err(e) => {
                tracing::warn!(error = %e, "failed to build HTTP client; using defaults");
                Self::default()
            }
        }
    }

    /// Execute a built request inside an `outgoing_http` span.
    pub async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let span = tracing::span!(
            Level::INFO, "outgoing_http",
            http.method = %req.method(),
            http.url = %req.url(),
            http.status_code = field::Empty,
            error = field::Empty,
            otel.kind = "client",
        );

        trace::inject_trace_context(req.headers_mut());

        let inner = self.inner.clone();
        async move {
            let response = inner.execute(req).await;
            let current = tracing::Span::current();
            match &response {
                Ok(resp) => {
                    current.record("http.status_code", resp.status().as_u16());
                    if resp.status().is_client_error() || resp.status().is_server_error() {
                        current.record("error", true);
                    }
                }
                Err(_) => {
                    current.record("error", true);
                }
            }
            response
        }
        .instrument(span)
        .await
    }

    /// Request builder bound to the underlying client.
    pub fn request(&self, method: http::Method, url: &str) -> reqwest::RequestBuilder {
        self.inner.request(method, url)
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }
}

impl From<reqwest::Client> for TracedClient {
    fn from(c: reqwest::Client) -> Self {
        Self::new(c)
    }
}

impl Default for TracedClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}
