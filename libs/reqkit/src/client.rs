//! Request executor.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

use crate::error::{ApiError, ClassifiedError, ContractError};
use crate::http::client::TracedClient;
use crate::http::headers::{build_headers, StaticToken, TokenProvider};
use crate::http::url::{build_url, join_base};
use crate::options::CallOptions;
use crate::route::{Method, Route};

/// Executes [`Route`]s against one backend.
///
/// Cheap to clone; clones share the transport and token provider.
#[derive(Clone)]
pub struct ApiClient {
    http: TracedClient,
    base_url: Arc<str>,
    tokens: Arc<dyn TokenProvider>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            http: None,
            tokens: None,
        }
    }

    /// Client for the configured backend.
    pub fn from_config(cfg: &runtime::ApiConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::builder(cfg.base_url.clone())
            .http(TracedClient::with_user_agent(&cfg.user_agent))
            .tokens(tokens)
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn transport(&self) -> &TracedClient {
        &self.http
    }

    /// Perform one call for `route`.
    ///
    /// Non-2xx responses and transport failures come back as [`ApiError::Classified`].
    /// If `options.signal` fires first the call is abandoned and [`ApiError::Cancelled`]
    /// is returned; no classified error is produced for it.
    #[instrument(
        name = "reqkit.execute",
        skip_all,
        fields(method = %route.method(), path = %route.path())
    )]
    pub async fn execute<Req, Res>(
        &self,
        route: &Route<Req, Res>,
        options: CallOptions<Req>,
    ) -> Result<Res, ApiError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        if options.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let relative = build_url(route.path(), &options.query_params, &options.path_params)?;
        let url = join_base(&self.base_url, &relative);

        let token = if route.no_auth() {
            None
        } else {
            self.tokens.access_token()
        };
        let headers = build_headers(route.no_auth(), token.as_deref(), &options.headers);

        let mut builder = self
            .http
            .request(route.method().into(), &url)
            .headers(headers);
        if let Some(body) = &options.body {
            if route.method() == Method::Get {
                tracing::warn!("ignoring request body on GET route");
            } else {
                let payload =
                    serde_json::to_vec(body).map_err(|e| ContractError::Body(e.to_string()))?;
                builder = builder.body(payload);
            }
        }
        let request = builder
            .build()
            .map_err(|e| ContractError::Request(e.to_string()))?;

        let exchange = self.exchange(request, options.silent);
        let (status, body) = match &options.signal {
            Some(signal) => {
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => {
                        tracing::debug!("request cancelled by caller");
                        return Err(ApiError::Cancelled);
                    }
                    res = exchange => res?,
                }
            }
            None => exchange.await?,
        };

        let parsed = parse_body(&body);
        if !status.is_success() {
            let err = ClassifiedError::from_response(status, parsed, options.silent);
            tracing::debug!(status = status.as_u16(), kind = %err.kind, "request failed");
            return Err(err.into());
        }

        serde_json::from_value(parsed.clone().unwrap_or(Value::Null)).map_err(|e| {
            tracing::warn!(error = %e, "response body does not match the route contract");
            ClassifiedError::from_response(status, parsed, options.silent).into_unknown().into()
        })
    }

    /// Send the request and read the whole body.
    async fn exchange(
        &self,
        request: reqwest::Request,
        silent: bool,
    ) -> Result<(http::StatusCode, Bytes), ClassifiedError> {
        let response = self.http.execute(request).await.map_err(|e| {
            tracing::debug!(error = %e, "transport failure");
            ClassifiedError::network(silent)
        })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            tracing::debug!(error = %e, "failed to read response body");
            ClassifiedError::network(silent)
        })?;
        Ok((status, body))
    }
}

/// Parse a JSON body; unparsable or empty bodies become `None`.
pub(crate) fn parse_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice(body).ok()
}

pub struct ApiClientBuilder {
    base_url: String,
    http: Option<TracedClient>,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl ApiClientBuilder {
    pub fn http(mut self, http: TracedClient) -> Self {
        self.http = Some(http);
        self
    }

    pub fn tokens(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn build(self) -> ApiClient {
        ApiClient {
            http: self.http.unwrap_or_default(),
            base_url: Arc::from(self.base_url),
            tokens: self
                .tokens
                .unwrap_or_else(|| Arc::new(StaticToken::none())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_body_tolerates_garbage() {
        assert_eq!(parse_body(b""), None);
        assert_eq!(parse_body(b"<html>oops</html>"), None);
        assert_eq!(parse_body(br#"{"a":1}"#), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn builder_defaults() {
        let client = ApiClient::builder("http://api.local").build();
        assert_eq!(client.base_url(), "http://api.local");
        assert!(client.tokens.access_token().is_none());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn get_body_is_dropped_with_warning() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/ping");
                then.status(200).json_body(serde_json::json!({"ok": true}));
            })
            .await;

        let route: Route<Value, Value> = Route::get("/ping");
        let client = ApiClient::builder(server.base_url()).build();
        let res = client
            .execute(&route, CallOptions::new().body(serde_json::json!({"x": 1})))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(res, serde_json::json!({"ok": true}));
        assert!(logs_contain("ignoring request body on GET route"));
    }
}
