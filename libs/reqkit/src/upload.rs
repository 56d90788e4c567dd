//! Binary uploads with progress reporting.
//!
//! Uploads go straight to a (usually pre-signed) URL, bypassing the JSON executor, but
//! failures are classified and reported through the same [`ErrorPolicy`].

use bytes::Bytes;
use futures::StreamExt;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::error::{ApiError, ClassifiedError, ContractError};
use crate::http::client::TracedClient;
use crate::policy::ErrorPolicy;
use crate::route::Method;

/// Size of the body chunks handed to the transport; progress is reported per chunk.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub payload: Bytes,
    pub signal: Option<CancellationToken>,
}

impl UploadRequest {
    pub fn put(url: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            method: Method::Put,
            headers: HeaderMap::new(),
            payload: payload.into(),
            signal: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadResponse {
    pub status: StatusCode,
    /// JSON body if it parsed, the raw text otherwise. `None` when empty.
    pub body: Option<Value>,
}

pub struct Uploader {
    http: TracedClient,
    policy: Arc<ErrorPolicy>,
}

impl Uploader {
    pub fn new(http: TracedClient, policy: Arc<ErrorPolicy>) -> Self {
        Self { http, policy }
    }

    /// Uploader sharing the transport of an existing [`ApiClient`].
    pub fn from_client(client: &ApiClient, policy: Arc<ErrorPolicy>) -> Self {
        Self::new(client.transport().clone(), policy)
    }

    /// Send `req.payload`, calling `on_progress` with a 0..=100 percentage as chunks go out.
    ///
    /// Failures are reported through the policy once and then returned; the call settles
    /// exactly once either way.
    pub async fn upload<P>(&self, req: UploadRequest, on_progress: P) -> Result<UploadResponse, ApiError>
    where
        P: Fn(u8) + Send + Sync + 'static,
    {
        let signal = req.signal.clone();
        let fut = self.send(req, on_progress);
        let res = match signal {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.cancelled() => Err(ApiError::Cancelled),
                res = fut => res,
            },
            None => fut.await,
        };

        if let Err(err) = &res {
            self.policy.handle(err);
        }
        res
    }

    async fn send<P>(&self, req: UploadRequest, on_progress: P) -> Result<UploadResponse, ApiError>
    where
        P: Fn(u8) + Send + Sync + 'static,
    {
        let total = req.payload.len();
        let sent = Arc::new(AtomicUsize::new(0));
        let progress = Arc::new(on_progress);

        let chunks: Vec<Bytes> = (0..total)
            .step_by(UPLOAD_CHUNK_SIZE)
            .map(|start| req.payload.slice(start..(start + UPLOAD_CHUNK_SIZE).min(total)))
            .collect();
        let body_progress = progress.clone();
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            let done = sent.fetch_add(chunk.len(), Ordering::SeqCst) + chunk.len();
            body_progress(percent(done, total));
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let mut headers = req.headers;
        headers.insert(CONTENT_LENGTH, HeaderValue::from(total as u64));

        let request = self
            .http
            .request(req.method.into(), &req.url)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(stream))
            .build()
            .map_err(|e| ContractError::Request(e.to_string()))?;

        let response = self.http.execute(request).await.map_err(|e| {
            tracing::warn!(error = %e, "upload transport failure");
            ClassifiedError::network(false)
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|_| ClassifiedError::network(false))?;
        let body = parse_json_or_text(text);

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "upload rejected");
            return Err(ClassifiedError::from_response(status, body, false).into());
        }
        if total == 0 {
            progress(100);
        }
        Ok(UploadResponse { status, body })
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

fn parse_json_or_text(text: String) -> Option<Value> {
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
