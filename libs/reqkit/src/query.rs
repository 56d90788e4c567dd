//! Adapters for an external cache/fetch scheduler.
//!
//! The scheduler owns retries, staleness and cancellation. It calls the functions built
//! here, handing each call a [`QueryContext`] whose signal it cancels when the result is
//! no longer wanted. Nothing in this module creates its own cancellation tokens or keeps
//! state between calls.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::options::{CallOptions, QueryValue};
use crate::pagination::{Identified, PaginatedResponse};
use crate::route::Route;

/// Delay applied by [`ApiClient::debounced_query`] when none is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// What the scheduler passes to a query function.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub signal: CancellationToken,
}

impl QueryContext {
    pub fn new(signal: CancellationToken) -> Self {
        Self { signal }
    }
}

/// Sleep for `delay` unless `signal` fires first, in which case `Err(Cancelled)`.
pub async fn cancellable_sleep(delay: Duration, signal: &CancellationToken) -> Result<(), ApiError> {
    tokio::select! {
        biased;
        _ = signal.cancelled() => Err(ApiError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Paging knobs for [`ApiClient::paginated_query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub page_size: u64,
    /// Stop after this many pages even if the backend reports more.
    pub max_pages: Option<u64>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: None,
        }
    }
}

impl PageOptions {
    pub fn from_config(cfg: &runtime::ApiConfig) -> Self {
        Self {
            page_size: cfg.page_size,
            max_pages: None,
        }
    }
}

/// Configured debounce delay.
pub fn debounce_from_config(cfg: &runtime::ApiConfig) -> Duration {
    Duration::from_millis(cfg.debounce_ms)
}

impl ApiClient {
    /// `(variables) -> result` function; `variables` become the request body.
    ///
    /// One call per invocation, no retry. Any body already set on `options` is dropped.
    pub fn mutation<Req, Res>(
        &self,
        route: Route<Req, Res>,
        options: CallOptions<Req>,
    ) -> impl Fn(Req) -> BoxFuture<'static, Result<Res, ApiError>> + Clone + Send + Sync + 'static
    where
        Req: Serialize + Send + Sync + 'static,
        Res: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        let route = Arc::new(route);
        let base: Arc<CallOptions<()>> = Arc::new(options.rebind());

        move |variables: Req| {
            let client = client.clone();
            let route = route.clone();
            let options = base.rebind::<Req>().body(variables);
            async move { client.execute(&route, options).await }.boxed()
        }
    }

    /// `(ctx) -> result` function that threads the scheduler's signal into the call.
    pub fn query<Req, Res>(
        &self,
        route: Route<Req, Res>,
        options: CallOptions<Req>,
    ) -> impl Fn(QueryContext) -> BoxFuture<'static, Result<Res, ApiError>> + Clone + Send + Sync + 'static
    where
        Req: Serialize + Clone + Send + Sync + 'static,
        Res: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        let route = Arc::new(route);
        let options = Arc::new(options);

        move |ctx: QueryContext| {
            let client = client.clone();
            let route = route.clone();
            let mut options = (*options).clone();
            options.signal = Some(ctx.signal);
            async move { client.execute(&route, options).await }.boxed()
        }
    }

    /// Like [`ApiClient::query`], but waits `delay` first.
    ///
    /// If the scheduler cancels the signal during the wait, the call ends with
    /// `Err(Cancelled)` and never reaches the network. Superseding a pending call is the
    /// scheduler's job: it must cancel the previous signal before issuing a new one.
    pub fn debounced_query<Req, Res>(
        &self,
        route: Route<Req, Res>,
        options: CallOptions<Req>,
        delay: Duration,
    ) -> impl Fn(QueryContext) -> BoxFuture<'static, Result<Res, ApiError>> + Clone + Send + Sync + 'static
    where
        Req: Serialize + Clone + Send + Sync + 'static,
        Res: DeserializeOwned + Send + 'static,
    {
        let query = self.query(route, options);

        move |ctx: QueryContext| {
            let query = query.clone();
            async move {
                cancellable_sleep(delay, &ctx.signal).await?;
                query(ctx).await
            }
            .boxed()
        }
    }

    /// Fetch every page of a list endpoint, deduplicating results by id.
    ///
    /// Pages are requested with `limit`/`offset` query params until the backend
    /// reports no `next` page, returns an empty page, or `page.max_pages` is reached.
    /// A `page_size` of zero is treated as one.
    pub fn paginated_query<Req, T>(
        &self,
        route: Route<Req, PaginatedResponse<T>>,
        options: CallOptions<Req>,
        page: PageOptions,
    ) -> impl Fn(QueryContext) -> BoxFuture<'static, Result<PaginatedResponse<T>, ApiError>>
           + Clone
           + Send
           + Sync
           + 'static
    where
        Req: Serialize + Clone + Send + Sync + 'static,
        T: Identified + DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        let route = Arc::new(route);
        let options = Arc::new(options);
        let page_size = page.page_size.max(1);

        move |ctx: QueryContext| {
            let client = client.clone();
            let route = route.clone();
            let options = options.clone();
            async move {
                let mut acc = PaginatedResponse::default();
                let mut index = 0u64;
                loop {
                    let mut opts = (*options).clone();
                    opts.signal = Some(ctx.signal.clone());
                    opts.query_params.retain(|(k, _)| k != "limit" && k != "offset");
                    opts.query_params
                        .push(("limit".into(), Some(QueryValue::from(page_size))));
                    opts.query_params.push((
                        "offset".into(),
                        Some(QueryValue::from(index * page_size)),
                    ));

                    let res = client.execute(&route, opts).await?;
                    let done = res.next.is_none() || res.results.is_empty();
                    acc = acc.merge(res);
                    index += 1;

                    if done || page.max_pages.is_some_and(|max| index >= max) {
                        break;
                    }
                }
                Ok(acc)
            }
            .boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_completes_without_cancellation() {
        let token = CancellationToken::new();
        assert!(cancellable_sleep(Duration::from_millis(5), &token).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_aborts_early_on_cancel() {
        let token = CancellationToken::new();
        let child = token.clone();
        let started = tokio::time::Instant::now();

        let sleeper = tokio::spawn(async move {
            cancellable_sleep(Duration::from_secs(60), &child).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let res = sleeper.await.unwrap();
        assert_eq!(res, Err(ApiError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn config_drives_paging_and_debounce() {
        let cfg = runtime::ApiConfig {
            debounce_ms: 250,
            page_size: 20,
            ..Default::default()
        };
        assert_eq!(PageOptions::from_config(&cfg).page_size, 20);
        assert_eq!(debounce_from_config(&cfg), Duration::from_millis(250));
        assert_eq!(
            debounce_from_config(&runtime::ApiConfig::default()),
            DEFAULT_DEBOUNCE
        );
    }

    #[tokio::test]
    async fn already_cancelled_signal_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            cancellable_sleep(Duration::from_secs(5), &token).await,
            Err(ApiError::Cancelled)
        );
    }
}
