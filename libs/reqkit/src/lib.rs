//! # reqkit - typed request/response orchestration
//!
//! Every screen of the application reaches its backend through this crate.
//!
//! ## Pieces
//!
//! - **Routes**: [`Route`] binds a URL template and a method to request/response types.
//! - **Executor**: [`ApiClient::execute`] turns a route + [`CallOptions`] into a typed value
//!   or a [`ClassifiedError`].
//! - **Adapters**: [`ApiClient::query`], [`ApiClient::mutation`] and
//!   [`ApiClient::debounced_query`] expose the executor the way an external cache/fetch
//!   scheduler calls it, threading its cancellation token through.
//! - **Policy**: [`ErrorPolicy`] decides what the user sees for a classified failure.
//! - **Broker**: [`Broker`] is a topic-keyed pub/sub registry of async handlers.
//!
//! ## Example
//!
//! ```rust,ignore
//! use reqkit::{ApiClient, CallOptions, Route};
//!
//! const GET_ITEM: Route<(), Item> = Route::get("/api/v1/items/{id}/");
//!
//! let item = client
//!     .execute(&GET_ITEM, CallOptions::new().path_param("id", 42))
//!     .await?;
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod options;
pub mod pagination;
pub mod policy;
pub mod pubsub;
pub mod query;
pub mod route;
pub mod upload;

pub use client::{ApiClient, ApiClientBuilder};
pub use error::{classify, ApiError, ClassifiedError, ContractError, ErrorBody, ErrorKind};
pub use http::client::TracedClient;
pub use http::headers::{build_headers, StaticToken, TokenProvider};
pub use http::url::build_url;
pub use options::{CallOptions, ParamValue, QueryValue};
pub use pagination::{merge_pages, Identified, PaginatedResponse};
pub use policy::{ErrorPolicy, LogNotifier, Navigator, NoopNavigator, Notice, Notifier, Outcome};
pub use pubsub::{Broker, Delivery, Handler, Subscription};
pub use query::{
    cancellable_sleep, debounce_from_config, PageOptions, QueryContext, DEFAULT_DEBOUNCE,
};
pub use route::{Method, Route};
pub use upload::{UploadRequest, UploadResponse, Uploader, UPLOAD_CHUNK_SIZE};

pub use tokio_util::sync::CancellationToken;
