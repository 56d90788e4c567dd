//! Default header assembly and the auth token seam.

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};

pub const APPLICATION_JSON: &str = "application/json";

/// Source of the bearer token attached to authenticated routes.
///
/// Token acquisition and refresh live outside this crate; returning `None` simply
/// omits the header and lets the backend reject the call.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn access_token(&self) -> Option<String> {
        self()
    }
}

/// Fixed token (or none), mostly for CLIs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Build request headers: JSON defaults, then `overrides`, then Authorization.
///
/// Overrides replace defaults key by key. The computed Authorization header always wins
/// unless `no_auth` is set, in which case a caller-supplied one is passed through.
pub fn build_headers(no_auth: bool, token: Option<&str>, overrides: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

    for (name, value) in overrides {
        headers.insert(name.clone(), value.clone());
    }

    if no_auth {
        return headers;
    }

    if let Some(token) = token {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut v) => {
                v.set_sensitive(true);
                headers.insert(AUTHORIZATION, v);
            }
            Err(_) => tracing::warn!("access token is not a valid header value; sending without it"),
        }
    }
    headers
}
