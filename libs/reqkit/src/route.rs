//! Static endpoint descriptors.
//!
//! A [`Route`] carries no runtime behavior: it names a URL template and an HTTP method,
//! and binds the request/response types at compile time so every call site is checked
//! against the endpoint's contract.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

/// HTTP methods a backend route may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
        }
    }
}

/// Contract for one backend endpoint.
///
/// `Req` is the JSON body type (use `()` for body-less routes) and `Res` the decoded
/// response type. Both only exist at the type level.
pub struct Route<Req, Res> {
    path: Cow<'static, str>,
    method: Method,
    no_auth: bool,
    _contract: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> Route<Req, Res> {
    /// A `GET` route for the given template, e.g. `/api/v1/items/{id}/`.
    pub const fn new(path: &'static str) -> Self {
        Self {
            path: Cow::Borrowed(path),
            method: Method::Get,
            no_auth: false,
            _contract: PhantomData,
        }
    }

    pub const fn get(path: &'static str) -> Self {
        Self::new(path)
    }

    pub const fn post(path: &'static str) -> Self {
        Self::new(path).with_method(Method::Post)
    }

    pub const fn put(path: &'static str) -> Self {
        Self::new(path).with_method(Method::Put)
    }

    pub const fn patch(path: &'static str) -> Self {
        Self::new(path).with_method(Method::Patch)
    }

    pub const fn delete(path: &'static str) -> Self {
        Self::new(path).with_method(Method::Delete)
    }

    /// Route built from a template only known at runtime (CLI, plugin manifests).
    pub fn dynamic(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: Cow::Owned(path.into()),
            method,
            no_auth: false,
            _contract: PhantomData,
        }
    }

    pub const fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Mark the route as public: no Authorization header is attached.
    pub const fn without_auth(mut self) -> Self {
        self.no_auth = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn no_auth(&self) -> bool {
        self.no_auth
    }

    /// Placeholder names in the template, in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        placeholders(&self.path)
    }
}

impl<Req, Res> Clone for Route<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            method: self.method,
            no_auth: self.no_auth,
            _contract: PhantomData,
        }
    }
}

impl<Req, Res> fmt::Debug for Route<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("no_auth", &self.no_auth)
            .finish()
    }
}

/// Extract `{name}` placeholders from a template. Unterminated braces are kept as text.
pub(crate) fn placeholders(template: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                out.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    out
}
