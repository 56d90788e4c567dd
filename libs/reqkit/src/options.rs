use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Value substituted into a `{name}` path placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::UInt(n) => write!(f, "{n}"),
            ParamValue::Float(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        ParamValue::Str(s.clone())
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Float(n)
    }
}

// Every listed type converts losslessly into the variant's payload type.
macro_rules! int_param {
    ($variant:ident as $wide:ty: $($t:ty),*) => {
        $(
            impl From<$t> for ParamValue {
                fn from(n: $t) -> Self {
                    ParamValue::$variant(n as $wide)
                }
            }
            impl From<$t> for QueryValue {
                fn from(n: $t) -> Self {
                    QueryValue::$variant(n as $wide)
                }
            }
        )*
    };
}

/// Scalar query-string value. `null`/`undefined` are modelled as `Option::None`.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

int_param!(Int as i64: i32, i64);
int_param!(UInt as u64: u32, u64, usize);

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Str(s) => f.write_str(s),
            QueryValue::Int(n) => write!(f, "{n}"),
            QueryValue::UInt(n) => write!(f, "{n}"),
            QueryValue::Float(n) => write!(f, "{n}"),
            QueryValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Str(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Str(s)
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue::Bool(b)
    }
}

impl From<f64> for QueryValue {
    fn from(n: f64) -> Self {
        QueryValue::Float(n)
    }
}

pub type PathParams = BTreeMap<String, ParamValue>;

/// Query parameters in insertion order; `None` entries are dropped when encoding.
pub type QueryParams = Vec<(String, Option<QueryValue>)>;

/// Per-call options for [`crate::ApiClient::execute`].
#[derive(Debug)]
pub struct CallOptions<B = ()> {
    pub path_params: PathParams,
    pub query_params: QueryParams,
    pub body: Option<B>,
    pub headers: HeaderMap,
    pub signal: Option<CancellationToken>,
    pub silent: bool,
}

impl<B> Default for CallOptions<B> {
    fn default() -> Self {
        Self {
            path_params: PathParams::new(),
            query_params: QueryParams::new(),
            body: None,
            headers: HeaderMap::new(),
            signal: None,
            silent: false,
        }
    }
}

impl<B: Clone> Clone for CallOptions<B> {
    fn clone(&self) -> Self {
        Self {
            body: self.body.clone(),
            ..self.rebind()
        }
    }
}

impl<B> CallOptions<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query_params.push((name.into(), Some(value.into())));
        self
    }

    /// Add a query parameter that may be absent; `None` is dropped from the encoded URL.
    pub fn query_opt<V: Into<QueryValue>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.query_params.push((name.into(), value.map(Into::into)));
        self
    }

    pub fn body(mut self, body: B) -> Self {
        self.body = Some(body);
        self
    }

    /// Add an extra header. Invalid names/values are skipped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                self.headers.insert(n, v);
            }
            _ => tracing::warn!(header = name, "ignoring invalid header override"),
        }
        self
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Copy everything except the body, retyping the body slot.
    pub fn rebind<T>(&self) -> CallOptions<T> {
        CallOptions {
            path_params: self.path_params.clone(),
            query_params: self.query_params.clone(),
            body: None,
            headers: self.headers.clone(),
            signal: self.signal.clone(),
            silent: self.silent,
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}
