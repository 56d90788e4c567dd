//! Failure taxonomy and the status/body classifier.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// `code` sent by the backend when the access token is expired or malformed.
pub const TOKEN_NOT_VALID: &str = "token_not_valid";

/// `detail` sent by the backend when no credentials were attached.
// TODO: switch to a dedicated error code once the backend exposes one for missing credentials.
pub const CREDENTIALS_NOT_PROVIDED: &str = "Authentication credentials were not provided.";

/// What went wrong, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// User-correctable input problem.
    Validation,
    /// Referenced resource is absent.
    NotFound,
    /// Authentication must be re-established.
    SessionExpired,
    /// No response was obtained.
    Network,
    Unknown,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::Network => "network",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a field-path validation error array (`[{type, loc, msg}, ...]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPathError {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub loc: Vec<Value>,
    pub msg: FieldPathMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldPathMessage {
    Text(String),
    Keyed(BTreeMap<String, String>),
}

impl FieldPathError {
    /// Dotted field path, e.g. `body.contact.phone`. Empty when `loc` is absent.
    pub fn field(&self) -> String {
        self.loc
            .iter()
            .map(|seg| match seg {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Human-readable messages carried by `msg`.
    pub fn messages(&self) -> Vec<String> {
        match &self.msg {
            FieldPathMessage::Text(s) => vec![s.clone()],
            FieldPathMessage::Keyed(map) => map.values().cloned().collect(),
        }
    }
}

/// Error payload shapes the backend produces.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    /// Array of `{type, loc, msg}` objects.
    FieldPath(Vec<FieldPathError>),
    /// Object keyed by field name, each value a message or list of messages.
    Structured(BTreeMap<String, Vec<String>>),
    /// `{detail: "..."}` (optionally with `code`).
    Detail(String),
    Other(Value),
    Empty,
}

impl ErrorBody {
    /// Decide which shape `body` has. Total: every JSON value maps to exactly one variant.
    pub fn discriminate(body: Option<&Value>) -> Self {
        let Some(body) = body else {
            return ErrorBody::Empty;
        };
        match body {
            Value::Null => ErrorBody::Empty,
            Value::Array(items) if !items.is_empty() => {
                let parsed: Result<Vec<FieldPathError>, _> = items
                    .iter()
                    .map(|v| serde_json::from_value::<FieldPathError>(v.clone()))
                    .collect();
                match parsed {
                    Ok(errs) => ErrorBody::FieldPath(errs),
                    Err(_) => ErrorBody::Other(body.clone()),
                }
            }
            Value::Object(map) if !map.is_empty() => {
                if let Some(Value::String(detail)) = map.get("detail") {
                    if map.keys().all(|k| k == "detail" || k == "code") {
                        return ErrorBody::Detail(detail.clone());
                    }
                }
                let mut fields = BTreeMap::new();
                for (key, value) in map {
                    let messages = match value {
                        Value::String(s) => vec![s.clone()],
                        Value::Array(list) => {
                            let strings: Option<Vec<String>> =
                                list.iter().map(|v| v.as_str().map(str::to_string)).collect();
                            match strings {
                                Some(s) => s,
                                None => return ErrorBody::Other(body.clone()),
                            }
                        }
                        _ => return ErrorBody::Other(body.clone()),
                    };
                    fields.insert(key.clone(), messages);
                }
                ErrorBody::Structured(fields)
            }
            other => ErrorBody::Other(other.clone()),
        }
    }

    pub fn is_validation_shape(&self) -> bool {
        matches!(self, ErrorBody::FieldPath(_) | ErrorBody::Structured(_))
    }
}

/// Whether the payload carries one of the backend's expired/missing-auth markers.
pub fn is_session_expired(body: Option<&Value>) -> bool {
    let Some(Value::Object(map)) = body else {
        return false;
    };
    map.get("code").and_then(Value::as_str) == Some(TOKEN_NOT_VALID)
        || map.get("detail").and_then(Value::as_str) == Some(CREDENTIALS_NOT_PROVIDED)
}

/// Classify a failed exchange. `status == None` means no response was received.
///
/// Precedence: network, not-found, session-expired, validation (400/406 with a
/// field-error shape), unknown.
pub fn classify(status: Option<StatusCode>, body: Option<&Value>) -> ErrorKind {
    let Some(status) = status else {
        return ErrorKind::Network;
    };
    if status == StatusCode::NOT_FOUND {
        return ErrorKind::NotFound;
    }
    if (status.is_client_error() || status.is_server_error()) && is_session_expired(body) {
        return ErrorKind::SessionExpired;
    }
    if (status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_ACCEPTABLE)
        && ErrorBody::discriminate(body).is_validation_shape()
    {
        return ErrorKind::Validation;
    }
    ErrorKind::Unknown
}

/// A failure tagged with its [`ErrorKind`], carrying the parsed response body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} error ({})", status_label(.status))]
pub struct ClassifiedError {
    /// HTTP status, or `None` when no response was received.
    pub status: Option<StatusCode>,
    pub kind: ErrorKind,
    pub cause: Option<Value>,
    pub silent: bool,
}

fn status_label(status: &Option<StatusCode>) -> String {
    match status {
        Some(s) => format!("HTTP {}", s.as_u16()),
        None => "no response".to_string(),
    }
}

impl ClassifiedError {
    pub fn from_response(status: StatusCode, cause: Option<Value>, silent: bool) -> Self {
        Self {
            kind: classify(Some(status), cause.as_ref()),
            status: Some(status),
            cause,
            silent,
        }
    }

    pub fn network(silent: bool) -> Self {
        Self {
            status: None,
            kind: ErrorKind::Network,
            cause: None,
            silent,
        }
    }

    pub(crate) fn into_unknown(mut self) -> Self {
        self.kind = ErrorKind::Unknown;
        self
    }

    /// Shape of the carried payload.
    pub fn body(&self) -> ErrorBody {
        ErrorBody::discriminate(self.cause.as_ref())
    }

    /// Backend `detail` message, if any.
    pub fn detail(&self) -> Option<&str> {
        self.cause.as_ref()?.get("detail")?.as_str()
    }
}

/// Misuse of a route contract. These indicate a bug at the call site.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    #[error("missing path param `{name}` for {path}")]
    MissingPathParam { path: String, name: String },

    #[error("path param `{name}` has no placeholder in {path}")]
    UnexpectedPathParam { path: String, name: String },

    #[error("failed to serialize request body: {0}")]
    Body(String),

    #[error("invalid request: {0}")]
    Request(String),
}

/// Everything [`crate::ApiClient::execute`] can return instead of a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Classified(#[from] ClassifiedError),

    /// The caller's signal fired. Not a failure; callers should just drop the result.
    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            ApiError::Classified(e) => Some(e),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.classified().map(|e| e.kind)
    }
}
