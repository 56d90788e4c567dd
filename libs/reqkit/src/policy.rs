//! What the user sees when a call fails.
//!
//! [`ErrorPolicy`] consumes an [`ApiError`] and drives two UI collaborators: a
//! [`Notifier`] for toast-style messages and a [`Navigator`] for the session-expired
//! redirect. The error itself is left untouched so callers can still handle it locally.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ApiError, ClassifiedError, ErrorBody, ErrorKind};

pub const SESSION_EXPIRED_PATH: &str = "/session-expired";

/// Upper bound on messages shown for a single field.
pub const MAX_MESSAGES_PER_FIELD: usize = 5;

pub const GENERIC_MESSAGE: &str = "Something went wrong!";
pub const NOT_FOUND_MESSAGE: &str = "Not Found";
pub const NETWORK_MESSAGE: &str = "Network failure. Please check your internet connectivity.";

/// One user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Field the message refers to, for validation failures.
    pub field: Option<String>,
    pub message: String,
}

impl Notice {
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

pub trait Navigator: Send + Sync {
    /// Current location, including query string, used as the post-login return target.
    fn current_location(&self) -> String;

    fn redirect(&self, to: &str);
}

/// Result of [`ErrorPolicy::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// This many notices were shown.
    Notified(usize),
    Redirected,
    Suppressed,
}

pub struct ErrorPolicy {
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl ErrorPolicy {
    pub fn new(notifier: Arc<dyn Notifier>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            notifier,
            navigator,
        }
    }

    pub fn handle(&self, err: &ApiError) -> Outcome {
        match err {
            ApiError::Cancelled => Outcome::Suppressed,
            ApiError::Contract(e) => self.emit(vec![Notice::general(e.to_string())]),
            ApiError::Classified(e) => self.handle_classified(e),
        }
    }

    pub fn handle_classified(&self, err: &ClassifiedError) -> Outcome {
        match err.kind {
            ErrorKind::Network => self.emit(vec![Notice::general(NETWORK_MESSAGE)]),
            ErrorKind::SessionExpired => self.redirect_to_login(),
            _ if err.silent => Outcome::Suppressed,
            ErrorKind::Validation => {
                let notices = validation_notices(&err.body());
                if notices.is_empty() {
                    self.emit(vec![Notice::general(GENERIC_MESSAGE)])
                } else {
                    self.emit(notices)
                }
            }
            ErrorKind::NotFound => {
                self.emit(vec![Notice::general(err.detail().unwrap_or(NOT_FOUND_MESSAGE))])
            }
            ErrorKind::Unknown => {
                self.emit(vec![Notice::general(err.detail().unwrap_or(GENERIC_MESSAGE))])
            }
        }
    }

    fn emit(&self, notices: Vec<Notice>) -> Outcome {
        let n = notices.len();
        for notice in notices {
            self.notifier.notify(notice);
        }
        Outcome::Notified(n)
    }

    fn redirect_to_login(&self) -> Outcome {
        let location = self.navigator.current_location();
        if location.starts_with(SESSION_EXPIRED_PATH) {
            tracing::debug!("already on the session-expired screen");
            return Outcome::Suppressed;
        }
        let target = format!(
            "{SESSION_EXPIRED_PATH}?redirect={}",
            urlencoding::encode(&location)
        );
        tracing::info!(from = %location, "session expired; redirecting");
        self.navigator.redirect(&target);
        Outcome::Redirected
    }
}

/// Per-field notices for a validation payload, deduplicated and capped per field.
pub fn validation_notices(body: &ErrorBody) -> Vec<Notice> {
    let mut by_field: BTreeMap<String, Vec<String>> = BTreeMap::new();
    match body {
        ErrorBody::FieldPath(errors) => {
            for e in errors {
                by_field.entry(e.field()).or_default().extend(e.messages());
            }
        }
        ErrorBody::Structured(fields) => {
            for (field, messages) in fields {
                by_field
                    .entry(field.clone())
                    .or_default()
                    .extend(messages.iter().cloned());
            }
        }
        ErrorBody::Detail(_) | ErrorBody::Other(_) | ErrorBody::Empty => {}
    }

    let mut out = Vec::new();
    for (field, messages) in by_field {
        let mut seen: Vec<String> = Vec::new();
        for m in messages {
            if seen.len() == MAX_MESSAGES_PER_FIELD {
                break;
            }
            if !seen.contains(&m) {
                seen.push(m);
            }
        }
        out.extend(seen.into_iter().map(|m| {
            if field.is_empty() {
                Notice::general(m)
            } else {
                Notice::for_field(field.clone(), m)
            }
        }));
    }
    out
}

/// Notifier for headless hosts: every notice becomes a `warn!` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match &notice.field {
            Some(field) => tracing::warn!(field = %field, "{}", notice.message),
            None => tracing::warn!("{}", notice.message),
        }
    }
}

/// Navigator for hosts with no screens to switch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_location(&self) -> String {
        "/".to_string()
    }

    fn redirect(&self, to: &str) {
        tracing::info!(to, "redirect requested");
    }
}
