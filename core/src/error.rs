//! Error types for the Graph API client.
//!
//! # Design
//! Failures fall into five buckets that callers handle differently: caller
//! mistakes (`Usage`), JSON that cannot be bound (`Mapping`), transport or
//! status-level failures (`Network`), server-reported semantic failures
//! (`Application`), and paging past the last page (`IterationExhausted`).
//! `Application` wins over `Network` whenever the body carries an error
//! envelope, so a 400 with a proper envelope is never reported as a bare
//! status.

use serde_json::Value;
use thiserror::Error;

use crate::http::DebugHeaderInfo;

/// Result type for Graph client operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors returned by the mapping engine and the request pipeline.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A caller precondition was violated. No network call was attempted.
    #[error("usage error: {0}")]
    Usage(String),

    /// JSON could not be mapped to or from the requested type.
    #[error("JSON mapping failed: {0}")]
    Mapping(String),

    /// The transport failed, or the server answered with a status that is
    /// not legible or is fatal without an error body.
    #[error("network error{}: {message}", status_suffix(.status))]
    Network { status: Option<u16>, message: String },

    /// The server understood the request but reported a failure.
    #[error(transparent)]
    Application(Box<ApplicationError>),

    /// `next_page` was called after the last page.
    #[error("no more pages to fetch")]
    IterationExhausted,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl GraphError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub(crate) fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    pub(crate) fn network_status(status: u16) -> Self {
        Self::Network {
            status: Some(status),
            message: format!("Graph API returned HTTP status {status}"),
        }
    }

    /// HTTP status associated with this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            Self::Application(e) => Some(e.http_status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application(_))
    }

    /// The application error payload, if this is one.
    #[must_use]
    pub fn as_application(&self) -> Option<&ApplicationError> {
        match self {
            Self::Application(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApplicationError> for GraphError {
    fn from(e: ApplicationError) -> Self {
        Self::Application(Box::new(e))
    }
}

/// Broad category of a server-reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationErrorKind {
    /// Invalid, expired, or missing access token.
    OAuth,
    /// The request itself was malformed or referenced an unknown field.
    QueryParse,
    /// Application, user, or page level throttling.
    RateLimit,
    /// The token lacks a permission the call requires.
    Permission,
    /// The referenced object does not exist or cannot be loaded.
    ResourceNotFound,
    Other,
}

/// A server error envelope decoded from a response body.
#[derive(Debug, Clone, Error)]
#[error("{kind:?} error (code {code:?}, subcode {subcode:?}, HTTP {http_status}): {message}")]
pub struct ApplicationError {
    pub kind: ApplicationErrorKind,
    pub message: String,
    pub error_type: Option<String>,
    pub code: Option<i64>,
    pub subcode: Option<i64>,
    pub http_status: u16,
    pub user_title: Option<String>,
    pub user_message: Option<String>,
    pub is_transient: bool,
    pub fbtrace_id: Option<String>,
    /// The `error` object (or whole body for legacy shapes) as received.
    pub raw: Value,
    pub debug: DebugHeaderInfo,
}

impl ApplicationError {
    /// Suggests whether retrying the same call later could succeed. The
    /// pipeline never retries on its own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_transient || self.kind == ApplicationErrorKind::RateLimit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_error() -> ApplicationError {
        ApplicationError {
            kind: ApplicationErrorKind::RateLimit,
            message: "Application request limit reached".into(),
            error_type: Some("OAuthException".into()),
            code: Some(4),
            subcode: None,
            http_status: 400,
            user_title: None,
            user_message: None,
            is_transient: false,
            fbtrace_id: Some("AbC".into()),
            raw: Value::Null,
            debug: DebugHeaderInfo::default(),
        }
    }

    #[test]
    fn network_error_display_includes_status() {
        let err = GraphError::network_status(499);
        assert_eq!(err.status(), Some(499));
        assert!(err.to_string().contains("HTTP 499"));
    }

    #[test]
    fn network_error_without_status() {
        let err = GraphError::Network {
            status: None,
            message: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn application_error_carries_status_and_is_retryable() {
        let err: GraphError = app_error().into();
        assert!(err.is_application());
        assert_eq!(err.status(), Some(400));
        assert!(err.as_application().unwrap().is_retryable());
        assert!(err.to_string().contains("Application request limit reached"));
    }
}
