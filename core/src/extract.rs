//! Recognition of server error envelopes in response bodies.
//!
//! # Design
//! The pipeline asks an `ErrorExtractor` about every legible response before
//! it looks at the status code. A body that encodes an error becomes an
//! `ApplicationError` regardless of status; anything else falls through to
//! status-based classification. The extractor is pluggable so callers can
//! recognise additional shapes without touching the pipeline.

use serde_json::{Map, Value};

use crate::error::{ApplicationError, ApplicationErrorKind, GraphError, GraphResult};
use crate::http::DebugHeaderInfo;

/// Raises an `ApplicationError` when a body carries a server error.
pub trait ErrorExtractor: Send + Sync {
    fn classify(&self, body: &str, status: u16, debug: &DebugHeaderInfo) -> GraphResult<()>;
}

/// Recognises the Graph error envelope, the OAuth-2 error shape, and the
/// legacy REST `error_code`/`error_msg` shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorExtractor;

impl ErrorExtractor for DefaultErrorExtractor {
    fn classify(&self, body: &str, status: u16, debug: &DebugHeaderInfo) -> GraphResult<()> {
        let trimmed = body.trim();
        // Arrays (batch responses), `true`, and empty bodies never carry an envelope.
        if !trimmed.starts_with('{') {
            return Ok(());
        }
        let Ok(Value::Object(root)) = serde_json::from_str::<Value>(trimmed) else {
            return Ok(());
        };
        match extract(&root, status, debug) {
            Some(error) => Err(GraphError::from(error)),
            None => Ok(()),
        }
    }
}

fn extract(root: &Map<String, Value>, status: u16, debug: &DebugHeaderInfo) -> Option<ApplicationError> {
    match root.get("error") {
        Some(Value::Object(error)) => Some(from_graph_envelope(error, status, debug)),
        Some(Value::String(kind)) => Some(from_oauth_shape(root, kind, status, debug)),
        _ if root.contains_key("error_code") => Some(from_legacy_shape(root, status, debug)),
        _ => None,
    }
}

fn from_graph_envelope(
    error: &Map<String, Value>,
    status: u16,
    debug: &DebugHeaderInfo,
) -> ApplicationError {
    let error_type = string_member(error, "type");
    let code = int_member(error, "code");
    let subcode = int_member(error, "error_subcode");
    ApplicationError {
        kind: classify_kind(error_type.as_deref(), code, subcode),
        message: string_member(error, "message").unwrap_or_default(),
        error_type,
        code,
        subcode,
        http_status: status,
        user_title: string_member(error, "error_user_title"),
        user_message: string_member(error, "error_user_msg"),
        is_transient: error
            .get("is_transient")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        fbtrace_id: string_member(error, "fbtrace_id").or_else(|| debug.trace_id.clone()),
        raw: Value::Object(error.clone()),
        debug: debug.clone(),
    }
}

fn from_oauth_shape(
    root: &Map<String, Value>,
    kind: &str,
    status: u16,
    debug: &DebugHeaderInfo,
) -> ApplicationError {
    ApplicationError {
        kind: ApplicationErrorKind::OAuth,
        message: string_member(root, "error_description").unwrap_or_else(|| kind.to_string()),
        error_type: Some(kind.to_string()),
        code: None,
        subcode: None,
        http_status: status,
        user_title: None,
        user_message: None,
        is_transient: false,
        fbtrace_id: debug.trace_id.clone(),
        raw: Value::Object(root.clone()),
        debug: debug.clone(),
    }
}

fn from_legacy_shape(root: &Map<String, Value>, status: u16, debug: &DebugHeaderInfo) -> ApplicationError {
    let code = int_member(root, "error_code");
    ApplicationError {
        kind: classify_kind(None, code, None),
        message: string_member(root, "error_msg").unwrap_or_default(),
        error_type: None,
        code,
        subcode: None,
        http_status: status,
        user_title: None,
        user_message: None,
        is_transient: false,
        fbtrace_id: debug.trace_id.clone(),
        raw: Value::Object(root.clone()),
        debug: debug.clone(),
    }
}

fn classify_kind(error_type: Option<&str>, code: Option<i64>, subcode: Option<i64>) -> ApplicationErrorKind {
    match (code, subcode) {
        (Some(4 | 17 | 32 | 613), _) => return ApplicationErrorKind::RateLimit,
        (Some(10 | 200..=299), _) => return ApplicationErrorKind::Permission,
        (Some(100), Some(33)) => return ApplicationErrorKind::ResourceNotFound,
        (Some(102 | 190), _) => return ApplicationErrorKind::OAuth,
        (Some(601), _) => return ApplicationErrorKind::QueryParse,
        _ => {}
    }
    match error_type {
        Some("OAuthException") => ApplicationErrorKind::OAuth,
        Some("QueryParseException" | "GraphMethodException") => ApplicationErrorKind::QueryParse,
        _ => ApplicationErrorKind::Other,
    }
}

fn string_member(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn int_member(map: &Map<String, Value>, key: &str) -> Option<i64> {
    match map.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
