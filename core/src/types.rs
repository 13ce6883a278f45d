//! Typed shapes for the responses the client itself interprets.
//!
//! Application objects (users, pages, posts) are left to callers; they
//! declare their own structs with `graph_object!`. The types here back the
//! client's built-in operations.

use time::OffsetDateTime;

use crate::error::{GraphError, GraphResult};

/// An OAuth access token as returned by `oauth/access_token`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: Option<String>,
    /// Lifetime in seconds; `None` for tokens that do not expire.
    pub expires_in: Option<u64>,
}

crate::graph_object! {
    AccessToken {
        "access_token" => access_token,
        "token_type" => token_type,
        "expires_in" => expires_in,
        "expires" => expires_in,
    }
}

impl AccessToken {
    /// Parse the legacy `access_token=...&expires=...` text form.
    pub fn from_query_string(text: &str) -> GraphResult<Self> {
        let mut token = Self::default();
        for pair in text.trim().split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = percent_encoding::percent_decode_str(&value.replace('+', " "))
                .decode_utf8_lossy()
                .into_owned();
            match key {
                "access_token" => token.access_token = value,
                "token_type" => token.token_type = Some(value),
                "expires" | "expires_in" => {
                    token.expires_in = Some(value.parse().map_err(|e| {
                        GraphError::mapping(format!("bad token lifetime {value:?}: {e}"))
                    })?)
                }
                _ => {}
            }
        }
        if token.access_token.is_empty() {
            return Err(GraphError::mapping(format!(
                "no access_token in response '{text}'"
            )));
        }
        Ok(token)
    }
}

/// Error details `debug_token` reports for an invalid token.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DebugTokenError {
    pub code: Option<i64>,
    pub message: Option<String>,
    pub subcode: Option<i64>,
}

crate::graph_object! {
    DebugTokenError {
        "code" => code,
        "message" => message,
        "subcode" => subcode,
    }
}

/// The `data` member of a `debug_token` response.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DebugTokenInfo {
    pub app_id: Option<String>,
    pub application: Option<String>,
    pub token_type: Option<String>,
    pub user_id: Option<String>,
    pub is_valid: bool,
    pub scopes: Vec<String>,
    pub granular_scopes: Vec<GranularScope>,
    pub issued_at: Option<OffsetDateTime>,
    pub expires_at: Option<OffsetDateTime>,
    pub data_access_expires_at: Option<OffsetDateTime>,
    pub error: Option<DebugTokenError>,
}

crate::graph_object! {
    DebugTokenInfo {
        "app_id" => app_id,
        "application" => application,
        "type" => token_type,
        "user_id" => user_id,
        "is_valid" => is_valid,
        "scopes" => scopes,
        "granular_scopes" => granular_scopes,
        "issued_at" => issued_at,
        "expires_at" => expires_at,
        "data_access_expires_at" => data_access_expires_at,
        "error" => error,
    }
    on_complete: [DebugTokenInfo::clear_never_expires]
}

impl DebugTokenInfo {
    /// An `expires_at` of 0 means the token never expires.
    fn clear_never_expires(&mut self, _mapper: &crate::mapping::Mapper) -> GraphResult<()> {
        if self.expires_at == Some(OffsetDateTime::UNIX_EPOCH) {
            self.expires_at = None;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GranularScope {
    pub scope: String,
    pub target_ids: Vec<String>,
}

crate::graph_object! {
    GranularScope {
        "scope" => scope,
        "target_ids" => target_ids,
    }
}

/// What the server answers to a publish: the new object's id, and for
/// posts to a page or profile also the `post_id`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub id: Option<String>,
    pub post_id: Option<String>,
    pub success: Option<bool>,
}

crate::graph_object! {
    PublishResult {
        "id" => id,
        "post_id" => post_id,
        "success" => success,
    }
}

/// The smallest useful Graph object: an id and a display name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NamedObject {
    pub id: String,
    pub name: Option<String>,
}

crate::graph_object! {
    NamedObject {
        "id" => id,
        "name" => name,
    }
}
