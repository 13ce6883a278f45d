//! Client configuration and endpoint resolution.
//!
//! # Design
//! `GraphConfig` is plain serde data, set once and handed to
//! `GraphClient::new`. Nothing on the client mutates it afterwards, so a
//! single client can be shared across threads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a `GraphClient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Access token appended to every call (or sent as a header).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// App secret used to sign `appsecret_proof`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,

    /// Version path segment such as `v21.0`; `None` calls the unversioned API.
    #[serde(default = "default_api_version")]
    pub api_version: Option<String>,

    #[serde(default = "default_graph_url")]
    pub graph_url: String,

    #[serde(default = "default_graph_video_url")]
    pub graph_video_url: String,

    /// Send the token as `Authorization: OAuth <token>` instead of a parameter.
    #[serde(default)]
    pub header_auth: bool,

    /// Issue deletes as POST with `method=delete` for environments that
    /// block the DELETE verb.
    #[serde(default)]
    pub delete_via_post: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_version() -> Option<String> {
    Some("v21.0".into())
}

fn default_graph_url() -> String {
    "https://graph.facebook.com".into()
}

fn default_graph_video_url() -> String {
    "https://graph-video.facebook.com".into()
}

fn default_timeout_secs() -> u64 {
    180
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            app_secret: None,
            api_version: default_api_version(),
            graph_url: default_graph_url(),
            graph_video_url: default_graph_video_url(),
            header_auth: false,
            delete_via_post: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GraphConfig {
    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Build a config from `GRAPH_ACCESS_TOKEN`, `GRAPH_APP_SECRET`,
    /// `GRAPH_API_VERSION`, and `GRAPH_URL`. Unset variables keep defaults;
    /// an empty `GRAPH_API_VERSION` selects the unversioned API.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            access_token: lookup("GRAPH_ACCESS_TOKEN").filter(|v| !v.is_empty()),
            app_secret: lookup("GRAPH_APP_SECRET").filter(|v| !v.is_empty()),
            ..Self::default()
        };
        if let Some(version) = lookup("GRAPH_API_VERSION") {
            config.api_version = Some(version).filter(|v| !v.is_empty());
        }
        if let Some(url) = lookup("GRAPH_URL").filter(|v| !v.is_empty()) {
            config.graph_url = url;
        }
        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Resolves the base URLs API calls are made against.
pub trait UrlResolver: Send + Sync {
    /// Base for ordinary calls, including the version segment if any.
    fn graph_endpoint_url(&self) -> String;

    /// Base for video uploads.
    fn graph_video_endpoint_url(&self) -> String;
}

/// `UrlResolver` derived from a `GraphConfig`.
#[derive(Debug, Clone)]
pub struct DefaultUrlResolver {
    graph_url: String,
    graph_video_url: String,
    api_version: Option<String>,
}

impl DefaultUrlResolver {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            graph_url: config.graph_url.trim_end_matches('/').to_string(),
            graph_video_url: config.graph_video_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        }
    }

    fn with_version(&self, base: &str) -> String {
        match &self.api_version {
            Some(version) => format!("{base}/{version}"),
            None => base.to_string(),
        }
    }
}

impl UrlResolver for DefaultUrlResolver {
    fn graph_endpoint_url(&self) -> String {
        self.with_version(&self.graph_url)
    }

    fn graph_video_endpoint_url(&self) -> String {
        self.with_version(&self.graph_video_url)
    }
}
