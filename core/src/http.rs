//! HTTP exchange types and the pluggable transport contract.
//!
//! # Design
//! Requests and responses are plain data. `GraphClient` assembles an
//! `HttpRequest`, hands it to a `Transport`, and classifies the returned
//! `HttpResponse`; sockets and TLS live entirely behind the trait. Response
//! headers travel with each response instead of being kept as "latest" state
//! on the transport, so one transport can serve concurrent calls and the
//! debug metadata always belongs to the exchange that produced it.

use std::io::{self, Read};

/// HTTP verb for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A file sent alongside a POST as a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryAttachment {
    /// Form field name the server reads the file from.
    pub field_name: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl BinaryAttachment {
    pub fn new(
        field_name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Drains `reader` into a new attachment. The reader is dropped (and thus
    /// closed) before this returns.
    pub fn from_reader<R: Read>(
        field_name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        mut reader: R,
    ) -> io::Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::new(field_name, filename, content_type, data))
    }

    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute and, for GET and DELETE, already carries the encoded
/// query string. For POST the encoded parameters travel in `body` unless
/// attachments are present, in which case they are in the query string and
/// the attachments form the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Token to send as `Authorization: OAuth <token>` instead of a parameter.
    pub header_token: Option<String>,
    pub body: Option<String>,
    pub attachments: Vec<BinaryAttachment>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// First header value named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn debug_info(&self) -> DebugHeaderInfo {
        DebugHeaderInfo::from_response(self)
    }
}

/// Diagnostic metadata the Graph API reports in response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugHeaderInfo {
    pub trace_id: Option<String>,
    pub revision: Option<String>,
    pub debug: Option<String>,
    pub api_version: Option<String>,
    pub app_usage: Option<String>,
    pub page_usage: Option<String>,
    pub ad_account_usage: Option<String>,
    pub business_use_case_usage: Option<String>,
}

impl DebugHeaderInfo {
    pub fn from_response(response: &HttpResponse) -> Self {
        Self::from_headers(response.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Collect the known headers from `(name, value)` pairs; names match
    /// case-insensitively.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let headers: Vec<(&str, &str)> = headers.into_iter().collect();
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| (*v).to_string())
        };
        Self {
            trace_id: get("x-fb-trace-id"),
            revision: get("x-fb-rev"),
            debug: get("x-fb-debug"),
            api_version: get("facebook-api-version"),
            app_usage: get("x-app-usage"),
            page_usage: get("x-page-usage"),
            ad_account_usage: get("x-ad-account-usage"),
            business_use_case_usage: get("x-business-use-case-usage"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Executes HTTP exchanges on behalf of `GraphClient`.
///
/// Implementations return every status as data; only failures to complete
/// the exchange (connect, TLS, read timeout) are reported as `Err`.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, header_token: Option<&str>) -> io::Result<HttpResponse>;

    fn post(
        &self,
        url: &str,
        header_token: Option<&str>,
        params: &str,
        attachments: &[BinaryAttachment],
    ) -> io::Result<HttpResponse>;

    fn delete(&self, url: &str, header_token: Option<&str>) -> io::Result<HttpResponse>;

    /// Dispatches `request` to the matching verb.
    fn execute(&self, request: &HttpRequest) -> io::Result<HttpResponse> {
        let token = request.header_token.as_deref();
        match request.method {
            HttpMethod::Get => self.get(&request.url, token),
            HttpMethod::Delete => self.delete(&request.url, token),
            HttpMethod::Post => self.post(
                &request.url,
                token,
                request.body.as_deref().unwrap_or(""),
                &request.attachments,
            ),
        }
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn get(&self, url: &str, header_token: Option<&str>) -> io::Result<HttpResponse> {
        (**self).get(url, header_token)
    }

    fn post(
        &self,
        url: &str,
        header_token: Option<&str>,
        params: &str,
        attachments: &[BinaryAttachment],
    ) -> io::Result<HttpResponse> {
        (**self).post(url, header_token, params, attachments)
    }

    fn delete(&self, url: &str, header_token: Option<&str>) -> io::Result<HttpResponse> {
        (**self).delete(url, header_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("X-FB-Trace-ID".to_string(), "trace123".to_string())],
            body: String::new(),
        };
        assert_eq!(response.header("x-fb-trace-id"), Some("trace123"));
        assert_eq!(response.header("x-fb-rev"), None);
    }

    #[test]
    fn debug_info_collects_known_headers() {
        let response = HttpResponse {
            status: 200,
            headers: vec![
                ("x-fb-trace-id".to_string(), "T".to_string()),
                ("x-fb-rev".to_string(), "1001".to_string()),
                ("x-app-usage".to_string(), r#"{"call_count":5}"#.to_string()),
                ("content-type".to_string(), "application/json".to_string()),
            ],
            body: String::new(),
        };
        let info = response.debug_info();
        assert_eq!(info.trace_id.as_deref(), Some("T"));
        assert_eq!(info.revision.as_deref(), Some("1001"));
        assert_eq!(info.app_usage.as_deref(), Some(r#"{"call_count":5}"#));
        assert!(info.page_usage.is_none());
        assert!(!info.is_empty());
    }

    #[test]
    fn empty_response_has_empty_debug_info() {
        assert!(HttpResponse::new(200, "{}").debug_info().is_empty());
    }

    #[test]
    fn attachment_from_reader_reads_everything() {
        let data: &[u8] = b"GIF89a";
        let att = BinaryAttachment::from_reader("source", "a.gif", "image/gif", data).unwrap();
        assert_eq!(att.data, b"GIF89a");
        assert!(!att.is_video());
        assert!(BinaryAttachment::new("source", "a.mp4", "video/mp4", vec![]).is_video());
    }
}
