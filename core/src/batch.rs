//! Batch sub-requests and their responses.
//!
//! A batch bundles several calls into one POST. Each `BatchRequest` becomes
//! one element of the `batch` parameter; the server answers with an array of
//! `BatchResponse` in submission order, using `null` for requests it did not
//! run or whose response was omitted.

use crate::error::GraphResult;
use crate::extract::{DefaultErrorExtractor, ErrorExtractor};
use crate::http::{DebugHeaderInfo, HttpMethod};
use crate::mapping::{FieldValue, Mapper};
use crate::params::{to_parameter_string, Parameter};

/// One header of a batch sub-request or sub-response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchHeader {
    pub name: String,
    pub value: String,
}

crate::graph_object! {
    BatchHeader {
        "name" => name,
        "value" => value,
    }
}

impl BatchHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single call inside a batch. Build with `BatchRequest::builder`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchRequest {
    method: String,
    relative_url: String,
    body: Option<String>,
    headers: Vec<BatchHeader>,
    name: Option<String>,
    omit_response_on_success: Option<bool>,
    depends_on: Option<String>,
    attached_files: Option<String>,
}

crate::graph_object! {
    BatchRequest {
        "method" => method,
        "relative_url" => relative_url,
        "body" => body,
        "headers" => headers,
        "name" => name,
        "omit_response_on_success" => omit_response_on_success,
        "depends_on" => depends_on,
        "attached_files" => attached_files,
    }
}

impl BatchRequest {
    pub fn builder(relative_url: impl Into<String>) -> BatchRequestBuilder {
        BatchRequestBuilder {
            method: HttpMethod::Get,
            relative_url: relative_url.into(),
            parameters: Vec::new(),
            headers: Vec::new(),
            name: None,
            omit_response_on_success: None,
            depends_on: None,
            attached_files: None,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn relative_url(&self) -> &str {
        &self.relative_url
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct BatchRequestBuilder {
    method: HttpMethod,
    relative_url: String,
    parameters: Vec<Parameter>,
    headers: Vec<BatchHeader>,
    name: Option<String>,
    omit_response_on_success: Option<bool>,
    depends_on: Option<String>,
    attached_files: Option<String>,
}

impl BatchRequestBuilder {
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Parameters go into the query string for GET and DELETE and into the
    /// body for POST.
    pub fn parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(BatchHeader::new(name, value));
        self
    }

    /// Name other requests can reference through JSONPath expressions.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn omit_response_on_success(mut self, omit: bool) -> Self {
        self.omit_response_on_success = Some(omit);
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on = Some(name.into());
        self
    }

    /// Comma-separated attachment field names this request consumes.
    pub fn attached_files(mut self, names: impl Into<String>) -> Self {
        self.attached_files = Some(names.into());
        self
    }

    pub fn build(self) -> BatchRequest {
        let encoded = to_parameter_string(&self.parameters);
        let (relative_url, body) = match self.method {
            _ if encoded.is_empty() => (self.relative_url, None),
            HttpMethod::Post => (self.relative_url, Some(encoded)),
            HttpMethod::Get | HttpMethod::Delete => {
                let separator = if self.relative_url.contains('?') { '&' } else { '?' };
                (format!("{}{separator}{encoded}", self.relative_url), None)
            }
        };
        BatchRequest {
            method: self.method.as_str().to_string(),
            relative_url,
            body,
            headers: self.headers,
            name: self.name,
            omit_response_on_success: self.omit_response_on_success,
            depends_on: self.depends_on,
            attached_files: self.attached_files,
        }
    }
}

/// The server's answer to one batch sub-request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchResponse {
    code: u16,
    headers: Vec<BatchHeader>,
    body: Option<String>,
}

crate::graph_object! {
    BatchResponse {
        "code" => code,
        "headers" => headers,
        "body" => body,
    }
}

impl BatchResponse {
    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn headers(&self) -> &[BatchHeader] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Raw body text, itself a JSON document.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Raises the sub-response's error envelope, if it carries one.
    pub fn check(&self) -> GraphResult<()> {
        let debug = DebugHeaderInfo::from_headers(
            self.headers.iter().map(|h| (h.name.as_str(), h.value.as_str())),
        );
        DefaultErrorExtractor.classify(self.body().unwrap_or(""), self.code, &debug)
    }

    /// Map the body to `T`. An error envelope in the body is raised first.
    pub fn body_as<T: FieldValue>(&self, mapper: &Mapper) -> GraphResult<Option<T>> {
        self.check()?;
        match self.body.as_deref() {
            Some(body) if !body.trim().is_empty() => mapper.to_object(body),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::error::GraphError;

    #[test]
    fn get_parameters_land_in_the_relative_url() {
        let request = BatchRequest::builder("me")
            .parameters([Parameter::text("fields", "id,name")])
            .name("me")
            .build();
        assert_eq!(request.relative_url(), "me?fields=id%2Cname");
        assert!(request.body().is_none());
        let json = Mapper::new().to_json_value(&request, true).unwrap();
        assert_eq!(
            json,
            json!({"method":"GET","relative_url":"me?fields=id%2Cname","name":"me"})
        );
    }

    #[test]
    fn post_parameters_land_in_the_body() {
        let request = BatchRequest::builder("me/feed")
            .method(HttpMethod::Post)
            .parameters([Parameter::text("message", "hi there")])
            .header("X-Trace", "1")
            .depends_on("first")
            .omit_response_on_success(false)
            .build();
        assert_eq!(request.relative_url(), "me/feed");
        assert_eq!(request.body(), Some("message=hi+there"));
        let json = Mapper::new().to_json_value(&request, true).unwrap();
        assert_eq!(json["headers"][0]["name"], "X-Trace");
        assert_eq!(json["depends_on"], "first");
        assert_eq!(json["omit_response_on_success"], false);
    }

    #[test]
    fn existing_query_string_is_extended() {
        let request = BatchRequest::builder("search?q=x")
            .method(HttpMethod::Delete)
            .parameters([Parameter::text("type", "page")])
            .build();
        assert_eq!(request.relative_url(), "search?q=x&type=page");
        assert_eq!(request.method(), "DELETE");
    }

    #[test]
    fn responses_keep_positions_with_nulls() {
        let json = r#"[{"code":200,"headers":[{"name":"Content-Type","value":"text/javascript"}],"body":"{\"id\":\"1\"}"},null]"#;
        let responses: Vec<Option<BatchResponse>> = Mapper::new().to_list(json).unwrap();
        assert_eq!(responses.len(), 2);
        let first = responses[0].as_ref().unwrap();
        assert_eq!(first.code(), 200);
        assert_eq!(first.header("content-type"), Some("text/javascript"));
        let body: Value = first.body_as(&Mapper::new()).unwrap().unwrap();
        assert_eq!(body["id"], "1");
        assert!(responses[1].is_none());
    }

    #[test]
    fn error_bodies_are_raised() {
        let response: BatchResponse = Mapper::new()
            .to_object(r#"{"code":400,"body":"{\"error\":{\"message\":\"bad\",\"code\":100}}"}"#)
            .unwrap()
            .unwrap();
        let err = response.body_as::<Value>(&Mapper::new()).unwrap_err();
        assert!(matches!(err, GraphError::Application(ref e) if e.http_status == 400));
    }
}
