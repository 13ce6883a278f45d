//! The Graph API request/response pipeline.
//!
//! # Design
//! Every call is split in two pure halves around the transport:
//! `build_request` turns a `RequestDescriptor` into an `HttpRequest`, and
//! `parse_response` turns the `HttpResponse` into either a body or a typed
//! error. The client holds no per-call state, so one instance can be shared
//! across threads, and a host that performs its own IO can drive the two
//! halves directly.
//!
//! Response classification order:
//! 1. transport failure: `Network` without status
//! 2. status outside the legible set: `Network` with that status
//! 3. error envelope in the body: `Application`
//! 4. 401 or 500 without an envelope: `Network` with that status
//! 5. otherwise the body is returned for mapping

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::batch::{BatchRequest, BatchResponse};
use crate::coerce::{text_form, Coerce};
use crate::config::{DefaultUrlResolver, GraphConfig, UrlResolver};
use crate::connection::Connection;
use crate::error::{GraphError, GraphResult};
use crate::extract::{DefaultErrorExtractor, ErrorExtractor};
use crate::http::{BinaryAttachment, HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::mapping::{FieldValue, Mapper};
use crate::params::{
    app_secret_proof, to_parameter_string, verify_not_reserved, Parameter, ACCESS_TOKEN_PARAM,
    APP_SECRET_PROOF_PARAM, FORMAT_PARAM, METHOD_PARAM,
};
use crate::transport::{redact, UreqTransport};
use crate::types::{AccessToken, DebugTokenInfo};

/// Statuses whose body is worth inspecting. Anything else is a network error.
const LEGIBLE_STATUSES: [u16; 7] = [200, 304, 400, 401, 403, 404, 500];

const IDS_PARAM: &str = "ids";
const BATCH_PARAM: &str = "batch";

/// What to call and how: endpoint, verb, parameters, and attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    endpoint: String,
    method: HttpMethod,
    parameters: Vec<Parameter>,
    attachments: Vec<BinaryAttachment>,
    delete_via_post: bool,
    include_format: bool,
}

impl RequestDescriptor {
    fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            parameters: Vec::new(),
            attachments: Vec::new(),
            delete_via_post: false,
            include_format: true,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, endpoint)
    }

    pub fn parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Attachments turn the call into a multipart POST.
    pub fn attachments(mut self, attachments: impl IntoIterator<Item = BinaryAttachment>) -> Self {
        self.attachments.extend(attachments);
        self
    }

    /// Send a DELETE as POST with `method=delete`, regardless of config.
    pub fn delete_via_post(mut self, enabled: bool) -> Self {
        self.delete_via_post = enabled;
        self
    }

    /// Leave out the `format=json` parameter.
    pub fn without_format(mut self) -> Self {
        self.include_format = false;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }
}

/// Blocking Graph API client.
#[derive(Clone)]
pub struct GraphClient {
    config: GraphConfig,
    transport: Arc<dyn Transport>,
    error_extractor: Arc<dyn ErrorExtractor>,
    url_resolver: Arc<dyn UrlResolver>,
    mapper: Mapper,
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("graph_endpoint", &self.url_resolver.graph_endpoint_url())
            .field("has_access_token", &self.config.access_token.is_some())
            .field("has_app_secret", &self.config.app_secret.is_some())
            .field("header_auth", &self.config.header_auth)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    pub fn new(config: GraphConfig, transport: impl Transport + 'static) -> Self {
        let url_resolver = DefaultUrlResolver::new(&config);
        Self {
            config,
            transport: Arc::new(transport),
            error_extractor: Arc::new(DefaultErrorExtractor),
            url_resolver: Arc::new(url_resolver),
            mapper: Mapper::new(),
        }
    }

    /// Client backed by `UreqTransport` with the configured timeout.
    pub fn from_config(config: GraphConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self::new(config, transport)
    }

    pub fn with_error_extractor(mut self, extractor: impl ErrorExtractor + 'static) -> Self {
        self.error_extractor = Arc::new(extractor);
        self
    }

    pub fn with_url_resolver(mut self, resolver: impl UrlResolver + 'static) -> Self {
        self.url_resolver = Arc::new(resolver);
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Fetch a single object, e.g. `me` or `{page-id}`.
    pub fn fetch_object<T: FieldValue>(
        &self,
        object: &str,
        parameters: &[Parameter],
    ) -> GraphResult<Option<T>> {
        verify_present("object", object)?;
        let descriptor = RequestDescriptor::get(object).parameters(parameters.iter().cloned());
        let body = self.make_request(&descriptor)?;
        self.mapper.to_object(&body)
    }

    /// Fetch several objects in one call. The result is keyed by id, so `T`
    /// is usually a map or a struct with one field per id.
    pub fn fetch_objects<T: FieldValue, S: AsRef<str>>(
        &self,
        ids: &[S],
        parameters: &[Parameter],
    ) -> GraphResult<Option<T>> {
        if ids.is_empty() {
            return Err(GraphError::usage("the list of IDs cannot be empty"));
        }
        if parameters.iter().any(|p| p.name == IDS_PARAM) {
            return Err(GraphError::usage(format!(
                "the '{IDS_PARAM}' parameter is built from the ID list and may not be specified"
            )));
        }
        let ids = ids
            .iter()
            .map(|id| match id.as_ref().trim() {
                "" => Err(GraphError::usage("the list of IDs cannot contain blank strings")),
                id => Ok(id.to_string()),
            })
            .collect::<GraphResult<Vec<_>>>()?;
        let descriptor = RequestDescriptor::get("")
            .parameters([Parameter::with(IDS_PARAM, ids)?])
            .parameters(parameters.iter().cloned());
        let body = self.make_request(&descriptor)?;
        self.mapper.to_object(&body)
    }

    /// Fetch the first page of a connection such as `me/feed`.
    pub fn fetch_connection<T: FieldValue>(
        &self,
        connection: &str,
        parameters: &[Parameter],
    ) -> GraphResult<Connection<T>> {
        verify_present("connection", connection)?;
        let descriptor = RequestDescriptor::get(connection).parameters(parameters.iter().cloned());
        let body = self.make_request(&descriptor)?;
        Connection::from_json(&self.mapper, &body)
    }

    /// Fetch a connection page from an absolute paging URL as returned by
    /// the server. The URL already carries the caller's parameters and
    /// token; only the secret proof is added when configured.
    pub fn fetch_connection_page<T: FieldValue>(&self, url: &str) -> GraphResult<Connection<T>> {
        verify_present("connection page URL", url)?;
        let mut url = url.to_string();
        if !url.contains(&format!("{APP_SECRET_PROOF_PARAM}=")) {
            if let Some(proof) = self.secret_proof()? {
                let proof = to_parameter_string(&[Parameter::text(APP_SECRET_PROOF_PARAM, proof)]);
                url = with_query(url, &proof);
            }
        }
        let request = HttpRequest {
            method: HttpMethod::Get,
            url,
            header_token: self.header_token(),
            body: None,
            attachments: Vec::new(),
        };
        let body = self.exchange(&request)?;
        Connection::from_json(&self.mapper, &body)
    }

    /// POST to a connection, e.g. `me/feed` or `{album-id}/photos`.
    pub fn publish<T: FieldValue>(
        &self,
        connection: &str,
        parameters: &[Parameter],
        attachments: Vec<BinaryAttachment>,
    ) -> GraphResult<Option<T>> {
        verify_present("connection", connection)?;
        let descriptor = RequestDescriptor::post(connection)
            .parameters(parameters.iter().cloned())
            .attachments(attachments);
        let body = self.make_request(&descriptor)?;
        self.mapper.to_object(&body)
    }

    /// Delete an object. Returns whether the server reported success.
    pub fn delete_object(&self, object: &str, parameters: &[Parameter]) -> GraphResult<bool> {
        verify_present("object", object)?;
        let descriptor = RequestDescriptor::delete(object).parameters(parameters.iter().cloned());
        let body = self.make_request(&descriptor)?;
        Ok(delete_succeeded(&body))
    }

    /// Run several calls in one POST. Responses keep submission order; a
    /// `None` marks a request the server skipped or omitted.
    pub fn execute_batch(
        &self,
        requests: &[BatchRequest],
        attachments: Vec<BinaryAttachment>,
    ) -> GraphResult<Vec<Option<BatchResponse>>> {
        if requests.is_empty() {
            return Err(GraphError::usage("a batch needs at least one request"));
        }
        let batch = requests
            .iter()
            .map(|r| r.to_json(&self.mapper, true))
            .collect::<GraphResult<Vec<_>>>()?;
        let descriptor = RequestDescriptor::post("")
            .parameters([Parameter::text(BATCH_PARAM, Value::Array(batch).to_string())])
            .attachments(attachments);
        let body = self.make_request(&descriptor)?;
        self.mapper.to_list(&body)
    }

    /// Obtain an app access token through the client-credentials grant.
    pub fn obtain_app_access_token(&self, app_id: &str, app_secret: &str) -> GraphResult<AccessToken> {
        verify_present("app_id", app_id)?;
        verify_present("app_secret", app_secret)?;
        let descriptor = RequestDescriptor::get("oauth/access_token").parameters([
            Parameter::text("client_id", app_id),
            Parameter::text("client_secret", app_secret),
            Parameter::text("grant_type", "client_credentials"),
        ]);
        let body = self.make_request(&descriptor)?;
        if body.trim_start().starts_with('{') {
            self.mapper
                .to_object::<AccessToken>(&body)?
                .filter(|t| !t.access_token.is_empty())
                .ok_or_else(|| GraphError::mapping(format!("no access_token in response '{body}'")))
        } else {
            AccessToken::from_query_string(&body)
        }
    }

    /// Inspect a token through `debug_token`.
    pub fn debug_token(&self, input_token: &str) -> GraphResult<DebugTokenInfo> {
        verify_present("input_token", input_token)?;
        let descriptor =
            RequestDescriptor::get("debug_token").parameters([Parameter::text("input_token", input_token)]);
        let body = self.make_request(&descriptor)?;
        let response: Value = self.mapper.to_object(&body)?.unwrap_or(Value::Null);
        let data = response
            .get("data")
            .ok_or_else(|| GraphError::mapping("debug_token response has no 'data' member"))?;
        self.mapper
            .map_value::<DebugTokenInfo>(data)?
            .ok_or_else(|| GraphError::mapping(format!("cannot map debug_token data '{data}'")))
    }

    /// Build, send, and classify one call, returning the raw body.
    pub fn make_request(&self, descriptor: &RequestDescriptor) -> GraphResult<String> {
        let request = self.build_request(descriptor)?;
        self.exchange(&request)
    }

    /// Assemble the HTTP request for `descriptor` without sending it.
    pub fn build_request(&self, descriptor: &RequestDescriptor) -> GraphResult<HttpRequest> {
        verify_not_reserved(&descriptor.parameters)?;

        let delete_as_post = descriptor.method == HttpMethod::Delete
            && (descriptor.delete_via_post || self.config.delete_via_post);
        let mut parameters = descriptor.parameters.clone();
        if delete_as_post {
            parameters.push(Parameter::text(METHOD_PARAM, "delete"));
        }
        if let Some(token) = self.config.access_token.as_deref() {
            if !self.config.header_auth {
                parameters.push(Parameter::text(ACCESS_TOKEN_PARAM, token));
            }
        }
        if let Some(proof) = self.secret_proof()? {
            parameters.push(Parameter::text(APP_SECRET_PROOF_PARAM, proof));
        }
        if descriptor.include_format {
            parameters.push(Parameter::text(FORMAT_PARAM, "json"));
        }
        let encoded = to_parameter_string(&parameters);

        let base = if descriptor.attachments.iter().any(BinaryAttachment::is_video) {
            self.url_resolver.graph_video_endpoint_url()
        } else {
            self.url_resolver.graph_endpoint_url()
        };
        let url = format!("{base}/{}", descriptor.endpoint.trim_start_matches('/'));

        let has_attachments = !descriptor.attachments.is_empty();
        let method = match descriptor.method {
            HttpMethod::Delete if delete_as_post => HttpMethod::Post,
            HttpMethod::Get if has_attachments => HttpMethod::Post,
            other => other,
        };
        let (url, body) = match method {
            HttpMethod::Post if !has_attachments => (url, Some(encoded)),
            _ => (with_query(url, &encoded), None),
        };

        Ok(HttpRequest {
            method,
            url,
            header_token: self.header_token(),
            body,
            attachments: descriptor.attachments.clone(),
        })
    }

    /// Classify a response: the body on success, a typed error otherwise.
    pub fn parse_response(&self, response: HttpResponse) -> GraphResult<String> {
        if !LEGIBLE_STATUSES.contains(&response.status) {
            debug!(status = response.status, "illegible HTTP status");
            return Err(GraphError::network_status(response.status));
        }
        let debug_info = response.debug_info();
        if !debug_info.is_empty() {
            trace!(
                trace_id = debug_info.trace_id.as_deref(),
                api_version = debug_info.api_version.as_deref(),
                app_usage = debug_info.app_usage.as_deref(),
                "Graph API debug headers"
            );
        }
        self.error_extractor
            .classify(&response.body, response.status, &debug_info)?;
        if matches!(response.status, 401 | 500) {
            return Err(GraphError::network_status(response.status));
        }
        Ok(response.body)
    }

    fn exchange(&self, request: &HttpRequest) -> GraphResult<String> {
        let method = request.method.as_str();
        let url = redact(&request.url);
        debug!(
            method,
            url,
            attachments = request.attachments.len(),
            "sending Graph API request"
        );
        let response = self.transport.execute(request).map_err(|e| GraphError::Network {
            status: None,
            message: format!("{method} {url} failed: {e}"),
        })?;
        debug!(
            method,
            url,
            status = response.status,
            bytes = response.body.len(),
            "received Graph API response"
        );
        self.parse_response(response)
    }

    fn header_token(&self) -> Option<String> {
        if self.config.header_auth {
            self.config.access_token.clone()
        } else {
            None
        }
    }

    fn secret_proof(&self) -> GraphResult<Option<String>> {
        match (&self.config.access_token, &self.config.app_secret) {
            (Some(token), Some(secret)) => app_secret_proof(token, secret).map(Some),
            _ => Ok(None),
        }
    }
}

fn verify_present(what: &str, value: &str) -> GraphResult<()> {
    if value.trim().is_empty() {
        return Err(GraphError::usage(format!("{what} cannot be blank")));
    }
    Ok(())
}

fn with_query(url: String, query: &str) -> String {
    if query.is_empty() {
        return url;
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

/// Delete responses come as `true`, `{"success": true}`, or the legacy
/// `{"result": "Successfully deleted"}`; anything unparseable is compared
/// with the literal `true`.
fn delete_succeeded(body: &str) -> bool {
    match serde_json::from_str::<Value>(body.trim()) {
        Ok(Value::Object(map)) => {
            if let Some(result) = map.get("result") {
                return text_form(result).contains("Successfully deleted");
            }
            map.get("success")
                .map(|v| bool::coerce(v).unwrap_or(false))
                .unwrap_or(false)
        }
        Ok(other) => bool::coerce(&other).unwrap_or(false),
        Err(_) => {
            trace!("delete response is not JSON, comparing the raw body");
            body.trim() == "true"
        }
    }
}
