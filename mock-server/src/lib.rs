//! In-memory stand-in for the Graph API, used by the client's integration
//! tests and for local experiments.
//!
//! Serves any version prefix. Answers carry the same debug headers and error
//! envelopes the real service sends, and a handful of reserved object ids
//! trigger failure modes on demand:
//!
//! | id             | answer                                     |
//! |----------------|--------------------------------------------|
//! | `rate_limited` | 400 with a code 4 envelope                 |
//! | `flaky`        | status 499 with an empty object            |
//! | `outage`       | 500 with a plain-text body                 |
//!
//! The access token `expired` is rejected with code 190.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

pub const API_VERSION: &str = "v21.0";
pub const FEED_SIZE: usize = 5;
pub const DEFAULT_PAGE_LIMIT: usize = 2;
pub const USER_ID: &str = "1";
pub const PAGE_ID: &str = "2";

const REVISION: &str = "1010101";
const CREATED_TIME: &str = "2024-03-01T12:30:00+0000";

type Params = HashMap<String, String>;

pub type Db = Arc<RwLock<Graph>>;

/// Objects the mock knows about, keyed by id.
#[derive(Debug, Clone)]
pub struct Graph {
    objects: BTreeMap<String, Value>,
    feed: Vec<Value>,
    next_id: u64,
}

impl Graph {
    /// A user, a page, and a five-post feed.
    pub fn seeded() -> Self {
        let mut objects = BTreeMap::new();
        objects.insert(
            USER_ID.to_string(),
            json!({
                "id": USER_ID,
                "name": "Mock User",
                "birthday": "04/15/1990",
                "updated_time": CREATED_TIME,
                "verified": "true",
            }),
        );
        objects.insert(
            PAGE_ID.to_string(),
            json!({
                "id": PAGE_ID,
                "name": "Mock Page",
                "fan_count": "1234",
                "category": "Software",
                "location": [],
            }),
        );
        let feed: Vec<Value> = (1..=FEED_SIZE)
            .map(|n| {
                json!({
                    "id": format!("{USER_ID}_{n}"),
                    "message": format!("post {n}"),
                    "created_time": CREATED_TIME,
                })
            })
            .collect();
        for post in &feed {
            if let Some(id) = post["id"].as_str() {
                objects.insert(id.to_string(), post.clone());
            }
        }
        Self {
            objects,
            feed,
            next_id: 100,
        }
    }

    fn resolve_id<'a>(&self, id: &'a str) -> &'a str {
        if id == "me" {
            USER_ID
        } else {
            id
        }
    }

    fn object(&self, id: &str) -> Result<Value, Failure> {
        match id {
            "rate_limited" => Err(Failure::envelope(
                StatusCode::BAD_REQUEST,
                4,
                None,
                "OAuthException",
                "(#4) Application request limit reached",
            )),
            "flaky" => Err(Failure {
                status: StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_GATEWAY),
                body: "{}".into(),
            }),
            "outage" => Err(Failure {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "Internal Server Error".into(),
            }),
            _ => self
                .objects
                .get(self.resolve_id(id))
                .cloned()
                .ok_or_else(|| Failure::unknown_object(id)),
        }
    }

    fn delete(&mut self, id: &str) -> Result<Value, Failure> {
        let id = self.resolve_id(id).to_string();
        match self.objects.remove(&id) {
            Some(_) => {
                info!(id, "deleted object");
                Ok(json!({ "success": true }))
            }
            None => Err(Failure::unknown_object(&id)),
        }
    }

    fn publish(&mut self, owner: &str, fields: &Params) -> Value {
        let owner = self.resolve_id(owner).to_string();
        self.next_id += 1;
        let id = format!("{owner}_{}", self.next_id);
        let mut object = Map::new();
        object.insert("id".into(), json!(id));
        object.insert("created_time".into(), json!(CREATED_TIME));
        for (key, value) in fields.iter().filter(|(k, _)| !is_pipeline_param(k)) {
            object.insert(key.clone(), json!(value));
        }
        self.objects.insert(id.clone(), Value::Object(object));
        info!(id, owner, "published object");
        json!({ "id": id })
    }
}

/// A response that short-circuits a handler.
#[derive(Debug, Clone)]
pub struct Failure {
    status: StatusCode,
    body: String,
}

impl Failure {
    fn envelope(
        status: StatusCode,
        code: i64,
        subcode: Option<i64>,
        error_type: &str,
        message: &str,
    ) -> Self {
        let mut error = json!({
            "message": message,
            "type": error_type,
            "code": code,
            "fbtrace_id": trace_id(),
        });
        if let Some(subcode) = subcode {
            error["error_subcode"] = json!(subcode);
        }
        Self {
            status,
            body: json!({ "error": error }).to_string(),
        }
    }

    fn unknown_object(id: &str) -> Self {
        Self::envelope(
            StatusCode::BAD_REQUEST,
            100,
            Some(33),
            "GraphMethodException",
            &format!("Unsupported get request. Object with ID '{id}' does not exist"),
        )
    }

    fn bad_parameter(message: &str) -> Self {
        Self::envelope(StatusCode::BAD_REQUEST, 100, None, "OAuthException", message)
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        graph_response(self.status, self.body)
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Graph::seeded()));
    Router::new()
        .route("/{version}/", get(fetch_many).post(batch))
        .route("/{version}/oauth/access_token", get(access_token))
        .route("/{version}/debug_token", get(debug_token))
        .route(
            "/{version}/{id}",
            get(fetch_one).post(post_to_object).delete(delete_object),
        )
        .route("/{version}/{id}/{connection}", get(connection).post(publish))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Every answer goes out as `text/javascript` with trace headers, like the
/// real service.
fn graph_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            ("content-type", "text/javascript; charset=UTF-8".to_string()),
            ("x-fb-trace-id", trace_id()),
            ("x-fb-rev", REVISION.to_string()),
            ("facebook-api-version", API_VERSION.to_string()),
        ],
        body,
    )
        .into_response()
}

fn ok(body: Value) -> Response {
    graph_response(StatusCode::OK, body.to_string())
}

fn trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn is_pipeline_param(name: &str) -> bool {
    matches!(name, "access_token" | "appsecret_proof" | "format" | "method")
}

fn authorize(query: &Params, form: Option<&Params>, headers: &HeaderMap) -> Result<(), Failure> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("OAuth "))
        .map(str::to_string)
        .or_else(|| query.get("access_token").cloned())
        .or_else(|| form.and_then(|f| f.get("access_token").cloned()));
    match token.as_deref() {
        None | Some("") => Err(Failure::envelope(
            StatusCode::BAD_REQUEST,
            2500,
            None,
            "OAuthException",
            "An active access token must be used to query information about the current user.",
        )),
        Some("expired") => Err(Failure::envelope(
            StatusCode::BAD_REQUEST,
            190,
            Some(463),
            "OAuthException",
            "Error validating access token: Session has expired.",
        )),
        Some(_) => Ok(()),
    }
}

/// Keep only the requested fields; `id` is always returned.
fn select_fields(object: Value, fields: Option<&String>) -> Value {
    let (Some(fields), Value::Object(map)) = (fields, &object) else {
        return object;
    };
    let wanted: Vec<&str> = fields.split(',').map(str::trim).collect();
    Value::Object(
        map.iter()
            .filter(|(k, _)| k.as_str() == "id" || wanted.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

async fn fetch_one(
    State(db): State<Db>,
    Path((_version, id)): Path<(String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    authorize(&query, None, &headers)?;
    let object = db.read().await.object(&id)?;
    debug!(id, "fetched object");
    Ok(ok(select_fields(object, query.get("fields"))))
}

/// `GET /?ids=...`: several objects keyed by id.
async fn fetch_many(
    State(db): State<Db>,
    Query(query): Query<Params>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    authorize(&query, None, &headers)?;
    let raw = query
        .get("ids")
        .ok_or_else(|| Failure::bad_parameter("(#100) The parameter ids is required"))?;
    let ids: Vec<String> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(raw)
            .map_err(|_| Failure::bad_parameter("(#100) ids must be a list of strings"))?
    } else {
        raw.split(',').map(|s| s.trim().to_string()).collect()
    };
    let graph = db.read().await;
    let mut result = Map::new();
    for id in ids {
        let object = graph.object(&id)?;
        result.insert(id, select_fields(object, query.get("fields")));
    }
    Ok(ok(Value::Object(result)))
}

async fn delete_object(
    State(db): State<Db>,
    Path((_version, id)): Path<(String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    authorize(&query, None, &headers)?;
    let answer = db.write().await.delete(&id)?;
    Ok(ok(answer))
}

/// POST to an object: `method=delete` tunnels a delete, anything else
/// updates fields.
async fn post_to_object(
    State(db): State<Db>,
    Path((_version, id)): Path<(String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
    Form(form): Form<Params>,
) -> Result<Response, Failure> {
    authorize(&query, Some(&form), &headers)?;
    let mut graph = db.write().await;
    if form.get("method").map(String::as_str) == Some("delete") {
        return Ok(ok(graph.delete(&id)?));
    }
    let key = graph.resolve_id(&id).to_string();
    let object = graph
        .objects
        .get_mut(&key)
        .ok_or_else(|| Failure::unknown_object(&id))?;
    if let Value::Object(map) = object {
        for (k, v) in form.iter().filter(|(k, _)| !is_pipeline_param(k)) {
            map.insert(k.clone(), json!(v));
        }
    }
    Ok(ok(json!({ "success": true })))
}

/// Cursor-paged feed. Like the real service, `next` is sent whenever the
/// page has data; on the last page both cursors point at the same item.
async fn connection(
    State(db): State<Db>,
    Path((version, id, connection)): Path<(String, String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    authorize(&query, None, &headers)?;
    let graph = db.read().await;
    if connection != "feed" || graph.resolve_id(&id) != USER_ID {
        return Err(Failure::envelope(
            StatusCode::BAD_REQUEST,
            2500,
            None,
            "OAuthException",
            &format!("Unknown path components: /{connection}"),
        ));
    }
    let limit = query
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = match query.get("after") {
        Some(cursor) => decode_cursor(cursor)
            .ok_or_else(|| Failure::bad_parameter("(#100) Invalid after cursor"))?
            + 1,
        None => 0,
    };
    let end = (offset + limit).min(graph.feed.len());
    let data: Vec<Value> = graph
        .feed
        .get(offset..end)
        .unwrap_or_default()
        .iter()
        .map(|post| select_fields(post.clone(), query.get("fields")))
        .collect();

    let mut body = json!({ "data": data });
    if !data.is_empty() {
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        let token = query.get("access_token").cloned().unwrap_or_default();
        let page_url = |cursor_name: &str, cursor: &str| {
            format!(
                "http://{host}/{version}/{id}/feed?limit={limit}&access_token={token}&{cursor_name}={cursor}"
            )
        };
        let before = encode_cursor(offset);
        let after = encode_cursor(end - 1);
        let mut paging = json!({
            "cursors": { "before": before, "after": after },
            "next": page_url("after", &after),
        });
        if offset > 0 {
            paging["previous"] = json!(page_url("before", &before));
        }
        body["paging"] = paging;
    }
    if query.get("summary").map(String::as_str) == Some("true") {
        body["summary"] = json!({ "total_count": graph.feed.len() });
    }
    Ok(ok(body))
}

fn encode_cursor(index: usize) -> String {
    format!("cursor{index}")
}

fn decode_cursor(cursor: &str) -> Option<usize> {
    cursor.strip_prefix("cursor")?.parse().ok()
}

/// Publish to a connection. Form posts create objects; multipart uploads
/// (photos, videos) are accepted without inspecting the payload.
async fn publish(
    State(db): State<Db>,
    Path((_version, id, connection)): Path<(String, String, String)>,
    Query(query): Query<Params>,
    headers: HeaderMap,
    form: Result<Form<Params>, FormRejection>,
) -> Result<Response, Failure> {
    let fields = match form {
        Ok(Form(form)) => {
            authorize(&query, Some(&form), &headers)?;
            if connection == "feed" && !form.contains_key("message") && !form.contains_key("link") {
                return Err(Failure::bad_parameter("(#100) Missing message or attachment"));
            }
            form
        }
        Err(_) if is_multipart(&headers) => {
            authorize(&query, None, &headers)?;
            query
        }
        Err(rejection) => return Err(Failure::bad_parameter(&rejection.body_text())),
    };
    let mut graph = db.write().await;
    let mut answer = graph.publish(&id, &fields);
    if connection == "photos" {
        answer["post_id"] = answer["id"].clone();
    }
    Ok(ok(answer))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

/// `POST /` with a `batch` parameter. Sub-requests run in order against the
/// same graph; responses keep submission order.
async fn batch(
    State(db): State<Db>,
    Query(query): Query<Params>,
    headers: HeaderMap,
    form: Result<Form<Params>, FormRejection>,
) -> Result<Response, Failure> {
    let form = match form {
        Ok(Form(form)) => form,
        Err(_) if is_multipart(&headers) => query.clone(),
        Err(rejection) => return Err(Failure::bad_parameter(&rejection.body_text())),
    };
    authorize(&query, Some(&form), &headers)?;
    let raw = form
        .get("batch")
        .ok_or_else(|| Failure::bad_parameter("(#100) The parameter batch is required"))?;
    let requests: Vec<Value> = serde_json::from_str(raw)
        .map_err(|_| Failure::bad_parameter("(#100) batch must be a JSON array"))?;

    let mut graph = db.write().await;
    let responses: Vec<Value> = requests
        .iter()
        .map(|request| run_sub_request(&mut graph, request))
        .collect();
    Ok(ok(Value::Array(responses)))
}

fn run_sub_request(graph: &mut Graph, request: &Value) -> Value {
    let method = request["method"].as_str().unwrap_or("GET");
    let relative_url = request["relative_url"].as_str().unwrap_or_default();
    let (path, query) = relative_url.split_once('?').unwrap_or((relative_url, ""));
    let fields = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "fields")
        .map(|(_, v)| v.replace("%2C", ","));
    let id = path.trim_matches('/');

    let outcome = match method {
        "GET" => graph.object(id).map(|o| select_fields(o, fields.as_ref())),
        "DELETE" => graph.delete(id),
        other => Err(Failure::bad_parameter(&format!(
            "(#100) Unsupported batch method {other}"
        ))),
    };
    let omit = request["omit_response_on_success"].as_bool().unwrap_or(false);
    match outcome {
        Ok(_) if omit => Value::Null,
        Ok(body) => sub_response(StatusCode::OK, body.to_string()),
        Err(failure) => sub_response(failure.status, failure.body),
    }
}

fn sub_response(status: StatusCode, body: String) -> Value {
    json!({
        "code": status.as_u16(),
        "headers": [
            { "name": "Content-Type", "value": "text/javascript; charset=UTF-8" },
            { "name": "x-fb-trace-id", "value": trace_id() },
        ],
        "body": body,
    })
}

async fn access_token(Query(query): Query<Params>) -> Result<Response, Failure> {
    if query.get("grant_type").map(String::as_str) != Some("client_credentials") {
        return Err(Failure::bad_parameter("Missing or unsupported grant_type"));
    }
    let (Some(client_id), Some(secret)) = (query.get("client_id"), query.get("client_secret")) else {
        return Err(Failure::bad_parameter("Missing client_id or client_secret"));
    };
    Ok(ok(json!({
        "access_token": format!("{client_id}|{secret}"),
        "token_type": "bearer",
    })))
}

async fn debug_token(Query(query): Query<Params>, headers: HeaderMap) -> Result<Response, Failure> {
    authorize(&query, None, &headers)?;
    let input = query
        .get("input_token")
        .ok_or_else(|| Failure::bad_parameter("(#100) The parameter input_token is required"))?;
    let mut data = json!({
        "app_id": "42",
        "type": "USER",
        "application": "Mock App",
        "expires_at": 0,
        "issued_at": 1_700_000_000,
        "is_valid": true,
        "scopes": ["public_profile", "email"],
        "user_id": USER_ID,
    });
    if input == "expired" {
        data["is_valid"] = json!(false);
        data["error"] = json!({
            "code": 190,
            "message": "Session has expired",
            "subcode": 463,
        });
    }
    Ok(ok(json!({ "data": data })))
}
