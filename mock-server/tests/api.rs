use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, DEFAULT_PAGE_LIMIT, FEED_SIZE};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn form_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body.to_string())
        .unwrap()
}

// --- objects ---

#[tokio::test]
async fn me_with_field_selection() {
    let resp = app()
        .oneshot(get("/v21.0/me?fields=name&access_token=tok&format=json"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-fb-trace-id"));
    assert_eq!(resp.headers()["facebook-api-version"], "v21.0");
    let me = body_json(resp).await;
    assert_eq!(me, serde_json::json!({"id": "1", "name": "Mock User"}));
}

#[tokio::test]
async fn header_token_is_accepted() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/v21.0/2")
                .header(http::header::AUTHORIZATION, "OAuth tok")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_json(resp).await;
    assert_eq!(page["fan_count"], "1234");
}

#[tokio::test]
async fn missing_token_returns_oauth_envelope() {
    let resp = app().oneshot(get("/v21.0/me")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["type"], "OAuthException");
    assert_eq!(body["error"]["code"], 2500);
}

#[tokio::test]
async fn expired_token_returns_code_190() {
    let resp = app().oneshot(get("/v21.0/me?access_token=expired")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], 190);
    assert_eq!(body["error"]["error_subcode"], 463);
}

#[tokio::test]
async fn unknown_object_returns_envelope() {
    let resp = app().oneshot(get("/v21.0/404?access_token=tok")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], 100);
    assert_eq!(body["error"]["error_subcode"], 33);
}

#[tokio::test]
async fn failure_modes_on_reserved_ids() {
    let resp = app().oneshot(get("/v21.0/flaky?access_token=tok")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 499);

    let resp = app().oneshot(get("/v21.0/outage?access_token=tok")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body_bytes(resp).await[..], b"Internal Server Error");

    let resp = app().oneshot(get("/v21.0/rate_limited?access_token=tok")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"]["code"], 4);
}

#[tokio::test]
async fn multiple_ids_in_one_call() {
    let resp = app()
        .oneshot(get("/v21.0/?ids=%5B%221%22%2C%222%22%5D&fields=name&access_token=tok"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["1"]["name"], "Mock User");
    assert_eq!(body["2"]["name"], "Mock Page");
}

// --- connections ---

#[tokio::test]
async fn feed_pages_until_cursors_meet() {
    let resp = app()
        .oneshot(get("/v21.0/me/feed?access_token=tok&summary=true"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let first = body_json(resp).await;
    assert_eq!(first["data"].as_array().unwrap().len(), DEFAULT_PAGE_LIMIT);
    assert_eq!(first["summary"]["total_count"], FEED_SIZE);
    assert!(first["paging"]["next"].as_str().unwrap().starts_with("http://"));
    assert!(first["paging"].get("previous").is_none());

    let resp = app()
        .oneshot(get("/v21.0/me/feed?access_token=tok&limit=2&after=cursor3"))
        .await
        .unwrap();
    let last = body_json(resp).await;
    assert_eq!(last["data"].as_array().unwrap().len(), 1);
    assert_eq!(
        last["paging"]["cursors"]["before"],
        last["paging"]["cursors"]["after"]
    );
    assert!(last["paging"]["previous"].is_string());
}

#[tokio::test]
async fn unknown_connection_is_rejected() {
    let resp = app().oneshot(get("/v21.0/me/friends?access_token=tok")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- tokens ---

#[tokio::test]
async fn client_credentials_grant() {
    let resp = app()
        .oneshot(get(
            "/v21.0/oauth/access_token?client_id=42&client_secret=s3cret&grant_type=client_credentials",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token = body_json(resp).await;
    assert_eq!(token["access_token"], "42|s3cret");

    let resp = app()
        .oneshot(get("/v21.0/oauth/access_token?client_id=42&client_secret=s3cret"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn debug_token_reports_expired_tokens() {
    let resp = app()
        .oneshot(get("/v21.0/debug_token?input_token=expired&access_token=tok"))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["data"]["is_valid"], false);
    assert_eq!(body["data"]["error"]["code"], 190);
}

// --- publish, batch, delete lifecycle ---

#[tokio::test]
async fn publish_batch_delete_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // publish
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("POST", "/v21.0/me/feed", "message=hello+world&access_token=tok"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let published = body_json(resp).await;
    let id = published["id"].as_str().unwrap().to_string();

    // read back through a batch
    let batch = format!(r#"[{{"method":"GET","relative_url":"{id}?fields=message"}}]"#);
    let body = format!(
        "batch={}&access_token=tok",
        batch
            .replace('%', "%25")
            .replace('"', "%22")
            .replace('?', "%3F")
            .replace('=', "%3D")
            .replace('&', "%26")
    );
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("POST", "/v21.0/", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let responses = body_json(resp).await;
    assert_eq!(responses[0]["code"], 200);
    let inner: Value = serde_json::from_str(responses[0]["body"].as_str().unwrap()).unwrap();
    assert_eq!(inner["message"], "hello world");

    // delete tunneled through POST
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "POST",
            &format!("/v21.0/{id}"),
            "method=delete&access_token=tok",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["success"], true);

    // second delete with the DELETE verb fails
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("DELETE")
                .uri(&format!("/v21.0/{id}?access_token=tok"))
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn publish_without_message_is_rejected() {
    let resp = app()
        .oneshot(form_request("POST", "/v21.0/me/feed", "access_token=tok"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
