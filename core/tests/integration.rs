//! End-to-end calls against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every client
//! operation over real HTTP through `UreqTransport`. Paging past the first
//! page is covered in `pipeline.rs`: the server's `next` links use `http://`
//! and the client upgrades them to `https://`, which the plain-HTTP mock
//! cannot serve.

use std::collections::HashMap;

use graphlink_core::{
    graph_object, ApplicationErrorKind, BatchRequest, BinaryAttachment, Connection, GraphClient,
    GraphConfig, GraphError, NamedObject, Parameter, PublishResult, UreqTransport,
};
use time::macros::date;
use time::OffsetDateTime;

#[derive(Debug, Default, Clone, PartialEq)]
struct User {
    id: String,
    name: Option<String>,
    birthday: Option<OffsetDateTime>,
    verified: bool,
}

graph_object! {
    User {
        "id" => id,
        "name" => name,
        "birthday" => birthday,
        "verified" => verified,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Location {
    city: Option<String>,
}

graph_object! {
    Location {
        "city" => city,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Page {
    id: String,
    name: Option<String>,
    fan_count: i64,
    location: Option<Location>,
}

graph_object! {
    Page {
        "id" => id,
        "name" => name,
        "fan_count" => fan_count,
        "location" => location,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Post {
    id: String,
    message: Option<String>,
    created_time: Option<OffsetDateTime>,
}

graph_object! {
    Post {
        "id" => id,
        "message" => message,
        "created_time" => created_time,
    }
}

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(base_url: &str, config: GraphConfig) -> GraphClient {
    let config = GraphConfig {
        graph_url: base_url.to_string(),
        graph_video_url: base_url.to_string(),
        ..config
    };
    GraphClient::new(config, UreqTransport::default())
}

#[test]
fn graph_lifecycle() {
    let base_url = start_server();
    let c = client(&base_url, GraphConfig::with_access_token("tok"));

    // Step 1: single object, with coerced and date fields.
    let me: User = c
        .fetch_object("me", &[Parameter::text("fields", "name,birthday,verified")])
        .unwrap()
        .unwrap();
    assert_eq!(me.id, "1");
    assert_eq!(me.name.as_deref(), Some("Mock User"));
    assert_eq!(me.birthday.map(|b| b.date()), Some(date!(1990 - 04 - 15)));
    assert!(me.verified);

    // Step 2: numeric string and `[]` standing in for an object.
    let page: Page = c.fetch_object("2", &[]).unwrap().unwrap();
    assert_eq!(page.fan_count, 1234);
    assert_eq!(page.location, Some(Location::default()));

    // Step 3: several objects in one call.
    let both: HashMap<String, NamedObject> = c
        .fetch_objects(&["1", " 2 "], &[Parameter::text("fields", "name")])
        .unwrap()
        .unwrap();
    assert_eq!(both.len(), 2);
    assert_eq!(both["1"].id, "1");
    assert_eq!(both["2"].name.as_deref(), Some("Mock Page"));

    // Step 4: first page of a connection.
    let feed: Connection<Post> = c
        .fetch_connection("me/feed", &[Parameter::text("summary", "true")])
        .unwrap();
    assert_eq!(feed.data().len(), mock_server::DEFAULT_PAGE_LIMIT);
    assert_eq!(feed.total_count(), Some(mock_server::FEED_SIZE as u64));
    assert!(feed.has_next());
    assert!(feed.next_page_url().unwrap().starts_with("https://"));
    assert!(feed.data()[0].created_time.is_some());

    // Step 5: publish.
    let published: PublishResult = c
        .publish("me/feed", &[Parameter::text("message", "hello world")], Vec::new())
        .unwrap()
        .unwrap();
    let id = published.id.unwrap();

    // Step 6: batch read of the new post plus a missing object.
    let requests = vec![
        BatchRequest::builder(id.as_str())
            .parameters([Parameter::text("fields", "message")])
            .build(),
        BatchRequest::builder("does_not_exist").build(),
    ];
    let responses = c.execute_batch(&requests, Vec::new()).unwrap();
    assert_eq!(responses.len(), 2);
    let first = responses[0].as_ref().unwrap();
    assert_eq!(first.code(), 200);
    let post: Post = first.body_as(c.mapper()).unwrap().unwrap();
    assert_eq!(post.message.as_deref(), Some("hello world"));
    let second = responses[1].as_ref().unwrap();
    assert!(second.check().unwrap_err().is_application());

    // Step 7: delete, then delete again.
    assert!(c.delete_object(&id, &[]).unwrap());
    let err = c.delete_object(&id, &[]).unwrap_err();
    assert_eq!(
        err.as_application().map(|e| e.kind),
        Some(ApplicationErrorKind::ResourceNotFound)
    );

    // Step 8: delete tunneled through POST.
    let tunneled = client(
        &base_url,
        GraphConfig {
            delete_via_post: true,
            ..GraphConfig::with_access_token("tok")
        },
    );
    let extra: PublishResult = tunneled
        .publish("me/feed", &[Parameter::text("message", "short lived")], Vec::new())
        .unwrap()
        .unwrap();
    assert!(tunneled.delete_object(extra.id.as_deref().unwrap(), &[]).unwrap());

    // Step 9: multipart upload.
    let photo = BinaryAttachment::new("source", "cat.png", "image/png", vec![0x89, b'P', b'N', b'G']);
    let uploaded: PublishResult = c
        .publish("me/photos", &[Parameter::text("caption", "cat")], vec![photo])
        .unwrap()
        .unwrap();
    assert!(uploaded.post_id.is_some());
}

#[test]
fn error_classification_over_http() {
    let base_url = start_server();
    let c = client(&base_url, GraphConfig::with_access_token("tok"));

    let err = c.fetch_object::<User>("rate_limited", &[]).unwrap_err();
    let app = err.as_application().unwrap();
    assert_eq!(app.kind, ApplicationErrorKind::RateLimit);
    assert_eq!(app.http_status, 400);
    assert!(app.is_retryable());
    assert!(app.debug.trace_id.is_some());
    assert_eq!(app.debug.api_version.as_deref(), Some("v21.0"));

    let err = c.fetch_object::<User>("flaky", &[]).unwrap_err();
    assert!(matches!(err, GraphError::Network { status: Some(499), .. }));

    let err = c.fetch_object::<User>("outage", &[]).unwrap_err();
    assert!(matches!(err, GraphError::Network { status: Some(500), .. }));

    let expired = client(&base_url, GraphConfig::with_access_token("expired"));
    let err = expired.fetch_object::<User>("me", &[]).unwrap_err();
    let app = err.as_application().unwrap();
    assert_eq!(app.kind, ApplicationErrorKind::OAuth);
    assert_eq!(app.subcode, Some(463));

    let anonymous = client(&base_url, GraphConfig::default());
    assert!(anonymous.fetch_object::<User>("me", &[]).unwrap_err().is_application());
}

#[test]
fn header_auth_and_tokens() {
    let base_url = start_server();
    let c = client(
        &base_url,
        GraphConfig {
            header_auth: true,
            app_secret: Some("secret".into()),
            ..GraphConfig::with_access_token("tok")
        },
    );
    let me: User = c.fetch_object("me", &[]).unwrap().unwrap();
    assert_eq!(me.id, "1");

    let token = c.obtain_app_access_token("42", "s3cret").unwrap();
    assert_eq!(token.access_token, "42|s3cret");
    assert_eq!(token.token_type.as_deref(), Some("bearer"));

    let info = c.debug_token("expired").unwrap();
    assert!(!info.is_valid);
    assert_eq!(info.error.and_then(|e| e.code), Some(190));
    assert!(info.expires_at.is_none());

    let info = c.debug_token("fresh").unwrap();
    assert!(info.is_valid);
    assert_eq!(info.scopes, vec!["public_profile", "email"]);
}
