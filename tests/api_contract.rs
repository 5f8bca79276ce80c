//! HTTP contract tests: the full router (auth, timeout, logging layers
//! included) driven through `tower::ServiceExt::oneshot` against the
//! in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use docgate::config::Config;
use docgate::server::HttpServer;
use docgate::store::MemoryStore;

const USERNAME: &str = "admin";
const PASSWORD: &str = "hunter2";

fn test_router() -> Router {
    let config = Config {
        auth_username: USERNAME.to_string(),
        auth_password: PASSWORD.to_string(),
        ..Default::default()
    };
    HttpServer::new(config, Arc::new(MemoryStore::new())).router()
}

fn auth_value() -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", USERNAME, PASSWORD)))
}

async fn send(
    router: &Router,
    method: &str,
    path: &str,
    body: Option<Value>,
    authorization: Option<String>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn call(router: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    send(router, method, path, body, Some(auth_value())).await
}

#[tokio::test]
async fn auth_gate_applies_to_every_endpoint() {
    let router = test_router();

    // No credentials at all.
    let (status, body) = send(&router, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    // Wrong password, valid body.
    let bad = format!("Basic {}", BASE64.encode(format!("{}:nope", USERNAME)));
    let (status, _) = send(
        &router,
        "POST",
        "/v0/find",
        Some(json!({"collection": "users"})),
        Some(bad),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Garbled header.
    let (status, _) = send(&router, "GET", "/", None, Some("Basic !!!".to_string())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unconfigured_credentials_reject_empty_basic_pair() {
    // A server built without credentials must not accept `Basic` with an
    // empty username and password.
    let router = HttpServer::new(Config::default(), Arc::new(MemoryStore::new())).router();

    let empty_pair = format!("Basic {}", BASE64.encode(":"));
    let (status, body) = send(&router, "GET", "/", None, Some(empty_pair)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn malformed_json_body_keeps_error_envelope() {
    let router = test_router();

    let request = Request::builder()
        .method("POST")
        .uri("/v0/find")
        .header(header::AUTHORIZATION, auth_value())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Invalid JSON body"), "got: {message}");
}

#[tokio::test]
async fn store_failures_surface_a_generic_message() {
    let router = test_router();

    let (status, body) = call(
        &router,
        "POST",
        "/v0/find",
        Some(json!({"collection": "users", "filter": {"name": {"$regex": "x"}}})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert!(body.get("debug").is_none());
}

#[tokio::test]
async fn root_reports_version() {
    let router = test_router();
    let (status, body) = call(&router, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["data"]["message"].is_string());
}

#[tokio::test]
async fn insert_one_reads_back_with_generated_id() {
    let router = test_router();

    let (status, body) = call(
        &router,
        "POST",
        "/v0/insert-one",
        Some(json!({"collection": "users", "document": {"name": "A"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "A");
    let id = body["data"]["_id"]["$oid"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    // A subsequent find returns exactly that record.
    let (status, body) = call(
        &router,
        "POST",
        "/v0/find",
        Some(json!({"collection": "users", "filter": {"name": "A"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["_id"]["$oid"], id.as_str());
}

#[tokio::test]
async fn find_one_returns_null_when_nothing_matches() {
    let router = test_router();
    let (status, body) = call(
        &router,
        "POST",
        "/v0/find-one",
        Some(json!({"collection": "users", "filter": {"name": "ghost"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn update_one_returns_post_image() {
    let router = test_router();
    call(
        &router,
        "POST",
        "/v0/insert-one",
        Some(json!({"collection": "items", "document": {"name": "X", "value": 10}})),
    )
    .await;

    let (status, body) = call(
        &router,
        "POST",
        "/v0/update-one",
        Some(json!({
            "collection": "items",
            "filter": {"name": "X"},
            "update": {"$inc": {"value": 5}},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], 15);
}

#[tokio::test]
async fn validation_names_the_missing_field() {
    let router = test_router();

    let (status, body) = call(&router, "POST", "/v0/find", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field: collection");

    let (status, body) = call(
        &router,
        "POST",
        "/v0/update-one",
        Some(json!({"collection": "items"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: filter, update");
}

#[tokio::test]
async fn empty_batch_rejected_with_exact_message() {
    let router = test_router();
    let (status, body) = call(
        &router,
        "POST",
        "/v0/transaction",
        Some(json!({"operations": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "At least one operation is required");
}

#[tokio::test]
async fn invalid_batch_never_partially_executes() {
    let router = test_router();

    // Second descriptor is missing its filter; the first must not run.
    let (status, body) = call(
        &router,
        "POST",
        "/v0/transaction",
        Some(json!({
            "operations": [
                {"type": "insertOne", "collection": "x", "document": {}},
                {"type": "deleteOne", "collection": "y"},
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("operations[1]: missing required field 'filter'"));

    let (_, body) = call(
        &router,
        "POST",
        "/v0/count",
        Some(json!({"collection": "x"})),
    )
    .await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn committed_batch_echoes_types_in_order() {
    let router = test_router();
    let (status, body) = call(
        &router,
        "POST",
        "/v0/transaction",
        Some(json!({
            "operations": [
                {"type": "insertOne", "collection": "a", "document": {"n": 1}},
                {"type": "findOneAndUpdate", "collection": "a",
                 "filter": {"n": 1}, "update": {"$set": {"n": 2}}},
                {"type": "deleteOne", "collection": "a", "filter": {"n": 2}},
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["operationCount"], 3);
    let results = body["data"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["type"], "insertOne");
    assert_eq!(results[1]["type"], "findOneAndUpdate");
    assert_eq!(results[2]["type"], "deleteOne");
    assert_eq!(results[2]["collection"], "a");
    assert_eq!(results[2]["deletedCount"], 1);
}

#[tokio::test]
async fn create_index_is_idempotent() {
    let router = test_router();
    let request = json!({"collection": "users", "keys": {"email": 1}, "options": {"unique": true}});

    let (status, first) = call(&router, "POST", "/v0/create-index", Some(request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let name = first["data"]["indexName"].as_str().unwrap().to_string();

    let (status, second) = call(&router, "POST", "/v0/create-index", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["indexName"], name.as_str());
}

#[tokio::test]
async fn drop_index_acknowledges() {
    let router = test_router();
    call(
        &router,
        "POST",
        "/v0/create-index",
        Some(json!({"collection": "users", "keys": {"email": 1}})),
    )
    .await;

    let (status, body) = call(
        &router,
        "POST",
        "/v0/drop-index",
        Some(json!({"collection": "users", "index": "email_1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["acknowledged"], true);
}

#[tokio::test]
async fn collections_lists_names() {
    let router = test_router();
    call(
        &router,
        "POST",
        "/v0/insert-one",
        Some(json!({"collection": "alpha", "document": {"n": 1}})),
    )
    .await;
    call(
        &router,
        "POST",
        "/v0/insert-one",
        Some(json!({"collection": "beta", "document": {"n": 2}})),
    )
    .await;

    let (status, body) = call(&router, "GET", "/v0/collections", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["alpha", "beta"]));
}

#[tokio::test]
async fn end_to_end_batch_lifecycle() {
    let router = test_router();

    // Insert two documents.
    let (status, body) = call(
        &router,
        "POST",
        "/v0/insert-many",
        Some(json!({
            "collection": "docs",
            "documents": [
                {"name": "Doc1", "type": "batch"},
                {"name": "Doc2", "type": "batch"},
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (_, body) = call(
        &router,
        "POST",
        "/v0/count",
        Some(json!({"collection": "docs", "filter": {"type": "batch"}})),
    )
    .await;
    assert_eq!(body["count"], 2);

    // Flag them all.
    let (status, body) = call(
        &router,
        "POST",
        "/v0/update-many",
        Some(json!({
            "collection": "docs",
            "filter": {"type": "batch"},
            "update": {"$set": {"flag": true}},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedCount"], 2);
    let updated = body["data"].as_array().unwrap();
    assert_eq!(updated.len(), 2);
    assert!(updated.iter().all(|d| d["flag"] == true));

    // Delete them all.
    let (status, body) = call(
        &router,
        "POST",
        "/v0/delete-many",
        Some(json!({"collection": "docs", "filter": {"type": "batch"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedCount"], 2);

    let (_, body) = call(
        &router,
        "POST",
        "/v0/count",
        Some(json!({"collection": "docs", "filter": {"type": "batch"}})),
    )
    .await;
    assert_eq!(body["count"], 0);
}
