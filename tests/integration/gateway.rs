//! HTTP/JSON gateway: translation, error mapping and middleware.

use reqwest::StatusCode;
use serde_json::json;

use crate::helpers::{assert_header, assert_status, TestApp};

#[tokio::test]
async fn test_post_json_round_trip() {
    let server = TestApp::start().await;

    let resp = server
        .post_json("/v1/echo", &json!({"message": "hello", "repeat": 2}))
        .await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "application/json");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "hello hello");
    assert_eq!(body["from_gateway"], true);

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_path_and_query_parameters() {
    let server = TestApp::start().await;

    let resp = server.get("/v1/echo/hi%20there?repeat=3").await;
    assert_status(&resp, StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "hi there hi there hi there");

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_validation_failure_is_bad_request() {
    let server = TestApp::start().await;

    let resp = server
        .post_json("/v1/echo", &json!({"message": "hi", "tags": ["ok", ""]}))
        .await;
    assert_status(&resp, StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        body["errors"]["message"],
        json!(["длина значения должна быть не меньше 3 символов"])
    );
    assert_eq!(
        body["errors"]["tags[1]"],
        json!(["длина значения должна быть не меньше 1 символов"])
    );

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_internal_error_is_redacted() {
    let server = TestApp::start().await;

    let resp = server
        .post_json("/v1/echo", &json!({"message": "internal"}))
        .await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
    let text = resp.text().await.unwrap();
    assert!(!text.contains("hunter2"));
    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body, json!({"code": 500, "message": "Internal Server Error"}));

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_grpc_code_maps_to_http_status() {
    let server = TestApp::start().await;

    let resp = server
        .post_json("/v1/echo", &json!({"message": "missing"}))
        .await;
    assert_status(&resp, StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 5);
    assert_eq!(body["message"], "nothing to echo");

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_handler_panic_becomes_internal_error() {
    let server = TestApp::start().await;

    let resp = server.post_json("/v1/echo", &json!({"message": "panic"})).await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"code": 500, "message": "Internal Server Error"}));

    // Both listeners survive
    let resp = server.post_json("/v1/echo", &json!({"message": "again"})).await;
    assert_status(&resp, StatusCode::OK);
    assert!(server.grpc_echo("direct").await.is_ok());

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let server = TestApp::start().await;

    let resp = server.get("/v2/unknown").await;
    assert_status(&resp, StatusCode::NOT_FOUND);

    let resp = server
        .client
        .delete(server.http_url("/v1/echo"))
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::METHOD_NOT_ALLOWED);

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let server = TestApp::start().await;

    let resp = server
        .client
        .post(server.http_url("/v1/echo"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::BAD_REQUEST);

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_authorization_is_forwarded() {
    let server = TestApp::start().await;

    let resp = server
        .client
        .post(server.http_url("/v1/echo"))
        .header("authorization", "Bearer token-1")
        .json(&json!({"message": "secure"}))
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["authorization"], "Bearer token-1");

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cors_preflight_for_docs_origin() {
    let server = TestApp::start().await;
    let origin = format!("http://localhost:{}", server.addrs.debug.port());

    let resp = server
        .client
        .request(reqwest::Method::OPTIONS, server.http_url("/v1/echo"))
        .header("origin", &origin)
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::NO_CONTENT);
    assert_header(&resp, "access-control-allow-origin", &origin);
    assert_header(&resp, "access-control-allow-credentials", "true");

    // Other origins get no CORS headers
    let resp = server
        .client
        .post(server.http_url("/v1/echo"))
        .header("origin", "http://evil.example.com")
        .json(&json!({"message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::OK);
    assert!(resp.headers().get("access-control-allow-origin").is_none());

    server.app.shutdown().await.unwrap();
}
