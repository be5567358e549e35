//! Request metrics across both transports.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;

use gantry::observability::{StatusBucket, PROTOCOL_GRPC, PROTOCOL_HTTP};

use crate::helpers::{assert_status, grpc_echo_with_metadata, sample_value, test_config, TestApp};

/// gRPC samples are recorded when the response body ends, which can race
/// the client seeing the trailers.
async fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..50 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test]
async fn test_gateway_call_counted_once() {
    let server = TestApp::start().await;
    let metrics = server.app.metrics().clone();

    let resp = server.post_json("/v1/echo", &json!({"message": "hello"})).await;
    assert_status(&resp, StatusCode::OK);

    assert_eq!(
        metrics.requests_count("HTTP POST: /v1/echo", PROTOCOL_HTTP, StatusBucket::Ok),
        1
    );
    // The loopback gRPC hop is not counted again
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(metrics.protocol_total(PROTOCOL_GRPC), 0);

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_route_pattern_used_as_label() {
    let server = TestApp::start().await;
    let metrics = server.app.metrics().clone();

    server.get("/v1/echo/first").await;
    server.get("/v1/echo/second").await;

    assert_eq!(
        metrics.requests_count("HTTP GET: /v1/echo/{message}", PROTOCOL_HTTP, StatusBucket::Ok),
        2
    );

    let text = server.metrics_text().await;
    let value = sample_value(
        &text,
        "itest_requests_total",
        &[("handler", "HTTP GET: /v1/echo/{message}"), ("protocol", "http")],
    );
    assert_eq!(value, Some(2.0));

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_status_buckets() {
    let server = TestApp::start().await;
    let metrics = server.app.metrics().clone();

    server.post_json("/v1/echo", &json!({"message": "hi"})).await;
    server.post_json("/v1/echo", &json!({"message": "internal"})).await;
    server.get("/v2/unknown").await;

    let handler = "HTTP POST: /v1/echo";
    assert_eq!(
        metrics.requests_count(handler, PROTOCOL_HTTP, StatusBucket::ClientError),
        1
    );
    assert_eq!(
        metrics.requests_count(handler, PROTOCOL_HTTP, StatusBucket::InternalError),
        1
    );
    assert_eq!(
        metrics.requests_count("HTTP GET: /v2/unknown", PROTOCOL_HTTP, StatusBucket::ClientError),
        1
    );

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_direct_grpc_calls_counted() {
    let server = TestApp::start().await;
    let metrics = server.app.metrics().clone();

    let reply = server.grpc_echo("direct").await.unwrap();
    assert_eq!(reply.message, "direct");
    assert!(!reply.from_gateway);

    let status = server.grpc_echo("no").await.unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);

    let status = server.grpc_echo("panic").await.unwrap_err();
    assert_eq!(status.code(), tonic::Code::Internal);

    assert!(
        wait_for(|| metrics.requests_count("Echo", PROTOCOL_GRPC, StatusBucket::Ok) == 1).await
    );
    assert!(
        wait_for(|| metrics.requests_count("Echo", PROTOCOL_GRPC, StatusBucket::ClientError) == 1)
            .await
    );
    assert!(
        wait_for(
            || metrics.requests_count("Echo", PROTOCOL_GRPC, StatusBucket::InternalError) == 1
        )
        .await
    );
    assert_eq!(metrics.protocol_total(PROTOCOL_HTTP), 0);

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_interceptor_outcomes_are_counted() {
    let server = TestApp::start_with(test_config(), |app| {
        app.use_interceptor(|req| {
            if req.metadata().contains_key("x-boom") {
                panic!("interceptor exploded");
            }
            if req.metadata().contains_key("x-deny") {
                return Err(tonic::Status::permission_denied("denied by interceptor"));
            }
            Ok(req)
        });
    })
    .await;
    let metrics = server.app.metrics().clone();
    let rpc = server.addrs.rpc;

    let reply = server.grpc_echo("allowed").await.unwrap();
    assert_eq!(reply.message, "allowed");

    let status = grpc_echo_with_metadata(rpc, "hello", &[("x-deny", "1")])
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::PermissionDenied);
    assert_eq!(status.message(), "denied by interceptor");

    let status = grpc_echo_with_metadata(rpc, "hello", &[("x-boom", "1")])
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Internal);

    assert!(
        wait_for(|| metrics.requests_count("Echo", PROTOCOL_GRPC, StatusBucket::Ok) == 1).await
    );
    assert!(
        wait_for(|| metrics.requests_count("Echo", PROTOCOL_GRPC, StatusBucket::ClientError) == 1)
            .await
    );
    assert!(
        wait_for(
            || metrics.requests_count("Echo", PROTOCOL_GRPC, StatusBucket::InternalError) == 1
        )
        .await
    );

    // The listener survives the panic
    let resp = server.post_json("/v1/echo", &json!({"message": "still up"})).await;
    assert_status(&resp, StatusCode::OK);

    server.app.shutdown().await.unwrap();
}
