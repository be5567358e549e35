//! Debug surface: probes, metrics exposition and docs.

use reqwest::StatusCode;

use crate::helpers::{assert_header, assert_status, test_config, TestApp};

#[tokio::test]
async fn test_live_and_ready_without_checks() {
    let server = TestApp::start().await;

    let resp = server.debug_get("/live").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "cache-control", "no-cache, no-store, must-revalidate");
    assert_eq!(resp.text().await.unwrap().trim(), "{}");

    let resp = server.debug_get("/ready").await;
    assert_status(&resp, StatusCode::OK);

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ready_full_lists_every_check() {
    let server = TestApp::start_with(test_config(), |app| {
        app.health()
            .add_liveness_check("goroutines", || async { Ok::<_, String>(()) });
        app.health()
            .add_readiness_check("db", || async { Err::<(), _>("connection refused") });
    })
    .await;

    // Liveness ignores readiness-only checks
    let resp = server.debug_get("/live?full=1").await;
    assert_status(&resp, StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["goroutines"], "OK");
    assert!(body.get("db").is_none());

    let resp = server.debug_get("/ready?full=1").await;
    assert_status(&resp, StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["goroutines"], "OK");
    assert_eq!(body["db"], "connection refused");

    // Without `full` the body stays empty
    let resp = server.debug_get("/ready").await;
    assert_status(&resp, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.text().await.unwrap().trim(), "{}");

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_panicking_check_is_isolated() {
    let server = TestApp::start_with(test_config(), |app| {
        app.health()
            .add_readiness_check("cache", || async { Ok::<_, String>(()) });
        app.health().add_readiness_check("flaky", || async {
            if true {
                panic!("nil map");
            }
            Ok::<_, String>(())
        });
    })
    .await;

    let resp = server.debug_get("/ready?full=1").await;
    assert_status(&resp, StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["cache"], "OK");
    assert_eq!(body["flaky"], "checker panic recovered: nil map");

    // The debug surface keeps serving after the panic
    let resp = server.debug_get("/live").await;
    assert_status(&resp, StatusCode::OK);

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_probe_method_and_unknown_path() {
    let server = TestApp::start().await;

    let resp = server
        .client
        .post(server.debug_url("/ready"))
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::METHOD_NOT_ALLOWED);

    let resp = server.debug_get("/nope").await;
    assert_status(&resp, StatusCode::NOT_FOUND);

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_metrics_exposition() {
    let server = TestApp::start().await;

    let resp = server.debug_get("/metrics").await;
    assert_status(&resp, StatusCode::OK);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("itest_connections_active"));

    server.app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_docs_index_and_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("echo.swagger.json"), r#"{"swagger":"2.0"}"#).unwrap();

    let mut config = test_config();
    config.server.docs_dir = dir.path().to_path_buf();
    let server = TestApp::start_with(config, |_| {}).await;

    let resp = server
        .client
        .get(server.debug_url("/docs"))
        .send()
        .await
        .unwrap();
    // reqwest follows the redirect to /docs/
    assert_status(&resp, StatusCode::OK);
    let html = resp.text().await.unwrap();
    assert!(html.contains("swagger-ui"));
    assert!(html.contains(&format!("localhost:{}", server.addrs.http.port())));

    let resp = server.debug_get("/docs/echo.swagger.json").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "application/json; charset=utf-8");

    let resp = server.debug_get("/docs/missing.json").await;
    assert_status(&resp, StatusCode::NOT_FOUND);

    server.app.shutdown().await.unwrap();
}
