//! Startup and shutdown orchestration against live listeners.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde_json::json;

use gantry::{App, LifecycleError, LifecycleState, StartupError};

use crate::helpers::{assert_status, test_config, TestApp};

#[tokio::test]
async fn test_in_flight_request_completes_during_shutdown() {
    let server = TestApp::start().await;

    let request = server
        .client
        .post(server.http_url("/v1/echo"))
        .json(&json!({"message": "slow:300"}))
        .send();
    let shutdown = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        server.app.shutdown().await
    };

    let (resp, report) = tokio::join!(request, shutdown);
    let resp = resp.expect("in-flight request dropped");
    assert_status(&resp, StatusCode::OK);

    let report = report.unwrap();
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(server.app.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn test_probes_served_while_draining() {
    let mut config = test_config();
    config.lifecycle.drain_delay = Duration::from_millis(400);
    let server = TestApp::start_with(config, |_| {}).await;

    let probe = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.app.state(), LifecycleState::Draining);
        let ready = server.debug_get("/ready").await;
        let echo = server.post_json("/v1/echo", &json!({"message": "still here"})).await;
        (ready.status(), echo.status())
    };

    let (report, (ready, echo)) = tokio::join!(server.app.shutdown(), probe);
    assert!(report.unwrap().is_clean());
    assert_eq!(ready, StatusCode::OK);
    assert_eq!(echo, StatusCode::OK);
}

#[tokio::test]
async fn test_forced_stop_after_grace_timeout() {
    let mut config = test_config();
    config.lifecycle.grace_timeout = Duration::from_millis(200);
    let server = TestApp::start_with(config, |_| {}).await;

    let request = server
        .client
        .post(server.http_url("/v1/echo"))
        .json(&json!({"message": "slow:5000"}))
        .send();
    let shutdown = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let started = Instant::now();
        (server.app.shutdown().await, started.elapsed())
    };

    let (resp, (report, elapsed)) = tokio::join!(request, shutdown);
    assert!(resp.is_err(), "request should be cut by the forced stop");

    let report = report.unwrap();
    assert!(report.timed_out().contains(&"gateway"), "{:?}", report.errors);
    assert!(elapsed < Duration::from_secs(4));
    assert_eq!(server.app.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn test_forced_stop_cuts_grpc_calls() {
    let mut config = test_config();
    config.lifecycle.grace_timeout = Duration::from_millis(200);
    let server = TestApp::start_with(config, |_| {}).await;

    let call = async {
        let started = Instant::now();
        (server.grpc_echo("slow:5000").await, started.elapsed())
    };
    let shutdown = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let started = Instant::now();
        (server.app.shutdown().await, started.elapsed())
    };

    let ((reply, call_elapsed), (report, elapsed)) = tokio::join!(call, shutdown);
    assert!(reply.is_err(), "call should be cut by the forced stop");
    assert!(call_elapsed < Duration::from_secs(4));

    let report = report.unwrap();
    assert!(report.timed_out().contains(&"grpc"), "{:?}", report.errors);
    assert!(elapsed < Duration::from_secs(4));
    assert_eq!(server.app.state(), LifecycleState::Terminated);
}

#[tokio::test]
async fn test_second_shutdown_is_rejected() {
    let server = TestApp::start().await;

    assert!(server.app.shutdown().await.is_ok());
    assert!(matches!(
        server.app.shutdown().await,
        Err(LifecycleError::AlreadyTerminated)
    ));
}

#[tokio::test]
async fn test_closers_run_after_surfaces() {
    let server = TestApp::start().await;
    let http = server.addrs.http;
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&seen);
    server.app.add_closer("db", move || async move {
        // The gateway is already closed when resources are released
        let refused = tokio::net::TcpStream::connect(http).await.is_err();
        log.lock().unwrap().push(("db", refused));
        Ok::<_, String>(())
    });
    server
        .app
        .add_closer("queue", || async { Err::<(), _>("flush failed") });

    let report = server.app.shutdown().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![("db", true)]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].hook(), "queue");
}

#[tokio::test]
async fn test_bind_failure_is_fatal() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = test_config();
    config.server.endpoints.http = taken.local_addr().unwrap();

    let mut app = App::new(config).unwrap();
    let err = app.start().await.unwrap_err();
    assert!(
        matches!(
            err,
            LifecycleError::Startup(StartupError::Bind { surface: "gateway", .. })
        ),
        "{}",
        err
    );
    assert!(app.bound_addrs().is_none());
}

#[tokio::test]
async fn test_run_until_signal() {
    let mut app = App::new(test_config()).unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let mut state = app.subscribe();
    let trigger = async move {
        state
            .wait_for(|s| *s == LifecycleState::Running)
            .await
            .unwrap();
        tx.send(()).unwrap();
    };

    let (report, _) = tokio::join!(
        app.run_until(async {
            let _ = rx.await;
        }),
        trigger
    );
    assert!(report.unwrap().is_clean());
    assert_eq!(app.state(), LifecycleState::Terminated);
}
