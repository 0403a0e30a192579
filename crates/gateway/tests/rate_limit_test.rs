use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use mikareads_core::config::{AdmissionPolicy, AppConfig};
use mikareads_core::mocks::ScriptedTransport;
use mikareads_gateway::{AppState, GatewayServer};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::ServiceExt;

fn app(policy: AdmissionPolicy, transport: Arc<ScriptedTransport>) -> Router {
    let mut config = AppConfig::default();
    config.admission.policy = policy;
    GatewayServer::new(AppState::new(config, transport)).build_router()
}

fn from_client(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_fifth_request_is_delayed() {
    let transport = Arc::new(ScriptedTransport::json(json!({"result": "ok"})));
    let app = app(AdmissionPolicy::Delay, transport.clone());

    for i in 0..4 {
        let started = Instant::now();
        let response = app
            .clone()
            .oneshot(from_client(&format!("/api/manga/m{}", i), "1.2.3.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "Request {} should pass", i);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    let started = Instant::now();
    let response = app
        .oneshot(from_client("/api/manga/m4", "1.2.3.4"))
        .await
        .unwrap();

    // The fifth request still succeeds, only later
    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(transport.call_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_fifth_request_is_rejected_under_reject_policy() {
    let transport = Arc::new(ScriptedTransport::json(json!({"result": "ok"})));
    let app = app(AdmissionPolicy::Reject, transport.clone());

    for i in 0..4 {
        let response = app
            .clone()
            .oneshot(from_client(&format!("/api/manga/m{}", i), "1.2.3.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "Request {} should pass", i);
    }

    let response = app
        .clone()
        .oneshot(from_client("/api/manga/m4", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
    // Rejected before any upstream call
    assert_eq!(transport.call_count(), 4);

    // Other clients are unaffected
    let other = app
        .clone()
        .oneshot(from_client("/api/manga/m5", "5.6.7.8"))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);

    // Admitted again once the window has slid past
    tokio::time::advance(Duration::from_millis(1001)).await;
    let later = app
        .oneshot(from_client("/api/manga/m6", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(later.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_health_is_not_throttled() {
    let transport = Arc::new(ScriptedTransport::json(json!({})));
    let app = app(AdmissionPolicy::Reject, transport);

    for i in 0..10 {
        let response = app
            .clone()
            .oneshot(from_client("/health", "1.2.3.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "Request {} should pass", i);
    }
}
