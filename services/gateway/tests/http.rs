mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::Harness;
use realtime_gateway::config::GatewayConfig;
use realtime_gateway::protocol::OutboundKind;
use realtime_gateway::router::create_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn call(harness: &Harness, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_router(harness.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_sessions_and_rooms() {
    let harness = Harness::new();
    let _bob = harness.connect("bob").await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = call(&harness, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 1);
    // user-bob and vendor-dashboard-bob
    assert_eq!(body["rooms"], 2);
}

#[tokio::test]
async fn vendor_order_endpoint_delivers_to_online_vendor() {
    let harness = Harness::new();
    let mut bob = harness.connect("bob").await;

    let (status, body) = call(
        &harness,
        post(
            "/internal/notify/vendor-order",
            json!({
                "vendorId": "bob",
                "orderId": "o9",
                "customerId": "alice",
                "itemSummary": "1x Mee Goreng",
                "total": 8.5
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["delivered"], 2);
    let kinds = bob.kinds();
    assert_eq!(
        kinds,
        vec![OutboundKind::NewOrderNotification, OutboundKind::DashboardUpdate]
    );
}

#[tokio::test]
async fn order_status_endpoint_notifies_customer() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;

    let (status, body) = call(
        &harness,
        post(
            "/internal/notify/order-status",
            json!({"orderId": "o1", "customerId": "alice", "status": "confirmed"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["delivered"], 1);
    let events = alice.events();
    assert_eq!(events[0].event, OutboundKind::NewNotification);
    assert_eq!(events[0].data["type"], "order-update");
}

#[tokio::test]
async fn notify_before_start_is_service_unavailable() {
    let harness = Harness::from_config(&GatewayConfig::default());

    let (status, body) = call(
        &harness,
        post(
            "/internal/notify/notification",
            json!({"userId": "alice", "message": "hello", "type": "info"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn malformed_notify_body_is_rejected() {
    let harness = Harness::new();
    let (status, _) = call(
        &harness,
        post("/internal/notify/balance", json!({"userId": "alice"})),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn evict_endpoint_forces_session_out() {
    let harness = Harness::new();
    let mut alice = harness.connect("alice").await;

    let (status, body) = call(
        &harness,
        post("/internal/sessions/alice/evict?reason=policy", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["evicted"], true);

    let events = alice.events();
    assert_eq!(events[0].event, OutboundKind::ForceDisconnect);
    assert_eq!(events[0].data["reason"], "policy");

    let (status, body) = call(
        &harness,
        post("/internal/sessions/alice/evict", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}
