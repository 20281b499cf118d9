// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router tests: callbacks, handshakes, health and metrics over a stub endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tokio::sync::Notify;
use tower::ServiceExt;

use courier_core::signature::{self, SignatureAlgorithm};
use courier_core::{
    AdapterType, ChallengeQuery, ConnectorType, CourierError, HealthStatus, PluginAdapter,
    WebhookEndpoint,
};
use courier_gateway::{GatewayState, HealthState, router};

const SECRET: &str = "gateway-secret";

#[derive(Default)]
struct StubEndpoint {
    bodies: Mutex<Vec<Vec<u8>>>,
    processed: Notify,
    /// Returned by the next `process` call instead of success.
    failure: Mutex<Option<CourierError>>,
}

#[async_trait]
impl WebhookEndpoint for StubEndpoint {
    fn path(&self) -> &str {
        "/hooks/stub"
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Messenger
    }

    fn signature_algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Sha1
    }

    fn verify_signature(&self, header: Option<&str>, body: &[u8]) -> bool {
        header.is_some_and(|h| signature::verify(SignatureAlgorithm::Sha1, SECRET, body, h))
    }

    fn verify_challenge(&self, query: &ChallengeQuery) -> Option<String> {
        (query.verify_token.as_deref() == Some("verify-me"))
            .then(|| query.challenge.clone())
            .flatten()
    }

    async fn process(&self, body: &[u8]) -> Result<usize, CourierError> {
        if let Some(e) = self.failure.lock().unwrap().take() {
            return Err(e);
        }
        self.bodies.lock().unwrap().push(body.to_vec());
        self.processed.notify_waiters();
        Ok(1)
    }
}

struct StaticAdapter(&'static str, HealthStatus);

#[async_trait]
impl PluginAdapter for StaticAdapter {
    fn name(&self) -> &str {
        self.0
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Connector
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(self.1.clone())
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

fn state(
    endpoint: Arc<StubEndpoint>,
    adapters: Vec<Arc<dyn PluginAdapter>>,
    metrics: bool,
) -> GatewayState {
    let render: Option<Arc<dyn Fn() -> String + Send + Sync>> = if metrics {
        Some(Arc::new(|| "courier_webhook_events_total 1\n".to_string()))
    } else {
        None
    };
    GatewayState::new(
        vec![endpoint],
        2,
        HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render: render,
            adapters,
        },
    )
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ---- Test 1: a signed callback is acknowledged and processed ----
#[tokio::test]
async fn signed_callback_processed() {
    let endpoint = Arc::new(StubEndpoint::default());
    let app = router(state(Arc::clone(&endpoint), Vec::new(), false));

    let body = br#"{"object":"page","entry":[]}"#.to_vec();
    let header = signature::sign(SignatureAlgorithm::Sha1, SECRET, &body);
    let processed = endpoint.processed.notified();
    let response = app
        .oneshot(
            Request::post("/hooks/stub")
                .header("x-hub-signature", header)
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::timeout(Duration::from_secs(5), processed)
        .await
        .expect("body processed");
    assert_eq!(endpoint.bodies.lock().unwrap().as_slice(), &[body]);
}

// ---- Test 2: a mis-signed callback still gets 200 but is dropped ----
#[tokio::test]
#[tracing_test::traced_test]
async fn bad_signature_dropped_with_200() {
    let endpoint = Arc::new(StubEndpoint::default());
    let app = router(state(Arc::clone(&endpoint), Vec::new(), false));

    let response = app
        .oneshot(
            Request::post("/hooks/stub")
                .header("x-hub-signature", "sha1=00")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(endpoint.bodies.lock().unwrap().is_empty());
    assert!(logs_contain("webhook signature mismatch"));
}

// ---- Test 3: handshake echoes the challenge or the fixed rejection ----
#[tokio::test]
async fn handshake_responses() {
    let endpoint = Arc::new(StubEndpoint::default());
    let app = router(state(endpoint, Vec::new(), false));

    let ok = app
        .clone()
        .oneshot(
            Request::get("/hooks/stub?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1234")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(body_text(ok).await, "1234");

    let rejected = app
        .oneshot(
            Request::get("/hooks/stub?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1234")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::OK);
    assert_eq!(body_text(rejected).await, "Invalid verify token");
}

// ---- Test 4: health reports the worst adapter status ----
#[tokio::test]
async fn health_aggregates_adapters() {
    let endpoint = Arc::new(StubEndpoint::default());
    let adapters: Vec<Arc<dyn PluginAdapter>> = vec![
        Arc::new(StaticAdapter("c1", HealthStatus::Healthy)),
        Arc::new(StaticAdapter(
            "c2",
            HealthStatus::Degraded("status page unreachable".into()),
        )),
    ];
    let app = router(state(Arc::clone(&endpoint), adapters, false));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["adapters"][1]["name"], "c2");

    let down: Vec<Arc<dyn PluginAdapter>> =
        vec![Arc::new(StaticAdapter("c3", HealthStatus::Unhealthy("down".into())))];
    let response = router(state(endpoint, down, false))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ---- Test 5: metrics are rendered when enabled ----
#[tokio::test]
async fn metrics_endpoint() {
    let endpoint = Arc::new(StubEndpoint::default());
    let enabled = router(state(Arc::clone(&endpoint), Vec::new(), true))
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(enabled.status(), StatusCode::OK);
    assert!(body_text(enabled).await.contains("courier_webhook_events_total"));

    let disabled = router(state(endpoint, Vec::new(), false))
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(disabled.status(), StatusCode::NOT_FOUND);
}

// ---- Test 6: unknown paths are not served ----
#[tokio::test]
async fn unknown_path_404() {
    let app = router(state(Arc::new(StubEndpoint::default()), Vec::new(), false));
    let response = app
        .oneshot(Request::post("/hooks/other").body(Body::from("{}")).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---- Test 7: an unknown connector is logged as a configuration error ----
#[tokio::test]
#[tracing_test::traced_test]
async fn unknown_connector_logged_at_error() {
    let endpoint = Arc::new(StubEndpoint::default());
    *endpoint.failure.lock().unwrap() = Some(CourierError::NotFound {
        kind: "connector",
        id: "wa1".into(),
    });
    let app = router(state(Arc::clone(&endpoint), Vec::new(), false));

    let body = b"{}".to_vec();
    let header = signature::sign(SignatureAlgorithm::Sha1, SECRET, &body);
    let response = app
        .oneshot(
            Request::post("/hooks/stub")
                .header("x-hub-signature", header)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for _ in 0..100 {
        if logs_contain("callback rejected") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    logs_assert(|lines: &[&str]| {
        lines
            .iter()
            .any(|l| l.contains("ERROR") && l.contains("connector wa1 not found"))
            .then_some(())
            .ok_or_else(|| "no error-level rejection logged".to_string())
    });
}
