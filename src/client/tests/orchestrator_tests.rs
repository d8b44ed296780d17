//! Integration tests for the request orchestrator
//!
//! Scoring endpoints and the relay are stood in for by wiremock servers; the
//! end-to-end tests run the real relay router on an ephemeral port.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ml_tester_client::storage::{KeyValueStore, KEY_HISTORY, KEY_USE_PROXY};
use ml_tester_client::{
    JsonFileStore, MemoryStore, Orchestrator, ScoringInput, Transport, FAILURE_PREFIX,
    HISTORY_LIMIT,
};
use ml_tester_shared::{EndpointDescriptor, FeatureName, ImageRef, VisionDescriptor};

async fn session(store: Arc<dyn KeyValueStore>, relay_url: &str) -> Orchestrator {
    let transport = Transport::new(relay_url).expect("Failed to create transport");
    Orchestrator::load(store, transport).await
}

fn scoring_endpoint(url: String) -> EndpointDescriptor {
    EndpointDescriptor {
        url,
        api_key: "abc".to_string(),
        auth_header_name: "Authorization".to_string(),
    }
}

/// Serve the relay router on an ephemeral port and return its relay URL
async fn spawn_relay() -> String {
    let state = ml_tester_relay::AppState::new(ml_tester_relay::Config::default())
        .expect("Failed to create relay state");
    let app = ml_tester_relay::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/api/proxy", addr)
}

// ============================================================================
// DIRECT MODE
// ============================================================================

#[tokio::test]
async fn test_direct_scoring_send_records_history() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/score"))
        .and(header("Authorization", "Bearer abc"))
        .and(body_string("{\"a\":1}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 42 })))
        .expect(1)
        .mount(&remote)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store.clone(), "http://127.0.0.1:1/api/proxy").await;
    orchestrator.set_use_proxy(false).await;
    orchestrator
        .set_endpoint(scoring_endpoint(format!("{}/score", remote.uri())))
        .await;

    let outcome = orchestrator
        .send_scoring(ScoringInput::json("{\"a\":1}"))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.envelope.data, json!({ "result": 42 }));
    assert_eq!(outcome.envelope.status_code, 200);

    let entry = orchestrator.history().iter().next().unwrap();
    assert_eq!(entry.request_body, "{\"a\":1}");
    assert_eq!(entry.response_body, "{\"result\":42}");
    assert_eq!(entry.status_code, 200);
    assert!(!entry.is_image);

    assert_eq!(
        store.get_raw(KEY_USE_PROXY).await.unwrap().as_deref(),
        Some("false")
    );
}

#[tokio::test]
async fn test_direct_unreachable_endpoint_sets_cors_hint() {
    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store, "http://127.0.0.1:1/api/proxy").await;
    orchestrator.set_use_proxy(false).await;
    orchestrator
        .set_endpoint(scoring_endpoint("http://127.0.0.1:1/score".to_string()))
        .await;

    let outcome = orchestrator
        .send_scoring(ScoringInput::json("{}"))
        .await
        .unwrap();

    assert!(outcome.cors_hint);
    assert_eq!(outcome.envelope.status_code, 0);
    let message = outcome.error.unwrap();
    assert!(message.starts_with(FAILURE_PREFIX));
    assert!(message.contains("CORS"));
    assert_eq!(orchestrator.history().len(), 1);
}

#[tokio::test]
async fn test_direct_plain_text_failure_keeps_remote_status() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/score"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(1)
        .mount(&remote)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store, "http://127.0.0.1:1/api/proxy").await;
    orchestrator.set_use_proxy(false).await;
    orchestrator
        .set_endpoint(scoring_endpoint(format!("{}/score", remote.uri())))
        .await;

    let outcome = orchestrator
        .send_scoring(ScoringInput::json("{}"))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert!(!outcome.cors_hint);
    assert_eq!(outcome.envelope.status_code, 503);
    assert_eq!(outcome.envelope.data, json!("Service Unavailable"));

    let entry = orchestrator.history().iter().next().unwrap();
    assert_eq!(entry.status_code, 503);
}

#[tokio::test]
async fn test_history_keeps_fifty_newest() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&remote)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store.clone(), "http://127.0.0.1:1/api/proxy").await;
    orchestrator.set_use_proxy(false).await;
    orchestrator.set_endpoint(scoring_endpoint(remote.uri())).await;

    for i in 0..=HISTORY_LIMIT {
        orchestrator
            .send_scoring(ScoringInput::json(format!("{{\"n\":{}}}", i)))
            .await
            .unwrap();
    }

    assert_eq!(orchestrator.history().len(), HISTORY_LIMIT);
    assert_eq!(
        orchestrator.history().iter().next().unwrap().request_body,
        "{\"n\":50}"
    );
    assert!(orchestrator
        .history()
        .iter()
        .all(|entry| entry.request_body != "{\"n\":0}"));

    let stored: Vec<Value> =
        serde_json::from_str(&store.get_raw(KEY_HISTORY).await.unwrap().unwrap()).unwrap();
    assert_eq!(stored.len(), HISTORY_LIMIT);
}

// ============================================================================
// PROXY MODE
// ============================================================================

#[tokio::test]
async fn test_proxy_mode_posts_relay_request() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/proxy"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "label": "cat" }, "status": 200 })),
        )
        .expect(1)
        .mount(&relay)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store, &format!("{}/api/proxy", relay.uri())).await;
    orchestrator
        .set_endpoint(scoring_endpoint("https://x/score".to_string()))
        .await;

    let outcome = orchestrator
        .send_scoring(ScoringInput::image(
            "{\"input_data\":{}}",
            "data:image/png;base64,AAAA",
        ))
        .await
        .unwrap();
    assert_eq!(outcome.envelope.data, json!({ "label": "cat" }));

    let requests = relay.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        sent,
        json!({
            "endpoint": "https://x/score",
            "apiKey": "abc",
            "keyHeaderName": "Authorization",
            "requestBody": "{\"input_data\":{}}"
        })
    );

    let entry = orchestrator.history().iter().next().unwrap();
    assert!(entry.is_image);
    assert_eq!(
        entry.image_preview.as_deref(),
        Some("data:image/png;base64,AAAA")
    );
}

#[tokio::test]
async fn test_relay_validation_error_has_status_zero() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Missing endpoint or API key",
            "kind": "missing_credentials"
        })))
        .mount(&relay)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store, &relay.uri()).await;
    orchestrator
        .set_endpoint(scoring_endpoint("https://x/score".to_string()))
        .await;

    let outcome = orchestrator
        .send_scoring(ScoringInput::json("{}"))
        .await
        .unwrap();

    assert_eq!(outcome.envelope.status_code, 0);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Failed to send request. Missing endpoint or API key")
    );
    assert!(!outcome.cors_hint);
}

// ============================================================================
// VISION
// ============================================================================

fn vision_config(endpoint: String) -> VisionDescriptor {
    VisionDescriptor {
        endpoint,
        api_key: "vision-key".to_string(),
        features: [FeatureName::Caption, FeatureName::SmartCrops].into_iter().collect(),
        crop_ratios: vec![1.0, 1.78],
    }
}

#[tokio::test]
async fn test_analyze_goes_through_relay_without_history() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "captionResult": {} }, "status": 200 })),
        )
        .expect(1)
        .mount(&relay)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store, &relay.uri()).await;
    orchestrator.set_use_proxy(false).await;
    orchestrator
        .set_vision(vision_config("https://vision.example".to_string()))
        .await;

    let outcome = orchestrator
        .analyze_image(Some(ImageRef::Url("https://img.example/a.jpg".to_string())))
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert!(orchestrator.history().is_empty());

    let requests = relay.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["serviceType"], "vision");
    assert_eq!(sent["visionEndpoint"], "https://vision.example");
    assert_eq!(sent["visionFeatures"], json!(["caption", "smartCrops"]));
    assert_eq!(sent["smartCropRatios"], json!([1.0, 1.78]));
    assert_eq!(sent["imageUrl"], "https://img.example/a.jpg");
}

#[tokio::test]
async fn test_remote_vision_failure_keeps_remote_status() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "Access denied due to invalid subscription key.",
            "kind": "remote_error",
            "details": { "error": { "code": "401" } }
        })))
        .mount(&relay)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store, &relay.uri()).await;
    orchestrator
        .set_vision(vision_config("https://vision.example".to_string()))
        .await;

    let outcome = orchestrator
        .analyze_image(Some(ImageRef::InlineBase64("iVBORw==".to_string())))
        .await
        .unwrap();

    assert_eq!(outcome.envelope.status_code, 401);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Failed to send request. Access denied due to invalid subscription key.")
    );
}

// ============================================================================
// END TO END
// ============================================================================

#[tokio::test]
async fn test_end_to_end_scoring_through_relay() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/score"))
        .and(header("Authorization", "Bearer abc"))
        .and(body_string("{\"input_data\":{\"columns\":[\"a\"],\"data\":[[1]]}}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [0.9] })))
        .expect(1)
        .mount(&remote)
        .await;

    let relay_url = spawn_relay().await;
    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store, &relay_url).await;
    orchestrator
        .set_endpoint(scoring_endpoint(format!("{}/score", remote.uri())))
        .await;

    let outcome = orchestrator
        .send_scoring(ScoringInput::json(
            "{\"input_data\":{\"columns\":[\"a\"],\"data\":[[1]]}}",
        ))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.envelope.data, json!({ "result": [0.9] }));
    assert_eq!(outcome.envelope.status_code, 200);
}

#[tokio::test]
async fn test_end_to_end_vision_error_through_relay() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/computervision/imageanalysis:analyze"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": "InvalidImageUrl", "message": "Image URL is badly formatted." }
        })))
        .mount(&remote)
        .await;

    let relay_url = spawn_relay().await;
    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = session(store, &relay_url).await;
    orchestrator.set_vision(vision_config(remote.uri())).await;

    let outcome = orchestrator
        .analyze_image(Some(ImageRef::Url("not-a-url".to_string())))
        .await
        .unwrap();

    assert_eq!(outcome.envelope.status_code, 400);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Failed to send request. Image URL is badly formatted.")
    );
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[tokio::test]
async fn test_session_survives_reload_from_files() {
    let remote = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&remote)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(dir.path()));

    {
        let mut orchestrator = session(store.clone(), "http://127.0.0.1:1/api/proxy").await;
        orchestrator.set_use_proxy(false).await;
        orchestrator.set_endpoint(scoring_endpoint(remote.uri())).await;
        orchestrator
            .send_scoring(ScoringInput::json("{}"))
            .await
            .unwrap();
    }

    let mut reloaded = session(store, "http://127.0.0.1:1/api/proxy").await;
    assert!(!reloaded.use_proxy());
    assert_eq!(reloaded.endpoint().url, remote.uri());
    assert_eq!(reloaded.history().len(), 1);

    reloaded.clear_history().await;
    let on_disk = std::fs::read_to_string(dir.path().join("ml-tester-history.json")).unwrap();
    assert_eq!(on_disk, "[]");
}
