//! Router tests for the page-serving shell
//!
//! Requires the `server` feature.

#![cfg(feature = "server")]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

use pagebridge::server::{create_router, AppState, HealthResponse};
use pagebridge::{
    BridgeConfig, CorrelationService, MemoryPropertyStore, Message, PageRegistry, PageRenderer,
    PageSpec, PropertyStore,
};

struct Harness {
    service: Arc<CorrelationService>,
    properties: Arc<MemoryPropertyStore>,
    inbound: mpsc::Receiver<Message>,
    state: AppState,
}

async fn harness() -> Harness {
    let config = Arc::new(BridgeConfig::from_lookup(|key| {
        (key == "PAGEBRIDGE_STATIC_DIR").then(|| format!("{}/static", env!("CARGO_MANIFEST_DIR")))
    }));
    let service = Arc::new(CorrelationService::new());
    let properties = Arc::new(MemoryPropertyStore::new());
    let pages = Arc::new(PageRegistry::new(config.plugin_path.clone()));
    pages
        .register(PageSpec::new("status", "Request status", false))
        .await;
    pages
        .register(PageSpec::new("insert", "Insert status", true))
        .await;
    let (tx, rx) = mpsc::channel(8);

    let state = AppState {
        config,
        service: service.clone(),
        pages,
        renderer: Arc::new(PageRenderer::new().unwrap()),
        properties: properties.clone(),
        inbound: tx,
    };
    Harness {
        service,
        properties,
        inbound: rx,
        state,
    }
}

fn app_from(state: AppState, peer: [u8; 4]) -> Router {
    create_router(state).layer(MockConnectInfo(SocketAddr::from((peer, 40000))))
}

const LOCAL: [u8; 4] = [127, 0, 0, 1];
const REMOTE: [u8; 4] = [192, 168, 1, 20];

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, location, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_claim_renders_fields_and_counts() {
    let h = harness().await;
    h.service
        .ingest(
            Message::new("DataFound")
                .with_field("Identifier", "get_abc123_1")
                .with_field("DataLength", "1024"),
        )
        .unwrap();

    let (status, _, body) = get(
        app_from(h.state.clone(), REMOTE),
        "/pagebridge/status?id=abc123&kind=DataFound",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("DataLength"));
    assert!(body.contains("1024"));
    assert!(!body.contains("http-equiv"));
    assert_eq!(h.properties.get_int("claims.status").await.unwrap(), 1);

    // Claimed once: the next request waits and refreshes.
    let (status, _, body) = get(
        app_from(h.state, REMOTE),
        "/pagebridge/status?id=abc123&kind=DataFound",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Waiting"));
    assert!(body.contains("http-equiv=\"refresh\""));
}

#[tokio::test]
async fn test_claim_with_redirect_redirects() {
    let h = harness().await;
    h.service
        .ingest(
            Message::new("GetFailed")
                .with_field("Identifier", "get_q1_1")
                .with_field("RedirectUri", "/USK@key/site/2"),
        )
        .unwrap();

    let (status, location, _) = get(
        app_from(h.state, LOCAL),
        "/pagebridge/status?id=q1&kind=GetFailed",
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/USK@key/site/2"));
    assert_eq!(h.service.stats().unwrap().messages, 0);
}

#[tokio::test]
async fn test_invalid_redirect_target_renders_reply() {
    let h = harness().await;
    h.service
        .ingest(
            Message::new("GetFailed")
                .with_field("Identifier", "get_q1_1")
                .with_field("RedirectUri", "/a\nb")
                .with_field("Code", "28"),
        )
        .unwrap();

    let (status, location, body) = get(
        app_from(h.state, LOCAL),
        "/pagebridge/status?id=q1&kind=GetFailed",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(location, None);
    assert!(body.contains("GetFailed for q1"));
    assert!(body.contains("Code"));
    assert_eq!(h.service.stats().unwrap(), Default::default());
    assert_eq!(h.properties.get_int("claims.status").await.unwrap(), 1);
}

#[tokio::test]
async fn test_form_post_claims() {
    let h = harness().await;
    h.service
        .ingest(
            Message::new("PutSuccessful")
                .with_field("Identifier", "put_up1_1")
                .with_field("URI", "CHK@done"),
        )
        .unwrap();

    let response = app_from(h.state, LOCAL)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/pagebridge/insert")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("id=up1&kind=PutSuccessful"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("CHK@done"));
    assert_eq!(h.service.stats().unwrap().messages, 0);
}

#[tokio::test]
async fn test_non_integer_counter_is_left_alone() {
    let h = harness().await;
    h.properties.set("claims.status", "many").await.unwrap();
    h.service
        .ingest(Message::new("DataFound").with_field("Identifier", "get_c_1"))
        .unwrap();

    let (status, _, _) = get(
        app_from(h.state, LOCAL),
        "/pagebridge/status?id=c&kind=DataFound",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        h.properties.get("claims.status").await.unwrap().as_deref(),
        Some("many")
    );
}

#[tokio::test]
async fn test_static_assets_served_under_plugin_path() {
    let h = harness().await;
    let (status, _, body) = get(
        app_from(h.state.clone(), REMOTE),
        "/pagebridge/static/style.css",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(".infobox"));

    let (status, _, _) = get(app_from(h.state, REMOTE), "/pagebridge/static/missing.css").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_restricted_host_denied_without_claiming() {
    let h = harness().await;
    h.service
        .ingest(Message::new("PutSuccessful").with_field("Identifier", "put_up1_1"))
        .unwrap();

    let (status, _, body) = get(
        app_from(h.state, REMOTE),
        "/pagebridge/insert?id=up1&kind=PutSuccessful",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Access denied!"));
    assert!(body.contains("full access rights only"));
    assert_eq!(h.service.stats().unwrap().messages, 1);
}

#[tokio::test]
async fn test_unknown_page_is_404() {
    let h = harness().await;
    let (status, _, _) = get(app_from(h.state, LOCAL), "/pagebridge/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_message_delivery_requires_full_access() {
    let mut h = harness().await;
    let payload = r#"{"kind":"DataFound","fields":{"Identifier":"get_abc_1"}}"#;
    let request = |peer| {
        let app = app_from(h.state.clone(), peer);
        let req = Request::builder()
            .method("POST")
            .uri("/pagebridge/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        app.oneshot(req)
    };

    let response = request(REMOTE).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = request(LOCAL).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let delivered = h.inbound.recv().await.unwrap();
    assert_eq!(delivered.identifier(), Some("get_abc_1"));
    assert!(h.inbound.try_recv().is_err());
}

#[tokio::test]
async fn test_health_reports_counts() {
    let h = harness().await;
    h.service
        .ingest(
            Message::new("GetFailed")
                .with_field("Identifier", "get_h_1")
                .with_field("RedirectUri", "/x"),
        )
        .unwrap();

    let (status, _, body) = get(app_from(h.state, REMOTE), "/pagebridge/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.messages, 1);
    assert_eq!(health.redirects, 1);
}
