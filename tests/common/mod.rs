#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, Response, header::{AUTHORIZATION, CONTENT_TYPE}},
};
use script_webhook::{
    build_router,
    config::Config,
    services::capabilities::{CapabilityProvider, NoCapabilities},
    state::AppState,
    storage::{KeyValueStore, MemoryKeyValueStore, MemoryTabularStore, TabularStore},
};
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Test configuration: in-memory storage, admin routes enabled.
pub fn test_config(audit_max_entries: usize) -> Config {
    Config {
        audit_max_entries,
        admin_token: Some(ADMIN_TOKEN.to_string()),
        ..Config::in_memory()
    }
}

/// Build the full application over fresh in-memory stores.
///
/// Returns the shared state too, so tests can seed keys and inspect the
/// audit log directly.
pub async fn build_test_app(config: Config) -> (Router, AppState) {
    build_test_app_with(config, Arc::new(NoCapabilities)).await
}

pub async fn build_test_app_with(
    config: Config,
    capabilities: Arc<dyn CapabilityProvider>,
) -> (Router, AppState) {
    build_app(
        config,
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(MemoryTabularStore::new()),
        capabilities,
    )
    .await
}

/// Build the application over caller-supplied stores, e.g. failing ones.
pub async fn build_test_app_on(
    config: Config,
    key_values: Arc<dyn KeyValueStore>,
    rows: Arc<dyn TabularStore>,
) -> (Router, AppState) {
    build_app(config, key_values, rows, Arc::new(NoCapabilities)).await
}

async fn build_app(
    config: Config,
    key_values: Arc<dyn KeyValueStore>,
    rows: Arc<dyn TabularStore>,
    capabilities: Arc<dyn CapabilityProvider>,
) -> (Router, AppState) {
    let state = AppState::build(config, key_values, rows, capabilities)
        .await
        .expect("state should build");

    (build_router(state.clone()), state)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("request should complete")
}

pub async fn post_raw(app: &Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn admin_request(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    admin_raw(app, method, uri, body).await
}

pub async fn admin_raw(app: &Router, method: Method, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
        .header(CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
