//! HTTP-level integration tests for the script execution webhook.
//!
//! Covers the full parse → authenticate → execute → log → respond pipeline
//! against in-memory stores.

mod common;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{
    body_json, build_test_app, build_test_app_on, build_test_app_with, post_json, post_raw,
    test_config,
};
use script_webhook::{
    models::audit::{LogStatus, UNKNOWN_IDENTIFIER},
    response::SERVER_ERROR_MESSAGE,
    services::capabilities::StaticCapabilities,
    storage::{
        KeyValueStore, MemoryKeyValueStore, MemoryTabularStore, Row, StoreError, TabularStore,
    },
};
use serde_json::json;

const WEBHOOK: &str = "/api/v1/webhook";

#[tokio::test]
async fn valid_key_runs_script() {
    let (app, state) = build_test_app(test_config(100)).await;
    let (secret, _) = state.key_store.create("reporter").await.unwrap();

    let response = post_json(
        &app,
        WEBHOOK,
        json!({ "title": "greeting", "script": "return \"hi\";", "apiKey": secret }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["result"], "hi");
    assert!(json["timestamp"].is_string());
    assert!(json["executionTimeMs"].is_u64());

    let entries = state.audit_log.recent(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].identifier, "reporter");
    assert_eq!(entries[0].title, "greeting");
    assert_eq!(entries[0].result_text, "hi");
    assert_eq!(entries[0].status, LogStatus::Success);
}

#[tokio::test]
async fn successful_call_counts_usage() {
    let (app, state) = build_test_app(test_config(100)).await;
    let (secret, _) = state.key_store.create("reporter").await.unwrap();

    for _ in 0..2 {
        let response = post_json(
            &app,
            WEBHOOK,
            json!({ "title": "t", "script": "1", "apiKey": secret }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let record = state.key_store.list().await.unwrap().remove(0);
    assert_eq!(record.usage_count, 2);
    assert!(record.last_used_at.is_some());
}

#[tokio::test]
async fn invalid_key_is_401_and_audited_once() {
    let (app, state) = build_test_app(test_config(100)).await;
    state.key_store.create("reporter").await.unwrap();

    let response = post_json(
        &app,
        WEBHOOK,
        json!({ "title": "intruder", "script": "return 1;", "apiKey": "wrong" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Invalid API key");
    assert_eq!(json["statusCode"], 401);

    let entries = state.audit_log.recent(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].identifier, UNKNOWN_IDENTIFIER);
    assert_eq!(entries[0].title, "intruder");
    assert_eq!(entries[0].status, LogStatus::Fail);

    // Nothing was counted against the real key
    assert_eq!(state.key_store.list().await.unwrap()[0].usage_count, 0);
}

#[tokio::test]
async fn missing_fields_are_listed_and_not_audited() {
    let (app, state) = build_test_app(test_config(100)).await;

    let response = post_json(&app, WEBHOOK, json!({ "script": "1" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing required fields: title, apiKey");
    assert_eq!(json["statusCode"], 400);
    assert!(state.audit_log.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_and_malformed_bodies_are_400() {
    let (app, state) = build_test_app(test_config(100)).await;

    let empty = post_raw(&app, WEBHOOK, "").await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(empty).await["error"], "Request body is empty");

    let malformed = post_raw(&app, WEBHOOK, "{\"title\":").await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json(malformed).await["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON payload")
    );

    assert_eq!(state.audit_log.stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn script_failure_is_400_with_timing_and_audited() {
    let (app, state) = build_test_app(test_config(100)).await;
    let (secret, _) = state.key_store.create("reporter").await.unwrap();

    let response = post_json(
        &app,
        WEBHOOK,
        json!({ "title": "explode", "script": "throw \"boom\";", "apiKey": secret }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Script execution failed: Error: boom");
    assert!(json["executionTimeMs"].is_u64());
    assert!(json.get("result").is_none());

    let entry = state.audit_log.recent(1).await.unwrap().remove(0);
    assert_eq!(entry.identifier, "reporter");
    assert_eq!(entry.result_text, "Error: boom");
    assert_eq!(entry.status, LogStatus::Fail);
}

#[tokio::test]
async fn oversized_script_is_rejected_and_audited_truncated() {
    let (app, state) = build_test_app(test_config(100)).await;
    let (secret, _) = state.key_store.create("reporter").await.unwrap();
    let script = "1".repeat(100_001);

    let response = post_json(
        &app,
        WEBHOOK,
        json!({ "title": "big", "script": script, "apiKey": secret }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("maximum length of 100000"));

    let entry = state.audit_log.recent(1).await.unwrap().remove(0);
    assert_eq!(entry.script_text.chars().count(), 1000);
    assert!(entry.script_text.ends_with("..."));
}

#[tokio::test]
async fn capabilities_are_visible_to_scripts() {
    let capabilities = StaticCapabilities::new().with_value("sheet", json!({ "rows": [3, 4] }));
    let (app, state) = build_test_app_with(test_config(100), Arc::new(capabilities)).await;
    let (secret, _) = state.key_store.create("reporter").await.unwrap();

    let response = post_json(
        &app,
        WEBHOOK,
        json!({ "title": "sum", "script": "sheet.rows[0] + sheet.rows[1]", "apiKey": secret }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["result"], 7);
}

#[tokio::test]
async fn audit_log_stays_capped() {
    let (app, state) = build_test_app(test_config(3)).await;
    let (secret, _) = state.key_store.create("reporter").await.unwrap();

    for n in 1..=4 {
        post_json(
            &app,
            WEBHOOK,
            json!({ "title": format!("run {n}"), "script": n.to_string(), "apiKey": secret }),
        )
        .await;
    }

    let titles: Vec<_> = state
        .audit_log
        .recent(10)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.title)
        .collect();
    assert_eq!(titles, vec!["run 4", "run 3", "run 2"]);
}

#[tokio::test]
async fn health_reports_connected_storage() {
    let (app, _) = build_test_app(test_config(100)).await;

    let request = axum::http::Request::get("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = common::send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["storage"], "connected");
}

fn disk_failure() -> StoreError {
    StoreError::Database(sqlx::Error::Protocol("disk full on audit volume".to_string()))
}

/// Audit rows that start rejecting inserts once `failing` is set.
#[derive(Default)]
struct BrokenAuditRows {
    inner: MemoryTabularStore,
    failing: AtomicBool,
}

#[async_trait]
impl TabularStore for BrokenAuditRows {
    async fn insert_row(&self, at_index: usize, row: Row) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(disk_failure());
        }
        self.inner.insert_row(at_index, row).await
    }

    async fn get_all_rows(&self) -> Result<Vec<Row>, StoreError> {
        self.inner.get_all_rows().await
    }

    async fn delete_rows(&self, from_index: usize, count: usize) -> Result<(), StoreError> {
        self.inner.delete_rows(from_index, count).await
    }

    async fn last_row_index(&self) -> Result<usize, StoreError> {
        self.inner.last_row_index().await
    }
}

/// Key values whose conditional updates never win, so usage updates exhaust
/// their retries.
#[derive(Default)]
struct AlwaysContendedKeys {
    inner: MemoryKeyValueStore,
}

#[async_trait]
impl KeyValueStore for AlwaysContendedKeys {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.inner.keys().await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StoreError> {
        match expected {
            None => self.inner.compare_and_swap(key, None, new).await,
            Some(_) => Ok(false),
        }
    }
}

async fn assert_generic_server_error(response: axum::response::Response) {
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["statusCode"], 500);
    assert_eq!(json["error"], SERVER_ERROR_MESSAGE);
    assert!(json.get("result").is_none());

    let text = json.to_string();
    assert!(!text.contains("disk full"));
    assert!(!text.contains("did not converge"));
}

#[tokio::test]
async fn failed_audit_write_is_500_without_leaking_the_cause() {
    let rows = Arc::new(BrokenAuditRows::default());
    let (app, state) = build_test_app_on(
        test_config(100),
        Arc::new(MemoryKeyValueStore::new()),
        rows.clone(),
    )
    .await;
    let (secret, _) = state.key_store.create("reporter").await.unwrap();
    rows.failing.store(true, Ordering::SeqCst);

    let response = post_json(
        &app,
        WEBHOOK,
        json!({ "title": "t", "script": "1 + 1", "apiKey": secret }),
    )
    .await;
    assert_generic_server_error(response).await;

    // No extra entry is written for the 500 itself
    rows.failing.store(false, Ordering::SeqCst);
    assert!(state.audit_log.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_audit_write_for_bad_key_is_500() {
    let rows = Arc::new(BrokenAuditRows::default());
    let (app, state) = build_test_app_on(
        test_config(100),
        Arc::new(MemoryKeyValueStore::new()),
        rows.clone(),
    )
    .await;
    rows.failing.store(true, Ordering::SeqCst);

    let response = post_json(
        &app,
        WEBHOOK,
        json!({ "title": "t", "script": "1", "apiKey": "wrong" }),
    )
    .await;
    assert_generic_server_error(response).await;

    rows.failing.store(false, Ordering::SeqCst);
    assert!(state.audit_log.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn usage_update_contention_is_500() {
    let (app, state) = build_test_app_on(
        test_config(100),
        Arc::new(AlwaysContendedKeys::default()),
        Arc::new(MemoryTabularStore::new()),
    )
    .await;
    let (secret, _) = state.key_store.create("reporter").await.unwrap();

    let response = post_json(
        &app,
        WEBHOOK,
        json!({ "title": "t", "script": "1", "apiKey": secret }),
    )
    .await;
    assert_generic_server_error(response).await;

    // The script never ran, so nothing was audited
    assert!(state.audit_log.recent(10).await.unwrap().is_empty());
}
