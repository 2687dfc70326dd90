//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Integration tests for sync-server startup wiring.
//!
//! Validates: Config loading from environment, AppState construction, and
//! router health check response. These tests target in-memory mode — run
//! with `--no-default-features`.
//!
//! NOTE: Tests that manipulate environment variables share the same process
//! address space. They use a per-process Mutex to run serially and avoid
//! races when setting/clearing vars.

use axum::{body::Body, http::Request};
use std::sync::{Arc, Mutex, OnceLock};
use tower::ServiceExt;

use oesp_sync::{create_router, AppState, Config, MemoryStore};

/// Global lock for tests that mutate environment variables.
fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

#[tokio::test]
async fn test_config_from_env_defaults() {
    let _guard = env_lock().lock().unwrap_or_else(|p| p.into_inner());

    std::env::remove_var("PORT");
    std::env::remove_var("MAX_CHUNK_BYTES");
    std::env::remove_var("MAX_CLOCK_SKEW_SEC");
    std::env::remove_var("API_KEY_REQUIRED");

    let config = Config::from_env().expect("Config::from_env() should succeed with no env vars");

    assert_eq!(config.port, 8080, "default port should be 8080");
    assert_eq!(config.max_chunk_bytes, 500_000);
    assert_eq!(config.max_clock_skew_sec, 300);
    assert!(!config.api_key_required);
}

#[tokio::test]
async fn test_config_from_env_overrides() {
    let _guard = env_lock().lock().unwrap_or_else(|p| p.into_inner());

    std::env::set_var("PORT", "9999");
    std::env::set_var("MAX_CHUNK_BYTES", "1024");
    std::env::set_var("API_KEY_REQUIRED", "true");
    std::env::set_var("GLOBAL_API_KEY", "k1");

    let config = Config::from_env().expect("Config::from_env() should succeed with overrides");

    std::env::remove_var("PORT");
    std::env::remove_var("MAX_CHUNK_BYTES");
    std::env::remove_var("API_KEY_REQUIRED");
    std::env::remove_var("GLOBAL_API_KEY");

    assert_eq!(config.port, 9999);
    assert_eq!(config.max_chunk_bytes, 1024);
    assert!(config.api_key_required);
    assert_eq!(config.global_api_key.as_deref(), Some("k1"));
}

#[tokio::test]
async fn test_config_invalid_port_uses_default() {
    let _guard = env_lock().lock().unwrap_or_else(|p| p.into_inner());

    std::env::set_var("PORT", "not_a_number");
    let config = Config::from_env()
        .expect("Config::from_env() should succeed even with an unparseable PORT value");
    std::env::remove_var("PORT");

    assert_eq!(config.port, 8080, "invalid PORT should fall back to 8080");
}

#[tokio::test]
async fn test_appstate_construction_and_router_health() {
    let state = AppState::new(Arc::new(MemoryStore::new()), Config::default());
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request builder should not fail"),
        )
        .await
        .expect("oneshot should not fail");

    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body_json: serde_json::Value =
        serde_json::from_slice(&body).expect("body should be valid JSON");
    assert_eq!(body_json["status"], "ok");
}

#[tokio::test]
async fn test_router_start_rejects_empty_body_with_error_envelope() {
    let state = AppState::new(Arc::new(MemoryStore::new()), Config::default());
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/sync/start")
                .header("content-type", "application/json")
                .header("X-OESP-DEVICE", "oesp:did:x")
                .body(Body::from("{}"))
                .expect("request builder should not fail"),
        )
        .await
        .expect("oneshot should not fail");

    // Body rejections (missing required fields in StartRequest) go through
    // ApiJson and come back as the standard error envelope.
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body_json: serde_json::Value =
        serde_json::from_slice(&body).expect("body should be valid JSON");
    assert_eq!(body_json["error"]["code"], "BAD_REQUEST");
    assert!(body_json["error"]["message"].is_string());
}
