//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Axum router composition for the sync HTTP layer.
//!
//! Routes:
//!   POST  /v1/sync/start               — open (or resume) a session
//!   POST  /v1/sync/:session_id/chunk   — upload one chunk
//!   GET   /v1/sync/:session_id/status  — session progress
//!   POST  /v1/sync/:session_id/commit  — seal and verify the batch
//!   GET   /health                      — health check (no auth)

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::auth::device_auth;
use super::handlers::{
    commit_sync, health_handler, session_status, start_sync, upload_chunk,
};
use super::state::AppState;

/// Compose the full router. Sync routes sit behind the device-header auth
/// middleware; the health check does not.
pub fn create_router(state: AppState) -> Router {
    let sync = Router::new()
        .route("/v1/sync/start", post(start_sync))
        .route("/v1/sync/:session_id/chunk", post(upload_chunk))
        .route("/v1/sync/:session_id/status", get(session_status))
        .route("/v1/sync/:session_id/commit", post(commit_sync))
        .route_layer(middleware::from_fn_with_state(state.clone(), device_auth));

    Router::new()
        .merge(sync)
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
