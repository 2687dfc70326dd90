//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! HTTP endpoint handlers for the sync surface.

use axum::extract::{Extension, Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use oesp_core::b64url;

use crate::error::{ApiError, ApiJson};
use crate::http::auth::DeviceIdentity;
use crate::http::state::AppState;
use crate::models::CommitOutcome;

// ---------------------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub device_did: String,
    #[serde(default)]
    pub device_pub_b64: Option<String>,
    pub expected_total_bytes: i64,
    pub expected_total_items: i64,
    #[serde(default)]
    pub client_meta: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ResumeHint {
    pub last_acked_seq: i64,
    pub acked_chunks: i64,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: Uuid,
    pub max_chunk_bytes: usize,
    pub resume: ResumeHint,
}

#[derive(Debug, Deserialize)]
pub struct ChunkRequest {
    pub seq: i64,
    pub payload_b64: String,
    pub sha256_b64: String,
}

#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub acked_seq: i64,
    pub last_acked_seq: i64,
    pub acked_chunks: i64,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub last_acked_seq: i64,
    pub acked_chunks: i64,
}

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub final_hash_b64: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_allow_expired")]
    pub allow_expired: bool,
}

fn default_format() -> String {
    "tokens-jsonl".to_string()
}

fn default_allow_expired() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// POST /v1/sync/start
pub async fn start_sync(
    State(state): State<AppState>,
    Extension(identity): Extension<DeviceIdentity>,
    ApiJson(req): ApiJson<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    if identity.0 != req.device_did {
        return Err(ApiError::bad_request(
            "X-OESP-DEVICE does not match body device_did",
        ));
    }

    let device_pub = req
        .device_pub_b64
        .as_deref()
        .map(|b64| b64url::decode(b64).map_err(|e| ApiError::bad_request(e.to_string())))
        .transpose()?;

    let session = state
        .service
        .start_session(
            &req.device_did,
            device_pub.as_deref(),
            req.expected_total_bytes,
            req.expected_total_items,
            req.client_meta,
        )
        .await?;

    Ok(Json(StartResponse {
        session_id: session.session_id,
        max_chunk_bytes: state.service.max_chunk_bytes(),
        resume: ResumeHint {
            last_acked_seq: session.last_acked_seq,
            acked_chunks: session.acked_chunks,
        },
    }))
}

/// POST /v1/sync/:session_id/chunk
pub async fn upload_chunk(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    ApiJson(req): ApiJson<ChunkRequest>,
) -> Result<Json<ChunkResponse>, ApiError> {
    let payload =
        b64url::decode(&req.payload_b64).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let sha256 =
        b64url::decode(&req.sha256_b64).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let session = state
        .service
        .add_chunk(session_id, req.seq, &payload, &sha256)
        .await?;

    Ok(Json(ChunkResponse {
        acked_seq: req.seq,
        last_acked_seq: session.last_acked_seq,
        acked_chunks: session.acked_chunks,
        status: "ok",
    }))
}

/// GET /v1/sync/:session_id/status
pub async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = state.service.get_session(session_id).await?;
    Ok(Json(StatusResponse {
        status: session.status.as_str().to_string(),
        last_acked_seq: session.last_acked_seq,
        acked_chunks: session.acked_chunks,
    }))
}

/// POST /v1/sync/:session_id/commit
pub async fn commit_sync(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    ApiJson(req): ApiJson<CommitRequest>,
) -> Result<Json<CommitOutcome>, ApiError> {
    if req.format != "tokens-jsonl" {
        return Err(ApiError::bad_request(format!(
            "unsupported format {:?}",
            req.format
        )));
    }
    let final_hash =
        b64url::decode(&req.final_hash_b64).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let outcome = state
        .service
        .commit_session(session_id, &final_hash, req.allow_expired)
        .await?;
    Ok(Json(outcome))
}
