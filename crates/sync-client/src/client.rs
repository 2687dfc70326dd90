//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Async sync client: `start → chunk → commit` against a sync server.
//!
//! The client serializes tokens as JSONL, honors the server's
//! `max_chunk_bytes`, skips chunks the resume hint already acknowledges, and
//! commits with the full-corpus SHA-256. Transport failures retry with
//! bounded attempts; server error envelopes abort with the server's code.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use oesp_core::b64url;

use crate::error::{Result, SyncClientError};

/// Required on every sync request.
pub const DEVICE_HEADER: &str = "X-OESP-DEVICE";
/// Sent when key auth is configured.
pub const APIKEY_HEADER: &str = "X-OESP-APIKEY";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct SyncClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Extra attempts after a transport-level failure.
    pub retries: u32,
}

impl Default for SyncClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            retries: 2,
        }
    }
}

impl SyncClientConfig {
    /// Defaults overridden by `OESP_SYNC_BASE_URL` when set.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OESP_SYNC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            ..Self::default()
        }
    }
}

/// The uploading device.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub did: String,
    /// base64url Ed25519 public key; required the first time a device talks
    /// to a server.
    pub public_key_b64: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    session_id: Uuid,
    max_chunk_bytes: usize,
    resume: ResumeHint,
}

#[derive(Debug, Deserialize)]
struct ResumeHint {
    last_acked_seq: i64,
    #[allow(dead_code)]
    acked_chunks: i64,
}

/// Counters the server returns from commit.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CommitSummary {
    pub status: String,
    pub inserted: u64,
    pub duplicates: u64,
    pub invalid: u64,
}

/// What one `sync_tokens` run did.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub session_id: Uuid,
    pub uploaded_chunks: usize,
    pub skipped_chunks: usize,
    pub total_bytes: usize,
    pub outcome: CommitSummary,
}

/// Async sync upload client.
pub struct OespSyncClient {
    http: reqwest::Client,
    config: SyncClientConfig,
}

impl OespSyncClient {
    pub fn new(config: SyncClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            config: SyncClientConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(SyncClientConfig::from_env())
    }

    /// Upload a batch of tokens and commit the session.
    pub async fn sync_tokens(
        &self,
        device: &DeviceIdentity,
        tokens: &[String],
        client_meta: Option<Value>,
        allow_expired: bool,
    ) -> Result<SyncSummary> {
        let corpus = encode_jsonl(tokens);

        let start: StartResponse = self
            .post_json(
                "/v1/sync/start",
                &device.did,
                &json!({
                    "device_did": device.did,
                    "device_pub_b64": device.public_key_b64,
                    "expected_total_bytes": corpus.len(),
                    "expected_total_items": tokens.len(),
                    "client_meta": client_meta,
                }),
            )
            .await?;
        info!(
            session_id = %start.session_id,
            max_chunk_bytes = start.max_chunk_bytes,
            "sync session open"
        );

        if start.max_chunk_bytes == 0 {
            return Err(SyncClientError::InvalidResponse(
                "server reported max_chunk_bytes = 0".into(),
            ));
        }

        let mut uploaded = 0usize;
        let mut skipped = 0usize;
        for (seq, chunk) in split_chunks(&corpus, start.max_chunk_bytes).enumerate() {
            // Already-acked sequence numbers survive from a prior attempt of
            // the same batch; the server's upsert would ack them again, so
            // skip the bytes entirely.
            if (seq as i64) <= start.resume.last_acked_seq {
                skipped += 1;
                continue;
            }
            let _: Value = self
                .post_json(
                    &format!("/v1/sync/{}/chunk", start.session_id),
                    &device.did,
                    &json!({
                        "seq": seq,
                        "payload_b64": b64url::encode(chunk),
                        "sha256_b64": b64url::encode(&Sha256::digest(chunk)),
                    }),
                )
                .await?;
            uploaded += 1;
        }
        debug!(uploaded, skipped, "chunk upload complete");

        let outcome: CommitSummary = self
            .post_json(
                &format!("/v1/sync/{}/commit", start.session_id),
                &device.did,
                &json!({
                    "final_hash_b64": b64url::encode(&Sha256::digest(&corpus)),
                    "format": "tokens-jsonl",
                    "allow_expired": allow_expired,
                }),
            )
            .await?;
        info!(
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            invalid = outcome.invalid,
            "sync committed"
        );

        Ok(SyncSummary {
            session_id: start.session_id,
            uploaded_chunks: uploaded,
            skipped_chunks: skipped,
            total_bytes: corpus.len(),
            outcome,
        })
    }

    /// POST with device headers. Transport failures (connect, timeout) are
    /// retried; any server error envelope aborts immediately.
    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        device_did: &str,
        body: &Value,
    ) -> Result<T> {
        let url = format!("{}{}", self.config.base_url, path);

        let mut attempt = 0u32;
        loop {
            let mut request = self
                .http
                .post(&url)
                .header(DEVICE_HEADER, device_did)
                .json(body);
            if let Some(key) = &self.config.api_key {
                request = request.header(APIKEY_HEADER, key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|e| SyncClientError::InvalidResponse(e.to_string()));
                    }
                    let (code, message) = decode_error_envelope(response).await;
                    return Err(SyncClientError::Api {
                        status: status.as_u16(),
                        code,
                        message,
                    });
                }
                Err(err) if attempt < self.config.retries && is_transport_error(&err) => {
                    attempt += 1;
                    debug!(%url, attempt, "transport error, retrying: {err}");
                }
                Err(err) => return Err(SyncClientError::Http(err)),
            }
        }
    }
}

fn is_transport_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

async fn decode_error_envelope(response: reqwest::Response) -> (String, String) {
    match response.json::<Value>().await {
        Ok(body) => {
            let code = body["error"]["code"].as_str().unwrap_or("UNKNOWN").to_string();
            let message = body["error"]["message"].as_str().unwrap_or("").to_string();
            (code, message)
        }
        Err(_) => ("UNKNOWN".to_string(), String::new()),
    }
}

/// One `{"token": ...}` object per line, `\n`-terminated, UTF-8.
pub fn encode_jsonl(tokens: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for token in tokens {
        out.extend_from_slice(json!({ "token": token }).to_string().as_bytes());
        out.push(b'\n');
    }
    out
}

/// Split the corpus into chunks no larger than `max_chunk_bytes`.
pub fn split_chunks(corpus: &[u8], max_chunk_bytes: usize) -> impl Iterator<Item = &[u8]> {
    corpus.chunks(max_chunk_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonl_one_object_per_line() {
        let corpus = encode_jsonl(&["OESP1.aaa".to_string(), "OESP1.bbb".to_string()]);
        let text = String::from_utf8(corpus).unwrap();
        assert_eq!(text, "{\"token\":\"OESP1.aaa\"}\n{\"token\":\"OESP1.bbb\"}\n");
    }

    #[test]
    fn test_jsonl_empty_batch_is_empty() {
        assert!(encode_jsonl(&[]).is_empty());
    }

    #[test]
    fn test_chunks_respect_max_size() {
        let corpus: Vec<u8> = (0..10u8).collect();
        let chunks: Vec<&[u8]> = split_chunks(&corpus, 4).collect();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 4));
        let rejoined: Vec<u8> = chunks.concat();
        assert_eq!(rejoined, corpus);
    }

    #[test]
    fn test_resume_skip_boundary() {
        // Mirrors the skip condition in sync_tokens: seq <= last_acked_seq.
        let last_acked_seq = 1i64;
        let skipped: Vec<usize> = (0..4usize)
            .filter(|&seq| (seq as i64) <= last_acked_seq)
            .collect();
        assert_eq!(skipped, vec![0, 1]);
    }
}
