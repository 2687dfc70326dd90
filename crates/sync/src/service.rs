//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Sync session state machine and the streaming commit pipeline.
//!
//! Sessions move `open → committed | aborted` and never leave a terminal
//! state. Chunk upload is idempotent by `(session_id, seq)`; commit consumes
//! chunks strictly in `seq` order, feeding an incremental SHA-256 and a JSONL
//! splitter so the corpus is never held in memory at once. A per-session
//! write intent serializes every session mutation: concurrent chunk uploads
//! (overlapping retries are legal) and commits both take it, so ack counters
//! never lose an increment and only one commit runs per session.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use oesp_core::canonical::canonical_json_bytes;
use oesp_core::{Verifier, VerifyPolicy};

use crate::config::Config;
use crate::error::ApiError;
use crate::jsonl::JsonlSplitter;
use crate::models::{
    CommitOutcome, InsertOutcome, NewMessage, SessionStatus, SyncSession,
};
use crate::store::SyncStore;

/// The sync service: storage plus per-session write serialization.
pub struct SyncService {
    store: Arc<dyn SyncStore>,
    config: Config,
    session_intents: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SyncService {
    pub fn new(store: Arc<dyn SyncStore>, config: Config) -> Self {
        Self {
            store,
            config,
            session_intents: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_chunk_bytes(&self) -> usize {
        self.config.max_chunk_bytes
    }

    /// The logical write intent for a session. Held across any read-compute-
    /// write sequence on session state.
    async fn session_intent(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        let mut intents = self.session_intents.lock().await;
        Arc::clone(intents.entry(session_id).or_default())
    }

    /// Open (or idempotently re-open) a session for a device.
    ///
    /// Unknown devices must supply their public key and are registered.
    /// Known devices presenting a key must match byte-for-byte. An existing
    /// open session with structurally equal `client_meta` is returned as-is.
    pub async fn start_session(
        &self,
        device_did: &str,
        device_pub: Option<&[u8]>,
        expected_total_bytes: i64,
        expected_total_items: i64,
        client_meta: Option<Value>,
    ) -> Result<SyncSession, ApiError> {
        match self.store.get_device(device_did).await? {
            None => {
                let Some(public_key) = device_pub else {
                    return Err(ApiError::bad_request(
                        "Device unknown and pub key not provided",
                    ));
                };
                self.store.insert_device(device_did, public_key).await?;
                info!(did = device_did, "registered new device");
            }
            Some(device) => {
                if let Some(public_key) = device_pub {
                    if device.public_key != public_key {
                        warn!(did = device_did, "device key mismatch on start");
                        return Err(ApiError::bad_device_key("Device key mismatch"));
                    }
                }
                self.store.touch_device(device_did).await?;
            }
        }

        if let Some(meta) = &client_meta {
            let wanted = canonical_meta(meta)?;
            for session in self.store.open_sessions(device_did).await? {
                let matches = match &session.client_meta {
                    Some(existing) => canonical_meta(existing)? == wanted,
                    None => false,
                };
                if matches {
                    debug!(session_id = %session.session_id, "resuming open session with equal client_meta");
                    return Ok(session);
                }
            }
        }

        let session = SyncSession::open(
            device_did,
            expected_total_bytes,
            expected_total_items,
            client_meta,
        );
        self.store.create_session(&session).await?;
        info!(session_id = %session.session_id, did = device_did, "opened sync session");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<SyncSession, ApiError> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(ApiError::session_not_found)
    }

    /// Accept one chunk. Re-uploading an identical `(seq, payload)` is a
    /// no-op ack; a differing payload for a stored `seq` is rejected to
    /// preserve commit integrity.
    pub async fn add_chunk(
        &self,
        session_id: Uuid,
        seq: i64,
        payload: &[u8],
        sha256: &[u8],
    ) -> Result<SyncSession, ApiError> {
        // Two uploads with different seqs would otherwise both read the same
        // ack snapshot and the later write would clobber the earlier
        // increment. The session state must be read under the intent.
        let intent = self.session_intent(session_id).await;
        let _guard = intent.lock().await;

        let session = self.get_session(session_id).await?;
        if session.status != SessionStatus::Open {
            return Err(ApiError::session_closed());
        }
        if seq < 0 {
            return Err(ApiError::bad_request("seq must be non-negative"));
        }
        if payload.len() > self.config.max_chunk_bytes {
            return Err(ApiError::too_large(format!(
                "Chunk too large, max {}",
                self.config.max_chunk_bytes
            )));
        }

        let actual = Sha256::digest(payload);
        if actual.as_slice() != sha256 {
            return Err(ApiError::invalid_hash("SHA256 mismatch"));
        }

        if let Some(stored_sha) = self.store.get_chunk_sha(session_id, seq).await? {
            if stored_sha != sha256 {
                warn!(session_id = %session_id, seq, "conflicting re-upload for stored chunk");
                return Err(ApiError::invalid_hash(
                    "Payload conflicts with previously stored chunk",
                ));
            }
            // Identical re-upload: ack without touching counters.
            return Ok(session);
        }

        self.store
            .insert_chunk(session_id, seq, payload, sha256)
            .await?;
        let last_acked_seq = session.last_acked_seq.max(seq);
        let acked_chunks = session.acked_chunks + 1;
        self.store
            .set_session_acks(session_id, last_acked_seq, acked_chunks)
            .await?;

        let mut session = session;
        session.last_acked_seq = last_acked_seq;
        session.acked_chunks = acked_chunks;
        Ok(session)
    }

    /// Commit the session: stream chunks in `seq` order, verify every token,
    /// insert idempotently, and seal — or roll back on hash mismatch.
    pub async fn commit_session(
        &self,
        session_id: Uuid,
        final_hash: &[u8],
        allow_expired: bool,
    ) -> Result<CommitOutcome, ApiError> {
        // One commit per session at a time; chunk uploads are locked out for
        // the duration. A commit that waited here will observe the committed
        // status below.
        let intent = self.session_intent(session_id).await;
        let _guard = intent.lock().await;

        let session = self.get_session(session_id).await?;
        if session.status != SessionStatus::Open {
            return Err(ApiError::session_closed());
        }

        let policy = VerifyPolicy::server(allow_expired, self.config.max_clock_skew_sec);
        let verifier = Verifier::new(policy);
        let now = chrono::Utc::now().timestamp();

        let mut hasher = Sha256::new();
        let mut splitter = JsonlSplitter::new();
        let mut outcome = CommitOutcome::default();
        let mut inserted_ids: Vec<Uuid> = Vec::new();

        let mut after_seq = -1i64;
        while let Some((seq, payload)) = self.store.next_chunk(session_id, after_seq).await? {
            after_seq = seq;
            hasher.update(&payload);
            for line in splitter.push(&payload) {
                self.process_line(session_id, &line, &verifier, now, &mut outcome, &mut inserted_ids)
                    .await?;
            }
        }
        if let Some(line) = splitter.finish() {
            self.process_line(session_id, &line, &verifier, now, &mut outcome, &mut inserted_ids)
                .await?;
        }

        if hasher.finalize().as_slice() != final_hash {
            warn!(session_id = %session_id, "final hash mismatch, rolling back commit");
            self.store
                .rollback_commit(session_id, &inserted_ids)
                .await?;
            // Session stays open for retry.
            return Err(ApiError::invalid_hash("Final hash mismatch"));
        }

        self.store.seal_session(session_id, final_hash).await?;
        // The session is terminal; later writers fail on the status check,
        // so the intent entry can go.
        self.session_intents.lock().await.remove(&session_id);
        outcome.status = SessionStatus::Committed.as_str().to_string();
        info!(
            session_id = %session_id,
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            invalid = outcome.invalid,
            "committed sync session"
        );
        Ok(outcome)
    }

    /// Verify and store a single JSONL record. Parse and verification
    /// failures bump `invalid` and never abort the commit.
    async fn process_line(
        &self,
        session_id: Uuid,
        line: &[u8],
        verifier: &Verifier,
        now: i64,
        outcome: &mut CommitOutcome,
        inserted_ids: &mut Vec<Uuid>,
    ) -> Result<(), ApiError> {
        let token = match serde_json::from_slice::<Value>(line) {
            Ok(item) => match item.get("token").and_then(Value::as_str) {
                Some(token) => token.to_string(),
                None => {
                    outcome.invalid += 1;
                    return Ok(());
                }
            },
            Err(_) => {
                outcome.invalid += 1;
                return Ok(());
            }
        };

        let verified = match verifier.verify_token_at(&token, now) {
            Ok(verified) => verified,
            Err(err) => {
                if err.is_hard() {
                    warn!(code = err.code(), "rejecting tampered token in commit stream");
                } else {
                    debug!(code = err.code(), "rejecting token in commit stream");
                }
                outcome.invalid += 1;
                return Ok(());
            }
        };

        let envelope = &verified.envelope;
        let message = NewMessage {
            from_did: envelope.from.did.clone(),
            mid: envelope.mid.clone(),
            ts: envelope.ts,
            exp: envelope.exp,
            token,
            envelope_json: envelope
                .to_value()
                .map_err(|e| ApiError::bad_request(e.to_string()))?,
            is_expired: envelope.exp < now,
        };

        let message_id = match self.store.insert_message(&message).await? {
            InsertOutcome::Inserted(id) => {
                outcome.inserted += 1;
                inserted_ids.push(id);
                id
            }
            InsertOutcome::Duplicate(id) => {
                outcome.duplicates += 1;
                id
            }
        };

        // Membership row regardless of insert-vs-duplicate.
        self.store.link_session_item(session_id, message_id).await?;
        Ok(())
    }
}

fn canonical_meta(meta: &Value) -> Result<Vec<u8>, ApiError> {
    canonical_json_bytes(meta, &[]).map_err(|e| ApiError::bad_request(e.to_string()))
}
