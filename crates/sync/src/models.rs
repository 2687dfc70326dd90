//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Server-side entities: devices, sync sessions, chunks, stored messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A device known to the server, keyed by DID.
#[derive(Debug, Clone)]
pub struct Device {
    pub did: String,
    pub public_key: Vec<u8>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Sync session lifecycle. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Committed,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Committed => "committed",
            SessionStatus::Aborted => "aborted",
        }
    }
}

/// One batch upload from one device.
#[derive(Debug, Clone)]
pub struct SyncSession {
    pub session_id: Uuid,
    pub device_did: String,
    pub status: SessionStatus,
    pub expected_total_bytes: i64,
    pub expected_total_items: i64,
    pub last_acked_seq: i64,
    pub acked_chunks: i64,
    pub client_meta: Option<Value>,
    pub final_hash: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl SyncSession {
    /// A fresh open session with ack state at its initial values.
    pub fn open(
        device_did: impl Into<String>,
        expected_total_bytes: i64,
        expected_total_items: i64,
        client_meta: Option<Value>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            device_did: device_did.into(),
            status: SessionStatus::Open,
            expected_total_bytes,
            expected_total_items,
            last_acked_seq: -1,
            acked_chunks: 0,
            client_meta,
            final_hash: None,
            created_at: Utc::now(),
        }
    }
}

/// A verified message ready for insertion. `(from_did, mid)` is the unique
/// key; the token is stored verbatim and the envelope as JSON for indexing.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub from_did: String,
    pub mid: String,
    pub ts: i64,
    pub exp: i64,
    pub token: String,
    pub envelope_json: Value,
    pub is_expired: bool,
}

/// Result of an idempotent message insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Uuid),
    Duplicate(Uuid),
}

/// Counters returned by a successful commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitOutcome {
    pub status: String,
    pub inserted: u64,
    pub duplicates: u64,
    pub invalid: u64,
}
