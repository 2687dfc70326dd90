//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! In-memory [`SyncStore`] backend. Mirrors the relational layout closely
//! enough that the service tests exercise the same state machine the
//! PostgreSQL backend runs in production.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{Device, InsertOutcome, NewMessage, SyncSession};
use crate::store::{StoreError, SyncStore};

#[derive(Default)]
struct Inner {
    devices: HashMap<String, Device>,
    sessions: HashMap<Uuid, SyncSession>,
    /// `(session_id → seq → (sha256, payload))`; BTreeMap gives `seq` order.
    chunks: HashMap<Uuid, BTreeMap<i64, (Vec<u8>, Vec<u8>)>>,
    /// `(from_did, mid)` unique key → message id.
    message_keys: HashMap<(String, String), Uuid>,
    messages: HashMap<Uuid, NewMessage>,
    session_items: HashMap<Uuid, Vec<Uuid>>,
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages. Test observability.
    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn get_device(&self, did: &str) -> Result<Option<Device>, StoreError> {
        Ok(self.lock().devices.get(did).cloned())
    }

    async fn insert_device(&self, did: &str, public_key: &[u8]) -> Result<(), StoreError> {
        let now = Utc::now();
        self.lock().devices.insert(
            did.to_string(),
            Device {
                did: did.to_string(),
                public_key: public_key.to_vec(),
                first_seen_at: now,
                last_seen_at: now,
            },
        );
        Ok(())
    }

    async fn touch_device(&self, did: &str) -> Result<(), StoreError> {
        if let Some(device) = self.lock().devices.get_mut(did) {
            device.last_seen_at = Utc::now();
        }
        Ok(())
    }

    async fn open_sessions(&self, device_did: &str) -> Result<Vec<SyncSession>, StoreError> {
        let guard = self.lock();
        Ok(guard
            .sessions
            .values()
            .filter(|s| {
                s.device_did == device_did && s.status == crate::models::SessionStatus::Open
            })
            .cloned()
            .collect())
    }

    async fn create_session(&self, session: &SyncSession) -> Result<(), StoreError> {
        self.lock()
            .sessions
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<SyncSession>, StoreError> {
        Ok(self.lock().sessions.get(&session_id).cloned())
    }

    async fn set_session_acks(
        &self,
        session_id: Uuid,
        last_acked_seq: i64,
        acked_chunks: i64,
    ) -> Result<(), StoreError> {
        if let Some(session) = self.lock().sessions.get_mut(&session_id) {
            session.last_acked_seq = last_acked_seq;
            session.acked_chunks = acked_chunks;
        }
        Ok(())
    }

    async fn seal_session(&self, session_id: Uuid, final_hash: &[u8]) -> Result<(), StoreError> {
        if let Some(session) = self.lock().sessions.get_mut(&session_id) {
            session.status = crate::models::SessionStatus::Committed;
            session.final_hash = Some(final_hash.to_vec());
        }
        Ok(())
    }

    async fn get_chunk_sha(
        &self,
        session_id: Uuid,
        seq: i64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .lock()
            .chunks
            .get(&session_id)
            .and_then(|chunks| chunks.get(&seq))
            .map(|(sha, _)| sha.clone()))
    }

    async fn insert_chunk(
        &self,
        session_id: Uuid,
        seq: i64,
        payload: &[u8],
        sha256: &[u8],
    ) -> Result<(), StoreError> {
        self.lock()
            .chunks
            .entry(session_id)
            .or_default()
            .insert(seq, (sha256.to_vec(), payload.to_vec()));
        Ok(())
    }

    async fn next_chunk(
        &self,
        session_id: Uuid,
        after_seq: i64,
    ) -> Result<Option<(i64, Vec<u8>)>, StoreError> {
        let guard = self.lock();
        Ok(guard.chunks.get(&session_id).and_then(|chunks| {
            chunks
                .range((after_seq + 1)..)
                .next()
                .map(|(&seq, (_, payload))| (seq, payload.clone()))
        }))
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<InsertOutcome, StoreError> {
        let mut guard = self.lock();
        let key = (message.from_did.clone(), message.mid.clone());
        if let Some(&existing) = guard.message_keys.get(&key) {
            return Ok(InsertOutcome::Duplicate(existing));
        }
        let id = Uuid::new_v4();
        guard.message_keys.insert(key, id);
        guard.messages.insert(id, message.clone());
        Ok(InsertOutcome::Inserted(id))
    }

    async fn link_session_item(
        &self,
        session_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock();
        let items = guard.session_items.entry(session_id).or_default();
        if !items.contains(&message_id) {
            items.push(message_id);
        }
        Ok(())
    }

    async fn rollback_commit(
        &self,
        session_id: Uuid,
        inserted_message_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut guard = self.lock();
        for id in inserted_message_ids {
            if let Some(message) = guard.messages.remove(id) {
                guard
                    .message_keys
                    .remove(&(message.from_did.clone(), message.mid.clone()));
            }
        }
        guard.session_items.remove(&session_id);
        Ok(())
    }
}
