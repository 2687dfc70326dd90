//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Storage seam for the sync service.
//!
//! The service drives everything through [`SyncStore`]; the PostgreSQL
//! backend (behind the `postgres` feature) persists across restarts while
//! the in-memory backend keeps the full state machine testable without a
//! database. Chunk payloads are fetched one at a time in `seq` order so the
//! commit pipeline never materializes the whole corpus.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Device, InsertOutcome, NewMessage, SyncSession};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

/// Persistent store failure.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database failure: {0}")]
    Database(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Everything the sync session state machine needs from storage.
#[async_trait]
pub trait SyncStore: Send + Sync {
    // Devices
    async fn get_device(&self, did: &str) -> Result<Option<Device>, StoreError>;
    async fn insert_device(&self, did: &str, public_key: &[u8]) -> Result<(), StoreError>;
    async fn touch_device(&self, did: &str) -> Result<(), StoreError>;

    // Sessions
    async fn open_sessions(&self, device_did: &str) -> Result<Vec<SyncSession>, StoreError>;
    async fn create_session(&self, session: &SyncSession) -> Result<(), StoreError>;
    async fn get_session(&self, session_id: Uuid) -> Result<Option<SyncSession>, StoreError>;
    async fn set_session_acks(
        &self,
        session_id: Uuid,
        last_acked_seq: i64,
        acked_chunks: i64,
    ) -> Result<(), StoreError>;
    async fn seal_session(&self, session_id: Uuid, final_hash: &[u8]) -> Result<(), StoreError>;

    // Chunks
    async fn get_chunk_sha(&self, session_id: Uuid, seq: i64)
        -> Result<Option<Vec<u8>>, StoreError>;
    async fn insert_chunk(
        &self,
        session_id: Uuid,
        seq: i64,
        payload: &[u8],
        sha256: &[u8],
    ) -> Result<(), StoreError>;
    /// The next chunk strictly after `after_seq`, in `seq` order.
    async fn next_chunk(
        &self,
        session_id: Uuid,
        after_seq: i64,
    ) -> Result<Option<(i64, Vec<u8>)>, StoreError>;

    // Messages
    async fn insert_message(&self, message: &NewMessage) -> Result<InsertOutcome, StoreError>;
    async fn link_session_item(
        &self,
        session_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), StoreError>;
    /// Undo a failed commit: drop this commit's inserts and every membership
    /// row for the session.
    async fn rollback_commit(
        &self,
        session_id: Uuid,
        inserted_message_ids: &[Uuid],
    ) -> Result<(), StoreError>;
}
