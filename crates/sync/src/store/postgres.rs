//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! PostgreSQL [`SyncStore`] backend.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Device, InsertOutcome, NewMessage, SessionStatus, SyncSession};
use crate::store::{StoreError, SyncStore};

/// sqlx-backed store over a connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn status_from_str(status: &str) -> SessionStatus {
    match status {
        "committed" => SessionStatus::Committed,
        "aborted" => SessionStatus::Aborted,
        _ => SessionStatus::Open,
    }
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> SyncSession {
    let status: String = row.get("status");
    SyncSession {
        session_id: row.get("session_id"),
        device_did: row.get("device_did"),
        status: status_from_str(&status),
        expected_total_bytes: row.get("expected_total_bytes"),
        expected_total_items: row.get("expected_total_items"),
        last_acked_seq: row.get("last_acked_seq"),
        acked_chunks: row.get("acked_chunks"),
        client_meta: row.get("client_meta"),
        final_hash: row.get("final_hash"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl SyncStore for PgStore {
    async fn get_device(&self, did: &str) -> Result<Option<Device>, StoreError> {
        let row = sqlx::query(
            "SELECT did, public_key, first_seen_at, last_seen_at FROM devices WHERE did = $1",
        )
        .bind(did)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Device {
            did: r.get("did"),
            public_key: r.get("public_key"),
            first_seen_at: r.get("first_seen_at"),
            last_seen_at: r.get("last_seen_at"),
        }))
    }

    async fn insert_device(&self, did: &str, public_key: &[u8]) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO devices (did, public_key) VALUES ($1, $2) ON CONFLICT (did) DO NOTHING",
        )
        .bind(did)
        .bind(public_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_device(&self, did: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE devices SET last_seen_at = now() WHERE did = $1")
            .bind(did)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn open_sessions(&self, device_did: &str) -> Result<Vec<SyncSession>, StoreError> {
        let rows = sqlx::query(
            "SELECT session_id, device_did, status, expected_total_bytes, expected_total_items, \
             last_acked_seq, acked_chunks, client_meta, final_hash, created_at \
             FROM sync_sessions WHERE device_did = $1 AND status = 'open'",
        )
        .bind(device_did)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(session_from_row).collect())
    }

    async fn create_session(&self, session: &SyncSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sync_sessions \
             (session_id, device_did, status, expected_total_bytes, expected_total_items, \
              last_acked_seq, acked_chunks, client_meta, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(session.session_id)
        .bind(&session.device_did)
        .bind(session.status.as_str())
        .bind(session.expected_total_bytes)
        .bind(session.expected_total_items)
        .bind(session.last_acked_seq)
        .bind(session.acked_chunks)
        .bind(&session.client_meta)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<SyncSession>, StoreError> {
        let row = sqlx::query(
            "SELECT session_id, device_did, status, expected_total_bytes, expected_total_items, \
             last_acked_seq, acked_chunks, client_meta, final_hash, created_at \
             FROM sync_sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(session_from_row))
    }

    async fn set_session_acks(
        &self,
        session_id: Uuid,
        last_acked_seq: i64,
        acked_chunks: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sync_sessions SET last_acked_seq = $2, acked_chunks = $3 WHERE session_id = $1",
        )
        .bind(session_id)
        .bind(last_acked_seq)
        .bind(acked_chunks)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn seal_session(&self, session_id: Uuid, final_hash: &[u8]) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sync_sessions SET status = 'committed', final_hash = $2 WHERE session_id = $1",
        )
        .bind(session_id)
        .bind(final_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_chunk_sha(
        &self,
        session_id: Uuid,
        seq: i64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query("SELECT sha256 FROM sync_chunks WHERE session_id = $1 AND seq = $2")
            .bind(session_id)
            .bind(seq)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("sha256")))
    }

    async fn insert_chunk(
        &self,
        session_id: Uuid,
        seq: i64,
        payload: &[u8],
        sha256: &[u8],
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sync_chunks (session_id, seq, size, sha256, payload) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (session_id, seq) DO NOTHING",
        )
        .bind(session_id)
        .bind(seq)
        .bind(payload.len() as i64)
        .bind(sha256)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn next_chunk(
        &self,
        session_id: Uuid,
        after_seq: i64,
    ) -> Result<Option<(i64, Vec<u8>)>, StoreError> {
        let row = sqlx::query(
            "SELECT seq, payload FROM sync_chunks \
             WHERE session_id = $1 AND seq > $2 ORDER BY seq ASC LIMIT 1",
        )
        .bind(session_id)
        .bind(after_seq)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| (r.get("seq"), r.get("payload"))))
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<InsertOutcome, StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO oesp_messages (id, from_did, mid, ts, exp, token, envelope_json, is_expired) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (from_did, mid) DO NOTHING RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&message.from_did)
        .bind(&message.mid)
        .bind(message.ts)
        .bind(message.exp)
        .bind(&message.token)
        .bind(&message.envelope_json)
        .bind(message.is_expired)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Inserted(row.get("id")));
        }

        let existing =
            sqlx::query("SELECT id FROM oesp_messages WHERE from_did = $1 AND mid = $2")
                .bind(&message.from_did)
                .bind(&message.mid)
                .fetch_one(&self.pool)
                .await?;
        Ok(InsertOutcome::Duplicate(existing.get("id")))
    }

    async fn link_session_item(
        &self,
        session_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO session_items (session_id, message_id) VALUES ($1, $2) \
             ON CONFLICT (session_id, message_id) DO NOTHING",
        )
        .bind(session_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rollback_commit(
        &self,
        session_id: Uuid,
        inserted_message_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM session_items WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM oesp_messages WHERE id = ANY($1)")
            .bind(inserted_message_ids)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
