//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! # OESP Sync Server
//!
//! Server side of the bulk-upload pipeline: chunked upload sessions
//! (`start → chunk → commit`), streaming JSONL verification against the OESP
//! verifier, and idempotent storage keyed by `(from_did, mid)`.
//!
//! The HTTP layer lives in [`http`], the session state machine in
//! [`service`], and storage backends in [`store`] (PostgreSQL behind the
//! `postgres` feature, in-memory for tests and demos).

pub mod config;
pub mod error;
pub mod http;
pub mod jsonl;
pub mod models;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{ApiError, ApiJson};
pub use http::{create_router, AppState};
pub use models::{CommitOutcome, SessionStatus, SyncSession};
pub use service::SyncService;
pub use store::{MemoryStore, StoreError, SyncStore};
#[cfg(feature = "postgres")]
pub use store::PgStore;
