//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! # OESP Sync Client
//!
//! Batches accumulated tokens as JSONL and streams them to a sync server:
//! `start → chunk → commit`, with resume support and transport retries.
//!
//! ```rust,no_run
//! use oesp_sync_client::{DeviceIdentity, OespSyncClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), oesp_sync_client::SyncClientError> {
//!     let client = OespSyncClient::from_env()?;
//!     let device = DeviceIdentity {
//!         did: "oesp:did:example".into(),
//!         public_key_b64: None,
//!     };
//!     let summary = client
//!         .sync_tokens(&device, &["OESP1.abc".into()], None, true)
//!         .await?;
//!     println!("inserted {}", summary.outcome.inserted);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;

pub use client::{
    encode_jsonl, split_chunks, CommitSummary, DeviceIdentity, OespSyncClient, SyncClientConfig,
    SyncSummary, APIKEY_HEADER, DEVICE_HEADER,
};
pub use error::{Result, SyncClientError};
