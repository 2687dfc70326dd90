//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! # OESP Core
//!
//! The Offline Exchange Secure Protocol: a self-contained messaging token
//! format — signed, encrypted to a recipient, timestamped — transportable
//! over any bearer, plus the verification pipeline that admits tokens on the
//! receiving side.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use oesp_core::{Keystore, MemoryKeystore, MemoryResolver, OespClient};
//!
//! # fn main() -> Result<(), oesp_core::OespError> {
//! let sender_keys = Arc::new(MemoryKeystore::generate());
//! let recipient_keys = Arc::new(MemoryKeystore::generate());
//!
//! let resolver = Arc::new(MemoryResolver::new());
//! resolver.insert(recipient_keys.did(), recipient_keys.exchange_public());
//!
//! let sender = OespClient::new(sender_keys).with_resolver(resolver);
//! let token = sender.pack(&recipient_keys.did(), b"meet at dawn")?;
//!
//! let recipient = OespClient::new(recipient_keys);
//! let message = recipient.unpack(&token)?;
//! assert_eq!(message.plaintext, b"meet at dawn");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`canonical`] — deterministic JSON bytes, the trust anchor for signing
//!   and AAD construction
//! - [`envelope`] — the v1 envelope object and token wire form
//! - [`client`] — pack/unpack engine bound to a [`keystore::Keystore`]
//! - [`verify`] — policy-driven token verification
//! - [`replay`] — per-sender `(from_did, mid)` anti-replay seam
//! - [`transport`] — BLE framing for token transfer over a byte-frame link

pub mod b64url;
pub mod canonical;
pub mod client;
pub mod crypto;
pub mod did;
pub mod envelope;
pub mod error;
pub mod keystore;
pub mod replay;
pub mod resolver;
pub mod transport;
pub mod verify;

pub use canonical::canonical_json_bytes;
pub use client::{DecodedMessage, OespClient, PackOptions};
pub use crypto::{NONCE_LEN, SESSION_KEY_LEN};
pub use did::{derive_did, DID_PREFIX};
pub use envelope::{
    Envelope, Recipient, Sender, ENC_CHACHA20_POLY1305, ENVELOPE_TYP, ENVELOPE_VERSION,
    KEX_X25519, SIG_ED25519, TOKEN_PREFIX,
};
pub use error::OespError;
pub use keystore::{Keystore, MemoryKeystore};
pub use replay::{MemoryReplayStore, ReplayStore};
pub use resolver::{MemoryResolver, Resolver};
pub use verify::{parse_token, DeviceDirectory, VerifiedEnvelope, Verifier, VerifyPolicy};
