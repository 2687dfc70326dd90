//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Resolver seam: maps a recipient DID to its X25519 public key. The
//! resolution mechanism (directory service, cache, pinned contacts) is
//! opaque to the envelope engine.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::crypto::X25519_KEY_LEN;
use crate::error::OespError;

/// DID → recipient X25519 public key.
pub trait Resolver: Send + Sync {
    fn resolve(&self, did: &str) -> Result<[u8; X25519_KEY_LEN], OespError>;
}

/// Map-backed resolver for tests, demos, and pinned contact lists.
#[derive(Default)]
pub struct MemoryResolver {
    keys: RwLock<HashMap<String, [u8; X25519_KEY_LEN]>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, did: impl Into<String>, key: [u8; X25519_KEY_LEN]) {
        self.keys
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(did.into(), key);
    }
}

impl Resolver for MemoryResolver {
    fn resolve(&self, did: &str) -> Result<[u8; X25519_KEY_LEN], OespError> {
        self.keys
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(did)
            .copied()
            .ok_or_else(|| OespError::ResolveFailed(format!("no key registered for {did}")))
    }
}
