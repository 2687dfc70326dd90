//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Replay store seam: the set of `(from_did, mid)` pairs already admitted.
//!
//! Duplication is scoped per sender — a single global `mid` set would
//! mis-attribute collisions across senders. Implementations synchronize
//! internally so [`ReplayStore::check_and_mark`] admits exactly one of two
//! concurrent verifications of the same pair.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::OespError;

/// Set of `(from_did, mid)` pairs previously admitted.
pub trait ReplayStore: Send + Sync {
    /// Has this pair been admitted before?
    fn seen(&self, mid: &str, from_did: &str) -> Result<bool, OespError>;

    /// Record the pair as admitted.
    fn mark_seen(&self, mid: &str, from_did: &str) -> Result<(), OespError>;

    /// Atomic seen-then-mark. Returns `true` when the pair was newly
    /// admitted. The default implementation is only as atomic as the two
    /// calls underneath; stores with a cheaper compare-and-insert should
    /// override it.
    fn check_and_mark(&self, mid: &str, from_did: &str) -> Result<bool, OespError> {
        if self.seen(mid, from_did)? {
            return Ok(false);
        }
        self.mark_seen(mid, from_did)?;
        Ok(true)
    }
}

/// Mutex-guarded in-memory replay set.
#[derive(Default)]
pub struct MemoryReplayStore {
    seen: Mutex<HashSet<(String, String)>>,
}

impl MemoryReplayStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplayStore for MemoryReplayStore {
    fn seen(&self, mid: &str, from_did: &str) -> Result<bool, OespError> {
        let guard = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        Ok(guard.contains(&(from_did.to_string(), mid.to_string())))
    }

    fn mark_seen(&self, mid: &str, from_did: &str) -> Result<(), OespError> {
        let mut guard = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        guard.insert((from_did.to_string(), mid.to_string()));
        Ok(())
    }

    fn check_and_mark(&self, mid: &str, from_did: &str) -> Result<bool, OespError> {
        let mut guard = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        Ok(guard.insert((from_did.to_string(), mid.to_string())))
    }
}
