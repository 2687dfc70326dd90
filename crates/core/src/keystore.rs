//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Keystore seam: produces signatures, yields public key material, and opens
//! sealed boxes. Private keys never cross the trait boundary.

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::crypto::sealed;
use crate::crypto::SESSION_KEY_LEN;
use crate::did::derive_did;
use crate::error::OespError;

/// Key operations the envelope engine depends on. Safe for concurrent
/// readers; implementations are read-only after construction.
pub trait Keystore: Send + Sync {
    /// Ed25519 identity public key (the DID anchor).
    fn identity_public(&self) -> [u8; 32];

    /// X25519 key-exchange public key, published via the resolver.
    fn exchange_public(&self) -> [u8; 32];

    /// Sign an envelope signing input with the Ed25519 identity key.
    fn sign(&self, message: &[u8]) -> [u8; 64];

    /// Open a sealed session-key blob with the X25519 private key.
    fn open_sealed(&self, blob: &[u8]) -> Result<[u8; SESSION_KEY_LEN], OespError>;
}

/// In-memory keystore holding freshly generated keypairs.
pub struct MemoryKeystore {
    signing: SigningKey,
    exchange: StaticSecret,
}

impl MemoryKeystore {
    /// Generate a new Ed25519 identity keypair and X25519 exchange keypair.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
            exchange: StaticSecret::random_from_rng(OsRng),
        }
    }

    /// The DID derived from the identity public key.
    pub fn did(&self) -> String {
        derive_did(&self.identity_public())
    }
}

impl Keystore for MemoryKeystore {
    fn identity_public(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    fn exchange_public(&self) -> [u8; 32] {
        *PublicKey::from(&self.exchange).as_bytes()
    }

    fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }

    fn open_sealed(&self, blob: &[u8]) -> Result<[u8; SESSION_KEY_LEN], OespError> {
        sealed::open(&self.exchange, blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rng::OsEntropy;
    use crate::crypto::signing::verify_detached;
    use crate::did::DID_PREFIX;

    #[test]
    fn test_did_matches_identity_key() {
        let ks = MemoryKeystore::generate();
        assert!(ks.did().starts_with(DID_PREFIX));
        assert_eq!(ks.did(), derive_did(&ks.identity_public()));
    }

    #[test]
    fn test_sign_verifies_against_identity_public() {
        let ks = MemoryKeystore::generate();
        let sig = ks.sign(b"input");
        assert!(verify_detached(&ks.identity_public(), b"input", &sig));
    }

    #[test]
    fn test_open_sealed_with_own_exchange_key() {
        let ks = MemoryKeystore::generate();
        let session_key = [9u8; SESSION_KEY_LEN];
        let blob = sealed::seal(&ks.exchange_public(), &session_key, &mut OsEntropy).unwrap();
        assert_eq!(ks.open_sealed(&blob).unwrap(), session_key);
    }
}
