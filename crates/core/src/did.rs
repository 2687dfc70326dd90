//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Self-certifying device identifiers derived from Ed25519 identity keys.

use data_encoding::BASE32;
use sha2::{Digest, Sha256};

/// Prefix of every OESP DID.
pub const DID_PREFIX: &str = "oesp:did:";

/// Derive the DID for an identity public key:
/// `oesp:did:` + lowercase unpadded RFC 4648 base32 of SHA-256(key).
pub fn derive_did(pubkey: &[u8]) -> String {
    let digest = Sha256::digest(pubkey);
    let b32 = BASE32.encode(&digest);
    format!("{DID_PREFIX}{}", b32.trim_end_matches('=').to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        let pub_key = [0x01u8; 32];
        assert_eq!(
            derive_did(&pub_key),
            "oesp:did:olgw5bbcyqd7w3ijq2ipceylpxwx5qxx6xq5gc6z2uq7afjwg6jq"
        );
    }

    #[test]
    fn test_deterministic_with_prefix() {
        let pub_key = [0xabu8; 32];
        let a = derive_did(&pub_key);
        let b = derive_did(&pub_key);
        assert_eq!(a, b);
        assert!(a.starts_with(DID_PREFIX));
        assert!(!a.contains('='));
        assert_eq!(a, a.to_ascii_lowercase());
    }

    #[test]
    fn test_distinct_keys_distinct_dids() {
        assert_ne!(derive_did(&[0u8; 32]), derive_did(&[1u8; 32]));
    }
}
