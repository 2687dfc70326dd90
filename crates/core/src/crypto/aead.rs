//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! ChaCha20-Poly1305 AEAD over a per-message session key.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

use crate::error::OespError;

/// Session keys are always 32 bytes.
pub const SESSION_KEY_LEN: usize = 32;

/// AEAD nonces are always 12 bytes.
pub const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under `session_key` and `aad`. The returned ciphertext
/// carries the Poly1305 tag appended.
pub fn encrypt(
    session_key: &[u8; SESSION_KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, OespError> {
    let cipher = ChaCha20Poly1305::new_from_slice(session_key)
        .map_err(|_| OespError::DecryptionFailed("bad session key length".into()))?;
    cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| OespError::DecryptionFailed("AEAD seal failed".into()))
}

/// Decrypt and authenticate `(nonce, ciphertext)` under `session_key` and
/// `aad`. Any mismatch — key, nonce, tag, or AAD — fails uniformly.
pub fn decrypt(
    session_key: &[u8; SESSION_KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, OespError> {
    let cipher = ChaCha20Poly1305::new_from_slice(session_key)
        .map_err(|_| OespError::DecryptionFailed("bad session key length".into()))?;
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| OespError::DecryptionFailed("AEAD open failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_with_aad() {
        let key = [7u8; SESSION_KEY_LEN];
        let nonce = [9u8; NONCE_LEN];
        let ct = encrypt(&key, &nonce, b"payload", b"headers").unwrap();
        assert_eq!(decrypt(&key, &nonce, &ct, b"headers").unwrap(), b"payload");
    }

    #[test]
    fn test_aad_mismatch_fails() {
        let key = [7u8; SESSION_KEY_LEN];
        let nonce = [9u8; NONCE_LEN];
        let ct = encrypt(&key, &nonce, b"payload", b"headers").unwrap();
        assert!(decrypt(&key, &nonce, &ct, b"other").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [7u8; SESSION_KEY_LEN];
        let nonce = [9u8; NONCE_LEN];
        let mut ct = encrypt(&key, &nonce, b"payload", b"").unwrap();
        ct[0] ^= 1;
        assert!(decrypt(&key, &nonce, &ct, b"").is_err());
    }
}
