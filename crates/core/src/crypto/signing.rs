//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Ed25519 signature helpers over the envelope signing input.

use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// Verify a detached Ed25519 signature. Malformed keys or signatures count
/// as verification failure, never as a distinct error.
pub fn verify_detached(public: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; PUBLIC_KEY_LENGTH]>::try_from(public) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
        return false;
    };
    verifying_key
        .verify(message, &Signature::from_bytes(&sig_bytes))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    #[test]
    fn test_verify_valid_signature() {
        let key = SigningKey::generate(&mut OsRng);
        let sig = key.sign(b"message");
        assert!(verify_detached(
            key.verifying_key().as_bytes(),
            b"message",
            &sig.to_bytes()
        ));
    }

    #[test]
    fn test_reject_wrong_message() {
        let key = SigningKey::generate(&mut OsRng);
        let sig = key.sign(b"message");
        assert!(!verify_detached(
            key.verifying_key().as_bytes(),
            b"other",
            &sig.to_bytes()
        ));
    }

    #[test]
    fn test_malformed_inputs_fail_closed() {
        let key = SigningKey::generate(&mut OsRng);
        let sig = key.sign(b"message");
        assert!(!verify_detached(b"short", b"message", &sig.to_bytes()));
        assert!(!verify_detached(
            key.verifying_key().as_bytes(),
            b"message",
            b"short"
        ));
    }
}
