//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Sealed-box construction for the per-message session key.
//!
//! An ephemeral X25519 keypair is generated per envelope; the blob is
//! `eph_pub(32) ‖ chacha20poly1305(session_key)` where the AEAD key and nonce
//! come from HKDF-SHA256 over the ECDH shared secret, with the info string
//! binding both public keys. The recipient needs only its long-term X25519
//! private key to open.

use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::crypto::aead::{self, NONCE_LEN, SESSION_KEY_LEN};
use crate::crypto::rng::EnvelopeRng;
use crate::error::OespError;

/// Byte length of an X25519 public key.
pub const X25519_KEY_LEN: usize = 32;

/// Fixed size of a sealed session key blob: ephemeral key, ciphertext, tag.
pub const SEALED_LEN: usize = X25519_KEY_LEN + SESSION_KEY_LEN + 16;

const SEALED_BOX_INFO: &[u8] = b"OESP-SEALED-BOX-V1";

/// Seal `session_key` to `recipient_pub` with a fresh ephemeral keypair.
pub fn seal(
    recipient_pub: &[u8; X25519_KEY_LEN],
    session_key: &[u8; SESSION_KEY_LEN],
    rng: &mut dyn EnvelopeRng,
) -> Result<Vec<u8>, OespError> {
    let mut eph_bytes = [0u8; X25519_KEY_LEN];
    rng.fill(&mut eph_bytes);
    let eph_secret = StaticSecret::from(eph_bytes);
    eph_bytes.zeroize();
    let eph_public = PublicKey::from(&eph_secret);

    let (mut key, nonce) = derive_seal_material(
        &eph_secret,
        &PublicKey::from(*recipient_pub),
        eph_public.as_bytes(),
        recipient_pub,
    )?;

    let sealed = aead::encrypt(&key, &nonce, session_key, &[]);
    key.zeroize();

    let mut out = Vec::with_capacity(SEALED_LEN);
    out.extend_from_slice(eph_public.as_bytes());
    out.extend_from_slice(&sealed?);
    Ok(out)
}

/// Open a sealed blob with the recipient's long-term X25519 private key.
pub fn open(
    recipient_secret: &StaticSecret,
    blob: &[u8],
) -> Result<[u8; SESSION_KEY_LEN], OespError> {
    if blob.len() != SEALED_LEN {
        return Err(OespError::KexFailed(format!(
            "sealed key blob must be {SEALED_LEN} bytes, got {}",
            blob.len()
        )));
    }

    let mut eph_pub_bytes = [0u8; X25519_KEY_LEN];
    eph_pub_bytes.copy_from_slice(&blob[..X25519_KEY_LEN]);
    let eph_public = PublicKey::from(eph_pub_bytes);
    let recipient_pub = PublicKey::from(recipient_secret);

    let (mut key, nonce) = derive_seal_material(
        recipient_secret,
        &eph_public,
        &eph_pub_bytes,
        recipient_pub.as_bytes(),
    )?;

    let opened = aead::decrypt(&key, &nonce, &blob[X25519_KEY_LEN..], &[]);
    key.zeroize();

    let opened = opened.map_err(|_| OespError::DecryptionFailed("sealed box open failed".into()))?;
    let mut session_key = [0u8; SESSION_KEY_LEN];
    session_key.copy_from_slice(&opened);
    Ok(session_key)
}

/// ECDH followed by HKDF-Extract/Expand into an AEAD key and nonce. The info
/// parameter binds the sealed box to both public keys.
fn derive_seal_material(
    my_secret: &StaticSecret,
    their_public: &PublicKey,
    eph_pub: &[u8; X25519_KEY_LEN],
    recipient_pub: &[u8; X25519_KEY_LEN],
) -> Result<([u8; SESSION_KEY_LEN], [u8; NONCE_LEN]), OespError> {
    let shared = my_secret.diffie_hellman(their_public);

    // Reject low-order points (all-zero shared secret).
    if shared.as_bytes().iter().all(|&b| b == 0) {
        return Err(OespError::KexFailed("ECDH produced zero shared secret".into()));
    }

    let mut info = Vec::with_capacity(SEALED_BOX_INFO.len() + 2 * X25519_KEY_LEN);
    info.extend_from_slice(SEALED_BOX_INFO);
    info.extend_from_slice(eph_pub);
    info.extend_from_slice(recipient_pub);

    let hkdf = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut okm = [0u8; SESSION_KEY_LEN + NONCE_LEN];
    hkdf.expand(&info, &mut okm)
        .map_err(|_| OespError::KexFailed("HKDF expand failed".into()))?;

    let mut key = [0u8; SESSION_KEY_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    key.copy_from_slice(&okm[..SESSION_KEY_LEN]);
    nonce.copy_from_slice(&okm[SESSION_KEY_LEN..]);
    okm.zeroize();
    Ok((key, nonce))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rng::OsEntropy;

    fn recipient() -> (StaticSecret, [u8; 32]) {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public = *PublicKey::from(&secret).as_bytes();
        (secret, public)
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let (secret, public) = recipient();
        let session_key = [0x42u8; SESSION_KEY_LEN];
        let blob = seal(&public, &session_key, &mut OsEntropy).unwrap();
        assert_eq!(blob.len(), SEALED_LEN);
        assert_eq!(open(&secret, &blob).unwrap(), session_key);
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let (_, public) = recipient();
        let (other_secret, _) = recipient();
        let blob = seal(&public, &[1u8; SESSION_KEY_LEN], &mut OsEntropy).unwrap();
        assert!(open(&other_secret, &blob).is_err());
    }

    #[test]
    fn test_tampered_blob_fails() {
        let (secret, public) = recipient();
        let mut blob = seal(&public, &[1u8; SESSION_KEY_LEN], &mut OsEntropy).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 1;
        assert!(open(&secret, &blob).is_err());
    }

    #[test]
    fn test_truncated_blob_is_kex_error() {
        let (secret, public) = recipient();
        let blob = seal(&public, &[1u8; SESSION_KEY_LEN], &mut OsEntropy).unwrap();
        let err = open(&secret, &blob[..SEALED_LEN - 1]).unwrap_err();
        assert_eq!(err.code(), "KEX_FAILED");
    }

    #[test]
    fn test_fresh_ephemeral_per_seal() {
        let (_, public) = recipient();
        let a = seal(&public, &[1u8; SESSION_KEY_LEN], &mut OsEntropy).unwrap();
        let b = seal(&public, &[1u8; SESSION_KEY_LEN], &mut OsEntropy).unwrap();
        assert_ne!(a, b);
    }
}
