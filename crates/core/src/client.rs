//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! The envelope engine: pack a body into a token, unpack a token back into
//! plaintext.
//!
//! Pack order is load-bearing: the session key is sealed before the
//! provisional envelope is built, the AAD is computed while `iv`/`ct`/`sig`
//! are still empty, and the signature is taken over the canonical envelope
//! (with `iv` and `ct` filled) plus the raw ciphertext. Re-ordering any of
//! these steps breaks verification.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use zeroize::Zeroize;

use crate::b64url;
use crate::crypto::rng::{EnvelopeRng, OsEntropy};
use crate::crypto::{aead, sealed, NONCE_LEN, SESSION_KEY_LEN};
use crate::did::derive_did;
use crate::envelope::{
    Envelope, Recipient, Sender, ENC_CHACHA20_POLY1305, ENVELOPE_TYP, ENVELOPE_VERSION,
    KEX_X25519, MID_LEN, SIG_ED25519,
};
use crate::error::OespError;
use crate::keystore::Keystore;
use crate::replay::ReplayStore;
use crate::resolver::Resolver;
use crate::verify::{parse_token, Verifier, VerifyPolicy};

/// Options for [`OespClient::pack_with`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Seconds until expiry, from issue time.
    pub ttl_sec: i64,
    /// Envelope type tag.
    pub typ: String,
    /// Opaque application tag.
    pub tag: Option<String>,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            ttl_sec: 600,
            typ: ENVELOPE_TYP.to_string(),
            tag: None,
        }
    }
}

/// A verified, decrypted message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub mid: String,
    pub sid: String,
    pub ts: i64,
    pub exp: i64,
    pub from_did: String,
    pub to_did: String,
    pub plaintext: Vec<u8>,
}

/// Device-side envelope engine bound to a keystore.
pub struct OespClient {
    keystore: Arc<dyn Keystore>,
    resolver: Option<Arc<dyn Resolver>>,
    replay: Option<Arc<dyn ReplayStore>>,
    rng: Mutex<Box<dyn EnvelopeRng>>,
}

impl OespClient {
    pub fn new(keystore: Arc<dyn Keystore>) -> Self {
        Self {
            keystore,
            resolver: None,
            replay: None,
            rng: Mutex::new(Box::new(OsEntropy)),
        }
    }

    /// Attach the resolver required for packing.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Attach a client-side replay store consulted during unpack.
    pub fn with_replay_store(mut self, store: Arc<dyn ReplayStore>) -> Self {
        self.replay = Some(store);
        self
    }

    /// Replace the RNG. Test vectors only.
    pub fn with_rng(mut self, rng: Box<dyn EnvelopeRng>) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// This device's DID, derived from its Ed25519 identity key.
    pub fn did(&self) -> String {
        derive_did(&self.keystore.identity_public())
    }

    /// Pack raw bytes for `to_did` with default options.
    pub fn pack(&self, to_did: &str, body: &[u8]) -> Result<String, OespError> {
        self.pack_with(to_did, body, &PackOptions::default())
    }

    /// Pack a structured body: serialized compact, UTF-8.
    pub fn pack_json(&self, to_did: &str, body: &Value) -> Result<String, OespError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| OespError::InvalidFormat(format!("body serialization: {e}")))?;
        self.pack_with(to_did, &bytes, &PackOptions::default())
    }

    /// Pack raw bytes for `to_did`.
    pub fn pack_with(
        &self,
        to_did: &str,
        body: &[u8],
        options: &PackOptions,
    ) -> Result<String, OespError> {
        let resolver = self
            .resolver
            .as_ref()
            .ok_or_else(|| OespError::ResolveFailed("resolver required for packing".into()))?;
        let recipient_key = resolver.resolve(to_did).map_err(|e| match e {
            resolved @ OespError::ResolveFailed(_) => resolved,
            other => OespError::ResolveFailed(other.to_string()),
        })?;

        let now = chrono::Utc::now().timestamp();
        let sid = self.did();

        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());

        let mut mid_bytes = [0u8; MID_LEN];
        rng.fill(&mut mid_bytes);

        let mut session_key = [0u8; SESSION_KEY_LEN];
        rng.fill(&mut session_key);
        let ek = sealed::seal(&recipient_key, &session_key, rng.as_mut())?;

        // Provisional envelope: iv/ct/sig empty so the AAD can be taken over
        // every header field.
        let mut envelope = Envelope {
            v: ENVELOPE_VERSION,
            typ: options.typ.clone(),
            mid: b64url::encode(&mid_bytes),
            sid: sid.clone(),
            ts: now,
            exp: now + options.ttl_sec,
            from: Sender {
                did: sid,
                public: b64url::encode(&self.keystore.identity_public()),
            },
            to: Recipient {
                did: to_did.to_string(),
            },
            enc: ENC_CHACHA20_POLY1305.to_string(),
            kex: KEX_X25519.to_string(),
            ek: b64url::encode(&ek),
            iv: String::new(),
            ct: String::new(),
            sig_alg: SIG_ED25519.to_string(),
            sig: String::new(),
            tag: options.tag.clone(),
        };

        let aad = envelope.aad()?;
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill(&mut nonce);
        drop(rng);

        let ciphertext = aead::encrypt(&session_key, &nonce, body, &aad)?;
        session_key.zeroize();

        envelope.iv = b64url::encode(&nonce);
        envelope.ct = b64url::encode(&ciphertext);

        let signing_input = envelope.signing_input(&ciphertext)?;
        envelope.sig = b64url::encode(&self.keystore.sign(&signing_input));

        envelope.encode()
    }

    /// Verify and decrypt a token addressed to this device.
    pub fn unpack(&self, token: &str) -> Result<DecodedMessage, OespError> {
        self.unpack_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify and decrypt at an explicit `now` (UNIX seconds).
    pub fn unpack_at(&self, token: &str, now: i64) -> Result<DecodedMessage, OespError> {
        let envelope = parse_token(token)?;
        Verifier::new(VerifyPolicy::default()).verify_envelope_at(&envelope, now)?;

        if let Some(store) = &self.replay {
            if store.seen(&envelope.mid, &envelope.from.did)? {
                return Err(OespError::Replay(format!(
                    "{} from {}",
                    envelope.mid, envelope.from.did
                )));
            }
        }

        let ek = b64url::decode(&envelope.ek)?;
        let mut session_key = self.keystore.open_sealed(&ek)?;

        let iv_bytes = b64url::decode(&envelope.iv)?;
        let nonce: [u8; NONCE_LEN] = iv_bytes.as_slice().try_into().map_err(|_| {
            OespError::InvalidFormat(format!("nonce must be {NONCE_LEN} bytes"))
        })?;
        let ciphertext = b64url::decode(&envelope.ct)?;

        let aad = envelope.aad()?;
        let plaintext = aead::decrypt(&session_key, &nonce, &ciphertext, &aad);
        session_key.zeroize();
        let plaintext = plaintext?;

        // Only a fully decrypted message is recorded as seen.
        if let Some(store) = &self.replay {
            store.mark_seen(&envelope.mid, &envelope.from.did)?;
        }

        Ok(DecodedMessage {
            mid: envelope.mid,
            sid: envelope.sid,
            ts: envelope.ts,
            exp: envelope.exp,
            from_did: envelope.from.did,
            to_did: envelope.to.did,
            plaintext,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonical_json_bytes;
    use crate::keystore::MemoryKeystore;
    use crate::replay::MemoryReplayStore;
    use crate::resolver::MemoryResolver;

    fn pair() -> (OespClient, OespClient, String) {
        let sender_ks = Arc::new(MemoryKeystore::generate());
        let recipient_ks = Arc::new(MemoryKeystore::generate());
        let recipient_did = recipient_ks.did();

        let resolver = Arc::new(MemoryResolver::new());
        resolver.insert(recipient_did.clone(), recipient_ks.exchange_public());

        let sender = OespClient::new(sender_ks).with_resolver(resolver);
        let recipient = OespClient::new(recipient_ks);
        (sender, recipient, recipient_did)
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let (sender, recipient, recipient_did) = pair();
        let token = sender
            .pack_json(&recipient_did, &serde_json::json!({"msg": "hello"}))
            .unwrap();
        assert!(token.starts_with("OESP1."));

        let decoded = recipient.unpack(&token).unwrap();
        assert_eq!(decoded.plaintext, br#"{"msg":"hello"}"#);
        assert_eq!(decoded.from_did, sender.did());
        assert_eq!(decoded.to_did, recipient_did);
    }

    #[test]
    fn test_pack_requires_resolver() {
        let ks = Arc::new(MemoryKeystore::generate());
        let client = OespClient::new(ks);
        let err = client.pack("oesp:did:nobody", b"x").unwrap_err();
        assert_eq!(err.code(), "RESOLVE_FAILED");
    }

    #[test]
    fn test_unknown_recipient_is_resolve_failed() {
        let (sender, _, _) = pair();
        let err = sender.pack("oesp:did:unknown", b"x").unwrap_err();
        assert_eq!(err.code(), "RESOLVE_FAILED");
    }

    #[test]
    fn test_wrong_recipient_cannot_unpack() {
        let (sender, _, recipient_did) = pair();
        let other = OespClient::new(Arc::new(MemoryKeystore::generate()));
        let token = sender.pack(&recipient_did, b"secret").unwrap();
        let err = other.unpack(&token).unwrap_err();
        assert!(matches!(
            err,
            OespError::DecryptionFailed(_) | OespError::KexFailed(_)
        ));
    }

    #[test]
    fn test_tampered_mid_is_invalid_signature() {
        let (sender, recipient, recipient_did) = pair();
        let token = sender.pack(&recipient_did, b"payload").unwrap();

        let payload = b64url::decode(token.strip_prefix("OESP1.").unwrap()).unwrap();
        let mut value: Value = serde_json::from_slice(&payload).unwrap();
        value["mid"] = Value::String("corrupted".into());
        let tampered = format!(
            "OESP1.{}",
            b64url::encode(&canonical_json_bytes(&value, &[]).unwrap())
        );

        let err = recipient.unpack(&tampered).unwrap_err();
        assert_eq!(err.code(), "INVALID_SIGNATURE");
    }

    #[test]
    fn test_replay_store_rejects_second_unpack() {
        let (sender, recipient, recipient_did) = pair();
        let recipient = recipient.with_replay_store(Arc::new(MemoryReplayStore::new()));
        let token = sender.pack(&recipient_did, b"once").unwrap();

        assert!(recipient.unpack(&token).is_ok());
        let err = recipient.unpack(&token).unwrap_err();
        assert_eq!(err.code(), "REPLAY");
    }

    #[test]
    fn test_failed_decrypt_does_not_mark_seen() {
        let (sender, _, recipient_did) = pair();
        let store = Arc::new(MemoryReplayStore::new());
        let wrong =
            OespClient::new(Arc::new(MemoryKeystore::generate())).with_replay_store(store.clone());
        let token = sender.pack(&recipient_did, b"payload").unwrap();

        assert!(wrong.unpack(&token).is_err());
        let envelope = parse_token(&token).unwrap();
        assert!(!store.seen(&envelope.mid, &envelope.from.did).unwrap());
    }

    #[test]
    fn test_deterministic_rng_yields_stable_header_fields() {
        let (sender, _, recipient_did) = pair();
        let sender = sender.with_rng(Box::new(crate::crypto::DeterministicRng::new(b"A")));
        let token = sender.pack(&recipient_did, b"x").unwrap();
        let envelope = parse_token(&token).unwrap();
        assert_eq!(envelope.mid, b64url::encode(&[b'A'; MID_LEN]));
    }

    #[test]
    fn test_tag_travels_in_envelope() {
        let (sender, recipient, recipient_did) = pair();
        let options = PackOptions {
            tag: Some("inventory".into()),
            ..PackOptions::default()
        };
        let token = sender.pack_with(&recipient_did, b"x", &options).unwrap();
        let envelope = parse_token(&token).unwrap();
        assert_eq!(envelope.tag.as_deref(), Some("inventory"));
        assert!(recipient.unpack(&token).is_ok());
    }
}
