//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! The v1 envelope: the signed, encrypted unit carried inside a token.
//!
//! Two signing domains share one envelope. The AAD covers every header but
//! not `ct`/`sig`/`iv` (which do not yet exist when the AEAD runs); the
//! signature covers everything but `sig`, followed by the *raw* ciphertext
//! bytes — never their base64 form. [`Envelope::aad`] and
//! [`Envelope::signing_input`] are the only builders of those byte strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::b64url;
use crate::canonical::canonical_json_bytes;
use crate::error::OespError;

/// Literal prefix of the token wire form.
pub const TOKEN_PREFIX: &str = "OESP1.";

/// The only supported envelope format version.
pub const ENVELOPE_VERSION: u32 = 1;

/// Default envelope type tag.
pub const ENVELOPE_TYP: &str = "oesp.envelope";

/// Supported AEAD algorithm identifier.
pub const ENC_CHACHA20_POLY1305: &str = "CHACHA20-POLY1305";

/// Supported key-exchange identifier.
pub const KEX_X25519: &str = "X25519";

/// Supported signature algorithm identifier.
pub const SIG_ED25519: &str = "Ed25519";

/// Message IDs are base64url of this many random bytes.
pub const MID_LEN: usize = 12;

/// Sender identity: DID plus the base64url Ed25519 public key it commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub did: String,
    #[serde(rename = "pub")]
    pub public: String,
}

/// Recipient identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub did: String,
}

/// The v1 envelope object. Field names match the wire form exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u32,
    pub typ: String,
    pub mid: String,
    pub sid: String,
    pub ts: i64,
    pub exp: i64,
    pub from: Sender,
    pub to: Recipient,
    pub enc: String,
    pub kex: String,
    pub ek: String,
    pub iv: String,
    pub ct: String,
    pub sig_alg: String,
    pub sig: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Envelope {
    /// The envelope as a JSON value, for canonicalization and storage.
    pub fn to_value(&self) -> Result<Value, OespError> {
        serde_json::to_value(self)
            .map_err(|e| OespError::InvalidFormat(format!("envelope serialization: {e}")))
    }

    /// AAD bound into the AEAD tag: canonical envelope sans `ct`, `sig`, `iv`.
    pub fn aad(&self) -> Result<Vec<u8>, OespError> {
        canonical_json_bytes(&self.to_value()?, &["ct", "sig", "iv"])
    }

    /// The Ed25519 signing input: canonical envelope sans `sig`, with the raw
    /// ciphertext bytes appended.
    pub fn signing_input(&self, ciphertext: &[u8]) -> Result<Vec<u8>, OespError> {
        let mut input = canonical_json_bytes(&self.to_value()?, &["sig"])?;
        input.extend_from_slice(ciphertext);
        Ok(input)
    }

    /// Encode to the token wire form `OESP1.<base64url(canonical json)>`.
    pub fn encode(&self) -> Result<String, OespError> {
        let payload = canonical_json_bytes(&self.to_value()?, &[])?;
        Ok(format!("{TOKEN_PREFIX}{}", b64url::encode(&payload)))
    }

    /// Parse and schema-check a token. Structural problems — prefix, base64,
    /// JSON, missing fields, bad version, `exp < ts` — are `INVALID_FORMAT`.
    pub fn decode(token: &str) -> Result<Self, OespError> {
        let payload_b64 = token
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| OespError::InvalidFormat("missing OESP1. prefix".into()))?;
        let payload = b64url::decode(payload_b64)?;
        let envelope: Envelope = serde_json::from_slice(&payload)
            .map_err(|e| OespError::InvalidFormat(format!("envelope JSON: {e}")))?;

        if envelope.v != ENVELOPE_VERSION {
            return Err(OespError::InvalidFormat(format!(
                "unsupported envelope version {}",
                envelope.v
            )));
        }
        if envelope.exp < envelope.ts {
            return Err(OespError::InvalidFormat(format!(
                "exp {} precedes ts {}",
                envelope.exp, envelope.ts
            )));
        }
        Ok(envelope)
    }
}
