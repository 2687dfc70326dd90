//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Token verification: parse, enforce policy, check identity and signature,
//! consult the replay store. First failure wins; the check order is part of
//! the protocol contract.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::b64url;
use crate::crypto::signing::verify_detached;
use crate::did::derive_did;
use crate::envelope::{
    Envelope, ENC_CHACHA20_POLY1305, ENVELOPE_TYP, KEX_X25519, SIG_ED25519,
};
use crate::error::OespError;
use crate::replay::ReplayStore;

/// Verification policy.
#[derive(Debug, Clone)]
pub struct VerifyPolicy {
    /// Accept envelopes whose `exp` has passed.
    pub allow_expired: bool,
    /// Maximum tolerated distance between `ts` and `now`, in seconds.
    pub max_clock_skew_sec: i64,
    /// Reject senders the device directory does not know.
    pub require_known_device: bool,
    /// Require this exact `typ` tag; `None` disables the check.
    pub enforce_typ: Option<String>,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            allow_expired: true,
            max_clock_skew_sec: 300,
            require_known_device: false,
            enforce_typ: Some(ENVELOPE_TYP.to_string()),
        }
    }
}

impl VerifyPolicy {
    /// The policy the sync server applies during commit.
    pub fn server(allow_expired: bool, max_clock_skew_sec: i64) -> Self {
        Self {
            allow_expired,
            max_clock_skew_sec,
            ..Self::default()
        }
    }
}

/// Lookup seam for `require_known_device`.
pub trait DeviceDirectory: Send + Sync {
    fn is_known(&self, did: &str) -> Result<bool, OespError>;
}

/// A successfully verified envelope and its signer.
#[derive(Debug, Clone)]
pub struct VerifiedEnvelope {
    pub envelope: Envelope,
    pub signer_did: String,
}

/// Parse a token into an envelope without verifying it.
pub fn parse_token(token: &str) -> Result<Envelope, OespError> {
    Envelope::decode(token)
}

/// Token verifier: policy plus optional replay store and device directory.
#[derive(Default)]
pub struct Verifier {
    policy: VerifyPolicy,
    replay: Option<Arc<dyn ReplayStore>>,
    devices: Option<Arc<dyn DeviceDirectory>>,
}

impl Verifier {
    pub fn new(policy: VerifyPolicy) -> Self {
        Self {
            policy,
            replay: None,
            devices: None,
        }
    }

    pub fn with_replay_store(mut self, store: Arc<dyn ReplayStore>) -> Self {
        self.replay = Some(store);
        self
    }

    pub fn with_device_directory(mut self, directory: Arc<dyn DeviceDirectory>) -> Self {
        self.devices = Some(directory);
        self
    }

    /// Verify a token against the wall clock.
    pub fn verify_token(&self, token: &str) -> Result<VerifiedEnvelope, OespError> {
        self.verify_token_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify a token at an explicit `now` (UNIX seconds).
    pub fn verify_token_at(&self, token: &str, now: i64) -> Result<VerifiedEnvelope, OespError> {
        let envelope = parse_token(token)?;
        self.verify_envelope_at(&envelope, now)?;
        Ok(VerifiedEnvelope {
            signer_did: envelope.from.did.clone(),
            envelope,
        })
    }

    /// Run every check on an already-parsed envelope.
    pub fn verify_envelope_at(&self, env: &Envelope, now: i64) -> Result<(), OespError> {
        // Type tag.
        if let Some(expected) = &self.policy.enforce_typ {
            if &env.typ != expected {
                return Err(OespError::InvalidFormat(format!(
                    "unexpected envelope type {:?}",
                    env.typ
                )));
            }
        }

        // Algorithm identifiers. Unknown strings are rejected outright rather
        // than falling through to a signature failure.
        if env.enc != ENC_CHACHA20_POLY1305 {
            return Err(OespError::UnsupportedAlg(format!("enc {:?}", env.enc)));
        }
        if env.kex != KEX_X25519 {
            return Err(OespError::UnsupportedAlg(format!("kex {:?}", env.kex)));
        }
        if env.sig_alg != SIG_ED25519 {
            return Err(OespError::UnsupportedAlg(format!("sig_alg {:?}", env.sig_alg)));
        }

        // Time policy.
        if !self.policy.allow_expired && env.exp < now {
            debug!(mid = %env.mid, exp = env.exp, now, "rejecting expired envelope");
            return Err(OespError::Expired(format!(
                "expired at {}, now {now}",
                env.exp
            )));
        }
        if (env.ts - now).abs() > self.policy.max_clock_skew_sec {
            return Err(OespError::ClockSkew(format!(
                "ts {} too far from now {now}",
                env.ts
            )));
        }

        // The sender DID must be self-certifying: derived from the embedded
        // public key and equal to `sid`.
        let pub_bytes = b64url::decode(&env.from.public)?;
        let derived = derive_did(&pub_bytes);
        if derived != env.from.did || env.from.did != env.sid {
            warn!(claimed = %env.from.did, %derived, "sender DID does not match public key");
            return Err(OespError::InvalidDid(env.from.did.clone()));
        }

        // Known-device policy.
        if self.policy.require_known_device {
            let known = match &self.devices {
                Some(directory) => directory.is_known(&env.from.did)?,
                None => false,
            };
            if !known {
                return Err(OespError::UnknownDevice(env.from.did.clone()));
            }
        }

        // Signature over canonical(envelope \ {sig}) ‖ raw ciphertext.
        let ct = b64url::decode(&env.ct)?;
        let sig = b64url::decode(&env.sig)?;
        let input = env.signing_input(&ct)?;
        if !verify_detached(&pub_bytes, &input, &sig) {
            warn!(mid = %env.mid, from = %env.from.did, "signature verification failed");
            return Err(OespError::InvalidSignature);
        }

        // Anti-replay, only after every other check has passed.
        if let Some(store) = &self.replay {
            if !store.check_and_mark(&env.mid, &env.from.did)? {
                debug!(mid = %env.mid, from = %env.from.did, "duplicate envelope");
                return Err(OespError::Replay(format!(
                    "{} from {}",
                    env.mid, env.from.did
                )));
            }
        }

        Ok(())
    }
}
