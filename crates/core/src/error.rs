//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Error hierarchy for OESP envelope and verification operations.
//!
//! Every variant carries a stable string code (see [`OespError::code`]) which
//! is the value surfaced to callers and over HTTP error envelopes. The
//! free-form detail string is for operators; it never replaces the code.

use thiserror::Error;

/// Typed errors for pack, unpack, and verification.
#[derive(Error, Debug)]
pub enum OespError {
    #[error("invalid envelope format: {0}")]
    InvalidFormat(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),

    #[error("sender DID does not match public key: {0}")]
    InvalidDid(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("envelope expired: {0}")]
    Expired(String),

    #[error("timestamp outside allowed clock skew: {0}")]
    ClockSkew(String),

    #[error("replay detected: {0}")]
    Replay(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("key exchange failed: {0}")]
    KexFailed(String),

    #[error("DID resolution failed: {0}")]
    ResolveFailed(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("unknown sender device: {0}")]
    UnknownDevice(String),
}

impl OespError {
    /// Stable string code for this error, as surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            OespError::InvalidFormat(_) => "INVALID_FORMAT",
            OespError::UnsupportedAlg(_) => "UNSUPPORTED_ALG",
            OespError::InvalidDid(_) => "INVALID_DID",
            OespError::InvalidSignature => "INVALID_SIGNATURE",
            OespError::Expired(_) => "EXPIRED",
            OespError::ClockSkew(_) => "CLOCK_SKEW",
            OespError::Replay(_) => "REPLAY",
            OespError::DecryptionFailed(_) => "DECRYPTION_FAILED",
            OespError::KexFailed(_) => "KEX_FAILED",
            OespError::ResolveFailed(_) => "RESOLVE_FAILED",
            OespError::Storage(_) => "STORAGE_ERROR",
            OespError::UnknownDevice(_) => "UNKNOWN_DEVICE",
        }
    }

    /// Hard failures indicate tampering and deserve louder logging than the
    /// soft, expected operational outcomes (`REPLAY`, `EXPIRED`).
    pub fn is_hard(&self) -> bool {
        matches!(self, OespError::InvalidSignature | OespError::InvalidDid(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(OespError::InvalidSignature.code(), "INVALID_SIGNATURE");
        assert_eq!(OespError::Replay("m1".into()).code(), "REPLAY");
        assert_eq!(OespError::Storage("db".into()).code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_hardness_split() {
        assert!(OespError::InvalidSignature.is_hard());
        assert!(OespError::InvalidDid("d".into()).is_hard());
        assert!(!OespError::Expired("e".into()).is_hard());
        assert!(!OespError::Replay("m".into()).is_hard());
    }
}
