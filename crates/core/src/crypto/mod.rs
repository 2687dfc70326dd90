//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Cryptographic primitives behind the envelope engine: AEAD, sealed boxes,
//! signature verification, and the RNG seam.

pub mod aead;
pub mod rng;
pub mod sealed;
pub mod signing;

pub use aead::{NONCE_LEN, SESSION_KEY_LEN};
pub use rng::{DeterministicRng, EnvelopeRng, OsEntropy};
pub use sealed::{SEALED_LEN, X25519_KEY_LEN};
