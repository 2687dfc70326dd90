//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Random byte sources for message IDs, session keys, nonces, and ephemeral
//! keys. The trait seam exists so test vectors can pin every random input.

use rand::rngs::OsRng;
use rand::RngCore;

/// Source of random bytes used by the envelope engine.
pub trait EnvelopeRng: Send {
    fn fill(&mut self, buf: &mut [u8]);
}

/// Operating-system entropy (the default).
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EnvelopeRng for OsEntropy {
    fn fill(&mut self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Cycles a fixed seed. Test-vector use only — never for production keys.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: Vec<u8>,
    pos: usize,
}

impl DeterministicRng {
    pub fn new(seed: &[u8]) -> Self {
        assert!(!seed.is_empty(), "seed must be non-empty");
        Self {
            seed: seed.to_vec(),
            pos: 0,
        }
    }
}

impl EnvelopeRng for DeterministicRng {
    fn fill(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.seed[self.pos % self.seed.len()];
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_rng_repeats() {
        let mut a = DeterministicRng::new(b"seed");
        let mut b = DeterministicRng::new(b"seed");
        let mut buf_a = [0u8; 10];
        let mut buf_b = [0u8; 10];
        a.fill(&mut buf_a);
        b.fill(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn test_deterministic_rng_advances() {
        let mut rng = DeterministicRng::new(b"ab");
        let mut first = [0u8; 2];
        let mut second = [0u8; 2];
        rng.fill(&mut first);
        rng.fill(&mut second);
        assert_eq!(&first, b"ab");
        assert_eq!(&second, b"ab");
    }

    #[test]
    fn test_os_entropy_fills() {
        let mut rng = OsEntropy;
        let mut buf = [0u8; 32];
        rng.fill(&mut buf);
        // Overwhelmingly unlikely to be all zero.
        assert!(buf.iter().any(|&b| b != 0));
    }
}
