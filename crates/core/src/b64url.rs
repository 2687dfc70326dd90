//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! base64url codec: URL-safe alphabet, padding stripped on encode and
//! tolerated on decode.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::OespError;

/// Encode bytes as an unpadded base64url string.
pub fn encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode a base64url string. Trailing `=` padding is accepted and stripped.
pub fn decode(s: &str) -> Result<Vec<u8>, OespError> {
    URL_SAFE_NO_PAD
        .decode(s.trim_end_matches('='))
        .map_err(|e| OespError::InvalidFormat(format!("base64url: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_strips_padding() {
        assert_eq!(encode(b"f"), "Zg");
        assert_eq!(encode(b"fo"), "Zm8");
        assert_eq!(encode(b"foo"), "Zm9v");
    }

    #[test]
    fn test_decode_accepts_padded_and_unpadded() {
        assert_eq!(decode("Zg").unwrap(), b"f");
        assert_eq!(decode("Zg==").unwrap(), b"f");
        assert_eq!(decode("Zm8=").unwrap(), b"fo");
    }

    #[test]
    fn test_roundtrip_url_safe_alphabet() {
        let data: Vec<u8> = (0u8..=255).collect();
        let s = encode(&data);
        assert!(!s.contains('+') && !s.contains('/'));
        assert_eq!(decode(&s).unwrap(), data);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not base64 !").is_err());
    }
}
