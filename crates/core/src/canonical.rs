//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Canonical JSON serialization — the trust anchor shared by signing, AAD
//! construction, and verification.
//!
//! Rules: object keys in codepoint order, compact separators, UTF-8 output
//! with printable non-ASCII preserved, arrays in given order, and a
//! caller-supplied key exclusion set applied at every object depth.
//!
//! The writer walks the [`serde_json::Value`] tree explicitly rather than
//! relying on map-ordering behavior of the serializer, so the byte output is
//! independent of cargo feature unification (`preserve_order` et al.).

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::OespError;

/// Serialize `value` into canonical bytes, dropping every key in `exclude`
/// from every object at any depth.
pub fn canonical_json_bytes(value: &Value, exclude: &[&str]) -> Result<Vec<u8>, OespError> {
    let exclude: BTreeSet<&str> = exclude.iter().copied().collect();
    let mut out = Vec::with_capacity(128);
    write_value(&mut out, value, &exclude)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value, exclude: &BTreeSet<&str>) -> Result<(), OespError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&str> = map
                .keys()
                .map(String::as_str)
                .filter(|k| !exclude.contains(k))
                .collect();
            // Byte order on UTF-8 strings equals codepoint order.
            keys.sort_unstable();

            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_leaf(out, &Value::String((*key).to_string()))?;
                out.push(b':');
                write_value(out, &map[*key], exclude)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item, exclude)?;
            }
            out.push(b']');
        }
        leaf => write_leaf(out, leaf)?,
    }
    Ok(())
}

fn write_leaf(out: &mut Vec<u8>, leaf: &Value) -> Result<(), OespError> {
    serde_json::to_writer(&mut *out, leaf)
        .map_err(|e| OespError::InvalidFormat(format!("canonical serialization: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical(value: &Value) -> Vec<u8> {
        canonical_json_bytes(value, &[]).unwrap()
    }

    #[test]
    fn test_sorts_keys_recursively() {
        let value = json!({"b": 2, "a": 1, "c": {"z": 0, "x": 1}});
        assert_eq!(canonical(&value), br#"{"a":1,"b":2,"c":{"x":1,"z":0}}"#);
    }

    #[test]
    fn test_permutation_invariant() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":{"b":2,"a":3},"z":[1,2]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"z":[1,2],"y":{"a":3,"b":2},"x":1}"#).unwrap();
        assert_eq!(canonical(&a), canonical(&b));
    }

    #[test]
    fn test_exclusion_applies_at_every_depth() {
        let value = json!({"sig": "s", "body": {"sig": "inner", "keep": 1}});
        let out = canonical_json_bytes(&value, &["sig"]).unwrap();
        assert_eq!(out, br#"{"body":{"keep":1}}"#);
    }

    #[test]
    fn test_arrays_keep_order() {
        let value = json!({"a": [3, 1, 2]});
        assert_eq!(canonical(&value), br#"{"a":[3,1,2]}"#);
    }

    #[test]
    fn test_non_ascii_preserved() {
        let value = json!({"msg": "héllo \u{2764}"});
        let out = canonical(&value);
        let s = String::from_utf8(out).unwrap();
        assert_eq!(s, "{\"msg\":\"héllo \u{2764}\"}");
    }

    #[test]
    fn test_compact_separators_and_integers() {
        let value = json!({"n": 42, "s": "x", "b": true, "z": null});
        assert_eq!(canonical(&value), br#"{"b":true,"n":42,"s":"x","z":null}"#);
    }

    #[test]
    fn test_string_escapes_match_json() {
        let value = json!({"q": "a\"b\\c\n"});
        assert_eq!(canonical(&value), br#"{"q":"a\"b\\c\n"}"#);
    }
}
