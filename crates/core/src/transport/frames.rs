//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! BLE frame vocabulary. Each frame is one JSON document written as a single
//! link PDU, tagged by `t` and a short session id `sid`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed GATT service UUID.
pub const BLE_SERVICE_UUID: &str = "e95f1234-5678-4321-8765-abcdef012345";
/// Central → Peripheral writes.
pub const BLE_CHAR_RX_UUID: &str = "e95f1235-5678-4321-8765-abcdef012345";
/// Peripheral → Central notifies.
pub const BLE_CHAR_TX_UUID: &str = "e95f1236-5678-4321-8765-abcdef012345";
/// Read-only metadata characteristic.
pub const BLE_CHAR_META_UUID: &str = "e95f1237-5678-4321-8765-abcdef012345";

/// Reason carried by a NACK frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NackReason {
    BadHash,
    Timeout,
    BadSeq,
    Unknown,
}

/// A single link PDU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Frame {
    #[serde(rename = "HELLO")]
    Hello {
        sid: String,
        ver: u32,
        did: String,
        caps: Value,
    },
    #[serde(rename = "START")]
    Start {
        sid: String,
        mid: String,
        #[serde(rename = "totalLen")]
        total_len: usize,
        parts: usize,
        sha256: String,
    },
    #[serde(rename = "CHUNK")]
    Chunk { sid: String, seq: usize, data: String },
    #[serde(rename = "END")]
    End { sid: String },
    #[serde(rename = "ACK")]
    Ack { sid: String, ack: i64 },
    #[serde(rename = "NACK")]
    Nack {
        sid: String,
        at: i64,
        reason: NackReason,
    },
}

impl Frame {
    /// The frame's session id.
    pub fn sid(&self) -> &str {
        match self {
            Frame::Hello { sid, .. }
            | Frame::Start { sid, .. }
            | Frame::Chunk { sid, .. }
            | Frame::End { sid }
            | Frame::Ack { sid, .. }
            | Frame::Nack { sid, .. } => sid,
        }
    }

    /// The wire tag, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "HELLO",
            Frame::Start { .. } => "START",
            Frame::Chunk { .. } => "CHUNK",
            Frame::End { .. } => "END",
            Frame::Ack { .. } => "ACK",
            Frame::Nack { .. } => "NACK",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_tag_roundtrip() {
        let frame = Frame::Chunk {
            sid: "ab12".into(),
            seq: 3,
            data: "AAAA".into(),
        };
        let bytes = frame.encode().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(r#""t":"CHUNK""#));
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_start_uses_total_len_wire_name() {
        let frame = Frame::Start {
            sid: "s".into(),
            mid: "m".into(),
            total_len: 10,
            parts: 2,
            sha256: "h".into(),
        };
        let text = String::from_utf8(frame.encode().unwrap()).unwrap();
        assert!(text.contains(r#""totalLen":10"#));
    }

    #[test]
    fn test_nack_reason_wire_names() {
        let frame = Frame::Nack {
            sid: "s".into(),
            at: -1,
            reason: NackReason::BadHash,
        };
        let text = String::from_utf8(frame.encode().unwrap()).unwrap();
        assert!(text.contains(r#""reason":"BAD_HASH""#));
    }

    #[test]
    fn test_ack_negative_one_for_control_frames() {
        let bytes = br#"{"t":"ACK","sid":"s","ack":-1}"#;
        assert_eq!(
            Frame::decode(bytes).unwrap(),
            Frame::Ack {
                sid: "s".into(),
                ack: -1
            }
        );
    }
}
