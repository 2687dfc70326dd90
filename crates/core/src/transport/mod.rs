//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! BLE framing transport for carrying tokens over a byte-frame link.

use thiserror::Error;

pub mod frames;
pub mod link;
pub mod reassembly;
pub mod sender;

pub use frames::{
    Frame, NackReason, BLE_CHAR_META_UUID, BLE_CHAR_RX_UUID, BLE_CHAR_TX_UUID, BLE_SERVICE_UUID,
};
pub use link::BleLink;
pub use reassembly::{Reassembler, ReceiverEvent};
pub use sender::{BleSender, NotifySink, SenderConfig};

/// Errors surfaced by the framing transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("link write failed: {0}")]
    Link(String),

    #[error("no ACK for {frame} frame after {attempts} attempts")]
    AckTimeout { frame: &'static str, attempts: u32 },

    #[error("peer rejected transfer at {at}: {reason:?}")]
    Rejected { at: i64, reason: NackReason },
}
