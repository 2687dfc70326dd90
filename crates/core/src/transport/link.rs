//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Abstract byte-frame link. The framing protocol sits on top of this trait;
//! the radio itself (GATT plumbing, MTU negotiation, platform stacks) lives
//! behind it and is out of scope here.

use crate::transport::TransportError;

/// One write per frame; delivery of peer frames arrives via the notify path
/// wired into [`super::NotifySink`].
#[async_trait::async_trait]
pub trait BleLink: Send + Sync {
    /// Write a single frame PDU to the peer.
    async fn write(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// MTU hint from the link, if the stack exposes one.
    fn mtu_hint(&self) -> Option<usize> {
        None
    }
}
