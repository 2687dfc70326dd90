//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Send side of the BLE framing protocol: START, then CHUNKs in increasing
//! `seq`, then END. Each outstanding frame awaits its ACK before the next is
//! emitted — no pipelining — with a per-frame timeout and bounded retries
//! under the same `sid`.

use std::time::Duration;

use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::b64url;
use crate::transport::frames::Frame;
use crate::transport::link::BleLink;
use crate::transport::TransportError;

/// Send-side tuning.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Maximum chunk body size before base64url expansion.
    pub max_chunk_bytes: usize,
    /// How long to wait for each expected ACK.
    pub frame_timeout: Duration,
    /// Attempts per frame before giving up.
    pub retries: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: 1024,
            frame_timeout: Duration::from_millis(3000),
            retries: 3,
        }
    }
}

/// Feed peer notifications into the sender. Undecodable PDUs are dropped.
#[derive(Clone)]
pub struct NotifySink(mpsc::UnboundedSender<Frame>);

impl NotifySink {
    pub fn push(&self, data: &[u8]) {
        match Frame::decode(data) {
            Ok(frame) => {
                let _ = self.0.send(frame);
            }
            Err(e) => debug!("dropping undecodable notify PDU: {e}"),
        }
    }
}

/// Token sender over an abstract BLE link.
pub struct BleSender<L: BleLink> {
    link: L,
    config: SenderConfig,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl<L: BleLink> BleSender<L> {
    /// Wire the returned [`NotifySink`] to the link's notify callback.
    pub fn new(link: L, config: SenderConfig) -> (Self, NotifySink) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                link,
                config,
                inbound: tokio::sync::Mutex::new(rx),
            },
            NotifySink(tx),
        )
    }

    /// Send one token with a fresh session id.
    pub async fn send_token(&self, token: &str) -> Result<(), TransportError> {
        let mut sid_bytes = [0u8; 4];
        rand::rngs::OsRng.fill_bytes(&mut sid_bytes);
        self.send_token_as(token, &hex::encode(sid_bytes)).await
    }

    /// Send one token under a caller-chosen session id.
    pub async fn send_token_as(&self, token: &str, sid: &str) -> Result<(), TransportError> {
        let token_bytes = token.as_bytes();
        let chunks: Vec<&[u8]> = token_bytes.chunks(self.config.max_chunk_bytes).collect();

        let mut mid_bytes = [0u8; 4];
        rand::rngs::OsRng.fill_bytes(&mut mid_bytes);

        let start = Frame::Start {
            sid: sid.to_string(),
            mid: hex::encode(mid_bytes),
            total_len: token_bytes.len(),
            parts: chunks.len(),
            sha256: b64url::encode(&Sha256::digest(token_bytes)),
        };
        self.send_with_ack(&start, -1).await?;

        for (seq, chunk) in chunks.iter().enumerate() {
            let frame = Frame::Chunk {
                sid: sid.to_string(),
                seq,
                data: b64url::encode(chunk),
            };
            self.send_with_ack(&frame, seq as i64).await?;
        }

        self.send_with_ack(
            &Frame::End {
                sid: sid.to_string(),
            },
            -1,
        )
        .await
    }

    async fn send_with_ack(&self, frame: &Frame, expected_ack: i64) -> Result<(), TransportError> {
        let payload = frame.encode()?;
        let sid = frame.sid();

        for attempt in 1..=self.config.retries {
            self.link.write(&payload).await?;

            let mut inbound = self.inbound.lock().await;
            match timeout(self.config.frame_timeout, wait_for_reply(&mut inbound, sid)).await {
                Ok(Reply::Ack(ack)) if ack == expected_ack => return Ok(()),
                Ok(Reply::Ack(ack)) => {
                    debug!(
                        kind = frame.kind(),
                        expected = expected_ack,
                        got = ack,
                        "unexpected ack, retrying"
                    );
                }
                Ok(Reply::Nack { at, reason }) => {
                    warn!(kind = frame.kind(), at, ?reason, "peer rejected transfer");
                    return Err(TransportError::Rejected { at, reason });
                }
                Ok(Reply::Closed) => {
                    return Err(TransportError::Link("notify channel closed".into()));
                }
                Err(_) => {
                    debug!(
                        kind = frame.kind(),
                        attempt,
                        retries = self.config.retries,
                        "ack timeout"
                    );
                }
            }
        }

        Err(TransportError::AckTimeout {
            frame: frame.kind(),
            attempts: self.config.retries,
        })
    }
}

enum Reply {
    Ack(i64),
    Nack {
        at: i64,
        reason: crate::transport::frames::NackReason,
    },
    Closed,
}

async fn wait_for_reply(inbound: &mut mpsc::UnboundedReceiver<Frame>, sid: &str) -> Reply {
    loop {
        match inbound.recv().await {
            Some(Frame::Ack { sid: frame_sid, ack }) if frame_sid == sid => {
                return Reply::Ack(ack)
            }
            Some(Frame::Nack {
                sid: frame_sid,
                at,
                reason,
            }) if frame_sid == sid => return Reply::Nack { at, reason },
            Some(_) => continue,
            None => return Reply::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::reassembly::{Reassembler, ReceiverEvent};
    use std::sync::{Arc, Mutex};

    /// Loopback link: every written frame is fed straight into a
    /// [`Reassembler`], whose replies come back through the notify sink.
    struct LoopbackLink {
        receiver: Arc<Mutex<Reassembler>>,
        tokens: Arc<Mutex<Vec<String>>>,
        sink: Arc<Mutex<Option<NotifySink>>>,
        drop_first_chunk: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl BleLink for LoopbackLink {
        async fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
            let decoded = Frame::decode(frame).unwrap();

            // Optionally drop one CHUNK to exercise the retry path.
            if let Frame::Chunk { seq: 0, .. } = decoded {
                let mut drop_flag = self.drop_first_chunk.lock().unwrap();
                if *drop_flag {
                    *drop_flag = false;
                    return Ok(());
                }
            }

            let events = self.receiver.lock().unwrap().handle_frame(decoded);
            for event in events {
                match event {
                    ReceiverEvent::Reply(reply) => {
                        let sink = self.sink.lock().unwrap();
                        sink.as_ref().unwrap().push(&reply.encode().unwrap());
                    }
                    ReceiverEvent::Token(token) => self.tokens.lock().unwrap().push(token),
                }
            }
            Ok(())
        }
    }

    fn loopback(drop_first_chunk: bool) -> (BleSender<LoopbackLink>, Arc<Mutex<Vec<String>>>) {
        let tokens = Arc::new(Mutex::new(Vec::new()));
        let sink_slot = Arc::new(Mutex::new(None));
        let link = LoopbackLink {
            receiver: Arc::new(Mutex::new(Reassembler::new(8))),
            tokens: Arc::clone(&tokens),
            sink: Arc::clone(&sink_slot),
            drop_first_chunk: Mutex::new(drop_first_chunk),
        };
        let (sender, sink) = BleSender::new(
            link,
            SenderConfig {
                max_chunk_bytes: 8,
                frame_timeout: Duration::from_millis(50),
                retries: 3,
            },
        );
        *sink_slot.lock().unwrap() = Some(sink);
        (sender, tokens)
    }

    #[tokio::test]
    async fn test_send_token_reassembles_on_receiver() {
        let (sender, tokens) = loopback(false);
        sender.send_token_as("OESP1.sixteen-bytes!", "s1").await.unwrap();
        assert_eq!(tokens.lock().unwrap().as_slice(), ["OESP1.sixteen-bytes!"]);
    }

    #[tokio::test]
    async fn test_lost_chunk_is_retried() {
        let (sender, tokens) = loopback(true);
        sender.send_token_as("OESP1.sixteen-bytes!", "s2").await.unwrap();
        assert_eq!(tokens.lock().unwrap().as_slice(), ["OESP1.sixteen-bytes!"]);
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        struct DeafLink;
        #[async_trait::async_trait]
        impl BleLink for DeafLink {
            async fn write(&self, _frame: &[u8]) -> Result<(), TransportError> {
                Ok(())
            }
        }

        let (sender, _sink) = BleSender::new(
            DeafLink,
            SenderConfig {
                max_chunk_bytes: 8,
                frame_timeout: Duration::from_millis(10),
                retries: 2,
            },
        );
        let err = sender.send_token_as("OESP1.x", "s3").await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::AckTimeout {
                frame: "START",
                attempts: 2
            }
        ));
    }
}
