//
// Copyright (c) 2025 OESP CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: oesp — offline exchange, secured.
//

//! Receive-side reassembly: a pure state machine over frames, link-agnostic
//! and synchronous. The caller feeds inbound frames and writes the returned
//! replies back to the peer.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::b64url;
use crate::transport::frames::{Frame, NackReason};

/// What the reassembler wants done after a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverEvent {
    /// Send this frame back to the peer.
    Reply(Frame),
    /// A complete token was received and its hash verified.
    Token(String),
}

struct Inflight {
    sid: String,
    expected_sha: String,
    parts: usize,
    chunks: Vec<Option<Vec<u8>>>,
    received: usize,
}

/// Reassembles one transfer at a time, keyed by `sid`.
pub struct Reassembler {
    max_chunk_bytes: usize,
    session: Option<Inflight>,
}

impl Reassembler {
    pub fn new(max_chunk_bytes: usize) -> Self {
        Self {
            max_chunk_bytes,
            session: None,
        }
    }

    /// Feed one inbound frame; returns replies to write and, on a verified
    /// END, the reassembled token.
    pub fn handle_frame(&mut self, frame: Frame) -> Vec<ReceiverEvent> {
        match frame {
            Frame::Start {
                sid,
                parts,
                sha256,
                ..
            } => {
                // A new START supersedes any transfer in flight.
                self.session = Some(Inflight {
                    sid: sid.clone(),
                    expected_sha: sha256,
                    parts,
                    chunks: vec![None; parts],
                    received: 0,
                });
                vec![ReceiverEvent::Reply(Frame::Ack { sid, ack: -1 })]
            }

            Frame::Chunk { sid, seq, data } => {
                let Some(session) = self.session.as_mut() else {
                    return Vec::new();
                };
                if session.sid != sid {
                    return Vec::new();
                }
                if seq >= session.parts {
                    debug!(sid, seq, parts = session.parts, "chunk out of range");
                    self.session = None;
                    return vec![ReceiverEvent::Reply(Frame::Nack {
                        sid,
                        at: seq as i64,
                        reason: NackReason::BadSeq,
                    })];
                }
                let Ok(bytes) = b64url::decode(&data) else {
                    self.session = None;
                    return vec![ReceiverEvent::Reply(Frame::Nack {
                        sid,
                        at: seq as i64,
                        reason: NackReason::Unknown,
                    })];
                };
                if bytes.len() > self.max_chunk_bytes {
                    self.session = None;
                    return vec![ReceiverEvent::Reply(Frame::Nack {
                        sid,
                        at: seq as i64,
                        reason: NackReason::Unknown,
                    })];
                }
                if session.chunks[seq].is_none() {
                    session.received += 1;
                }
                session.chunks[seq] = Some(bytes);
                vec![ReceiverEvent::Reply(Frame::Ack {
                    sid,
                    ack: seq as i64,
                })]
            }

            Frame::End { sid } => {
                let Some(session) = self.session.take() else {
                    return Vec::new();
                };
                if session.sid != sid {
                    self.session = Some(session);
                    return Vec::new();
                }
                if session.received != session.parts {
                    debug!(
                        sid,
                        received = session.received,
                        parts = session.parts,
                        "transfer incomplete at END"
                    );
                    return vec![ReceiverEvent::Reply(Frame::Nack {
                        sid,
                        at: -1,
                        reason: NackReason::BadSeq,
                    })];
                }

                let mut full = Vec::new();
                for chunk in session.chunks.into_iter().flatten() {
                    full.extend_from_slice(&chunk);
                }
                let actual_sha = b64url::encode(&Sha256::digest(&full));
                if actual_sha != session.expected_sha {
                    debug!(sid, "hash mismatch at END, discarding transfer");
                    return vec![ReceiverEvent::Reply(Frame::Nack {
                        sid,
                        at: -1,
                        reason: NackReason::BadHash,
                    })];
                }

                match String::from_utf8(full) {
                    Ok(token) => vec![
                        ReceiverEvent::Reply(Frame::Ack { sid, ack: -1 }),
                        ReceiverEvent::Token(token),
                    ],
                    Err(_) => vec![ReceiverEvent::Reply(Frame::Nack {
                        sid,
                        at: -1,
                        reason: NackReason::Unknown,
                    })],
                }
            }

            // HELLO is a handshake concern above this layer; ACK/NACK are
            // sender-bound.
            Frame::Hello { .. } | Frame::Ack { .. } | Frame::Nack { .. } => Vec::new(),
        }
    }
}
