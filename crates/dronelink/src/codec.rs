// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame codec: bytes <-> [`Packet`].
//!
//! The pump only depends on the [`Codec`] trait. [`FrameCodec`] is the
//! reference implementation used by every built-in link:
//!
//! ```text
//! +------+------------+-----+------+-----+--------------+-----------+-------------+
//! | 0xFD | len u16 LE | sys | comp | seq | msgid u16 LE | JSON body | CRC-32 LE   |
//! +------+------------+-----+------+-----+--------------+-----------+-------------+
//! ```
//!
//! The CRC covers every byte after the magic up to the end of the body.
//!
//! # Resynchronisation
//!
//! Every rejection consumes exactly one byte. The length field is only
//! trusted once the CRC over it checks out, so a stray `0xFD` in line
//! noise or a truncated frame never swallows the valid frames behind it:
//! the decoder slides forward to the next magic byte and tries again.
//!
//! The decoder never panics on arbitrary input.

use crate::error::{Error, Result};
use crate::message::{Header, Message, Packet};
use std::sync::atomic::{AtomicU64, Ordering};

/// Start-of-frame marker.
pub const FRAME_MAGIC: u8 = 0xFD;

/// Bytes before the body: magic, length, sys, comp, seq, msgid.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Trailing CRC-32.
pub const FRAME_CRC_SIZE: usize = 4;

/// Default maximum body size (anti-garbage protection).
pub const DEFAULT_MAX_BODY_SIZE: usize = 4096;

/// Outcome of one decode attempt over the front of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A complete packet; `consumed` bytes should be drained.
    Packet(Packet, usize),
    /// The buffer holds a partial frame.
    NeedMoreData,
    /// `consumed` bytes are garbage and should be dropped.
    Malformed { consumed: usize, reason: String },
}

/// Bytes <-> typed packets.
pub trait Codec: Send + Sync {
    /// Decode the first frame at the front of `buf`.
    fn decode(&self, buf: &[u8]) -> Decoded;

    /// Encode a packet into a complete frame.
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>>;
}

/// Reference framing codec (see module docs).
#[derive(Debug)]
pub struct FrameCodec {
    /// Maximum allowed body size
    max_body: usize,

    /// Statistics: frames decoded
    frames_decoded: AtomicU64,

    /// Statistics: frames rejected (any reason)
    frames_rejected: AtomicU64,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_SIZE)
    }
}

impl FrameCodec {
    /// Create a codec with the specified max body size.
    pub fn new(max_body: usize) -> Self {
        Self {
            max_body: max_body.min(u16::MAX as usize),
            frames_decoded: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
        }
    }

    /// Get maximum allowed body size.
    pub fn max_body(&self) -> usize {
        self.max_body
    }

    /// Get number of frames successfully decoded.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded.load(Ordering::Relaxed)
    }

    /// Get number of frames rejected.
    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected.load(Ordering::Relaxed)
    }

    fn reject(&self, consumed: usize, reason: impl Into<String>) -> Decoded {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
        Decoded::Malformed {
            consumed,
            reason: reason.into(),
        }
    }
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(bytes);
    crc.sum()
}

impl Codec for FrameCodec {
    fn decode(&self, buf: &[u8]) -> Decoded {
        let Some(&first) = buf.first() else {
            return Decoded::NeedMoreData;
        };
        if first != FRAME_MAGIC {
            return self.reject(1, format!("bad magic 0x{:02x}", first));
        }
        if buf.len() < FRAME_HEADER_SIZE {
            return Decoded::NeedMoreData;
        }

        let body_len = u16::from_le_bytes([buf[1], buf[2]]) as usize;
        if body_len > self.max_body {
            return self.reject(
                1,
                format!("body length {} exceeds max {}", body_len, self.max_body),
            );
        }

        let total = FRAME_HEADER_SIZE + body_len + FRAME_CRC_SIZE;
        if buf.len() < total {
            return Decoded::NeedMoreData;
        }

        let crc_offset = FRAME_HEADER_SIZE + body_len;
        let expected = u32::from_le_bytes([
            buf[crc_offset],
            buf[crc_offset + 1],
            buf[crc_offset + 2],
            buf[crc_offset + 3],
        ]);
        let actual = crc32(&buf[1..crc_offset]);
        if expected != actual {
            return self.reject(
                1,
                format!("crc mismatch: expected {:08x}, got {:08x}", expected, actual),
            );
        }

        let msg_id = u16::from_le_bytes([buf[6], buf[7]]);
        let message: Message = match serde_json::from_slice(&buf[FRAME_HEADER_SIZE..crc_offset]) {
            Ok(m) => m,
            Err(e) => return self.reject(1, format!("msgid {}: bad body: {}", msg_id, e)),
        };
        if message.kind().id() != msg_id {
            return self.reject(
                1,
                format!(
                    "msgid {} does not match body {}",
                    msg_id,
                    message.kind().name()
                ),
            );
        }

        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
        let header = Header {
            system_id: buf[3],
            component_id: buf[4],
            sequence: buf[5],
        };
        Decoded::Packet(Packet::new(header, message), total)
    }

    fn encode(&self, packet: &Packet) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(&packet.message).map_err(|e| Error::Encode(e.to_string()))?;
        if body.len() > self.max_body {
            return Err(Error::Encode(format!(
                "{} body of {} bytes exceeds max {}",
                packet.kind(),
                body.len(),
                self.max_body
            )));
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len() + FRAME_CRC_SIZE);
        frame.push(FRAME_MAGIC);
        frame.extend_from_slice(&(body.len() as u16).to_le_bytes());
        frame.push(packet.header.system_id);
        frame.push(packet.header.component_id);
        frame.push(packet.header.sequence);
        frame.extend_from_slice(&packet.kind().id().to_le_bytes());
        frame.extend_from_slice(&body);
        let crc = crc32(&frame[1..]);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn heartbeat_packet(seq: u8) -> Packet {
        Packet::new(
            Header {
                system_id: 1,
                component_id: 1,
                sequence: seq,
            },
            Message::Heartbeat {
                mav_type: 2,
                autopilot: 3,
                base_mode: 81,
                custom_mode: 4,
                system_status: 4,
            },
        )
    }

    #[test]
    fn test_encode_decode_single_frame() {
        let codec = FrameCodec::default();
        let packet = heartbeat_packet(7);
        let frame = codec.encode(&packet).expect("encode");
        assert_eq!(frame[0], FRAME_MAGIC);
        assert_eq!(u16::from_le_bytes([frame[6], frame[7]]), 0);

        match codec.decode(&frame) {
            Decoded::Packet(decoded, consumed) => {
                assert_eq!(decoded, packet);
                assert_eq!(consumed, frame.len());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(codec.frames_decoded(), 1);
    }

    #[test]
    fn test_partial_frame_needs_more_data() {
        let codec = FrameCodec::default();
        let frame = codec.encode(&heartbeat_packet(0)).expect("encode");
        assert_eq!(codec.decode(&[]), Decoded::NeedMoreData);
        assert_eq!(codec.decode(&frame[..5]), Decoded::NeedMoreData);
        assert_eq!(codec.decode(&frame[..frame.len() - 1]), Decoded::NeedMoreData);
    }

    #[test]
    fn test_garbage_before_frame_is_skipped_byte_by_byte() {
        let codec = FrameCodec::default();
        let mut buf = vec![0x00, 0x42];
        buf.extend(codec.encode(&heartbeat_packet(1)).expect("encode"));

        assert!(matches!(
            codec.decode(&buf),
            Decoded::Malformed { consumed: 1, .. }
        ));
        assert!(matches!(
            codec.decode(&buf[1..]),
            Decoded::Malformed { consumed: 1, .. }
        ));
        assert!(matches!(codec.decode(&buf[2..]), Decoded::Packet(_, _)));
        assert_eq!(codec.frames_rejected(), 2);
    }

    #[test]
    fn test_corrupt_crc_skips_one_byte() {
        let codec = FrameCodec::default();
        let mut frame = codec.encode(&heartbeat_packet(1)).expect("encode");
        frame[FRAME_HEADER_SIZE + 2] ^= 0xFF;
        match codec.decode(&frame) {
            Decoded::Malformed { consumed, reason } => {
                assert_eq!(consumed, 1);
                assert!(reason.contains("crc"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    /// Decode everything in `buf`, draining as a pump would.
    fn decode_all(codec: &FrameCodec, mut buf: &[u8]) -> Vec<Packet> {
        let mut packets = Vec::new();
        loop {
            match codec.decode(buf) {
                Decoded::Packet(packet, n) => {
                    packets.push(packet);
                    buf = &buf[n..];
                }
                Decoded::Malformed { consumed, .. } => buf = &buf[consumed..],
                Decoded::NeedMoreData => return packets,
            }
        }
    }

    fn mission_current(seq: u16) -> Packet {
        Packet::new(
            Header {
                system_id: 1,
                component_id: 1,
                sequence: seq as u8,
            },
            Message::MissionCurrent { seq },
        )
    }

    #[test]
    fn test_stray_magic_does_not_swallow_following_frames() {
        let codec = FrameCodec::default();
        // Looks like a header announcing a 64-byte body
        let mut buf = vec![FRAME_MAGIC, 0x40, 0x00, 1, 1, 0, 0, 0];
        for seq in 0..4 {
            buf.extend(codec.encode(&mission_current(seq)).expect("encode"));
        }

        let seqs: Vec<u16> = decode_all(&codec, &buf)
            .into_iter()
            .map(|p| match p.message {
                Message::MissionCurrent { seq } => seq,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_truncated_frame_does_not_swallow_next_frame() {
        let codec = FrameCodec::default();
        let first = codec.encode(&mission_current(0)).expect("encode");
        let mut buf = first[..first.len() - 6].to_vec();
        buf.extend(codec.encode(&mission_current(1)).expect("encode"));
        buf.extend(codec.encode(&mission_current(2)).expect("encode"));

        let decoded = decode_all(&codec, &buf);
        assert_eq!(decoded, vec![mission_current(1), mission_current(2)]);
    }

    #[test]
    fn test_msgid_mismatch_rejected() {
        let codec = FrameCodec::default();
        let mut frame = codec.encode(&heartbeat_packet(1)).expect("encode");
        let wrong = MessageKind::Attitude.id().to_le_bytes();
        frame[6] = wrong[0];
        frame[7] = wrong[1];
        // Recompute CRC so only the id check fails
        let crc_offset = frame.len() - FRAME_CRC_SIZE;
        let crc = crc32(&frame[1..crc_offset]);
        frame[crc_offset..].copy_from_slice(&crc.to_le_bytes());

        match codec.decode(&frame) {
            Decoded::Malformed { reason, .. } => assert!(reason.contains("does not match")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_oversize_length_rejected() {
        let codec = FrameCodec::new(16);
        let buf = [FRAME_MAGIC, 0xFF, 0x00, 1, 1, 0, 0, 0];
        assert!(matches!(
            codec.decode(&buf),
            Decoded::Malformed { consumed: 1, .. }
        ));
        assert!(codec.encode(&heartbeat_packet(0)).is_err());
    }

    #[test]
    fn test_arbitrary_bytes_never_panic() {
        let codec = FrameCodec::default();
        let mut state: u32 = 0x1234_5678;
        let mut buf = Vec::with_capacity(512);
        for _ in 0..512 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            buf.push((state & 0xFF) as u8);
        }
        buf[10] = FRAME_MAGIC;
        let mut offset = 0;
        while offset < buf.len() {
            match codec.decode(&buf[offset..]) {
                Decoded::Packet(_, n) | Decoded::Malformed { consumed: n, .. } => offset += n,
                Decoded::NeedMoreData => break,
            }
        }
    }
}
