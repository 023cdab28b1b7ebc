//! Frame header encoding and decoding.
//!
//! Implements the 5-byte header format:
//! ```text
//! ┌──────────────┬──────────┐
//! │ Length       │ Type     │
//! │ 4 bytes      │ 1 byte   │
//! │ uint32 LE    │          │
//! └──────────────┴──────────┘
//! ```
//!
//! Length counts payload bytes only. All multi-byte integers on this wire
//! are Little Endian: the source writes its host byte order, never network
//! order.

use crate::error::{BridgeError, Result};

/// Header size in bytes (fixed, exactly 5).
pub const FRAME_HEADER_SIZE: usize = 5;

/// Raw message type byte as it appears on the wire.
pub type RawMessageType = u8;

/// Message types the bridge understands.
///
/// Frames carrying any other type byte are drained from the socket to keep
/// the stream aligned, then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Composite combat event: optional Ev, agents and skill name plus
    /// mandatory id/revision.
    CombatEvent = 0,
    /// Lightweight heartbeat carrying a single activity flag.
    Heartbeat = 1,
}

impl MessageType {
    /// The wire byte for this type.
    #[inline]
    pub fn as_byte(self) -> RawMessageType {
        self as u8
    }

    /// Parse a wire byte, returning `None` for unrecognized types.
    pub fn from_byte(byte: RawMessageType) -> Option<Self> {
        match byte {
            0 => Some(MessageType::CombatEvent),
            1 => Some(MessageType::Heartbeat),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::CombatEvent => f.write_str("combat-event"),
            MessageType::Heartbeat => f.write_str("heartbeat"),
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length in bytes.
    pub payload_length: u32,
    /// Message type byte (may be unrecognized; routing decides).
    pub message_type: RawMessageType,
}

impl FrameHeader {
    /// Create a new header.
    pub fn new(payload_length: u32, message_type: RawMessageType) -> Self {
        Self { payload_length, message_type }
    }

    /// Encode header to bytes (Little Endian).
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4] = self.message_type;
        buf
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEADER_SIZE {
            return None;
        }
        Some(Self {
            payload_length: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            message_type: buf[4],
        })
    }

    /// Validate the declared payload length against the configured cap.
    ///
    /// The declared length must be trustworthy even for unrecognized types,
    /// since it is the only way to keep the stream aligned; a length beyond
    /// the cap therefore means the stream is corrupt, not just this frame.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(BridgeError::protocol(format!(
                "declared payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }
        Ok(())
    }
}
