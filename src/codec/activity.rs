//! Heartbeat payload layout.

use serde::{Deserialize, Serialize};

use super::{Reader, Writer};
use crate::error::Result;

/// Decoded heartbeat message: the activity flag the source toggles while it
/// is actively producing frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityUpdate {
    /// Whether the source considers itself actively rendering.
    pub active: bool,
}

impl ActivityUpdate {
    /// Decode a heartbeat payload: `[1 byte reserved][1 byte boolean flag]`.
    ///
    /// Trailing bytes beyond the flag are tolerated; some source versions pad
    /// the payload to a word boundary.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(payload, "ActivityUpdate");
        reader.skip(1, "reserved")?;
        let active = reader.read_bool("active")?;
        Ok(Self { active })
    }

    /// Encode a heartbeat payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u8(0);
        writer.write_bool(self.active);
        writer.into_bytes()
    }
}
