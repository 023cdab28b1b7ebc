//! Binary payload codecs.
//!
//! Payloads decode strictly left-to-right with a bounds-checked cursor; every
//! read advances an offset and a short buffer surfaces as a structured
//! [`BridgeError::Decode`] naming the field that ran out of bytes. Decode
//! failures are frame-local: the frame reader has already established the
//! frame boundary, so a bad payload never desynchronizes the stream.
//!
//! All integers are little-endian, matching the source's host order. Strings
//! are a u64 byte length followed by that many UTF-8 bytes.

mod activity;
mod combat;

pub use activity::ActivityUpdate;
pub use combat::{Agent, CombatEvent, CombatPayload, EV_RECORD_SIZE};

use crate::error::{BridgeError, Result};

/// Bounds-checked little-endian reader over a payload slice.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
    /// Payload name used in decode-error context.
    context: &'static str,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self { buf, offset: 0, context }
    }

    /// Bytes not yet consumed.
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(BridgeError::decode(
                self.context,
                format!(
                    "field '{field}' needs {len} bytes at offset {}, only {} remain",
                    self.offset,
                    self.remaining()
                ),
            ));
        }
        let slice = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub(crate) fn read_bool(&mut self, field: &str) -> Result<bool> {
        Ok(self.read_u8(field)? != 0)
    }

    pub(crate) fn read_u16(&mut self, field: &str) -> Result<u16> {
        let bytes = self.take(2, field)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32(&mut self, field: &str) -> Result<u32> {
        let bytes = self.take(4, field)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_i32(&mut self, field: &str) -> Result<i32> {
        let bytes = self.take(4, field)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn read_u64(&mut self, field: &str) -> Result<u64> {
        let bytes = self.take(8, field)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("slice length checked")))
    }

    /// Read a u64-length-prefixed UTF-8 string.
    pub(crate) fn read_string(&mut self, field: &str) -> Result<String> {
        let len = self.read_u64(field)?;
        let len = usize::try_from(len).map_err(|_| {
            BridgeError::decode(self.context, format!("field '{field}' length {len} overflows"))
        })?;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            BridgeError::decode(self.context, format!("field '{field}' is not valid UTF-8: {e}"))
        })
    }

    /// Skip `len` bytes (reserved/padding).
    pub(crate) fn skip(&mut self, len: usize, field: &str) -> Result<()> {
        self.take(len, field).map(|_| ())
    }
}

/// Little-endian writer mirroring [`Reader`], used by the encoder side.
#[derive(Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub(crate) fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn write_string(&mut self, value: &str) {
        self.write_u64(value.len() as u64);
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub(crate) fn write_zeros(&mut self, len: usize) {
        self.buf.resize(self.buf.len() + len, 0);
    }
}
