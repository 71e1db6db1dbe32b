//! Byte buffer writer and reader used by every packet layer.
//!
//! All multi-byte integers on the wire are big-endian. Length prefixes are
//! written with [`PacketWriter::add_body`] and read back with
//! [`PacketReader::read_body`].

use crate::error::LoginError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Append-only builder for one packet layer.
#[derive(Debug, Default, Clone)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Append raw bytes parsed from a hex literal such as `"1F 41 08 10"`.
    /// Whitespace between nibbles is ignored.
    pub fn add_hex(&mut self, literal: &str) -> Result<&mut Self, LoginError> {
        let bytes = parse_hex(literal)?;
        self.buf.put_slice(&bytes);
        Ok(self)
    }

    /// Append `value` as a big-endian unsigned integer of exactly `width` bytes.
    pub fn add_int(&mut self, value: u64, width: usize) -> Result<&mut Self, LoginError> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(LoginError::InvalidWidth(width));
        }
        if width < 8 && value >> (width * 8) != 0 {
            return Err(LoginError::ValueOutOfRange { value, width });
        }
        self.buf.put_slice(&value.to_be_bytes()[8 - width..]);
        Ok(self)
    }

    pub fn add_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn add_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn add_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn add_u64(&mut self, value: u64) -> &mut Self {
        self.buf.put_u64(value);
        self
    }

    pub fn add_bytes(&mut self, blob: &[u8]) -> &mut Self {
        self.buf.put_slice(blob);
        self
    }

    /// Append a `length_width`-byte length prefix holding `blob.len() + extra`,
    /// then `blob` itself.
    ///
    /// `extra` covers framings whose length counts bytes outside the blob,
    /// e.g. the SSO intLV fields count their own 4-byte prefix.
    pub fn add_body(&mut self, blob: &[u8], length_width: usize, extra: usize) -> Result<&mut Self, LoginError> {
        let declared = (blob.len() + extra) as u64;
        self.add_int(declared, length_width)?;
        self.buf.put_slice(blob);
        Ok(self)
    }

    /// Short-LV string: 2-byte length followed by the UTF-8 bytes.
    pub fn add_str(&mut self, value: &str) -> Result<&mut Self, LoginError> {
        self.add_body(value.as_bytes(), 2, 0)
    }

    /// Clear the buffer so the writer can frame another layer.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Snapshot of the bytes written so far.
    pub fn bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a received byte sequence.
///
/// Every read checks the remaining length first. A read past the end is a
/// framing error ([`LoginError::InsufficientData`]); a zero-length read is legal.
#[derive(Debug, Clone)]
pub struct PacketReader {
    buf: Bytes,
    total: usize,
}

impl PacketReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let buf = data.into();
        let total = buf.len();
        Self { buf, total }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.total - self.buf.remaining()
    }

    fn ensure(&self, n: usize) -> Result<(), LoginError> {
        if self.buf.remaining() < n {
            return Err(LoginError::InsufficientData {
                expected: n,
                actual: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes, LoginError> {
        self.ensure(n)?;
        Ok(self.buf.split_to(n))
    }

    pub fn skip(&mut self, n: usize) -> Result<(), LoginError> {
        self.ensure(n)?;
        self.buf.advance(n);
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, LoginError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, LoginError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32, LoginError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    /// Read a big-endian unsigned integer of `width` bytes.
    pub fn read_int(&mut self, width: usize) -> Result<u64, LoginError> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(LoginError::InvalidWidth(width));
        }
        self.ensure(width)?;
        Ok(self.buf.get_uint(width))
    }

    /// Read a `length_width`-byte length prefix and the blob it describes.
    /// `extra` is subtracted from the declared length, mirroring
    /// [`PacketWriter::add_body`].
    pub fn read_body(&mut self, length_width: usize, extra: usize) -> Result<Bytes, LoginError> {
        let declared = self.read_int(length_width)? as usize;
        let len = declared
            .checked_sub(extra)
            .ok_or_else(|| LoginError::InvalidPacket(format!("length {declared} smaller than its own prefix")))?;
        self.read_bytes(len)
    }

    /// Short-LV string, decoded lossily.
    pub fn read_str(&mut self) -> Result<String, LoginError> {
        let raw = self.read_body(2, 0)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Everything from the cursor to the end. Never fails; may be empty.
    pub fn read_remaining(&mut self) -> Bytes {
        let n = self.buf.remaining();
        self.buf.split_to(n)
    }
}

/// Parse a whitespace-separated hex literal.
pub fn parse_hex(literal: &str) -> Result<Vec<u8>, LoginError> {
    let compact: String = literal.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(compact)?)
}
