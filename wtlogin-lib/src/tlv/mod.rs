//! Tag-length-value records.
//!
//! Every record is `[tag:2][len:2][payload]`, big-endian. Requests are built
//! from an ordered [`TlvSet`]; responses are walked by [`decode`].

pub mod decode;
pub mod encode;

use crate::buffer::{PacketReader, PacketWriter};
use crate::error::LoginError;
use bytes::Bytes;
use num_enum::{FromPrimitive, IntoPrimitive};
use tracing::debug;

/// Tags recognised by the response decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Tag {
    WatchT018 = 0x0018,
    WatchT019 = 0x0019,
    WatchT065 = 0x0065,
    CaptchaSign = 0x0104,
    T106 = 0x0106,
    Ksid = 0x0108,
    Tgt = 0x010A,
    TgtKey = 0x010D,
    UserStKey = 0x010E,
    UserStSig = 0x0114,
    Encrypted = 0x0119,
    AccountInfo = 0x011A,
    Skey = 0x0120,
    WtSessionTicket = 0x0133,
    WtSessionTicketKey = 0x0134,
    D2 = 0x0143,
    ErrorInfo = 0x0146,
    NoPicSig = 0x016A,
    CaptchaUrl = 0x0192,
    D2Key = 0x0305,
    TgtQr = 0x0318,
    PskeyMap = 0x0512,
    PowChallenge = 0x0546,

    #[num_enum(catch_all)]
    Unknown(u16),
}

/// One framed record as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvRecord {
    pub tag: u16,
    pub payload: Bytes,
}

/// Frame `payload` under `tag`.
pub fn record(tag: u16, payload: &[u8]) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::with_capacity(4 + payload.len());
    w.add_u16(tag);
    w.add_body(payload, 2, 0)?;
    Ok(w.freeze())
}

/// Split a TLV stream into records until the buffer is exhausted.
///
/// A length prefix running past the end is a framing error.
pub fn split_records(data: impl Into<Bytes>) -> Result<Vec<TlvRecord>, LoginError> {
    let mut reader = PacketReader::new(data);
    let mut records = Vec::new();
    while !reader.is_empty() {
        let tag = reader.read_u16()?;
        let payload = reader.read_body(2, 0)?;
        records.push(TlvRecord { tag, payload });
    }
    Ok(records)
}

/// Ordered list of framed records for one request body.
///
/// Rejects a second record with a tag already present, so the count written
/// by [`TlvSet::into_body`] always equals the records concatenated after it.
#[derive(Debug, Default, Clone)]
pub struct TlvSet {
    tags: Vec<u16>,
    records: Vec<Bytes>,
}

impl TlvSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Bytes) -> Result<&mut Self, LoginError> {
        if record.len() < 4 {
            return Err(LoginError::InvalidPacket(format!("TLV record of {} bytes", record.len())));
        }
        let tag = u16::from_be_bytes([record[0], record[1]]);
        if self.tags.contains(&tag) {
            return Err(LoginError::DuplicateTag(tag));
        }
        self.tags.push(tag);
        self.records.push(record);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn tags(&self) -> &[u16] {
        &self.tags
    }

    /// `[sub_command:2][count:2][records...]`
    pub fn into_body(self, sub_command: u16) -> Result<Bytes, LoginError> {
        let tag_list: Vec<String> = self.tags.iter().map(|t| format!("{t:04X}")).collect();
        debug!(
            "Assembling TLV body 0x{:04X} with {} records: {}",
            sub_command,
            self.records.len(),
            tag_list.join(",")
        );

        let mut w = PacketWriter::new();
        w.add_u16(sub_command);
        w.add_int(self.records.len() as u64, 2)?;
        for record in &self.records {
            w.add_bytes(record);
        }
        Ok(w.freeze())
    }

    /// The records alone, for bodies whose count lives in a fixed preamble.
    pub fn into_records(self) -> Bytes {
        let mut w = PacketWriter::new();
        for record in &self.records {
            w.add_bytes(record);
        }
        w.freeze()
    }
}
