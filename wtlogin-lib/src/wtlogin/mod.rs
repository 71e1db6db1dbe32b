//! Handshake sequencer: request builders and response parsers for the
//! wtlogin flows.
//!
//! Every outbound request nests the same way:
//!
//! ```text
//! SSO frame ( login head ( 02 [len:2] OICQ header ++ TEA(body) 03 ) )
//! ```
//!
//! where the OICQ header is `1F 41 [cmd:2] 00 01 [uin:4] [client blob] [key block]`.

pub mod exchange;
pub mod login;
pub mod qrcode;

use crate::buffer::{PacketReader, PacketWriter};
use crate::constants::{
    LOGIN_FAILURE_PREAMBLE, LOGIN_RESPONSE_HEADER, LOGIN_SUCCESS_PREAMBLE, NESTED_TLV_MARKER,
    OICQ_MAGIC, OICQ_VERSION_WORD,
};
use crate::error::LoginError;
use crate::session::{HandshakeState, SessionContext};
use crate::sso::{EncryptionMode, PacketType, SsoEnvelope};
use crate::tea;
use bytes::Bytes;
use tracing::{debug, trace};

/// Key block announcing the client key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyBlock {
    /// `01 01 [rand] 01 02 [pub LV]`, watch and QR flows
    Short,
    /// `02 01 [rand] 01 31 00 01 [pub LV]`, phone, captcha and exchange
    Long,
}

pub(crate) fn oicq_header(
    w: &mut PacketWriter,
    cmd: u16,
    uin: u64,
    client_blob: &str,
) -> Result<(), LoginError> {
    w.add_u16(OICQ_MAGIC).add_u16(cmd).add_u16(OICQ_VERSION_WORD);
    w.add_int(uin, 4)?;
    w.add_hex(client_blob)?;
    Ok(())
}

pub(crate) fn key_block(
    w: &mut PacketWriter,
    block: KeyBlock,
    key_rand: &[u8],
    public_key: &[u8],
) -> Result<(), LoginError> {
    match block {
        KeyBlock::Short => {
            w.add_hex("01 01")?.add_bytes(key_rand).add_hex("01 02")?;
        }
        KeyBlock::Long => {
            w.add_hex("02 01")?.add_bytes(key_rand).add_hex("01 31 00 01")?;
        }
    }
    w.add_body(public_key, 2, 0)?;
    Ok(())
}

/// `02 [len:2] inner 03`, the length counting the whole frame.
pub(crate) fn frame_oicq(inner: &[u8]) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::with_capacity(inner.len() + 4);
    w.add_u8(0x02);
    w.add_body(inner, 2, 4)?;
    w.add_u8(0x03);
    Ok(w.freeze())
}

/// Login head plus SSO frame shared by the `0x0A` flows.
///
/// The head carries the current `ctx.seq`, which is then advanced so the
/// next request goes out under a fresh sequence.
pub(crate) fn finish_request(
    ctx: &mut SessionContext,
    sso: &impl SsoEnvelope,
    command: &str,
    oicq: &[u8],
) -> Result<Bytes, LoginError> {
    let with_head = sso.login_header(ctx, command, oicq)?;
    let frame = sso.wrap(ctx, &with_head, EncryptionMode::ZeroKey, PacketType::Login, ctx.seq)?;
    ctx.next_seq();
    ctx.transition(HandshakeState::AwaitingResponse);
    Ok(frame)
}

/// Strip a login-style response down to its status byte and TLV stream.
///
/// `data` is the OICQ frame (`02 ... 03`). The body after the status byte is
/// decrypted under `key`. On success a leading T119 is decrypted under
/// `nested_key` and its records are placed before the remaining outer ones.
pub(crate) fn strip_login_response(
    data: &[u8],
    key: &[u8; 16],
    nested_key: Option<&[u8; 16]>,
) -> Result<(u8, Bytes), LoginError> {
    if data.len() < LOGIN_RESPONSE_HEADER + 2 {
        return Err(LoginError::InsufficientData {
            expected: LOGIN_RESPONSE_HEADER + 2,
            actual: data.len(),
        });
    }
    let body = &data[LOGIN_RESPONSE_HEADER..data.len() - 1];
    let status = body[0];
    let plain = tea::decrypt(&body[1..], key)?;
    trace!("Login response status {} plain: {}", status, hex::encode(&plain));

    let mut r = PacketReader::new(plain);
    if status != 0 {
        r.skip(LOGIN_FAILURE_PREAMBLE)?;
        return Ok((status, r.read_remaining()));
    }

    r.skip(LOGIN_SUCCESS_PREAMBLE)?;
    let rest = r.read_remaining();
    let mut peek = PacketReader::new(rest.clone());
    if rest.len() < 4 || peek.read_u16()? != NESTED_TLV_MARKER {
        return Ok((status, rest));
    }

    let payload = peek.read_body(2, 0)?;
    let nested_key = nested_key.ok_or(LoginError::MissingField("nested TLV key"))?;
    let mut stream = tea::decrypt(&payload, nested_key)?;
    debug!("Peeled T119: {} nested bytes", stream.len());
    stream.extend_from_slice(&peek.read_remaining());
    Ok((status, Bytes::from(stream)))
}

/// Length of the OICQ header with a long key block and a 65-byte public key.
#[cfg(test)]
pub(crate) const LONG_HEADER_LEN: usize = 25 + 2 + 16 + 4 + 2 + 65;

/// Peel an outbound `0x0A` zero-key frame down to its `02 ... 03` OICQ frame.
#[cfg(test)]
pub(crate) fn open_login_frame(frame: &[u8]) -> Bytes {
    let mut r = PacketReader::new(Bytes::copy_from_slice(frame));
    r.skip(4 + 4 + 1).unwrap();
    r.read_body(4, 4).unwrap();
    r.skip(1).unwrap();
    r.read_body(4, 4).unwrap();
    let plain = tea::decrypt(&r.read_remaining(), &tea::ZERO_KEY).unwrap();
    let mut r = PacketReader::new(plain);
    r.read_body(4, 4).unwrap();
    let oicq = r.read_body(4, 4).unwrap();
    assert!(r.is_empty());
    oicq
}
