//! SSO framing around every wtlogin packet.
//!
//! Outbound, a login body is first given a login head
//! ([`SsoEnvelope::login_header`]) and then wrapped into a transport frame
//! ([`SsoEnvelope::wrap`]):
//!
//! ```text
//! [len:4][packet_type:4][encryption:1][ticket intLV | sso_seq:4][00][uin intLV][payload]
//! ```
//!
//! The payload is encrypted under the zero key (mode 2) or `share_key`
//! (mode 1). [`parse_response`] reverses the frame for server replies.

use crate::buffer::{PacketReader, PacketWriter};
use crate::constants::{MSG_COOKIE, SSO_HEAD_FIXED};
use crate::error::LoginError;
use crate::session::SessionContext;
use crate::tea::{self, ZERO_KEY};
use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum PacketType {
    /// Login frame, carries a ticket slot
    Login = 0x0A,
    /// Frame carrying its own SSO sequence
    Protected = 0x0B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum EncryptionMode {
    Plain = 0,
    ShareKey = 1,
    ZeroKey = 2,
}

/// Session framing used by the handshake flows.
pub trait SsoEnvelope {
    /// Prefix `body` with the per-command login head.
    fn login_header(&self, ctx: &SessionContext, command: &str, body: &[u8]) -> Result<Bytes, LoginError>;

    /// Wrap a payload into one transport frame.
    ///
    /// `sso_seq` is written only into [`PacketType::Protected`] frames. Login
    /// frames have no slot for it; their sequence travels in the login head.
    fn wrap(
        &self,
        ctx: &SessionContext,
        payload: &[u8],
        encryption: EncryptionMode,
        packet_type: PacketType,
        sso_seq: u32,
    ) -> Result<Bytes, LoginError>;
}

/// Default SSO framing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SsoCodec;

impl SsoEnvelope for SsoCodec {
    fn login_header(&self, ctx: &SessionContext, command: &str, body: &[u8]) -> Result<Bytes, LoginError> {
        let p = &ctx.profile;

        let mut head = PacketWriter::new();
        head.add_u32(ctx.seq).add_u32(p.app_id).add_u32(p.app_id);
        head.add_hex(SSO_HEAD_FIXED)?;
        head.add_body(&[], 4, 4)?;
        head.add_body(command.as_bytes(), 4, 4)?;
        head.add_body(&MSG_COOKIE, 4, 4)?;
        head.add_body(p.device.imei.as_bytes(), 4, 4)?;
        head.add_body(&ctx.tlv.ksid, 2, 2)?;
        head.add_body(p.version_var.as_bytes(), 2, 2)?;
        head.add_body(&[], 4, 4)?;

        let mut w = PacketWriter::new();
        w.add_body(&head.freeze(), 4, 4)?;
        w.add_body(body, 4, 4)?;
        debug!("SSO login head for {} ({} body bytes)", command, body.len());
        Ok(w.freeze())
    }

    fn wrap(
        &self,
        ctx: &SessionContext,
        payload: &[u8],
        encryption: EncryptionMode,
        packet_type: PacketType,
        sso_seq: u32,
    ) -> Result<Bytes, LoginError> {
        let mut frame = PacketWriter::new();
        frame.add_u32(packet_type.into()).add_u8(encryption.into());
        match packet_type {
            PacketType::Login => {
                let ticket: &[u8] = if encryption == EncryptionMode::ShareKey { &ctx.tlv.d2 } else { &[] };
                frame.add_body(ticket, 4, 4)?;
            }
            PacketType::Protected => {
                frame.add_u32(sso_seq);
            }
        }
        frame.add_u8(0);
        frame.add_body(ctx.uin.to_string().as_bytes(), 4, 4)?;

        match encryption {
            EncryptionMode::Plain => frame.add_bytes(payload),
            EncryptionMode::ZeroKey => frame.add_bytes(&ctx.encrypt(payload, &ZERO_KEY)),
            EncryptionMode::ShareKey => {
                let key = tea::key16(&ctx.keys.share_key, "share_key")?;
                frame.add_bytes(&ctx.encrypt(payload, key))
            }
        };

        let mut w = PacketWriter::new();
        w.add_body(&frame.freeze(), 4, 4)?;
        let out = w.freeze();
        debug!(
            "SSO frame {:?} mode {:?} seq {}: {} bytes",
            packet_type,
            encryption,
            sso_seq,
            out.len()
        );
        trace!("SSO frame: {}", hex::encode(&out));
        Ok(out)
    }
}

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoResponse {
    pub seq: u32,
    pub ret_code: u32,
    pub tips: String,
    pub command: String,
    pub body: Bytes,
}

/// Parse a server frame (transport length prefix already removed).
///
/// Non-empty tips are also recorded on the session.
pub fn parse_response(ctx: &mut SessionContext, frame: &[u8]) -> Result<SsoResponse, LoginError> {
    let mut r = PacketReader::new(Bytes::copy_from_slice(frame));
    let _packet_type = r.read_u32()?;
    let mode = r.read_u8()?;
    r.skip(1)?;
    let _uin = r.read_body(4, 4)?;
    let encrypted = r.read_remaining();

    let plain = match EncryptionMode::try_from(mode) {
        Ok(EncryptionMode::ZeroKey) => tea::decrypt(&encrypted, &ZERO_KEY)?,
        Ok(EncryptionMode::ShareKey) => tea::decrypt(&encrypted, tea::key16(&ctx.keys.share_key, "share_key")?)?,
        _ => {
            warn!("Unknown SSO encryption mode {}", mode);
            return Err(LoginError::InvalidPacket(format!("unknown encryption mode {mode}")));
        }
    };

    let mut r = PacketReader::new(plain);
    let head = r.read_body(4, 4)?;
    let body = r.read_body(4, 4)?;

    let mut h = PacketReader::new(head);
    let seq = h.read_u32()?;
    let ret_code = h.read_u32()?;
    let tips = String::from_utf8_lossy(&h.read_body(4, 4)?).into_owned();
    let command = String::from_utf8_lossy(&h.read_body(4, 4)?).into_owned();

    if !tips.is_empty() {
        warn!("Server tips for {}: {}", command, tips);
        ctx.tips = Some(tips.clone());
    }
    debug!("SSO response {} seq {} ret {}", command, seq, ret_code);

    Ok(SsoResponse {
        seq,
        ret_code,
        tips,
        command,
        body,
    })
}
