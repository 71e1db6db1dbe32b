//! QR code login: fetch and poll (`trans_emp`) plus the authorisation
//! step (`trans_emp_auth`) performed from an already logged-in phone.
//!
//! `trans_emp_auth` nests three TEA layers, innermost first:
//!
//! | Layer | Key |
//! |-------|-----|
//! | auth payload | `userSt_Key` (T10E) |
//! | `[header][userStSig] 00 ...` | `wtSessionTicketKey` (T134) |
//! | SSO envelope | all-zero key |

use super::{KeyBlock, finish_request, frame_oicq, key_block, oicq_header};
use crate::buffer::{PacketReader, PacketWriter};
use crate::constants::{
    CMD_NAME_TRANS_EMP, CMD_TRANS_EMP, EMP_AUTH_CLIENT_BLOB, EMP_AUTH_INNER_SKIP, EMP_AUTH_PACKAGE,
    EMP_AUTH_REQUEST_BLOCK, EMP_AUTH_REQUEST_LAYER, EMP_AUTH_REQUEST_TAIL, EMP_AUTH_REQUEST_TRAILER, EMP_AUTH_SKIP,
    EMP_AUTH_SSO_HEAD, EMP_AUTH_UIN_GAP, EMP_AUTH_VERIFY_BLOCK, EMP_AUTH_VERIFY_LAYER, EMP_AUTH_VERIFY_TRAILER,
    EMP_RESPONSE_HEADER, QR_FETCH_PREAMBLE, QR_POLL_BODY, QR_POLL_HEAD, QR_POLL_TAIL, TRANS_EMP_CONFIRMED_SKIP,
    TRANS_EMP_SKIP, WATCH_CLIENT_BLOB,
};
use crate::error::LoginError;
use crate::session::{HandshakeState, SessionContext};
use crate::sso::{EncryptionMode, PacketType, SsoEnvelope};
use crate::tea;
use crate::tlv::decode::decode;
use crate::tlv::{TlvSet, encode as tlv};
use crate::trans::wtlogin_trans;
use bytes::Bytes;
use chrono::Utc;
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;
use tracing::{debug, info, trace, warn};

/// Status reported by a `trans_emp` poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum QrStatus {
    Authorized = 0,
    ScanWithPhone = 48,
    ConfirmOnPhone = 53,
    Cancelled = 54,
    PleaseScan = 99,
    #[num_enum(catch_all)]
    Other(u8),
}

impl QrStatus {
    pub fn message(self) -> &'static str {
        match self {
            QrStatus::Authorized => "authorized",
            QrStatus::ScanWithPhone => "scan with phone",
            QrStatus::ConfirmOnPhone => "confirm on phone",
            QrStatus::Cancelled => "cancelled by user",
            QrStatus::PleaseScan => "please scan",
            QrStatus::Other(_) => "unknown status",
        }
    }
}

/// Fixed status text of a QR flow code.
pub fn qr_status_message(status: u8) -> &'static str {
    QrStatus::from(status).message()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCodeOutcome {
    pub status: u8,
    pub message: &'static str,
    /// PNG image of the QR code, present on a fetch
    pub qr_code: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmpAuthOutcome {
    Authorized {
        time: u32,
        /// Name of the device being authorised
        auth_name: String,
    },
    Rejected {
        status: u8,
        message: String,
    },
}

/// Plain body of a QR fetch (`verify = false`) or poll (`verify = true`).
pub fn trans_emp_body(ctx: &SessionContext, verify: bool, timestamp: u32) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    if verify {
        let mark = SessionContext::require(&ctx.tlv.qr_code_mark, "qr_code_mark")?;
        w.add_hex(QR_POLL_HEAD)?.add_u32(timestamp);
        w.add_hex(QR_POLL_BODY)?.add_body(mark, 2, 0)?.add_hex(QR_POLL_TAIL)?;
    } else {
        let mut set = TlvSet::new();
        set.push(tlv::t016(ctx)?)?
            .push(tlv::t01b(ctx)?)?
            .push(tlv::t01d(ctx)?)?
            .push(tlv::t01f(ctx)?)?
            .push(tlv::t033(ctx)?)?
            .push(tlv::t035(ctx)?)?;
        debug!("QR fetch with TLVs {:04X?}", set.tags());
        w.add_hex(QR_FETCH_PREAMBLE)?.add_bytes(&set.into_records()).add_u8(0x03);
    }
    Ok(w.freeze())
}

/// Build a QR code fetch or poll request under the session's current keys.
pub fn trans_emp(ctx: &mut SessionContext, sso: &impl SsoEnvelope, verify: bool) -> Result<Bytes, LoginError> {
    ctx.transition(HandshakeState::BuildingRequest);
    let body = trans_emp_body(ctx, verify, Utc::now().timestamp() as u32)?;
    let share_key = tea::key16(&ctx.keys.share_key, "share_key")?;
    let encrypted = ctx.encrypt(&body, share_key);

    let mut w = PacketWriter::new();
    oicq_header(&mut w, CMD_TRANS_EMP, 0, WATCH_CLIENT_BLOB)?;
    key_block(&mut w, KeyBlock::Short, &ctx.keys.key_rand, &ctx.keys.public_key)?;
    w.add_bytes(&encrypted);
    let oicq = frame_oicq(&w.freeze())?;
    finish_request(ctx, sso, CMD_NAME_TRANS_EMP, &oicq)
}

/// Parse a `trans_emp` response.
///
/// A fetch stores the QR mark for later polls and returns the image. A poll
/// that reports [`QrStatus::Authorized`] decodes the confirmation TLVs.
pub fn trans_emp_response(ctx: &mut SessionContext, data: &[u8], verify: bool) -> Result<QrCodeOutcome, LoginError> {
    ctx.transition(HandshakeState::Decoding);
    if data.len() < EMP_RESPONSE_HEADER + 1 {
        return Err(LoginError::InsufficientData {
            expected: EMP_RESPONSE_HEADER + 1,
            actual: data.len(),
        });
    }
    let share_key = tea::key16(&ctx.keys.share_key, "share_key")?;
    let plain = tea::decrypt(&data[EMP_RESPONSE_HEADER..data.len() - 1], share_key)?;
    trace!("trans_emp plain: {}", hex::encode(&plain));

    let (status, qr_code) = if verify {
        if plain.len() < 2 {
            return Err(LoginError::InsufficientData {
                expected: 2,
                actual: plain.len(),
            });
        }
        let status = plain[plain.len() - 2];
        if status == u8::from(QrStatus::Authorized) {
            let stream = plain.get(TRANS_EMP_CONFIRMED_SKIP..).ok_or(LoginError::InsufficientData {
                expected: TRANS_EMP_CONFIRMED_SKIP,
                actual: plain.len(),
            })?;
            decode(ctx, Bytes::copy_from_slice(stream))?;
        }
        (status, None)
    } else {
        let mut r = PacketReader::new(plain);
        r.skip(TRANS_EMP_SKIP)?;
        r.skip(2)?;
        let mark = r.read_body(2, 0)?;
        r.skip(4)?;
        let image = r.read_body(2, 0)?;
        debug!("QR mark of {} bytes, image of {} bytes", mark.len(), image.len());
        ctx.tlv.qr_code_mark = mark.to_vec();
        (u8::from(QrStatus::PleaseScan), Some(image))
    };

    let message = qr_status_message(status);
    if status == u8::from(QrStatus::Authorized) {
        info!("QR login confirmed for {}", ctx.uin);
        ctx.transition(HandshakeState::Success);
    } else {
        info!("QR status {}: {}", status, message);
        ctx.transition(HandshakeState::NeedQrConfirm);
    }
    Ok(QrCodeOutcome {
        status,
        message,
        qr_code,
    })
}

/// Innermost `trans_emp_auth` payload, before any encryption.
pub fn emp_auth_payload(
    ctx: &SessionContext,
    k_value: &str,
    verify: bool,
    timestamp: u32,
) -> Result<Bytes, LoginError> {
    let tgt = SessionContext::require(&ctx.tlv.tgt, "tgt")?;
    let token = wtlogin_trans(k_value.as_bytes())?;

    let mut w = PacketWriter::new();
    w.add_u32(timestamp);
    w.add_hex(if verify { EMP_AUTH_VERIFY_BLOCK } else { EMP_AUTH_REQUEST_BLOCK })?;
    w.add_int(ctx.uin, 4)?;
    w.add_hex(EMP_AUTH_UIN_GAP)?;
    w.add_int(ctx.uin, 4)?;
    w.add_body(&token, 2, 0)?;
    w.add_body(tgt, 2, 0)?;
    if verify {
        w.add_hex(EMP_AUTH_VERIFY_TRAILER)?;
        w.add_body(&ctx.guid, 2, 0)?;
    } else {
        w.add_bytes(&ctx.guid);
        w.add_hex(EMP_AUTH_REQUEST_TRAILER)?;
        w.add_str(EMP_AUTH_PACKAGE)?;
        w.add_hex(EMP_AUTH_REQUEST_TAIL)?;
    }
    w.add_u8(0x03);
    Ok(w.freeze())
}

/// Authorise (`verify = false`) or confirm (`verify = true`) a scanned QR
/// code using the tickets of a logged-in session.
pub fn trans_emp_auth(
    ctx: &mut SessionContext,
    sso: &impl SsoEnvelope,
    k_value: &str,
    verify: bool,
) -> Result<Bytes, LoginError> {
    ctx.transition(HandshakeState::BuildingRequest);
    let user_st_key = tea::key16(&ctx.tlv.user_st_key, "user_st_key")?;
    let user_st_sig = SessionContext::require(&ctx.tlv.user_st_sig, "user_st_sig")?;
    let ticket = SessionContext::require(&ctx.tlv.wt_session_ticket, "wt_session_ticket")?;
    let ticket_key = tea::key16(&ctx.tlv.wt_session_ticket_key, "wt_session_ticket_key")?;

    let payload = emp_auth_payload(ctx, k_value, verify, Utc::now().timestamp() as u32)?;
    let inner = ctx.encrypt(&payload, user_st_key);

    let mut layer = PacketWriter::new();
    layer.add_hex(if verify { EMP_AUTH_VERIFY_LAYER } else { EMP_AUTH_REQUEST_LAYER })?;
    layer.add_bytes(user_st_sig).add_u8(0).add_bytes(&inner);
    let middle = ctx.encrypt(&layer.freeze(), ticket_key);

    let mut w = PacketWriter::new();
    oicq_header(&mut w, CMD_TRANS_EMP, ctx.uin, EMP_AUTH_CLIENT_BLOB)?;
    w.add_bytes(ticket).add_bytes(&middle);
    let oicq = frame_oicq(&w.freeze())?;

    let mut head = PacketWriter::new();
    head.add_hex(EMP_AUTH_SSO_HEAD)?.add_body(&oicq, 4, 4)?;
    debug!("trans_emp_auth verify={} ({} bytes)", verify, head.len());

    let seq = ctx.next_seq();
    let frame = sso.wrap(ctx, &head.freeze(), EncryptionMode::ZeroKey, PacketType::Protected, seq)?;
    ctx.transition(HandshakeState::AwaitingResponse);
    Ok(frame)
}

/// Parse a `trans_emp_auth` response, peeling the ticket-key and then the
/// `userSt_Key` layer.
pub fn trans_emp_auth_response(
    ctx: &mut SessionContext,
    data: &[u8],
    verify: bool,
) -> Result<EmpAuthOutcome, LoginError> {
    ctx.transition(HandshakeState::Decoding);
    if data.len() < EMP_RESPONSE_HEADER + 1 {
        return Err(LoginError::InsufficientData {
            expected: EMP_RESPONSE_HEADER + 1,
            actual: data.len(),
        });
    }
    let ticket_key = tea::key16(&ctx.tlv.wt_session_ticket_key, "wt_session_ticket_key")?;
    let user_st_key = tea::key16(&ctx.tlv.user_st_key, "user_st_key")?;

    let outer = tea::decrypt(&data[EMP_RESPONSE_HEADER..data.len() - 1], ticket_key)?;
    let inner_encrypted = outer.get(EMP_AUTH_INNER_SKIP..).ok_or(LoginError::InsufficientData {
        expected: EMP_AUTH_INNER_SKIP,
        actual: outer.len(),
    })?;
    let plain = tea::decrypt(inner_encrypted, user_st_key)?;
    trace!("trans_emp_auth plain: {}", hex::encode(&plain));

    let mut r = PacketReader::new(plain);
    r.skip(EMP_AUTH_SKIP)?;
    let status = r.read_u8()?;
    if status != 0 {
        let message = r.read_str()?;
        warn!("QR authorisation rejected with status {}: {}", status, message);
        ctx.transition(HandshakeState::Failed);
        return Ok(EmpAuthOutcome::Rejected { status, message });
    }

    let time = r.read_u32()?;
    let auth_name = r.read_str()?;
    if verify {
        r.skip(2)?;
    }
    let tags = decode(ctx, r.read_remaining())?;
    info!("QR authorisation for {} accepted, {} TLVs", auth_name, tags.len());
    ctx.transition(HandshakeState::Success);
    Ok(EmpAuthOutcome::Authorized { time, auth_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::parse_hex;
    use crate::device::ClientVariant;
    use crate::sso::SsoCodec;
    use crate::tlv::record;

    #[test]
    fn test_status_messages() {
        assert_eq!(qr_status_message(48), "scan with phone");
        assert_eq!(qr_status_message(53), "confirm on phone");
        assert_eq!(qr_status_message(54), "cancelled by user");
        assert_eq!(qr_status_message(99), "please scan");
        assert_eq!(qr_status_message(0), "authorized");
        assert_eq!(qr_status_message(17), "unknown status");
        assert_eq!(QrStatus::from(17), QrStatus::Other(17));
    }

    #[test]
    fn test_fetch_body_layout() {
        let ctx = SessionContext::new(0, ClientVariant::Watch);
        let body = trans_emp_body(&ctx, false, 0).unwrap();
        let preamble = parse_hex(QR_FETCH_PREAMBLE).unwrap();
        assert_eq!(&body[..preamble.len()], preamble.as_slice());
        assert_eq!(&body[preamble.len()..preamble.len() + 2], &[0x00, 0x16]);
        assert_eq!(*body.last().unwrap(), 0x03);
    }

    #[test]
    fn test_poll_requires_mark() {
        let ctx = SessionContext::new(0, ClientVariant::Watch);
        assert!(matches!(
            trans_emp_body(&ctx, true, 0),
            Err(LoginError::MissingField("qr_code_mark"))
        ));
    }

    #[test]
    fn test_poll_body_echoes_mark() {
        let mut ctx = SessionContext::new(0, ClientVariant::Watch);
        ctx.tlv.qr_code_mark = vec![0xAB; 3];
        let body = trans_emp_body(&ctx, true, 0x0102_0304).unwrap();
        let head = parse_hex(QR_POLL_HEAD).unwrap();
        assert_eq!(&body[head.len()..head.len() + 4], &[1, 2, 3, 4]);
        let tail = parse_hex(QR_POLL_TAIL).unwrap();
        let mark_end = body.len() - tail.len();
        assert_eq!(&body[mark_end - 5..mark_end], &[0x00, 0x03, 0xAB, 0xAB, 0xAB]);
    }

    fn emp_response(key: &[u8; 16], plain: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; EMP_RESPONSE_HEADER];
        data[0] = 0x02;
        data.extend_from_slice(&tea::encrypt(plain, key));
        data.push(0x03);
        data
    }

    #[test]
    fn test_fetch_response_stores_mark() {
        let mut ctx = SessionContext::new(0, ClientVariant::Watch);
        let key: [u8; 16] = ctx.keys.share_key.as_slice().try_into().unwrap();
        let mut plain = vec![0u8; TRANS_EMP_SKIP];
        plain.extend_from_slice(&record(0x0017, &[0x11; 4]).unwrap());
        plain.extend_from_slice(&[0x00, 0x18, 0x00, 0x05, 0x00, 0x03]);
        plain.extend_from_slice(b"PNG");

        let outcome = trans_emp_response(&mut ctx, &emp_response(&key, &plain), false).unwrap();
        assert_eq!(outcome.status, 99);
        assert_eq!(outcome.message, "please scan");
        assert_eq!(outcome.qr_code.as_deref(), Some(&b"PNG"[..]));
        assert_eq!(ctx.tlv.qr_code_mark, vec![0x11; 4]);
        assert_eq!(ctx.state(), HandshakeState::NeedQrConfirm);
    }

    #[test]
    fn test_poll_response_pending() {
        let mut ctx = SessionContext::new(0, ClientVariant::Watch);
        let key: [u8; 16] = ctx.keys.share_key.as_slice().try_into().unwrap();
        let mut plain = vec![0u8; 40];
        plain.extend_from_slice(&[53, 0x03]);
        let outcome = trans_emp_response(&mut ctx, &emp_response(&key, &plain), true).unwrap();
        assert_eq!(outcome.status, 53);
        assert_eq!(outcome.message, "confirm on phone");
        assert!(outcome.qr_code.is_none());
    }

    #[test]
    fn test_poll_response_confirmed() {
        let mut ctx = SessionContext::new(0, ClientVariant::Watch);
        let key: [u8; 16] = ctx.keys.share_key.as_slice().try_into().unwrap();
        let mut plain = vec![0u8; TRANS_EMP_CONFIRMED_SKIP];
        plain.extend_from_slice(&record(0x016A, &[0x6A; 8]).unwrap());
        plain.extend_from_slice(&record(0x0318, &[0x18; 8]).unwrap());
        plain.extend_from_slice(&record(0x0106, &[0x06; 8]).unwrap());
        // final record ends `00 03`, so status reads 0
        plain.extend_from_slice(&record(0x0999, &[0x00, 0x03]).unwrap());

        let outcome = trans_emp_response(&mut ctx, &emp_response(&key, &plain), true).unwrap();
        assert_eq!(outcome.status, 0);
        assert_eq!(ctx.tlv.no_pic_sig, vec![0x6A; 8]);
        assert_eq!(ctx.tlv.tgt_qr, vec![0x18; 8]);
        assert_eq!(ctx.tlv.t106, vec![0x06; 8]);
        assert_eq!(ctx.state(), HandshakeState::Success);
    }

    fn logged_in() -> SessionContext {
        let mut ctx = SessionContext::new(123456, ClientVariant::Phone);
        ctx.tlv.tgt = vec![0x0A; 8];
        ctx.tlv.user_st_key = vec![0x0E; 16];
        ctx.tlv.user_st_sig = vec![0x14; 8];
        ctx.tlv.wt_session_ticket = vec![0x33; 48];
        ctx.tlv.wt_session_ticket_key = vec![0x34; 16];
        ctx
    }

    #[test]
    fn test_emp_auth_payload_variants() {
        let ctx = logged_in();
        let request = emp_auth_payload(&ctx, "AAAA", false, 0).unwrap();
        let verify = emp_auth_payload(&ctx, "AAAA", true, 0).unwrap();
        assert_eq!(&request[4..7], &[0x02, 0x00, 0xDE]);
        assert_eq!(&verify[4..7], &[0x02, 0x00, 0xC9]);
        assert!(
            request
                .windows(EMP_AUTH_PACKAGE.len())
                .any(|w| w == EMP_AUTH_PACKAGE.as_bytes())
        );
        assert_eq!(*verify.last().unwrap(), 0x03);
    }

    #[test]
    fn test_emp_auth_requires_tickets() {
        let mut ctx = logged_in();
        ctx.tlv.wt_session_ticket_key.clear();
        assert!(matches!(
            trans_emp_auth(&mut ctx, &SsoCodec, "AAAA", false),
            Err(LoginError::MissingField("wt_session_ticket_key"))
        ));
    }

    #[test]
    fn test_emp_auth_rejects_bad_k_value() {
        let mut ctx = logged_in();
        assert!(matches!(
            trans_emp_auth(&mut ctx, &SsoCodec, "AA!A", false),
            Err(LoginError::InvalidCharacter { position: 2, byte: b'!' })
        ));
    }

    fn auth_response(ctx: &SessionContext, plain: &[u8]) -> Vec<u8> {
        let user_st_key: [u8; 16] = ctx.tlv.user_st_key.as_slice().try_into().unwrap();
        let ticket_key: [u8; 16] = ctx.tlv.wt_session_ticket_key.as_slice().try_into().unwrap();
        let mut outer = vec![0u8; EMP_AUTH_INNER_SKIP];
        outer.extend_from_slice(&tea::encrypt(plain, &user_st_key));
        emp_response(&ticket_key, &outer)
    }

    #[test]
    fn test_emp_auth_response_authorized() {
        let mut ctx = logged_in();
        let mut w = PacketWriter::new();
        w.add_bytes(&[0u8; EMP_AUTH_SKIP]).add_u8(0).add_u32(1_700_000_000);
        w.add_str("Pixel").unwrap();
        w.add_u16(0);
        w.add_bytes(&record(0x0120, b"@skey").unwrap());

        let resp = auth_response(&ctx, &w.bytes());

        let outcome = trans_emp_auth_response(&mut ctx, &resp, true).unwrap();
        assert_eq!(
            outcome,
            EmpAuthOutcome::Authorized {
                time: 1_700_000_000,
                auth_name: "Pixel".to_string()
            }
        );
        assert_eq!(ctx.cookies.skey, "@skey");
    }

    #[test]
    fn test_emp_auth_response_rejected() {
        let mut ctx = logged_in();
        let mut w = PacketWriter::new();
        w.add_bytes(&[0u8; EMP_AUTH_SKIP]).add_u8(3);
        w.add_str("expired").unwrap();

        let resp = auth_response(&ctx, &w.bytes());

        let outcome = trans_emp_auth_response(&mut ctx, &resp, false).unwrap();
        assert_eq!(
            outcome,
            EmpAuthOutcome::Rejected {
                status: 3,
                message: "expired".to_string()
            }
        );
        assert_eq!(ctx.state(), HandshakeState::Failed);
    }
}
