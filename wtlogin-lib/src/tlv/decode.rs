//! Response TLV walker.
//!
//! Walks a decrypted TLV stream and stores recognised fields in the session.
//! Unknown tags are skipped. A recognised tag whose payload does not parse is
//! logged and skipped as well; only a length prefix overrunning the buffer
//! aborts the walk.

use super::{Tag, split_records};
use crate::buffer::PacketReader;
use crate::error::LoginError;
use crate::session::{AccountInfo, ErrorInfo, SessionContext};
use crate::tea;
use bytes::Bytes;
use tracing::{debug, trace, warn};

/// Decode `data` into `ctx` and return the tags seen, nested ones included.
///
/// The payload of T119 is decrypted under `key_tgtgt` and walked recursively.
pub fn decode(ctx: &mut SessionContext, data: impl Into<Bytes>) -> Result<Vec<u16>, LoginError> {
    let records = split_records(data)?;
    let mut seen = Vec::with_capacity(records.len());

    for record in records {
        trace!("TLV {:04X} [{}]: {}", record.tag, record.payload.len(), hex::encode(&record.payload));
        seen.push(record.tag);

        match Tag::from(record.tag) {
            Tag::Encrypted => match decrypt_nested(ctx, &record.payload) {
                Ok(inner) => seen.extend(decode(ctx, inner)?),
                Err(e) => warn!("Skipping T119 that does not decrypt: {}", e),
            },
            Tag::Unknown(tag) => debug!("Skipping unknown TLV {:04X}", tag),
            tag => {
                if let Err(e) = apply(ctx, tag, record.payload) {
                    warn!("Skipping malformed TLV {:04X}: {}", record.tag, e);
                }
            }
        }
    }

    Ok(seen)
}

fn decrypt_nested(ctx: &SessionContext, payload: &[u8]) -> Result<Vec<u8>, LoginError> {
    let key = tea::key16(&ctx.keys.key_tgtgt, "key_tgtgt")?;
    tea::decrypt(payload, key)
}

fn apply(ctx: &mut SessionContext, tag: Tag, payload: Bytes) -> Result<(), LoginError> {
    let tlv = &mut ctx.tlv;
    match tag {
        Tag::WatchT018 => tlv.t018 = payload.to_vec(),
        Tag::WatchT019 => tlv.t019 = payload.to_vec(),
        Tag::WatchT065 => tlv.t065 = payload.to_vec(),
        Tag::CaptchaSign => tlv.captcha_sign = payload.to_vec(),
        Tag::T106 => tlv.t106 = payload.to_vec(),
        Tag::Ksid => tlv.ksid = payload.to_vec(),
        Tag::Tgt => tlv.tgt = payload.to_vec(),
        Tag::TgtKey => ctx.keys.key_tg = payload.to_vec(),
        Tag::UserStKey => tlv.user_st_key = payload.to_vec(),
        Tag::UserStSig => tlv.user_st_sig = payload.to_vec(),
        Tag::WtSessionTicket => tlv.wt_session_ticket = payload.to_vec(),
        Tag::WtSessionTicketKey => tlv.wt_session_ticket_key = payload.to_vec(),
        Tag::D2 => tlv.d2 = payload.to_vec(),
        Tag::D2Key => tlv.d2_key = payload.to_vec(),
        Tag::NoPicSig => tlv.no_pic_sig = payload.to_vec(),
        Tag::TgtQr => tlv.tgt_qr = payload.to_vec(),
        Tag::PowChallenge => tlv.pow_challenge = payload.to_vec(),
        Tag::Skey => ctx.cookies.skey = String::from_utf8_lossy(&payload).into_owned(),
        Tag::CaptchaUrl => tlv.captcha_url = Some(String::from_utf8_lossy(&payload).into_owned()),
        Tag::AccountInfo => {
            let mut r = PacketReader::new(payload);
            let face = r.read_u16()?;
            let age = r.read_u8()?;
            let gender = r.read_u8()?;
            let nick = r.read_body(1, 0)?;
            tlv.account = Some(AccountInfo {
                face,
                age,
                gender,
                nick: String::from_utf8_lossy(&nick).into_owned(),
            });
        }
        Tag::ErrorInfo => {
            let mut r = PacketReader::new(payload);
            let code = r.read_u32()?;
            let title = r.read_str()?;
            let message = r.read_str()?;
            tlv.error = Some(ErrorInfo { code, title, message });
        }
        Tag::PskeyMap => {
            let mut r = PacketReader::new(payload);
            let count = r.read_u16()?;
            for _ in 0..count {
                let domain = r.read_str()?;
                let p_skey = r.read_str()?;
                let _p4_token = r.read_str()?;
                if !p_skey.is_empty() {
                    ctx.cookies.p_skey.insert(domain, p_skey);
                }
            }
        }
        Tag::Encrypted | Tag::Unknown(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ClientVariant;
    use crate::tlv::record;

    fn stream(records: &[(u16, &[u8])]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|(tag, payload)| record(*tag, payload).unwrap().to_vec())
            .collect()
    }

    #[test]
    fn test_stores_known_tags() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone);
        let data = stream(&[
            (0x010A, &[0xAA; 8]),
            (0x0143, &[0xBB; 8]),
            (0x010E, &[0x01; 16]),
            (0x0120, b"@skey123"),
            (0x0192, b"https://captcha.example/x"),
        ]);
        let seen = decode(&mut ctx, data).unwrap();
        assert_eq!(seen, vec![0x010A, 0x0143, 0x010E, 0x0120, 0x0192]);
        assert_eq!(ctx.tlv.tgt, vec![0xAA; 8]);
        assert_eq!(ctx.tlv.d2, vec![0xBB; 8]);
        assert_eq!(ctx.tlv.user_st_key, vec![0x01; 16]);
        assert_eq!(ctx.cookies.skey, "@skey123");
        assert_eq!(ctx.tlv.captcha_url.as_deref(), Some("https://captcha.example/x"));
    }

    #[test]
    fn test_unknown_tag_skipped() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone);
        let data = stream(&[(0x0999, &[1, 2, 3]), (0x010A, &[0xCC; 4])]);
        let seen = decode(&mut ctx, data).unwrap();
        assert_eq!(seen, vec![0x0999, 0x010A]);
        assert_eq!(ctx.tlv.tgt, vec![0xCC; 4]);
    }

    #[test]
    fn test_malformed_known_tag_is_not_fatal() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone);
        // T146 truncated after the code
        let data = stream(&[(0x0146, &[0, 0, 0, 1]), (0x0143, &[0xDD; 4])]);
        decode(&mut ctx, data).unwrap();
        assert!(ctx.tlv.error.is_none());
        assert_eq!(ctx.tlv.d2, vec![0xDD; 4]);
    }

    #[test]
    fn test_overrun_is_fatal() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone);
        let data = hex::decode("010A0010AABB").unwrap();
        assert!(matches!(decode(&mut ctx, data), Err(LoginError::InsufficientData { .. })));
    }

    #[test]
    fn test_error_info_and_account() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone);
        let mut t146 = vec![0, 0, 0, 0x2D];
        t146.extend_from_slice(&[0, 5]);
        t146.extend_from_slice(b"Error");
        t146.extend_from_slice(&[0, 14]);
        t146.extend_from_slice(b"wrong password");
        let mut t11a = vec![0x01, 0x02, 30, 1, 4];
        t11a.extend_from_slice(b"nick");

        decode(&mut ctx, stream(&[(0x0146, &t146), (0x011A, &t11a)])).unwrap();
        let err = ctx.tlv.error.clone().unwrap();
        assert_eq!(err.code, 0x2D);
        assert_eq!(err.title, "Error");
        assert_eq!(err.message, "wrong password");
        let account = ctx.tlv.account.clone().unwrap();
        assert_eq!(account.face, 0x0102);
        assert_eq!(account.age, 30);
        assert_eq!(account.nick, "nick");
    }

    #[test]
    fn test_pskey_map() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone);
        let mut w = crate::buffer::PacketWriter::new();
        w.add_u16(2);
        w.add_str("qzone.qq.com").unwrap().add_str("pskey-a").unwrap().add_str("").unwrap();
        w.add_str("vip.qq.com").unwrap().add_str("").unwrap().add_str("").unwrap();
        decode(&mut ctx, stream(&[(0x0512, &w.freeze())])).unwrap();
        assert_eq!(ctx.cookies.p_skey.len(), 1);
        assert_eq!(ctx.cookies.p_skey["qzone.qq.com"], "pskey-a");
    }

    #[test]
    fn test_nested_t119() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone);
        ctx.keys.key_tgtgt = vec![0x42; 16];
        let inner = stream(&[(0x0134, &[0x07; 16]), (0x0133, &[0x08; 48])]);
        let encrypted = tea::encrypt(&inner, &[0x42; 16]);
        let seen = decode(&mut ctx, stream(&[(0x0119, &encrypted)])).unwrap();
        assert_eq!(seen, vec![0x0119, 0x0134, 0x0133]);
        assert_eq!(ctx.tlv.wt_session_ticket_key, vec![0x07; 16]);
        assert_eq!(ctx.tlv.wt_session_ticket.len(), 48);
    }

    #[test]
    fn test_nested_t119_wrong_key_skipped() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone);
        ctx.keys.key_tgtgt = vec![0x43; 16];
        let inner = stream(&[(0x0134, &[0x07; 16])]);
        let encrypted = tea::encrypt(&inner, &[0x42; 16]);
        let seen = decode(&mut ctx, stream(&[(0x0119, &encrypted), (0x010A, &[1])])).unwrap();
        assert_eq!(seen, vec![0x0119, 0x010A]);
        assert!(ctx.tlv.wt_session_ticket_key.is_empty());
    }
}
