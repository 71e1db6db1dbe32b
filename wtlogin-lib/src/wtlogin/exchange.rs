//! Silent credential refresh (`wtlogin.exchange_emp`).
//!
//! The request reuses TGT and D2 from a previous login and is encrypted under
//! a fixed protocol key instead of the session `share_key`.

use super::{KeyBlock, finish_request, frame_oicq, key_block, oicq_header, strip_login_response};
use crate::buffer::PacketWriter;
use crate::constants::{
    CMD_LOGIN, CMD_NAME_EXCHANGE_EMP, EMP_REFRESH_INTERVAL_HOURS, EXCHANGE_KEY, EXCHANGE_PUBLIC_KEY, SUB_CMD_EXCHANGE,
    WATCH_CLIENT_BLOB,
};
use crate::error::LoginError;
use crate::session::{Cookies, HandshakeState, SessionContext};
use crate::sso::SsoEnvelope;
use crate::tlv::decode::decode;
use crate::tlv::{TlvSet, encode as tlv};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Refreshed { cookies: Cookies },
    Failed { status: u8, message: String },
}

/// Whether the tokens are due for refresh at `now`.
pub fn needs_exchange(ctx: &SessionContext, now: DateTime<Utc>, force: bool) -> bool {
    if force {
        return true;
    }
    match ctx.emp_time {
        Some(last) => now - last >= Duration::hours(EMP_REFRESH_INTERVAL_HOURS),
        None => true,
    }
}

/// Ordered TLVs of the refresh body.
pub fn exchange_tlvs(ctx: &SessionContext) -> Result<TlvSet, LoginError> {
    let tgt = SessionContext::require(&ctx.tlv.tgt, "tgt")?;
    let d2 = SessionContext::require(&ctx.tlv.d2, "d2")?;

    let mut set = TlvSet::new();
    set.push(tlv::t100(ctx, 5, 16, 0, 34_869_472)?)?
        .push(tlv::t10a(ctx, tgt)?)?
        .push(tlv::t116(ctx, 2)?)?
        .push(tlv::t143(ctx, d2)?)?
        .push(tlv::t142(ctx)?)?
        .push(tlv::t154(ctx)?)?
        .push(tlv::t017(ctx, ctx.profile.app_id, ctx.uin, ctx.login_time)?)?
        .push(tlv::t141(ctx)?)?
        .push(tlv::t008(ctx)?)?
        .push(tlv::t147(ctx)?)?
        .push(tlv::t177(ctx)?)?
        .push(tlv::t187(ctx)?)?
        .push(tlv::t188(ctx)?)?
        .push(tlv::t202(ctx)?)?
        .push(tlv::t511(ctx)?)?;
    Ok(set)
}

/// Build a token refresh request.
///
/// The header announces the fixed exchange public key. The session's own
/// public key is left untouched.
pub fn exchange_emp(ctx: &mut SessionContext, sso: &impl SsoEnvelope) -> Result<Bytes, LoginError> {
    ctx.transition(HandshakeState::BuildingRequest);
    let set = exchange_tlvs(ctx)?;
    debug!("Token refresh for {} with {} TLVs", ctx.uin, set.len());
    let encrypted = ctx.encrypt(&set.into_body(SUB_CMD_EXCHANGE)?, &EXCHANGE_KEY);

    let mut w = PacketWriter::new();
    oicq_header(&mut w, CMD_LOGIN, ctx.uin, WATCH_CLIENT_BLOB)?;
    key_block(&mut w, KeyBlock::Long, &ctx.keys.key_rand, &EXCHANGE_PUBLIC_KEY)?;
    w.add_bytes(&encrypted);
    let oicq = frame_oicq(&w.freeze())?;
    finish_request(ctx, sso, CMD_NAME_EXCHANGE_EMP, &oicq)
}

/// Parse a refresh response. A nested T119 is keyed by `md5(share_key)`.
pub fn exchange_emp_response(
    ctx: &mut SessionContext,
    data: &[u8],
    now: DateTime<Utc>,
) -> Result<ExchangeOutcome, LoginError> {
    ctx.transition(HandshakeState::Decoding);
    let nested_key = md5::compute(SessionContext::require(&ctx.keys.share_key, "share_key")?).0;
    let (status, stream) = strip_login_response(data, &EXCHANGE_KEY, Some(&nested_key))?;
    decode(ctx, stream)?;

    if status != 0 {
        warn!("Token refresh for {} failed with status {}", ctx.uin, status);
        ctx.transition(HandshakeState::Failed);
        return Ok(ExchangeOutcome::Failed {
            status,
            message: "token refresh failed".to_string(),
        });
    }

    ctx.emp_time = Some(now);
    info!("Tokens refreshed for {}", ctx.uin);
    ctx.transition(HandshakeState::Success);
    Ok(ExchangeOutcome::Refreshed {
        cookies: ctx.cookies.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ClientVariant;
    use crate::sso::SsoCodec;
    use crate::tea;
    use crate::tlv::{record, split_records};
    use crate::wtlogin::{LONG_HEADER_LEN, open_login_frame};
    use chrono::TimeZone;

    fn logged_in() -> SessionContext {
        let mut ctx = SessionContext::new(123456, ClientVariant::Phone);
        ctx.keys.share_key = vec![0x5A; 16];
        ctx.tlv.tgt = vec![0x0A; 8];
        ctx.tlv.d2 = vec![0x43; 8];
        ctx
    }

    #[test]
    fn test_refresh_window() {
        let mut ctx = logged_in();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert!(needs_exchange(&ctx, now, false));

        ctx.emp_time = Some(now - Duration::hours(3));
        assert!(!needs_exchange(&ctx, now, false));
        assert!(needs_exchange(&ctx, now, true));

        ctx.emp_time = Some(now - Duration::hours(12));
        assert!(needs_exchange(&ctx, now, false));
    }

    #[test]
    fn test_tlv_order() {
        let set = exchange_tlvs(&logged_in()).unwrap();
        assert_eq!(
            set.tags(),
            &[
                0x100, 0x10A, 0x116, 0x143, 0x142, 0x154, 0x017, 0x141, 0x008, 0x147, 0x177, 0x187, 0x188, 0x202,
                0x511
            ]
        );
    }

    #[test]
    fn test_requires_tickets() {
        let mut ctx = logged_in();
        ctx.tlv.d2.clear();
        assert!(matches!(exchange_tlvs(&ctx), Err(LoginError::MissingField("d2"))));
    }

    #[test]
    fn test_public_key_not_mutated() {
        let mut ctx = logged_in();
        ctx.keys.public_key = vec![0x04; 65];
        exchange_emp(&mut ctx, &SsoCodec).unwrap();
        assert_eq!(ctx.keys.public_key, vec![0x04; 65]);
        assert_eq!(ctx.state(), HandshakeState::AwaitingResponse);
    }

    #[test]
    fn test_request_under_exchange_key() {
        let mut ctx = logged_in();
        let frame = exchange_emp(&mut ctx, &SsoCodec).unwrap();
        let oicq = open_login_frame(&frame);

        let header = &oicq[3..3 + LONG_HEADER_LEN];
        assert_eq!(&header[2..4], &[0x08, 0x10]);
        assert_eq!(&header[10..12], &[0x03, 0x07]);
        assert_eq!(&header[25..27], &[0x02, 0x01]);
        assert_eq!(&header[43..47], &[0x01, 0x31, 0x00, 0x01]);
        assert_eq!(&header[47..49], &[0x00, 0x41]);
        assert_eq!(&header[49..], &EXCHANGE_PUBLIC_KEY);

        let encrypted = &oicq[3 + LONG_HEADER_LEN..oicq.len() - 1];
        assert!(tea::decrypt(encrypted, &[0x5A; 16]).is_err());
        let body = tea::decrypt(encrypted, &EXCHANGE_KEY).unwrap();
        assert_eq!(&body[..4], &[0x00, 0x0B, 0x00, 0x0F]);
        let tags: Vec<u16> = split_records(Bytes::from(body[4..].to_vec()))
            .unwrap()
            .iter()
            .map(|r| r.tag)
            .collect();
        assert_eq!(tags, exchange_tlvs(&ctx).unwrap().tags());
    }

    fn response(status: u8, plain: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 15];
        data[0] = 0x02;
        data.push(status);
        data.extend_from_slice(&tea::encrypt(plain, &EXCHANGE_KEY));
        data.push(0x03);
        data
    }

    #[test]
    fn test_response_refreshed() {
        let mut ctx = logged_in();
        let nested_key = md5::compute([0x5A; 16]).0;
        let mut inner = record(0x0120, b"@fresh").unwrap().to_vec();
        inner.extend_from_slice(&record(0x0143, &[0x44; 8]).unwrap());
        let mut plain = vec![0x00, 0x0B, 0x00, 0x00, 0x02];
        plain.extend_from_slice(&record(0x0119, &tea::encrypt(&inner, &nested_key)).unwrap());

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let outcome = exchange_emp_response(&mut ctx, &response(0, &plain), now).unwrap();
        match outcome {
            ExchangeOutcome::Refreshed { cookies } => assert_eq!(cookies.skey, "@fresh"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(ctx.tlv.d2, vec![0x44; 8]);
        assert_eq!(ctx.emp_time, Some(now));
    }

    #[test]
    fn test_response_failed() {
        let mut ctx = logged_in();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let outcome = exchange_emp_response(&mut ctx, &response(1, &[0, 0x0B, 0]), now).unwrap();
        assert_eq!(
            outcome,
            ExchangeOutcome::Failed {
                status: 1,
                message: "token refresh failed".to_string()
            }
        );
        assert!(ctx.emp_time.is_none());
    }
}
