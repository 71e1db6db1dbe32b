//! Password login and captcha submission (`wtlogin.login`).

use super::{KeyBlock, finish_request, frame_oicq, key_block, oicq_header, strip_login_response};
use crate::buffer::PacketWriter;
use crate::constants::{
    CMD_LOGIN, CMD_NAME_LOGIN, LEGACY_GUID, PHONE_CLIENT_BLOB, SUB_CMD_CAPTCHA, SUB_CMD_LOGIN, WATCH_CLIENT_BLOB,
};
use crate::device::ClientVariant;
use crate::ecdh::{KeyExchange, P256Exchange};
use crate::error::LoginError;
use crate::session::{HandshakeState, KeyMaterial, SessionContext};
use crate::sso::{SsoCodec, SsoEnvelope};
use crate::tea;
use crate::tlv::encode::{self as tlv, Encoder};
use crate::tlv::{TlvSet, decode::decode};
use bytes::Bytes;
use tracing::{debug, info, warn};

/// Status of a login response asking for a slider captcha.
pub const STATUS_NEED_CAPTCHA: u8 = 2;

/// Template of the legacy phone client: encoders invoked uniformly with
/// profile defaults at assembly time.
pub const LEGACY_TEMPLATE: &[Encoder] = &[
    tlv::t018,
    tlv::t001,
    tlv::t106,
    tlv::t116_profile,
    tlv::t100_profile,
    tlv::t107,
    tlv::t142,
    tlv::t144,
    tlv::t145,
    tlv::t147,
    tlv::t154,
    tlv::t141,
    tlv::t008,
    tlv::t511,
    tlv::t187,
    tlv::t188,
    tlv::t191_profile,
    tlv::t177,
    tlv::t516,
    tlv::t521_profile,
    tlv::t525_profile,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    NeedCaptcha { url: String },
    Failed { status: u8, title: String, message: String },
}

/// Ordered TLV records of the login body for the context's variant.
pub fn login_tlvs(ctx: &SessionContext) -> Result<TlvSet, LoginError> {
    let mut set = TlvSet::new();
    match ctx.variant {
        ClientVariant::Phone => {
            set.push(tlv::t018(ctx)?)?
                .push(tlv::t001(ctx)?)?
                .push(tlv::t106(ctx)?)?
                .push(tlv::t116(ctx, 0)?)?
                .push(tlv::t100(ctx, 15, 16, 0, 34_869_472)?)?
                .push(tlv::t107(ctx)?)?
                .push(tlv::t142(ctx)?)?
                .push(tlv::t144(ctx)?)?
                .push(tlv::t145(ctx)?)?
                .push(tlv::t147(ctx)?)?
                .push(tlv::t154(ctx)?)?
                .push(tlv::t141(ctx)?)?
                .push(tlv::t008(ctx)?)?
                .push(tlv::t511(ctx)?)?
                .push(tlv::t187(ctx)?)?
                .push(tlv::t188(ctx)?)?
                .push(tlv::t191(ctx, 0x82)?)?
                .push(tlv::t202(ctx)?)?
                .push(tlv::t177(ctx)?)?
                .push(tlv::t516(ctx)?)?
                .push(tlv::t521(ctx, 0)?)?
                .push(tlv::t525(ctx, &[0x00, 0x01, 0x05, 0x36, 0x00, 0x02, 0x01, 0x00])?)?;
        }
        ClientVariant::Watch => {
            set.push(tlv::t018(ctx)?)?
                .push(tlv::t001(ctx)?)?
                .push(tlv::t106(ctx)?)?
                .push(tlv::t116(ctx, 0)?)?
                .push(tlv::t100(ctx, 5, 16, 0, 33_820_864)?)?
                .push(tlv::t107(ctx)?)?
                .push(tlv::t142(ctx)?)?
                .push(tlv::t144(ctx)?)?
                .push(tlv::t145(ctx)?)?
                .push(tlv::t147(ctx)?)?
                .push(tlv::t16a(ctx)?)?
                .push(tlv::t154(ctx)?)?
                .push(tlv::t141(ctx)?)?
                .push(tlv::t008(ctx)?)?
                .push(tlv::t187(ctx)?)?
                .push(tlv::t188(ctx)?)?
                .push(tlv::t194(ctx)?)?
                .push(tlv::t191(ctx, 0x00)?)?
                .push(tlv::t202(ctx)?)?
                .push(tlv::t177(ctx)?)?
                .push(tlv::t516(ctx)?)?
                .push(tlv::t521(ctx, 115)?)?
                .push(tlv::t318(ctx)?)?;
        }
        ClientVariant::Legacy => {
            for encode in LEGACY_TEMPLATE {
                set.push(encode(ctx)?)?;
            }
        }
    }
    Ok(set)
}

/// Prepare keys, assemble the body and return the `02 ... 03` OICQ frame.
///
/// Phone and Watch take a fresh pair from `key_exchange`; Legacy restores
/// its pinned keys and GUID.
pub fn login_packet(ctx: &mut SessionContext, key_exchange: &impl KeyExchange) -> Result<Bytes, LoginError> {
    ctx.transition(HandshakeState::BuildingRequest);
    match ctx.variant {
        ClientVariant::Phone | ClientVariant::Watch => ctx.keys.apply_ecdh(key_exchange.generate()?),
        ClientVariant::Legacy => {
            ctx.keys.restore_pinned(&KeyMaterial::for_variant(ClientVariant::Legacy));
            ctx.guid = LEGACY_GUID;
        }
    }
    ctx.derive_secondary_keys();

    let set = login_tlvs(ctx)?;
    debug!("{} login with {} TLVs", ctx.variant, set.len());
    let body = set.into_body(SUB_CMD_LOGIN)?;
    let share_key = tea::key16(&ctx.keys.share_key, "share_key")?;
    let encrypted = ctx.encrypt(&body, share_key);

    let (blob, block) = match ctx.variant {
        ClientVariant::Watch => (WATCH_CLIENT_BLOB, KeyBlock::Short),
        ClientVariant::Phone | ClientVariant::Legacy => (PHONE_CLIENT_BLOB, KeyBlock::Long),
    };
    let mut w = PacketWriter::new();
    oicq_header(&mut w, CMD_LOGIN, ctx.uin, blob)?;
    key_block(&mut w, block, &ctx.keys.key_rand, &ctx.keys.public_key)?;
    w.add_bytes(&encrypted);
    frame_oicq(&w.freeze())
}

/// Build a complete password login request.
pub fn login_with(
    ctx: &mut SessionContext,
    key_exchange: &impl KeyExchange,
    sso: &impl SsoEnvelope,
) -> Result<Bytes, LoginError> {
    let oicq = login_packet(ctx, key_exchange)?;
    finish_request(ctx, sso, CMD_NAME_LOGIN, &oicq)
}

/// Password login against the built-in server key with the default SSO codec.
pub fn login(ctx: &mut SessionContext) -> Result<Bytes, LoginError> {
    login_with(ctx, &P256Exchange::default(), &SsoCodec)
}

/// Submit a captcha ticket after a [`LoginOutcome::NeedCaptcha`].
pub fn login_captcha(ctx: &mut SessionContext, sso: &impl SsoEnvelope, ticket: &str) -> Result<Bytes, LoginError> {
    ctx.transition(HandshakeState::BuildingRequest);
    let share_key = tea::key16(&ctx.keys.share_key, "share_key")?;

    let mut set = TlvSet::new();
    set.push(tlv::t193(ctx, ticket)?)?
        .push(tlv::t008(ctx)?)?
        .push(tlv::t104(ctx)?)?
        .push(tlv::t116(ctx, 0)?)?
        .push(tlv::t547(ctx)?)?;
    let encrypted = ctx.encrypt(&set.into_body(SUB_CMD_CAPTCHA)?, share_key);

    let mut w = PacketWriter::new();
    oicq_header(&mut w, CMD_LOGIN, ctx.uin, WATCH_CLIENT_BLOB)?;
    key_block(&mut w, KeyBlock::Long, &ctx.keys.key_rand, &ctx.keys.public_key)?;
    w.add_bytes(&encrypted);
    let oicq = frame_oicq(&w.freeze())?;
    finish_request(ctx, sso, CMD_NAME_LOGIN, &oicq)
}

/// Parse the OICQ frame of a `wtlogin.login` response.
pub fn login_response(ctx: &mut SessionContext, data: &[u8]) -> Result<LoginOutcome, LoginError> {
    ctx.transition(HandshakeState::Decoding);
    let share_key = *tea::key16(&ctx.keys.share_key, "share_key")?;
    let tgtgt = tea::key16(&ctx.keys.key_tgtgt, "key_tgtgt").ok().copied();

    let (status, stream) = strip_login_response(data, &share_key, tgtgt.as_ref())?;
    let tags = decode(ctx, stream)?;
    debug!("Login response status {} carried {} TLVs", status, tags.len());

    let outcome = match status {
        0 => {
            info!("Login succeeded for {}", ctx.uin);
            ctx.transition(HandshakeState::Success);
            LoginOutcome::Success
        }
        STATUS_NEED_CAPTCHA => {
            info!("Login for {} needs a captcha", ctx.uin);
            ctx.transition(HandshakeState::NeedCaptcha);
            LoginOutcome::NeedCaptcha {
                url: ctx.tlv.captcha_url.clone().unwrap_or_default(),
            }
        }
        _ => {
            let (title, message) = match &ctx.tlv.error {
                Some(e) => (e.title.clone(), e.message.clone()),
                None => ("login failed".to_string(), String::new()),
            };
            warn!("Login for {} failed with status {}: {}", ctx.uin, status, title);
            ctx.transition(HandshakeState::Failed);
            LoginOutcome::Failed { status, title, message }
        }
    };
    Ok(outcome)
}
