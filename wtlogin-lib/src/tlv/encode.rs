//! TLV record builders.
//!
//! Each builder reads the [`SessionContext`] (and for a few tags an explicit
//! argument) and returns one framed record. Builders never write to the
//! context: the keys they need (`key_tgtgt`, the password MD5) are cached
//! beforehand by [`SessionContext::derive_secondary_keys`]. Random words and
//! TEA fill come from the context's random source.
//!
//! | Tag  | Reads |
//! |------|-------|
//! | T001 | uin, login_time, device ip, a random word |
//! | T106 | uin, login_time, guid, profile, `password_md5`, `key_tgtgt` (or a stored T106) |
//! | T144 | device, guid, `key_tgtgt` |
//! | T154 | seq |
//! | T16A / T318 | no-pic sig / QR TGT stored by the decoder |
//! | T104 / T547 | captcha sign / proof-of-work challenge stored by the decoder |

use super::record;
use crate::buffer::PacketWriter;
use crate::constants::T511_DOMAINS;
use crate::device::DeviceInfo;
use crate::error::LoginError;
use crate::session::SessionContext;
use crate::tea;
use bytes::Bytes;

/// Encoder with no caller arguments, as listed by the legacy template.
pub type Encoder = fn(&SessionContext) -> Result<Bytes, LoginError>;

const LOCALE_ID: u32 = 2052;
const PING_VERSION: u16 = 1;
const PING_SSO_VERSION: u32 = 1536;
const TGTGT_VERSION: u16 = 4;
const LOGIN_TYPE_PASSWORD: u32 = 1;
const APP_ID_LIST: u32 = 1_600_000_226;
const QR_PT_OS_VERSION: u32 = 8;

fn md5(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

fn network_type_code(device: &DeviceInfo) -> u16 {
    if device.network_type.eq_ignore_ascii_case("wifi") { 2 } else { 1 }
}

pub fn t001(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u16(1)
        .add_u32(ctx.random_u32())
        .add_int(ctx.uin, 4)?
        .add_u32(ctx.login_time)
        .add_bytes(&ctx.profile.device.ip)
        .add_u16(0);
    record(0x0001, &w.freeze())
}

pub fn t008(_ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u16(0).add_u32(LOCALE_ID).add_u16(0);
    record(0x0008, &w.freeze())
}

pub fn t016(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let p = &ctx.profile;
    let mut w = PacketWriter::new();
    w.add_u32(p.sso_version)
        .add_u32(p.ping_app_id)
        .add_u32(p.app_id)
        .add_bytes(&ctx.guid);
    w.add_str(&p.package_name)?.add_str(&p.version)?;
    w.add_body(&p.apk_sign, 2, 0)?;
    record(0x0016, &w.freeze())
}

pub fn t017(_ctx: &SessionContext, app_id: u32, uin: u64, login_time: u32) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u32(app_id).add_int(uin, 4)?.add_u32(login_time);
    record(0x0017, &w.freeze())
}

pub fn t018(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u16(PING_VERSION)
        .add_u32(PING_SSO_VERSION)
        .add_u32(ctx.profile.ping_app_id)
        .add_u32(0)
        .add_int(ctx.uin, 4)?
        .add_u16(0)
        .add_u16(0);
    record(0x0018, &w.freeze())
}

/// QR image parameters: size 3, margin 4, 72 dpi, EC level 2, hint 2.
pub fn t01b(_ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u32(0)
        .add_u32(0)
        .add_u32(3)
        .add_u32(4)
        .add_u32(72)
        .add_u32(2)
        .add_u32(2)
        .add_u16(0);
    record(0x001B, &w.freeze())
}

pub fn t01d(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u8(1)
        .add_u32(ctx.profile.misc_bitmap)
        .add_u32(0)
        .add_u8(0)
        .add_u32(0);
    record(0x001D, &w.freeze())
}

pub fn t01f(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let d = &ctx.profile.device;
    let mut w = PacketWriter::new();
    w.add_u8(0);
    w.add_str(&d.os_type)?.add_str(&d.os_version)?;
    w.add_u16(network_type_code(d));
    w.add_str(&d.sim_operator)?.add_str("")?.add_str(&d.apn)?;
    record(0x001F, &w.freeze())
}

pub fn t033(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0033, &ctx.guid)
}

pub fn t035(_ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0035, &QR_PT_OS_VERSION.to_be_bytes())
}

pub fn t100(
    ctx: &SessionContext,
    sso_version: u32,
    app_id: u32,
    app_client_version: u32,
    main_sig_map: u32,
) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u16(1)
        .add_u32(sso_version)
        .add_u32(app_id)
        .add_u32(ctx.profile.app_id)
        .add_u32(app_client_version)
        .add_u32(main_sig_map);
    record(0x0100, &w.freeze())
}

/// T100 with every argument taken from the profile.
pub fn t100_profile(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let p = &ctx.profile;
    t100(ctx, p.sso_version, p.ping_app_id, p.app_client_version, p.main_sig_map)
}

pub fn t104(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let sign = SessionContext::require(&ctx.tlv.captcha_sign, "captcha_sign")?;
    record(0x0104, sign)
}

/// Encrypted A1 credential block.
///
/// When the server already issued a T106 (QR confirmation), that blob is
/// echoed unchanged. Otherwise it is built from the password hash and
/// encrypted under `md5(password_md5 ++ 00000000 ++ uin)`.
pub fn t106(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    if !ctx.tlv.t106.is_empty() {
        return record(0x0106, &ctx.tlv.t106);
    }

    let password_md5 = SessionContext::require(&ctx.keys.password_md5, "password")?;
    let tgtgt = SessionContext::require(&ctx.keys.key_tgtgt, "key_tgtgt")?;
    let p = &ctx.profile;

    let mut body = PacketWriter::new();
    body.add_u16(TGTGT_VERSION)
        .add_u32(ctx.random_u32())
        .add_u32(p.sso_version)
        .add_u32(p.ping_app_id)
        .add_u32(p.app_client_version)
        .add_u64(ctx.uin)
        .add_u32(ctx.login_time)
        .add_bytes(&p.device.ip)
        .add_u8(1)
        .add_bytes(password_md5)
        .add_bytes(tgtgt)
        .add_u32(0)
        .add_u8(1)
        .add_bytes(&ctx.guid)
        .add_u32(p.app_id)
        .add_u32(LOGIN_TYPE_PASSWORD);
    body.add_str(&ctx.uin.to_string())?;
    body.add_u16(0);

    let mut key_src = PacketWriter::new();
    key_src.add_bytes(password_md5).add_u32(0).add_int(ctx.uin, 4)?;
    let key = md5(&key_src.freeze());

    record(0x0106, &ctx.encrypt(&body.freeze(), &key))
}

pub fn t107(_ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u16(0).add_u8(0).add_u16(0).add_u8(1);
    record(0x0107, &w.freeze())
}

pub fn t109(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0109, &md5(&ctx.profile.device.android_id))
}

pub fn t10a(_ctx: &SessionContext, tgt: &[u8]) -> Result<Bytes, LoginError> {
    record(0x010A, tgt)
}

pub fn t116(ctx: &SessionContext, version: u8) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u8(version)
        .add_u32(ctx.profile.misc_bitmap)
        .add_u32(ctx.profile.sub_sig_map)
        .add_u8(1)
        .add_u32(APP_ID_LIST);
    record(0x0116, &w.freeze())
}

pub fn t116_profile(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    t116(ctx, 0)
}

pub fn t124(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let d = &ctx.profile.device;
    let mut w = PacketWriter::new();
    w.add_str(&d.os_type)?.add_str(&d.os_version)?;
    w.add_u16(network_type_code(d));
    w.add_str(&d.sim_operator)?.add_str("")?.add_str(&d.apn)?;
    record(0x0124, &w.freeze())
}

pub fn t128(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let d = &ctx.profile.device;
    let mut w = PacketWriter::new();
    w.add_u16(0)
        .add_u8(0)
        .add_u8(1)
        .add_u8(0)
        .add_u32(0x0100_0000);
    w.add_str(&d.model)?;
    w.add_body(&ctx.guid, 2, 0)?;
    w.add_str(&d.brand)?;
    record(0x0128, &w.freeze())
}

pub fn t141(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let d = &ctx.profile.device;
    let mut w = PacketWriter::new();
    w.add_u16(1);
    w.add_str(&d.sim_operator)?;
    w.add_u16(network_type_code(d));
    w.add_str(&d.apn)?;
    record(0x0141, &w.freeze())
}

pub fn t142(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u16(0);
    w.add_str(&ctx.profile.package_name)?;
    record(0x0142, &w.freeze())
}

pub fn t143(_ctx: &SessionContext, d2: &[u8]) -> Result<Bytes, LoginError> {
    record(0x0143, d2)
}

/// Device report: T109, T124, T128 and T16E grouped and encrypted under `key_tgtgt`.
pub fn t144(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let tgtgt = tea::key16(&ctx.keys.key_tgtgt, "key_tgtgt")?;
    let inner = [t109(ctx)?, t124(ctx)?, t128(ctx)?, t16e(ctx)?];

    let mut w = PacketWriter::new();
    w.add_int(inner.len() as u64, 2)?;
    for r in &inner {
        w.add_bytes(r);
    }
    record(0x0144, &ctx.encrypt(&w.freeze(), tgtgt))
}

pub fn t145(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0145, &ctx.guid)
}

pub fn t147(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let p = &ctx.profile;
    let mut w = PacketWriter::new();
    w.add_u32(p.ping_app_id);
    w.add_str(&p.version)?;
    w.add_body(&p.apk_sign, 2, 0)?;
    record(0x0147, &w.freeze())
}

pub fn t154(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0154, &ctx.seq.to_be_bytes())
}

pub fn t16a(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let sig = SessionContext::require(&ctx.tlv.no_pic_sig, "no_pic_sig")?;
    record(0x016A, sig)
}

pub fn t16e(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x016E, ctx.profile.device.model.as_bytes())
}

pub fn t177(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u8(1).add_u32(ctx.profile.build_time);
    w.add_str(&ctx.profile.sdk_version)?;
    record(0x0177, &w.freeze())
}

pub fn t187(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0187, &md5(ctx.profile.device.mac.as_bytes()))
}

pub fn t188(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0188, &md5(&ctx.profile.device.android_id))
}

pub fn t191(_ctx: &SessionContext, flag: u8) -> Result<Bytes, LoginError> {
    record(0x0191, &[flag])
}

pub fn t191_profile(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    t191(ctx, ctx.profile.t191_flag)
}

pub fn t193(_ctx: &SessionContext, ticket: &str) -> Result<Bytes, LoginError> {
    record(0x0193, ticket.as_bytes())
}

pub fn t194(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0194, &md5(ctx.profile.device.imsi.as_bytes()))
}

pub fn t202(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let d = &ctx.profile.device;
    let mut w = PacketWriter::new();
    w.add_body(&md5(d.bssid.as_bytes()), 2, 0)?;
    w.add_str(&d.ssid)?;
    record(0x0202, &w.freeze())
}

pub fn t318(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let tgt_qr = SessionContext::require(&ctx.tlv.tgt_qr, "tgt_qr")?;
    record(0x0318, tgt_qr)
}

pub fn t511(_ctx: &SessionContext) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_int(T511_DOMAINS.len() as u64, 2)?;
    for domain in T511_DOMAINS {
        w.add_u8(1);
        w.add_str(domain)?;
    }
    record(0x0511, &w.freeze())
}

pub fn t516(_ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0516, &0u32.to_be_bytes())
}

pub fn t521(_ctx: &SessionContext, product_type: u32) -> Result<Bytes, LoginError> {
    let mut w = PacketWriter::new();
    w.add_u32(product_type).add_u16(0);
    record(0x0521, &w.freeze())
}

pub fn t521_profile(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    t521(ctx, ctx.profile.t521_product)
}

pub fn t525(_ctx: &SessionContext, blob: &[u8]) -> Result<Bytes, LoginError> {
    record(0x0525, blob)
}

pub fn t525_profile(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    t525(ctx, &ctx.profile.t525_blob)
}

/// Echo of the T546 challenge. Empty when the server sent none.
pub fn t547(ctx: &SessionContext) -> Result<Bytes, LoginError> {
    record(0x0547, &ctx.tlv.pow_challenge)
}
