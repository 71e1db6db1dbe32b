//! Mutable per-attempt session state.
//!
//! One [`SessionContext`] is created per login attempt and passed by `&mut`
//! through the request builders and response parsers. Builders read
//! identity, profile and key material; parsers write decoded artifacts into
//! [`TlvResults`] and [`Cookies`]. Secrets are wiped when the context drops.
//!
//! Every random value that ends up on the wire (nonces, TEA fill bytes,
//! `key_tgtgt`) is drawn from the context's random source, so a seeded
//! source makes whole packets reproducible.

use crate::constants::{
    DEFAULT_GUID, LEGACY_GUID, LEGACY_KEY_RAND, LEGACY_KEY_TG, LEGACY_PUBLIC_KEY, LEGACY_SHARE_KEY, WATCH_KEY_RAND,
    WATCH_PUBLIC_KEY, WATCH_SHARE_KEY,
};
use crate::device::{ClientProfile, ClientVariant};
use crate::ecdh::EcdhKeys;
use crate::error::LoginError;
use chrono::{DateTime, Utc};
use crate::tea;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::Display;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// First SSO sequence number handed out by a new context.
pub const INITIAL_SSO_SEQ: u32 = 5267;

/// Key material of one attempt. Empty vectors mean "not established yet".
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    /// Client ECDH public key announced in the OICQ header
    pub public_key: Vec<u8>,
    /// Primary TEA key of the inner login payload
    pub share_key: Vec<u8>,
    /// Random bytes carried in the OICQ header
    pub key_rand: Vec<u8>,
    /// Key of T106 contents and of T144, cached once per attempt
    pub key_tgtgt: Vec<u8>,
    /// TGT key (T10D)
    pub key_tg: Vec<u8>,
    pub password_md5: Vec<u8>,
}

impl KeyMaterial {
    /// Variant-constant key material. Phone starts with only a random
    /// `key_rand`; its ECDH pair is generated by `login`.
    pub fn for_variant(variant: ClientVariant) -> Self {
        let mut keys = Self::default();
        match variant {
            ClientVariant::Phone => {
                keys.key_rand = rand::random::<[u8; 16]>().to_vec();
            }
            ClientVariant::Watch => {
                keys.public_key = WATCH_PUBLIC_KEY.to_vec();
                keys.share_key = WATCH_SHARE_KEY.to_vec();
                keys.key_rand = WATCH_KEY_RAND.to_vec();
            }
            ClientVariant::Legacy => {
                keys.public_key = LEGACY_PUBLIC_KEY.to_vec();
                keys.share_key = LEGACY_SHARE_KEY.to_vec();
                keys.key_rand = LEGACY_KEY_RAND.to_vec();
                keys.key_tg = LEGACY_KEY_TG.to_vec();
            }
        }
        keys
    }

    /// Install a new key pair, wiping the previous one.
    pub fn apply_ecdh(&mut self, keys: EcdhKeys) {
        self.public_key.zeroize();
        self.share_key.zeroize();
        self.public_key = keys.public_key;
        self.share_key = keys.share_key.to_vec();
    }

    /// Replace the pinned fields with those of `pinned`, wiping the old values.
    pub fn restore_pinned(&mut self, pinned: &KeyMaterial) {
        for (field, value) in [
            (&mut self.public_key, &pinned.public_key),
            (&mut self.share_key, &pinned.share_key),
            (&mut self.key_rand, &pinned.key_rand),
            (&mut self.key_tg, &pinned.key_tg),
        ] {
            field.zeroize();
            field.extend_from_slice(value);
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &hex::encode(&self.public_key))
            .field("share_key", &redacted(&self.share_key))
            .field("key_rand", &redacted(&self.key_rand))
            .field("key_tgtgt", &redacted(&self.key_tgtgt))
            .field("key_tg", &redacted(&self.key_tg))
            .field("password_md5", &redacted(&self.password_md5))
            .finish()
    }
}

fn redacted(secret: &[u8]) -> String {
    if secret.is_empty() {
        "<unset>".to_string()
    } else {
        format!("<{} bytes>", secret.len())
    }
}

/// Error text carried by T146.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorInfo {
    pub code: u32,
    pub title: String,
    pub message: String,
}

/// Account summary carried by T11A.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountInfo {
    pub face: u16,
    pub age: u8,
    pub gender: u8,
    pub nick: String,
}

/// Artifacts extracted by the TLV decoder, accumulated across responses.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct TlvResults {
    /// T10A
    pub tgt: Vec<u8>,
    /// T143
    pub d2: Vec<u8>,
    /// T305
    pub d2_key: Vec<u8>,
    /// T10E
    pub user_st_key: Vec<u8>,
    /// T114
    pub user_st_sig: Vec<u8>,
    /// T133
    pub wt_session_ticket: Vec<u8>,
    /// T134
    pub wt_session_ticket_key: Vec<u8>,
    /// Echoed by the QR poll request
    pub qr_code_mark: Vec<u8>,
    pub t106: Vec<u8>,
    /// T108
    pub ksid: Vec<u8>,
    /// T16A
    pub no_pic_sig: Vec<u8>,
    /// T318, issued by the QR confirmation
    pub tgt_qr: Vec<u8>,
    pub t018: Vec<u8>,
    pub t019: Vec<u8>,
    pub t065: Vec<u8>,
    /// T104, echoed by the captcha submission
    pub captcha_sign: Vec<u8>,
    /// T546, echoed as T547
    pub pow_challenge: Vec<u8>,
    #[zeroize(skip)]
    pub captcha_url: Option<String>,
    #[zeroize(skip)]
    pub error: Option<ErrorInfo>,
    #[zeroize(skip)]
    pub account: Option<AccountInfo>,
}

impl fmt::Debug for TlvResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlvResults")
            .field("tgt", &redacted(&self.tgt))
            .field("d2", &redacted(&self.d2))
            .field("user_st_key", &redacted(&self.user_st_key))
            .field("wt_session_ticket", &redacted(&self.wt_session_ticket))
            .field("qr_code_mark", &self.qr_code_mark.len())
            .field("captcha_url", &self.captcha_url)
            .field("error", &self.error)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// Web cookies issued on login (T120, T512).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cookies {
    #[serde(default)]
    pub skey: String,
    #[serde(default)]
    pub client_key: String,
    #[serde(default)]
    pub p_skey: BTreeMap<String, String>,
}

/// Progress of the current handshake step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum HandshakeState {
    #[default]
    Idle,
    BuildingRequest,
    AwaitingResponse,
    Decoding,
    Success,
    NeedCaptcha,
    NeedQrConfirm,
    Failed,
}

impl HandshakeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::NeedCaptcha | Self::NeedQrConfirm | Self::Failed)
    }

    fn expects(self, next: Self) -> bool {
        use HandshakeState::*;
        match next {
            BuildingRequest => self == Idle || self.is_terminal(),
            AwaitingResponse => self == BuildingRequest,
            Decoding => self == AwaitingResponse,
            Idle => true,
            _ => self == Decoding,
        }
    }
}

pub struct SessionContext {
    pub uin: u64,
    pub password: Option<Zeroizing<String>>,
    pub guid: [u8; 16],
    pub variant: ClientVariant,
    pub profile: ClientProfile,
    pub keys: KeyMaterial,
    pub login_time: u32,
    pub seq: u32,
    pub tlv: TlvResults,
    pub cookies: Cookies,
    /// Last successful token exchange
    pub emp_time: Option<DateTime<Utc>>,
    /// Server tips of the last SSO response
    pub tips: Option<String>,
    state: HandshakeState,
    rng: RefCell<Box<dyn RngCore + Send>>,
}

impl SessionContext {
    pub fn new(uin: u64, variant: ClientVariant) -> Self {
        let guid = match variant {
            ClientVariant::Phone | ClientVariant::Watch => DEFAULT_GUID,
            ClientVariant::Legacy => LEGACY_GUID,
        };
        Self {
            uin,
            password: None,
            guid,
            variant,
            profile: ClientProfile::for_variant(variant),
            keys: KeyMaterial::for_variant(variant),
            login_time: Utc::now().timestamp() as u32,
            seq: INITIAL_SSO_SEQ,
            tlv: TlvResults::default(),
            cookies: Cookies::default(),
            emp_time: None,
            tips: None,
            state: HandshakeState::Idle,
            rng: RefCell::new(Box::new(StdRng::from_entropy())),
        }
    }

    /// Draw nonces and fill bytes from `rng` instead of the OS-seeded default.
    pub fn with_rng(self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng.replace(Box::new(rng));
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    pub fn with_guid(mut self, guid: [u8; 16]) -> Self {
        self.guid = guid;
        self
    }

    /// Replace the profile. The variant of the profile wins.
    pub fn with_profile(mut self, profile: ClientProfile) -> Self {
        self.variant = profile.variant;
        self.profile = profile;
        self
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Record a state change. Out-of-order transitions are logged, not refused.
    pub fn transition(&mut self, next: HandshakeState) {
        if !self.state.expects(next) {
            warn!("Unexpected handshake transition {} -> {}", self.state, next);
        }
        debug!("Handshake state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Advance and return the sequence number for the next SSO frame.
    pub fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// Derive and cache the keys that TLV encoders consume.
    ///
    /// Runs once before packet assembly: fills `key_tgtgt` with random bytes
    /// unless already set, and caches the MD5 of the password when one is
    /// present. Encoders never write session state themselves.
    pub fn derive_secondary_keys(&mut self) {
        if self.keys.key_tgtgt.is_empty() {
            let mut tgtgt = vec![0u8; 16];
            self.rng.get_mut().fill_bytes(&mut tgtgt);
            self.keys.key_tgtgt = tgtgt;
        }
        if let Some(password) = &self.password {
            self.keys.password_md5.zeroize();
            self.keys.password_md5 = md5::compute(password.as_bytes()).0.to_vec();
        }
    }

    /// Next random word from the session's source.
    pub fn random_u32(&self) -> u32 {
        self.rng.borrow_mut().next_u32()
    }

    /// TEA-encrypt with fill bytes drawn from the session's source.
    pub fn encrypt(&self, plaintext: &[u8], key: &[u8; 16]) -> Vec<u8> {
        let mut rng = self.rng.borrow_mut();
        tea::encrypt_with_fill(plaintext, key, || rng.next_u32() as u8)
    }

    /// Borrow a decoded artifact required by a later step.
    pub fn require<'a>(field: &'a [u8], name: &'static str) -> Result<&'a [u8], LoginError> {
        if field.is_empty() {
            return Err(LoginError::MissingField(name));
        }
        Ok(field)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("uin", &self.uin)
            .field("variant", &self.variant)
            .field("guid", &hex::encode(self.guid))
            .field("keys", &self.keys)
            .field("seq", &self.seq)
            .field("state", &self.state)
            .field("tlv", &self.tlv)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_defaults() {
        let phone = SessionContext::new(123456, ClientVariant::Phone);
        assert_eq!(phone.guid, DEFAULT_GUID);
        assert!(phone.keys.share_key.is_empty());
        assert_eq!(phone.keys.key_rand.len(), 16);

        let legacy = SessionContext::new(123456, ClientVariant::Legacy);
        assert_eq!(legacy.guid, LEGACY_GUID);
        assert_eq!(legacy.keys.share_key, LEGACY_SHARE_KEY.to_vec());
        assert_eq!(legacy.keys.key_tg, LEGACY_KEY_TG.to_vec());

        let watch = SessionContext::new(0, ClientVariant::Watch);
        assert_eq!(watch.guid, DEFAULT_GUID);
        assert_eq!(watch.keys.public_key.len(), 49);
    }

    #[test]
    fn test_derive_secondary_keys_once() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone).with_password("hunter2");
        ctx.derive_secondary_keys();
        let tgtgt = ctx.keys.key_tgtgt.clone();
        assert_eq!(tgtgt.len(), 16);
        assert_eq!(hex::encode(&ctx.keys.password_md5), "2ab96390c7dbe3439de74d0c9b0b1767");

        ctx.derive_secondary_keys();
        assert_eq!(ctx.keys.key_tgtgt, tgtgt);
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let a = SessionContext::new(1, ClientVariant::Phone).with_rng(StdRng::seed_from_u64(7));
        let b = SessionContext::new(1, ClientVariant::Phone).with_rng(StdRng::seed_from_u64(7));
        assert_eq!(a.random_u32(), b.random_u32());
        assert_eq!(a.encrypt(b"payload", &[1; 16]), b.encrypt(b"payload", &[1; 16]));
    }

    #[test]
    fn test_apply_ecdh_replaces_keys() {
        let mut keys = KeyMaterial::for_variant(ClientVariant::Legacy);
        keys.apply_ecdh(EcdhKeys {
            public_key: vec![0x04; 65],
            share_key: [0x5A; 16],
        });
        assert_eq!(keys.public_key, vec![0x04; 65]);
        assert_eq!(keys.share_key, vec![0x5A; 16]);

        keys.restore_pinned(&KeyMaterial::for_variant(ClientVariant::Legacy));
        assert_eq!(keys.share_key, LEGACY_SHARE_KEY.to_vec());
        assert_eq!(keys.public_key, LEGACY_PUBLIC_KEY.to_vec());
    }

    #[test]
    fn test_transitions_tolerate_anomalies() {
        let mut ctx = SessionContext::new(1, ClientVariant::Phone);
        assert_eq!(ctx.state(), HandshakeState::Idle);
        ctx.transition(HandshakeState::BuildingRequest);
        ctx.transition(HandshakeState::AwaitingResponse);
        ctx.transition(HandshakeState::Decoding);
        ctx.transition(HandshakeState::NeedCaptcha);
        assert!(ctx.state().is_terminal());
        // skipping straight to Decoding is logged but recorded
        ctx.transition(HandshakeState::Decoding);
        assert_eq!(ctx.state(), HandshakeState::Decoding);
    }

    #[test]
    fn test_require_reports_name() {
        assert!(matches!(
            SessionContext::require(&[], "TGT_T10A"),
            Err(LoginError::MissingField("TGT_T10A"))
        ));
        assert_eq!(SessionContext::require(&[1, 2], "D2_T143").unwrap(), &[1, 2]);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let ctx = SessionContext::new(1, ClientVariant::Legacy);
        let dump = format!("{:?}", ctx);
        assert!(!dump.contains(&hex::encode(LEGACY_SHARE_KEY)));
        assert!(dump.contains("<16 bytes>"));
    }
}
