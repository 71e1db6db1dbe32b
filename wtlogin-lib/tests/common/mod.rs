//! Common test utilities and shared imports

// Shared across test files; not every item is used by each of them
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use rand::rngs::mock::StepRng;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use wtlogin_lib::buffer::{PacketReader, PacketWriter, parse_hex};
#[allow(unused_imports)]
pub use wtlogin_lib::ecdh::FixedKeys;
#[allow(unused_imports)]
pub use wtlogin_lib::error::LoginError;
#[allow(unused_imports)]
pub use wtlogin_lib::tlv::{TlvSet, record, split_records};
#[allow(unused_imports)]
pub use wtlogin_lib::{ClientVariant, HandshakeState, SessionContext, tea};

/// Route library logs to the test harness. `RUST_LOG` selects the level.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

#[allow(dead_code)]
pub const TEST_UIN: u64 = 123456;

#[allow(dead_code)]
pub const TEST_SHARE_KEY: [u8; 16] = [
    0x5A, 0x11, 0x3C, 0x90, 0x02, 0xE7, 0x41, 0x6B, 0x8D, 0x20, 0x77, 0xC4, 0x19, 0xAE, 0x55, 0x0F,
];

/// Uncompressed-point shaped test public key
#[allow(dead_code)]
pub fn test_public_key() -> Vec<u8> {
    let mut key = vec![0xAB; 65];
    key[0] = 0x04;
    key
}

/// Arithmetic sequence standing in for the session's random source
#[allow(dead_code)]
pub fn test_rng() -> StepRng {
    StepRng::new(0x1234_5678, 0x0101_0101)
}

/// Phone session with every random input pinned
#[allow(dead_code)]
pub fn pinned_phone_session() -> SessionContext {
    let mut ctx = SessionContext::new(TEST_UIN, ClientVariant::Phone)
        .with_password("hunter2")
        .with_rng(test_rng());
    ctx.keys.key_rand = vec![0x11; 16];
    ctx.keys.key_tgtgt = vec![0x22; 16];
    ctx.login_time = 1_700_000_000;
    ctx
}

/// Session holding the artifacts a successful login leaves behind
#[allow(dead_code)]
pub fn logged_in_session() -> SessionContext {
    let mut ctx = SessionContext::new(TEST_UIN, ClientVariant::Phone);
    ctx.keys.share_key = TEST_SHARE_KEY.to_vec();
    ctx.tlv.tgt = vec![0x0A; 72];
    ctx.tlv.d2 = vec![0x43; 64];
    ctx.tlv.user_st_key = vec![0x0E; 16];
    ctx.tlv.user_st_sig = vec![0x14; 40];
    ctx.tlv.wt_session_ticket = vec![0x33; 48];
    ctx.tlv.wt_session_ticket_key = vec![0x34; 16];
    ctx
}

/// Payload of an outbound SSO frame encrypted under the zero key.
#[allow(dead_code)]
pub fn open_sso_frame(frame: &[u8]) -> Vec<u8> {
    let mut r = PacketReader::new(Bytes::copy_from_slice(frame));
    let len = r.read_u32().expect("length") as usize;
    assert_eq!(len, frame.len(), "frame length counts itself");
    let packet_type = r.read_u32().expect("packet type");
    assert_eq!(r.read_u8().expect("mode"), 2);
    match packet_type {
        0x0A => {
            r.read_body(4, 4).expect("ticket slot");
        }
        0x0B => {
            r.read_u32().expect("sso seq");
        }
        other => panic!("unexpected packet type {other:#x}"),
    }
    assert_eq!(r.read_u8().expect("separator"), 0);
    r.read_body(4, 4).expect("uin");
    tea::decrypt(&r.read_remaining(), &tea::ZERO_KEY).expect("zero-key layer")
}
