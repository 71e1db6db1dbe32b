//! Token snapshots restore everything the follow-up flows need

mod common;

use common::*;
use wtlogin_lib::sso::SsoCodec;
use wtlogin_lib::token::{TokenSnapshot, export, import};
use wtlogin_lib::{exchange_emp, trans_emp_auth};

#[test]
fn test_export_import_is_lossless() {
    let mut source = logged_in_session();
    source.cookies.skey = "@skey".to_string();
    source.cookies.p_skey.insert("qzone.qq.com".to_string(), "pskey".to_string());
    let json = export(&source).unwrap();

    let mut restored = SessionContext::new(1, ClientVariant::Phone);
    import(&mut restored, &json).unwrap();

    assert_eq!(TokenSnapshot::from_session(&restored), TokenSnapshot::from_session(&source));
    assert_eq!(restored.uin, TEST_UIN);
    assert_eq!(restored.cookies.p_skey["qzone.qq.com"], "pskey");
}

#[test]
fn test_restored_session_drives_follow_up_flows() {
    let json = export(&logged_in_session()).unwrap();
    let mut ctx = SessionContext::new(1, ClientVariant::Phone);
    import(&mut ctx, &json).unwrap();

    exchange_emp(&mut ctx, &SsoCodec).unwrap();
    trans_emp_auth(&mut ctx, &SsoCodec, "AAAA", false).unwrap();
}

#[test]
fn test_snapshot_without_tgt_cannot_refresh() {
    let mut source = logged_in_session();
    source.tlv.tgt.clear();
    let json = export(&source).unwrap();
    let mut ctx = SessionContext::new(1, ClientVariant::Phone);
    import(&mut ctx, &json).unwrap();
    assert!(matches!(
        exchange_emp(&mut ctx, &SsoCodec),
        Err(LoginError::MissingField("tgt"))
    ));
}
