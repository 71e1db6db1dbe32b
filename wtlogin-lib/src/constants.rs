// Protocol constants for the wtlogin handshake

/// Outer OICQ header magic (`1F 41`)
pub const OICQ_MAGIC: u16 = 0x1F41;

/// OICQ command for password login, captcha and token exchange
pub const CMD_LOGIN: u16 = 0x0810;

/// OICQ command for the QR (`trans_emp`) flows
pub const CMD_TRANS_EMP: u16 = 0x0812;

/// Fixed word following the OICQ command
pub const OICQ_VERSION_WORD: u16 = 0x0001;

/// Inner sub-command of the password login body
pub const SUB_CMD_LOGIN: u16 = 0x0009;

/// Inner sub-command of the captcha submission body
pub const SUB_CMD_CAPTCHA: u16 = 0x0002;

/// Inner sub-command of the token exchange body
pub const SUB_CMD_EXCHANGE: u16 = 0x000B;

/// Client blob sent by the watch client (and by captcha, QR and exchange packets)
pub const WATCH_CLIENT_BLOB: &str = "03 07 00 00 00 00 02 00 00 00 00 00 00 00 00";

/// Client blob sent by the phone clients
pub const PHONE_CLIENT_BLOB: &str = "03 87 00 00 00 00 02 00 00 00 00 00 00 00 00";

/// Client blob of the `trans_emp_auth` envelope, ending with the ticket length (0x30)
pub const EMP_AUTH_CLIENT_BLOB: &str = "03 45 00 00 00 00 02 00 00 00 00 00 00 00 00 00 30";

/// SSO command names
pub const CMD_NAME_LOGIN: &str = "wtlogin.login";
pub const CMD_NAME_TRANS_EMP: &str = "wtlogin.trans_emp";
pub const CMD_NAME_EXCHANGE_EMP: &str = "wtlogin.exchange_emp";

/// Length of the response header stripped before the status byte (login, exchange)
pub const LOGIN_RESPONSE_HEADER: usize = 15;

/// Length of the response header of QR and `trans_emp_auth` responses
pub const EMP_RESPONSE_HEADER: usize = 16;

/// Plaintext bytes preceding the first TLV of a successful login response (`00 09 00 00 02`)
pub const LOGIN_SUCCESS_PREAMBLE: usize = 5;

/// Plaintext bytes preceding the TLVs of a failed login response
pub const LOGIN_FAILURE_PREAMBLE: usize = 3;

/// Marker of a TLV whose payload is a nested encrypted TLV stream
pub const NESTED_TLV_MARKER: u16 = 0x0119;

/// Bytes skipped inside a decrypted `trans_emp` response before its fields
pub const TRANS_EMP_SKIP: usize = 53;

/// Bytes skipped inside a confirmed `trans_emp` poll response before its TLVs
pub const TRANS_EMP_CONFIRMED_SKIP: usize = 72;

/// Bytes skipped inside a decrypted `trans_emp_auth` response before the status
pub const EMP_AUTH_SKIP: usize = 53;

/// Bytes between the outer and inner `trans_emp_auth` response layers
pub const EMP_AUTH_INNER_SKIP: usize = 5;

/// Preamble of the QR code fetch body, followed by six TLVs and `03`
pub const QR_FETCH_PREAMBLE: &str = "00 01 0D 00 00 00 10 00 00 00 72 00 00 00 64 C9 FA 20 02 01 09 00 31 00 00 00 00 00 00 00 00 00 00 00 00 00 \
     00 00 00 00 00 00 00 00 03 00 00 00 32 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 10 00 00 00 00 00 \
     00 00 00 08 00 00 00 06";

/// Poll body: head before the timestamp
pub const QR_POLL_HEAD: &str = "00 00 62 00 00 00 10 00 00 00 72 00 00 00";

/// Poll body: fixed block after the timestamp
pub const QR_POLL_BODY: &str = "02 00 5E 00 12 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 03 00 00 00 32 00 \
     00 00 01 00 00 00 00 00 00 00 00 00 05 01 00 00 00 73 00 00 00 10";

/// Poll body: trailer after the echoed QR mark
pub const QR_POLL_TAIL: &str = "00 00 00 00 00 00 00 00 08 00 00 00 00 03";

/// `trans_emp_auth` inner block, authorisation request
pub const EMP_AUTH_REQUEST_BLOCK: &str = "02 00 DE 00 13 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 03 00 00 00 32 00 00 00 00 00 00 00 00";

/// `trans_emp_auth` inner block, authorisation confirmation
pub const EMP_AUTH_VERIFY_BLOCK: &str = "02 00 C9 00 14 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 03 00 00 00 32 00 00 00 02 00 00 00 00";

/// Fixed bytes between the two uin fields of the `trans_emp_auth` body
pub const EMP_AUTH_UIN_GAP: &str = "00 00 00 00 00 10 00 00 00 00";

/// Trailer of the confirmation body, before the length-prefixed GUID
pub const EMP_AUTH_VERIFY_TRAILER: &str = "08 00 03 00 02 00 08 00 00 00 00 00 00 00 0B 00 15 00 04 00 00 00 00 00 68";

/// Trailer of the request body, after the raw GUID
pub const EMP_AUTH_REQUEST_TRAILER: &str = "01 00 01 08 00 04 00 03 00 05 00 20 00 36 00 01 00 09";

/// Trailer of the request body, after the package name
pub const EMP_AUTH_REQUEST_TAIL: &str = "00 39 00 04 00 00 00 01";

/// Middle layer header of `trans_emp_auth`, request and confirmation
pub const EMP_AUTH_REQUEST_LAYER: &str = "01 00 F0 00 00 00 10 00 00 00 72 00 60";
pub const EMP_AUTH_VERIFY_LAYER: &str = "01 00 D8 00 00 00 10 00 00 00 72 00 60";

/// Pre-built SSO head of `trans_emp_auth` (command, message cookie, trailer)
pub const EMP_AUTH_SSO_HEAD: &str = "00 00 00 27 00 00 00 15 77 74 6C 6F 67 69 6E 2E 74 72 61 6E 73 5F 65 6D 70 00 00 00 08 F7 C0 A1 E8 00 00 00 06 70 00";

/// Package name announced by the authorisation request
pub const EMP_AUTH_PACKAGE: &str = "com.tencent.mobileqq";

/// SSO message cookie
pub const MSG_COOKIE: [u8; 4] = [0xF7, 0xC0, 0xA1, 0xE8];

/// Fixed 12 bytes of the SSO login head
pub const SSO_HEAD_FIXED: &str = "01 00 00 00 00 00 00 00 00 00 01 00";

/// Interval during which a successful token exchange is considered fresh
pub const EMP_REFRESH_INTERVAL_HOURS: i64 = 12;

/// Marker written into exported token snapshots
pub const TOKEN_SNAPSHOT_MARK: u32 = 1012;

/// Default device GUID when none is supplied
pub const DEFAULT_GUID: [u8; 16] = [
    0x69, 0x4C, 0x16, 0x6C, 0xBA, 0x92, 0x7C, 0xCD, 0xC5, 0x32, 0x73, 0x13, 0x79, 0xFF, 0x74, 0xDA,
];

/// GUID pinned by the legacy phone client
pub const LEGACY_GUID: [u8; 16] = [
    0x9B, 0x6B, 0xE0, 0x65, 0x3A, 0x35, 0x6F, 0x4F, 0xAC, 0x89, 0x92, 0x6F, 0x3F, 0x1C, 0xEB, 0x7E,
];

/// Legacy phone: fixed ECDH public key
pub const LEGACY_PUBLIC_KEY: [u8; 65] = [
    0x04, 0x6F, 0x9E, 0xD9, 0x8C, 0xFB, 0x8B, 0x92, 0x73, 0x73, 0x69, 0x6E, 0xB7, 0xCA, 0x40, 0xA5,
    0xBE, 0x28, 0x84, 0xD0, 0xEF, 0xEC, 0xD5, 0x96, 0x84, 0xC2, 0xE9, 0x14, 0x50, 0x8F, 0xA9, 0x7B,
    0x20, 0x9F, 0xF2, 0x4E, 0x35, 0x5E, 0xD3, 0x92, 0x21, 0x53, 0xED, 0x9A, 0xF1, 0x8F, 0x14, 0xD0,
    0x02, 0x73, 0xE0, 0x62, 0xAD, 0xC3, 0xA3, 0x79, 0x21, 0xA2, 0x6A, 0x66, 0x19, 0xD2, 0xA5, 0xC7,
    0xE3,
];

/// Legacy phone: share key matching [`LEGACY_PUBLIC_KEY`]
pub const LEGACY_SHARE_KEY: [u8; 16] = [
    0x0E, 0x6F, 0x09, 0x41, 0x5F, 0xC0, 0xA5, 0xCC, 0xD0, 0x40, 0xAF, 0xA9, 0x2E, 0xBE, 0x3E, 0xB0,
];

pub const LEGACY_KEY_RAND: [u8; 16] = [
    0x94, 0x4C, 0x10, 0xA6, 0x9E, 0x2A, 0x5E, 0x4C, 0xEE, 0xF0, 0x85, 0x12, 0xBA, 0x3B, 0x39, 0xFE,
];

pub const LEGACY_KEY_TG: [u8; 16] = [
    0xAD, 0x07, 0xED, 0x80, 0x67, 0x75, 0xBB, 0xF7, 0xFD, 0xC4, 0xA8, 0xD5, 0x41, 0x5E, 0x73, 0xEA,
];

/// Watch: fixed public key (49 bytes) used by the QR flows
pub const WATCH_PUBLIC_KEY: [u8; 49] = [
    0x04, 0x04, 0x6E, 0x31, 0xF8, 0x59, 0x79, 0xDF, 0x7F, 0x3D, 0xF0, 0x31, 0xCD, 0xC6, 0xEB, 0xD9,
    0xB9, 0x8E, 0xE2, 0xE2, 0xF6, 0x3E, 0xFB, 0x6E, 0x79, 0xBC, 0x54, 0xBF, 0xEE, 0xFB, 0x0F, 0x60,
    0x24, 0x07, 0xDA, 0x8C, 0x41, 0x4A, 0x34, 0xEF, 0x46, 0x10, 0xA7, 0x95, 0x48, 0x0E, 0xF8, 0x3F,
    0x0E,
];

pub const WATCH_SHARE_KEY: [u8; 16] = [
    0x54, 0x9F, 0x5C, 0x3A, 0xB4, 0x8D, 0xB9, 0x16, 0xDA, 0x96, 0x5F, 0x3B, 0x1B, 0xC1, 0x03, 0x4B,
];

pub const WATCH_KEY_RAND: [u8; 16] = [
    0x70, 0x3F, 0x79, 0x79, 0x55, 0x78, 0x2E, 0x55, 0x63, 0x64, 0x3A, 0x44, 0x38, 0x49, 0x7A, 0x53,
];

/// Public key announced by `exchange_emp`
pub const EXCHANGE_PUBLIC_KEY: [u8; 65] = [
    0x04, 0x70, 0x83, 0xE0, 0x93, 0x38, 0xB0, 0x49, 0x98, 0x89, 0x88, 0xB7, 0x8B, 0x87, 0xD8, 0xB0,
    0x03, 0xCE, 0x45, 0xB2, 0x6D, 0xA6, 0x92, 0x21, 0x84, 0x67, 0xA0, 0x63, 0x49, 0x6F, 0x78, 0xB3,
    0x36, 0x06, 0x36, 0xE2, 0x19, 0x8D, 0x18, 0x85, 0x57, 0xDA, 0x0D, 0x30, 0x2D, 0x2E, 0x53, 0x1E,
    0x2C, 0xC2, 0x2C, 0x21, 0x4B, 0x92, 0x7F, 0x8A, 0x5B, 0xBC, 0xCC, 0xAD, 0x33, 0x19, 0xAF, 0xF3,
    0x1A,
];

/// Fixed TEA key of the `exchange_emp` request and response bodies
pub const EXCHANGE_KEY: [u8; 16] = [
    0x48, 0x23, 0x99, 0x47, 0xA6, 0xE9, 0x76, 0xDF, 0xA5, 0x43, 0x26, 0xF1, 0xFB, 0xDE, 0x51, 0x18,
];

/// Server P-256 public key for the login key agreement
pub const SERVER_PUBLIC_KEY: [u8; 65] = [
    0x04, 0xEB, 0xCA, 0x94, 0xD7, 0x33, 0xE3, 0x99, 0xB2, 0xDB, 0x96, 0xEA, 0xCD, 0xD3, 0xF6, 0x9A,
    0x8B, 0xB0, 0xF7, 0x42, 0x24, 0xE2, 0xB4, 0x4E, 0x33, 0x57, 0x81, 0x22, 0x11, 0xD2, 0xE6, 0x2E,
    0xFB, 0xC9, 0x1B, 0xB5, 0x53, 0x09, 0x8E, 0x25, 0xE3, 0x3A, 0x79, 0x9A, 0xDC, 0x7F, 0x76, 0xFE,
    0xB2, 0x08, 0xDA, 0x7C, 0x65, 0x22, 0xCD, 0xB0, 0x71, 0x9A, 0x30, 0x51, 0x80, 0xCC, 0x54, 0xA8,
    0x2E,
];

/// Substituted when an imported snapshot carries no session ticket
pub const FALLBACK_WT_SESSION_TICKET: [u8; 48] = [
    0x8E, 0xED, 0x6A, 0x07, 0x46, 0xFD, 0x90, 0x6D, 0x06, 0x51, 0x2F, 0x5F, 0x07, 0x4B, 0xAD, 0x0F,
    0x2D, 0x17, 0x29, 0xFA, 0x10, 0x6E, 0xE9, 0x8D, 0x40, 0xC9, 0xA5, 0x22, 0x1F, 0x36, 0x75, 0x79,
    0x70, 0x33, 0x60, 0xE2, 0x9F, 0x4B, 0x7D, 0x4A, 0xE7, 0xFC, 0x25, 0xAE, 0x2D, 0x8D, 0xF2, 0x41,
];

pub const FALLBACK_WT_SESSION_TICKET_KEY: [u8; 16] = [
    0x04, 0xBE, 0xBF, 0x01, 0x16, 0x41, 0x3C, 0xF5, 0x4C, 0x3D, 0x21, 0x91, 0x9F, 0x01, 0x64, 0xD8,
];

/// MD5 of the APK signing certificate
pub const APK_SIGN: [u8; 16] = [
    0xA6, 0xB7, 0x45, 0xBF, 0x24, 0xA2, 0xC2, 0x77, 0x52, 0x77, 0x16, 0xF6, 0xF3, 0x6E, 0xB6, 0x8D,
];

/// Domains requested in T511
pub const T511_DOMAINS: [&str; 14] = [
    "office.qq.com",
    "qun.qq.com",
    "gamecenter.qq.com",
    "docs.qq.com",
    "mail.qq.com",
    "ti.qq.com",
    "vip.qq.com",
    "tenpay.com",
    "qqweb.qq.com",
    "qzone.qq.com",
    "mma.qq.com",
    "game.qq.com",
    "openmobile.qq.com",
    "connect.qq.com",
];
