pub mod buffer;
pub mod constants;
pub mod device;
pub mod ecdh;
pub mod error;
pub mod session;
pub mod sso;
pub mod tea;
pub mod tlv;
pub mod token;
pub mod trans;
pub mod wtlogin;

// Re-export the session types and flow entry points for easy access
pub use device::{ClientProfile, ClientVariant, DeviceInfo};
pub use error::LoginError;
pub use session::{HandshakeState, SessionContext};
pub use wtlogin::exchange::{ExchangeOutcome, exchange_emp, exchange_emp_response, needs_exchange};
pub use wtlogin::login::{LoginOutcome, login, login_captcha, login_response, login_with};
pub use wtlogin::qrcode::{
    EmpAuthOutcome, QrCodeOutcome, QrStatus, qr_status_message, trans_emp, trans_emp_auth, trans_emp_auth_response,
    trans_emp_response,
};
