use std::array::TryFromSliceError;
use thiserror::Error;

/// The primary error type for the `wtlogin-lib` library.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Missing session field: {0}")]
    MissingField(&'static str),

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Invalid hex literal: {0}")]
    InvalidHex(String),

    #[error("Value {value} does not fit in {width} bytes")]
    ValueOutOfRange { value: u64, width: usize },

    #[error("Unsupported integer width: {0}")]
    InvalidWidth(usize),

    #[error("TLV 0x{0:04X} appears more than once in one packet")]
    DuplicateTag(u16),

    #[error("Decryption failed: {0}")]
    Decrypt(String),

    #[error("Key exchange failed: {0}")]
    KeyExchange(String),

    #[error("Invalid character 0x{byte:02X} at position {position}")]
    InvalidCharacter { position: usize, byte: u8 },

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Token snapshot error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<TryFromSliceError> for LoginError {
    fn from(_: TryFromSliceError) -> Self {
        LoginError::InvalidPacket("Failed to convert slice to array".to_string())
    }
}

impl From<hex::FromHexError> for LoginError {
    fn from(err: hex::FromHexError) -> Self {
        LoginError::InvalidHex(err.to_string())
    }
}
