//! Key agreement against the server's P-256 key.
//!
//! The login body is encrypted under `share_key`, which is the MD5 of the
//! first half of the raw ECDH x-coordinate. The client announces its own
//! uncompressed public key in the OICQ header so the server can derive the
//! same secret.

use crate::constants::SERVER_PUBLIC_KEY;
use crate::error::LoginError;
use p256::ecdh::EphemeralSecret;
use p256::{EncodedPoint, PublicKey};
use rand::rngs::OsRng;

/// Output of one key agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdhKeys {
    /// Client public key as sent on the wire
    pub public_key: Vec<u8>,
    pub share_key: [u8; 16],
}

/// Source of the (public key, share key) pair used by a login attempt.
pub trait KeyExchange {
    fn generate(&self) -> Result<EcdhKeys, LoginError>;
}

/// Fresh ephemeral P-256 agreement with a server public key.
#[derive(Debug, Clone)]
pub struct P256Exchange {
    server_key: Vec<u8>,
}

impl P256Exchange {
    pub fn new(server_key: &[u8]) -> Self {
        Self {
            server_key: server_key.to_vec(),
        }
    }
}

impl Default for P256Exchange {
    fn default() -> Self {
        Self::new(&SERVER_PUBLIC_KEY)
    }
}

impl KeyExchange for P256Exchange {
    fn generate(&self) -> Result<EcdhKeys, LoginError> {
        let server = PublicKey::from_sec1_bytes(&self.server_key)
            .map_err(|e| LoginError::KeyExchange(format!("invalid server key: {e}")))?;

        let secret = EphemeralSecret::random(&mut OsRng);
        let public_key = EncodedPoint::from(secret.public_key()).as_bytes().to_vec();
        let shared = secret.diffie_hellman(&server);
        let share_key = md5::compute(&shared.raw_secret_bytes()[..16]).0;

        Ok(EcdhKeys { public_key, share_key })
    }
}

/// Pre-agreed key pair, used by clients that pin their keys and by tests.
#[derive(Debug, Clone)]
pub struct FixedKeys {
    keys: EcdhKeys,
}

impl FixedKeys {
    pub fn new(public_key: &[u8], share_key: [u8; 16]) -> Self {
        Self {
            keys: EcdhKeys {
                public_key: public_key.to_vec(),
                share_key,
            },
        }
    }
}

impl KeyExchange for FixedKeys {
    fn generate(&self) -> Result<EcdhKeys, LoginError> {
        Ok(self.keys.clone())
    }
}
