//! QQ-flavoured TEA: 16-round TEA over big-endian words, chained in the
//! protocol's CBC-like mode with a random fill prefix.
//!
//! Padded plaintext layout:
//!
//! ```text
//! [0xF8 | (fill_len - 2)] [fill_len random bytes] [plaintext] [7 x 0x00]
//! ```
//!
//! `fill_len` is chosen in `2..=9` so the total is a multiple of 8.

use crate::error::LoginError;

const DELTA: u32 = 0x9E37_79B9;
const ROUNDS: usize = 16;
const BLOCK: usize = 8;

pub const ZERO_KEY: [u8; 16] = [0u8; 16];

/// Encrypt `plaintext` under `key` with random fill bytes.
pub fn encrypt(plaintext: &[u8], key: &[u8; 16]) -> Vec<u8> {
    encrypt_with_fill(plaintext, key, rand::random::<u8>)
}

/// Encrypt with a caller-supplied fill source. The server ignores the fill,
/// so a constant source only matters for reproducible fixtures.
pub fn encrypt_with_fill(plaintext: &[u8], key: &[u8; 16], mut fill: impl FnMut() -> u8) -> Vec<u8> {
    let fill_len = (BLOCK - (plaintext.len() + 2) % BLOCK) % BLOCK + 2;

    let mut padded = Vec::with_capacity(1 + fill_len + plaintext.len() + 7);
    padded.push(((fill_len - 2) as u8) | 0xF8);
    padded.extend((0..fill_len).map(|_| fill()));
    padded.extend_from_slice(plaintext);
    padded.extend_from_slice(&[0u8; 7]);

    let k = key_words(key);
    let mut out = Vec::with_capacity(padded.len());
    let mut prev_cipher = [0u8; BLOCK];
    let mut prev_plain = [0u8; BLOCK];

    for chunk in padded.chunks_exact(BLOCK) {
        let mut mixed = [0u8; BLOCK];
        for i in 0..BLOCK {
            mixed[i] = chunk[i] ^ prev_cipher[i];
        }
        let enciphered = encipher(mixed, &k);
        let mut cipher = [0u8; BLOCK];
        for i in 0..BLOCK {
            cipher[i] = enciphered[i] ^ prev_plain[i];
        }
        prev_plain = mixed;
        prev_cipher = cipher;
        out.extend_from_slice(&cipher);
    }

    out
}

/// Decrypt and strip the fill prefix and zero tail.
pub fn decrypt(ciphertext: &[u8], key: &[u8; 16]) -> Result<Vec<u8>, LoginError> {
    let len = ciphertext.len();
    if len < 2 * BLOCK || len % BLOCK != 0 {
        return Err(LoginError::Decrypt(format!(
            "ciphertext length {len} is not a multiple of 8 of at least 16"
        )));
    }

    let k = key_words(key);
    let first: [u8; BLOCK] = ciphertext[..BLOCK].try_into()?;
    let mut prev_plain = decipher(first, &k);
    let mut prev_cipher = first;
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(&prev_plain);

    for chunk in ciphertext[BLOCK..].chunks_exact(BLOCK) {
        let mut mixed = [0u8; BLOCK];
        for i in 0..BLOCK {
            mixed[i] = chunk[i] ^ prev_plain[i];
        }
        let deciphered = decipher(mixed, &k);
        for i in 0..BLOCK {
            out.push(deciphered[i] ^ prev_cipher[i]);
        }
        prev_plain = deciphered;
        prev_cipher.copy_from_slice(chunk);
    }

    if out[len - 7..].iter().any(|&b| b != 0) {
        return Err(LoginError::Decrypt("padding check failed".to_string()));
    }
    let start = (out[0] & 0x07) as usize + 3;
    if start > len - 7 {
        return Err(LoginError::Decrypt("fill length exceeds block".to_string()));
    }
    Ok(out[start..len - 7].to_vec())
}

/// Borrow a 16-byte key out of session material, naming the field on failure.
pub fn key16<'a>(material: &'a [u8], field: &'static str) -> Result<&'a [u8; 16], LoginError> {
    if material.is_empty() {
        return Err(LoginError::MissingField(field));
    }
    material
        .try_into()
        .map_err(|_| LoginError::InvalidPacket(format!("{field} must be 16 bytes, got {}", material.len())))
}

fn key_words(key: &[u8; 16]) -> [u32; 4] {
    let mut words = [0u32; 4];
    for (i, word) in words.iter_mut().enumerate() {
        *word = u32::from_be_bytes([key[i * 4], key[i * 4 + 1], key[i * 4 + 2], key[i * 4 + 3]]);
    }
    words
}

fn encipher(block: [u8; BLOCK], k: &[u32; 4]) -> [u8; BLOCK] {
    let mut v0 = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
    let mut v1 = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
    let mut sum = 0u32;
    for _ in 0..ROUNDS {
        sum = sum.wrapping_add(DELTA);
        v0 = v0.wrapping_add(
            (v1 << 4).wrapping_add(k[0]) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(k[1]),
        );
        v1 = v1.wrapping_add(
            (v0 << 4).wrapping_add(k[2]) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(k[3]),
        );
    }
    let mut out = [0u8; BLOCK];
    out[..4].copy_from_slice(&v0.to_be_bytes());
    out[4..].copy_from_slice(&v1.to_be_bytes());
    out
}

fn decipher(block: [u8; BLOCK], k: &[u32; 4]) -> [u8; BLOCK] {
    let mut v0 = u32::from_be_bytes([block[0], block[1], block[2], block[3]]);
    let mut v1 = u32::from_be_bytes([block[4], block[5], block[6], block[7]]);
    let mut sum = DELTA.wrapping_mul(ROUNDS as u32);
    for _ in 0..ROUNDS {
        v1 = v1.wrapping_sub(
            (v0 << 4).wrapping_add(k[2]) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(k[3]),
        );
        v0 = v0.wrapping_sub(
            (v1 << 4).wrapping_add(k[0]) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(k[1]),
        );
        sum = sum.wrapping_sub(DELTA);
    }
    let mut out = [0u8; BLOCK];
    out[..4].copy_from_slice(&v0.to_be_bytes());
    out[4..].copy_from_slice(&v1.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_key() -> [u8; 16] {
        let mut key = [0u8; 16];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        key
    }

    #[test]
    fn test_golden_vectors_with_zero_fill() {
        let key = counting_key();
        let cases: [(&[u8], &str); 3] = [
            (b"", "1ac2675390c203563a96b3c769074bb5"),
            (b"hello", "2fc29f20eda6c2e3d0a0fad61543c80b"),
            (
                b"0123456789abcdef",
                "1ac2675390c20356661a7ae85a0e0a1c158ac0438ced401f702b618868105839",
            ),
        ];
        for (plain, expected) in cases {
            let cipher = encrypt_with_fill(plain, &key, || 0);
            assert_eq!(hex::encode(&cipher), expected, "plaintext {:?}", plain);
        }

        let cipher = encrypt_with_fill(b"wtlogin", &ZERO_KEY, || 0);
        assert_eq!(hex::encode(cipher), "7901fcd147d4b7da30b87fde166e955906621492c3867d5f");
    }

    #[test]
    fn test_round_trip_random_fill() {
        let key = counting_key();
        for len in 0..40 {
            let plain: Vec<u8> = (0..len as u8).collect();
            let cipher = encrypt(&plain, &key);
            assert_eq!(cipher.len() % 8, 0);
            assert!(cipher.len() >= plain.len() + 10);
            assert_eq!(decrypt(&cipher, &key).unwrap(), plain);
        }
    }

    #[test]
    fn test_wrong_key_fails_padding() {
        let cipher = encrypt_with_fill(b"session payload", &counting_key(), || 0x5A);
        assert!(matches!(decrypt(&cipher, &ZERO_KEY), Err(LoginError::Decrypt(_))));
    }

    #[test]
    fn test_bad_length_rejected() {
        assert!(decrypt(&[0u8; 8], &ZERO_KEY).is_err());
        assert!(decrypt(&[0u8; 17], &ZERO_KEY).is_err());
    }

    #[test]
    fn test_key16_reports_field() {
        assert!(matches!(key16(&[], "userSt_Key"), Err(LoginError::MissingField("userSt_Key"))));
        assert!(key16(&[1u8; 15], "userSt_Key").is_err());
        assert_eq!(key16(&[7u8; 16], "userSt_Key").unwrap(), &[7u8; 16]);
    }
}
