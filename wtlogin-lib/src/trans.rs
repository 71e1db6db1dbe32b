//! The K-value transform applied to QR authorisation tokens.
//!
//! This is a Base64-style decoder over a private alphabet: `A-Z` map to
//! 0..=25, `a-z` to 26..=51, `0-9` to 52..=61, `*` to 62 and `-` to 63.
//! A space is read as `*`. Six bits are consumed per character, and at most
//! 32 characters fill a fixed 24-byte output.

use crate::error::LoginError;

/// Characters consumed from the K value.
pub const K_VALUE_CHARS: usize = 32;

/// Size of the transformed token.
pub const K_VALUE_BYTES: usize = 24;

const INVALID: u8 = 0xFF;
const TERMINATOR: u8 = 0x5F;

/// 256-entry lookup table; [`INVALID`] marks bytes outside the alphabet.
static DECODE_TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < 26 {
        table[b'A' as usize + i] = i as u8;
        table[b'a' as usize + i] = 26 + i as u8;
        i += 1;
    }
    let mut d = 0;
    while d < 10 {
        table[b'0' as usize + d] = 52 + d as u8;
        d += 1;
    }
    table[b'*' as usize] = 62;
    table[b'-' as usize] = 63;
    table
}

/// Transform a K value into the 24-byte token embedded in `trans_emp_auth`.
///
/// Decoding stops at the 32nd character, at the end of the input, at a NUL
/// byte, or at `_` (0x5F). Unused output bytes stay zero. A byte outside the
/// alphabet aborts with [`LoginError::InvalidCharacter`] instead of emitting
/// bits.
pub fn wtlogin_trans(k_value: &[u8]) -> Result<[u8; K_VALUE_BYTES], LoginError> {
    let mut out = [0u8; K_VALUE_BYTES];
    let mut out_pos = 0usize;

    for (position, &raw) in k_value.iter().take(K_VALUE_CHARS).enumerate() {
        if raw == 0 || raw == TERMINATOR {
            break;
        }
        let ch = if raw == b' ' { b'*' } else { raw };
        let sextet = DECODE_TABLE[ch as usize];
        if sextet == INVALID {
            return Err(LoginError::InvalidCharacter { position, byte: raw });
        }

        match position % 4 {
            0 => out[out_pos] = sextet << 2,
            1 => {
                out[out_pos] |= sextet >> 4;
                out_pos += 1;
                out[out_pos] = (sextet & 0x0F) << 4;
            }
            2 => {
                out[out_pos] |= sextet >> 2;
                out_pos += 1;
                out[out_pos] = (sextet & 0x03) << 6;
            }
            _ => {
                out[out_pos] |= sextet;
                out_pos += 1;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_outputs() {
        let cases = [
            (
                "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdef",
                "00108310518720928b30d38f41149351559761969b71d79f",
            ),
            (
                "0123456789*-abcdefghijklmnopqrst",
                "d35db7e39ebbf3dfbf69b71d79f8218a39259a7a29aabb2d",
            ),
            (
                "k1 Zx-9*qQ0mNbVcXz8aSdFgHjKlPoIu",
                "935f99c7ff7ea90d2635b55c5f3f1a49d1601e32a53e822e",
            ),
        ];
        for (input, expected) in cases {
            let out = wtlogin_trans(input.as_bytes()).unwrap();
            assert_eq!(hex::encode(out), expected, "input {input}");
        }
    }

    #[test]
    fn test_space_reads_as_star() {
        let with_space = wtlogin_trans(b"AB CDEFGHIJKLMNOPQRSTUVWXYZabcdef").unwrap();
        let with_star = wtlogin_trans(b"AB*CDEFGHIJKLMNOPQRSTUVWXYZabcdef").unwrap();
        assert_eq!(with_space, with_star);
    }

    #[test]
    fn test_invalid_character_stops() {
        match wtlogin_trans(b"ABCD!EFG") {
            Err(LoginError::InvalidCharacter { position, byte }) => {
                assert_eq!(position, 4);
                assert_eq!(byte, b'!');
            }
            other => panic!("expected InvalidCharacter, got {:?}", other),
        }
    }

    #[test]
    fn test_terminator_and_short_input() {
        let terminated = wtlogin_trans(b"ABCD_EFGH").unwrap();
        let short = wtlogin_trans(b"ABCD").unwrap();
        assert_eq!(terminated, short);
        assert_eq!(&short[..3], &[0x00, 0x10, 0x83]);
        assert!(short[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_only_first_32_characters_used() {
        let base = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdef";
        let longer = format!("{base}!!!!");
        assert_eq!(wtlogin_trans(longer.as_bytes()).unwrap(), wtlogin_trans(base.as_bytes()).unwrap());
    }
}
