// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! 7-bit wire encoding
//!
//! Firmata data bytes carry 7 bits each; wider values are split LSB first
//! across consecutive data bytes.

use crate::constants::DATA_MASK;

/// Join two 7-bit data bytes into one byte
///
/// Bits above the eighth are dropped, so a pair whose high byte is larger
/// than 1 wraps. Use [`decode_14bit`] when the full range is needed.
#[inline]
pub fn decode_7bit_pair(low: u8, high: u8) -> u8 {
    decode_14bit(low, high) as u8
}

/// Join two 7-bit data bytes into a value of up to 14 bits
#[inline]
pub fn decode_14bit(low: u8, high: u8) -> u16 {
    u16::from(low & DATA_MASK) | (u16::from(high & DATA_MASK) << 7)
}

/// Split one byte into a `[low, high]` pair. `high` is 0 for values <= 127.
#[inline]
pub fn encode_7bit(value: u8) -> [u8; 2] {
    [value & DATA_MASK, (value >> 7) & DATA_MASK]
}

/// Split a value of up to 14 bits into a `[low, high]` pair
#[inline]
pub fn encode_14bit(value: u16) -> [u8; 2] {
    [(value as u8) & DATA_MASK, ((value >> 7) as u8) & DATA_MASK]
}

/// Split a value of up to 21 bits into `[low, mid, high]`
#[inline]
pub fn encode_7bit_wide(value: u32) -> [u8; 3] {
    [
        (value as u8) & DATA_MASK,
        ((value >> 7) as u8) & DATA_MASK,
        ((value >> 14) as u8) & DATA_MASK,
    ]
}

/// Decode text sent as 7-bit byte pairs, one character per pair
///
/// Odd-length input is padded with a trailing zero byte.
pub fn decode_multibyte_string(bytes: &[u8]) -> String {
    bytes
        .chunks(2)
        .map(|pair| {
            let high = pair.get(1).copied().unwrap_or(0);
            char::from(decode_7bit_pair(pair[0], high))
        })
        .collect()
}

/// Inverse of [`decode_multibyte_string`]
pub fn encode_multibyte_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        // Characters beyond Latin-1 do not fit the one-byte-per-pair format
        let byte = u8::try_from(u32::from(ch)).unwrap_or(b'?');
        out.extend_from_slice(&encode_7bit(byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pair_matches_formula() {
        for low in 0u8..128 {
            for high in 0u8..2 {
                assert_eq!(decode_7bit_pair(low, high), low | (high << 7));
            }
        }
    }

    #[test]
    fn test_encode_7bit_roundtrips_every_byte() {
        for value in 0..=u8::MAX {
            let [low, high] = encode_7bit(value);
            assert!(low < 0x80 && high < 0x80);
            assert_eq!(decode_7bit_pair(low, high), value);
        }
    }

    #[test]
    fn test_small_values_have_zero_high_byte() {
        assert_eq!(encode_7bit(0x7F), [0x7F, 0x00]);
        assert_eq!(encode_7bit(0x80), [0x00, 0x01]);
    }

    #[test]
    fn test_14bit_range() {
        assert_eq!(encode_14bit(1023), [0x7F, 0x07]);
        assert_eq!(decode_14bit(0x7F, 0x07), 1023);
        assert_eq!(decode_14bit(0x7F, 0x7F), 0x3FFF);
        // High bits of the data bytes are masked off
        assert_eq!(decode_14bit(0xFF, 0x80), 0x7F);
    }

    #[test]
    fn test_wide_encoding() {
        assert_eq!(encode_7bit_wide(0), [0, 0, 0]);
        assert_eq!(encode_7bit_wide(0x1F_FFFF), [0x7F, 0x7F, 0x7F]);
        assert_eq!(encode_7bit_wide(16384), [0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_multibyte_string() {
        let bytes = [b'U', 0, b'n', 0, b'o', 0];
        assert_eq!(decode_multibyte_string(&bytes), "Uno");
        assert_eq!(encode_multibyte_string("Uno"), bytes);
    }

    #[test]
    fn test_multibyte_string_reencodes_even_input() {
        let bytes = [0x46, 0x00, 0x69, 0x00, 0x00, 0x01, 0x7F, 0x01];
        let text = decode_multibyte_string(&bytes);
        let reencoded: Vec<u8> = text
            .chars()
            .flat_map(|c| encode_7bit(c as u8))
            .collect();
        assert_eq!(reencoded, bytes);
    }

    #[test]
    fn test_multibyte_string_odd_length_is_padded() {
        assert_eq!(decode_multibyte_string(&[b'A', 0, b'B']), "AB");
        assert_eq!(decode_multibyte_string(&[]), "");
    }
}
