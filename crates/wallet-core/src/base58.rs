//! Base58 and Base58Check.
//!
//! The payload is read as one big-endian integer; every leading zero byte maps
//! to a leading `'1'`.

use crate::error::{Error, Result};
use crate::hash::double_sha256;

const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

pub fn encode(data: &[u8]) -> String {
    let leading_zeros = data.iter().take_while(|&&b| b == 0).count();

    // Base-58 digits, least significant first
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 138 / 100 + 1);
    for &byte in &data[leading_zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let temp = (*digit as u32) * 256 + carry;
            *digit = (temp % 58) as u8;
            carry = temp / 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut out = String::with_capacity(leading_zeros + digits.len());
    out.extend(std::iter::repeat('1').take(leading_zeros));
    out.extend(digits.iter().rev().map(|&d| BASE58_ALPHABET[d as usize] as char));
    out
}

pub fn decode(input: &str) -> Result<Vec<u8>> {
    // Count leading '1's (they become leading zeros)
    let leading_zeros = input.chars().take_while(|&c| c == '1').count();

    let mut result: Vec<u8> = Vec::with_capacity(input.len());
    for c in input.chars().skip(leading_zeros) {
        let value = BASE58_ALPHABET
            .iter()
            .position(|&x| x as char == c)
            .ok_or_else(|| Error::malformed(format!("invalid Base58 character {c:?}")))?
            as u32;

        // Multiply result by 58 and add value
        let mut carry = value;
        for byte in result.iter_mut().rev() {
            let temp = (*byte as u32) * 58 + carry;
            *byte = (temp & 0xFF) as u8;
            carry = temp >> 8;
        }

        while carry > 0 {
            result.insert(0, (carry & 0xFF) as u8);
            carry >>= 8;
        }
    }

    let mut decoded = vec![0u8; leading_zeros];
    decoded.extend(result);
    Ok(decoded)
}

/// `encode(payload || double_sha256(payload)[..4])`.
pub fn encode_check(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.extend_from_slice(payload);
    data.extend_from_slice(&double_sha256(payload)[..4]);
    encode(&data)
}

/// Decode and verify the 4-byte checksum, returning the payload.
pub fn decode_check(input: &str) -> Result<Vec<u8>> {
    let mut decoded = decode(input)?;
    if decoded.len() < 4 {
        return Err(Error::malformed("Base58Check string too short for a checksum"));
    }
    let split = decoded.len() - 4;
    if decoded[split..] != double_sha256(&decoded[..split])[..4] {
        return Err(Error::malformed("invalid Base58Check checksum"));
    }
    decoded.truncate(split);
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_decode_vectors() {
        let cases = [
            ("", ""),
            ("0000030405", "1121kY"),
            ("68656c6c6f20776f726c64", "StV1DL6CwTryKyV"),
            ("009C13ABEAA29473787191861F62952F651CE6EDAC3D6CC5B3", "1FEFyjGTFbc128EXz298mRd2PsPGhobkWe"),
        ];
        for (data, text) in cases {
            let bytes = hex::decode(data).unwrap();
            assert_eq!(encode(&bytes), text);
            assert_eq!(decode(text).unwrap(), bytes);
        }
    }

    #[test]
    fn test_check_address() {
        let payload = hex::decode("00f54a5851e9372b87810a8e60cdd2e7cfd80b6e31").unwrap();
        let address = encode_check(&payload);
        assert_eq!(address, "1PMycacnJaSqwwJqjawXBErnLsZ7RkXUAs");
        assert_eq!(decode_check(&address).unwrap(), payload);
    }

    #[test]
    fn test_decode_rejects() {
        // '0', 'O', 'I' and 'l' are not in the alphabet
        for bad in ["0", "O", "I", "l", "abc!"] {
            assert!(matches!(decode(bad), Err(Error::MalformedInput(_))), "{bad}");
        }
        assert!(matches!(decode_check("1PMycacnJaSqwwJqjawXBErnLsZ7RkXUAt"), Err(Error::MalformedInput(_))));
        assert!(matches!(decode_check("1"), Err(Error::MalformedInput(_))));
    }

    proptest! {
        #[test]
        fn prop_check_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..40)) {
            let encoded = encode_check(&payload);
            prop_assert_eq!(decode_check(&encoded).unwrap(), payload);
        }

        #[test]
        fn prop_checksum_bit_flip_rejected(
            payload in proptest::collection::vec(any::<u8>(), 1..40),
            bit in 0usize..32,
        ) {
            let mut data = payload.clone();
            data.extend_from_slice(&double_sha256(&payload)[..4]);
            let at = data.len() - 4 + bit / 8;
            data[at] ^= 1 << (bit % 8);
            prop_assert!(decode_check(&encode(&data)).is_err());
        }
    }
}
