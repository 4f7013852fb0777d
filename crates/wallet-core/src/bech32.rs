//! Bech32 (BIP-173) and Bech32m (BIP-350) encoding and segwit addresses.

use crate::error::{Error, Result};

const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BECH32M_CONST: u32 = 0x2bc830a3;
const MAX_LENGTH: usize = 90;
const CHECKSUM_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Bech32,
    Bech32m,
}

impl Variant {
    fn constant(self) -> u32 {
        match self {
            Variant::Bech32 => 1,
            Variant::Bech32m => BECH32M_CONST,
        }
    }

    /// Checksum variant required for a witness version.
    pub fn for_witness_version(version: u8) -> Self {
        if version == 0 {
            Variant::Bech32
        } else {
            Variant::Bech32m
        }
    }
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(hrp.len() * 2 + 1);
    result.extend(hrp.bytes().map(|b| b >> 5));
    result.push(0);
    result.extend(hrp.bytes().map(|b| b & 31));
    result
}

fn polymod(values: impl IntoIterator<Item = u8>) -> u32 {
    const GEN: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];

    let mut chk: u32 = 1;
    for value in values {
        let top = chk >> 25;
        chk = ((chk & 0x1ffffff) << 5) ^ (value as u32);
        for (i, &g) in GEN.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

/// Encode 5-bit `data` under `hrp`. The HRP is lowercased.
pub fn encode(hrp: &str, data: &[u8], variant: Variant) -> Result<String> {
    let hrp = hrp.to_ascii_lowercase();
    if hrp.is_empty() || !hrp.bytes().all(|b| (33..=126).contains(&b)) {
        return Err(Error::operand("invalid Bech32 human-readable part"));
    }
    if data.iter().any(|&v| v >> 5 != 0) {
        return Err(Error::operand("Bech32 data must be 5-bit groups"));
    }
    if hrp.len() + 1 + data.len() + CHECKSUM_LENGTH > MAX_LENGTH {
        return Err(Error::operand("Bech32 string would exceed 90 characters"));
    }

    let mut values = hrp_expand(&hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LENGTH]);
    let checksum = polymod(values) ^ variant.constant();

    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LENGTH);
    out.push_str(&hrp);
    out.push('1');
    for &v in data {
        out.push(BECH32_CHARSET[v as usize] as char);
    }
    for i in 0..CHECKSUM_LENGTH {
        let v = (checksum >> (5 * (5 - i))) & 31;
        out.push(BECH32_CHARSET[v as usize] as char);
    }
    Ok(out)
}

/// Decode into `(hrp, 5-bit data without checksum, variant)`.
pub fn decode(input: &str) -> Result<(String, Vec<u8>, Variant)> {
    if input.len() > MAX_LENGTH {
        return Err(Error::malformed("Bech32 string longer than 90 characters"));
    }
    if !input.bytes().all(|b| (33..=126).contains(&b)) {
        return Err(Error::malformed("Bech32 string has characters outside US-ASCII 33..126"));
    }
    let has_lower = input.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = input.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(Error::malformed("Bech32 string mixes upper and lower case"));
    }
    let input = input.to_ascii_lowercase();

    // Find separator
    let sep_pos = input
        .rfind('1')
        .ok_or_else(|| Error::malformed("Bech32 separator not found"))?;
    if sep_pos == 0 || sep_pos + 1 + CHECKSUM_LENGTH > input.len() {
        return Err(Error::malformed("invalid Bech32 separator position"));
    }

    let hrp = &input[..sep_pos];
    let mut data = Vec::with_capacity(input.len() - sep_pos - 1);
    for c in input[sep_pos + 1..].bytes() {
        let idx = BECH32_CHARSET
            .iter()
            .position(|&x| x == c)
            .ok_or_else(|| Error::malformed(format!("invalid Bech32 character {:?}", c as char)))?;
        data.push(idx as u8);
    }

    // Verify checksum and determine variant
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(&data);
    let variant = match polymod(values) {
        1 => Variant::Bech32,
        BECH32M_CONST => Variant::Bech32m,
        _ => return Err(Error::malformed("invalid Bech32 checksum")),
    };

    data.truncate(data.len() - CHECKSUM_LENGTH);
    Ok((hrp.to_string(), data, variant))
}

/// Regroup bits, e.g. 8-bit bytes into 5-bit groups.
///
/// Without `pad`, leftover bits must be fewer than `from_bits` and all zero.
pub(crate) fn convert_bits(data: &[u8], from_bits: u8, to_bits: u8, pad: bool) -> Result<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u8 = 0;
    let mut result = Vec::with_capacity(data.len() * from_bits as usize / to_bits as usize + 1);
    let max_value = (1u32 << to_bits) - 1;

    for &value in data {
        if (value as u32) >> from_bits != 0 {
            return Err(Error::malformed("value out of range for bit conversion"));
        }
        acc = (acc << from_bits) | (value as u32);
        bits += from_bits;

        while bits >= to_bits {
            bits -= to_bits;
            result.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            result.push(((acc << (to_bits - bits)) & max_value) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & max_value) != 0 {
        return Err(Error::malformed("invalid padding in bit conversion"));
    }

    Ok(result)
}

fn check_witness_program(version: u8, program: &[u8]) -> std::result::Result<(), String> {
    if version > 16 {
        return Err(format!("invalid witness version {version}"));
    }
    if !(2..=40).contains(&program.len()) {
        return Err(format!("invalid witness program length {}", program.len()));
    }
    match (version, program.len()) {
        (0, 20 | 32) | (1, 32) | (2.., _) => Ok(()),
        (_, len) => Err(format!("invalid program length {len} for witness version {version}")),
    }
}

/// Encode a segwit address: Bech32 for version 0, Bech32m otherwise.
pub fn encode_segwit(hrp: &str, version: u8, program: &[u8]) -> Result<String> {
    check_witness_program(version, program).map_err(Error::InvalidOperand)?;
    let mut data = Vec::with_capacity(1 + (program.len() * 8).div_ceil(5));
    data.push(version);
    data.extend(convert_bits(program, 8, 5, true)?);
    encode(hrp, &data, Variant::for_witness_version(version))
}

/// Decode a segwit address for `expected_hrp`, returning `(version, program)`.
pub fn decode_segwit(expected_hrp: &str, address: &str) -> Result<(u8, Vec<u8>)> {
    let (hrp, data, variant) = decode(address)?;
    if hrp != expected_hrp.to_ascii_lowercase() {
        return Err(Error::malformed(format!("unexpected human-readable part {hrp:?}")));
    }
    let (&version, groups) = data
        .split_first()
        .ok_or_else(|| Error::malformed("segwit address has no witness version"))?;
    let program = convert_bits(groups, 5, 8, false)?;
    check_witness_program(version, &program).map_err(Error::MalformedInput)?;
    if variant != Variant::for_witness_version(version) {
        return Err(Error::malformed(format!(
            "witness version {version} requires {:?} checksum",
            Variant::for_witness_version(version)
        )));
    }
    Ok((version, program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_segwit_vectors() {
        let cases = [
            (
                "bc1p5d7rjq7g6rdk2yhzks9smlaqtedr4dekq08ge8ztwac72sfr9rusxg3297",
                1,
                "a37c3903c8d0db6512e2b40b0dffa05e5a3ab73603ce8c9c4b7771e5412328f9",
            ),
            ("bc1qnnadqr2q2ycw5n52f4wnsxju3fry973wvewf6q", 0, "9cfad00d405130ea4e8a4d5d381a5c8a4642fa2e"),
            (
                "bc1qeklep85ntjz4605drds6aww9u0qr46qzrv5xswd35uhjuj8ahfcqgf6hak",
                0,
                "cdbf909e935c855d3e8d1b61aeb9c5e3c03ae8021b286839b1a72f2e48fdba70",
            ),
        ];
        for (address, version, program) in cases {
            let program = hex::decode(program).unwrap();
            assert_eq!(encode_segwit("bc", version, &program).unwrap(), address);
            assert_eq!(decode_segwit("bc", address).unwrap(), (version, program));
        }
    }

    #[test]
    fn test_uppercase_accepted() {
        let (version, program) =
            decode_segwit("bc", "BC1QNNADQR2Q2YCW5N52F4WNSXJU3FRY973WVEWF6Q").unwrap();
        assert_eq!(version, 0);
        assert_eq!(hex::encode(program), "9cfad00d405130ea4e8a4d5d381a5c8a4642fa2e");
    }

    #[test]
    fn test_decode_segwit_rejections() {
        let rejects = [
            // v1 program under a Bech32 checksum
            "bc1pqqqsyqcyq5rqwzqfpg9scrgwpugpzysnzs23v9ccrydpk8qarc0sagmhkq",
            // v0 program under a Bech32m checksum
            "bc1qqqqsyqcyq5rqwzqfpg9scrgwpugpzysnqslask",
            // v0 with a 16-byte program
            "bc1qqqqsyqcyq5rqwzqfpg9scrgwpuk7nx3h",
            // v1 with a 20-byte program
            "bc1pqqqsyqcyq5rqwzqfpg9scrgwpugpzysntwgkaa",
            // mixed case
            "bc1qnnadqr2q2ycw5n52f4wnsxju3fry973wvewF6q",
            // bad checksum
            "bc1qnnadqr2q2ycw5n52f4wnsxju3fry973wvewf6p",
            // wrong hrp
            "tb1pqqqsyqcyq5rqwzqfpg9scrgwpugpzysnzs23v9ccrydpk8qarc0slua5fd",
            // 'b' is not in the charset
            "bc1qnnadqr2q2ycw5n52f4wnsxju3fry973wvewfbq",
            // no separator
            "bcqnnadqr2q2ycw5n52f4wnsxju3fry973wvewf6q",
        ];
        for address in rejects {
            assert!(matches!(decode_segwit("bc", address), Err(Error::MalformedInput(_))), "{address}");
        }
        let too_long = format!("bc1{}", "q".repeat(90));
        assert!(decode(&too_long).is_err());
    }

    #[test]
    fn test_encode_segwit_validates() {
        assert!(matches!(encode_segwit("bc", 0, &[0u8; 16]), Err(Error::InvalidOperand(_))));
        assert!(matches!(encode_segwit("bc", 17, &[0u8; 32]), Err(Error::InvalidOperand(_))));
        assert!(matches!(encode_segwit("bc", 2, &[0u8; 41]), Err(Error::InvalidOperand(_))));
    }

    #[test]
    fn test_future_witness_version() {
        assert_eq!(encode_segwit("bc", 2, &[0x75, 0x1e]).unwrap(), "bc1zw50qjl4auq");
        assert_eq!(decode_segwit("bc", "bc1zw50qjl4auq").unwrap(), (2, vec![0x75, 0x1e]));
    }

    #[test]
    fn test_generic_roundtrip_detects_variant() {
        let data = [0u8, 1, 2, 3, 31];
        for variant in [Variant::Bech32, Variant::Bech32m] {
            let s = encode("test", &data, variant).unwrap();
            assert_eq!(decode(&s).unwrap(), ("test".to_string(), data.to_vec(), variant));
        }
        assert!(encode("test", &[32], Variant::Bech32).is_err());
    }

    #[test]
    fn test_convert_bits_padding() {
        assert_eq!(convert_bits(&[0xff], 8, 5, true).unwrap(), vec![31, 28]);
        assert!(convert_bits(&[31, 28], 5, 8, false).is_err());
        assert_eq!(convert_bits(&[31, 24], 5, 8, false).unwrap(), vec![0xff]);
    }

    proptest! {
        #[test]
        fn prop_segwit_roundtrip(program in proptest::collection::vec(any::<u8>(), 32..=32), v0 in any::<bool>()) {
            let (version, program) = if v0 { (0u8, program) } else { (1u8, program) };
            let address = encode_segwit("tb", version, &program).unwrap();
            prop_assert_eq!(decode_segwit("tb", &address).unwrap(), (version, program));
        }

        #[test]
        fn prop_single_char_change_rejected(program in proptest::collection::vec(any::<u8>(), 20..=20), pos in 0usize..6, delta in 1u8..32) {
            let address = encode_segwit("bc", 0, &program).unwrap();
            let mut bytes = address.into_bytes();
            let at = bytes.len() - 1 - pos;
            let idx = BECH32_CHARSET.iter().position(|&c| c == bytes[at]).unwrap();
            bytes[at] = BECH32_CHARSET[(idx + delta as usize) % 32];
            let tampered = String::from_utf8(bytes).unwrap();
            prop_assert!(decode_segwit("bc", &tampered).is_err());
        }
    }
}
