//! ASN.1 DER packing of ECDSA `(r, s)` pairs.
//!
//! Only the subset Bitcoin signatures need: a SEQUENCE of two INTEGERs with
//! short-form lengths.

use crate::error::{Error, Result};

const TAG_INTEGER: u8 = 0x02;
const TAG_SEQUENCE: u8 = 0x30;
/// Short-form lengths only; the high bit marks the long form.
const LONG_FORM: u8 = 0x80;

/// Minimal big-endian INTEGER content for an unsigned value.
///
/// Leading zeros are stripped, keeping one when the next byte has its high bit
/// set (it would otherwise read as negative). An empty or all-zero input packs to `00`.
pub fn pack_integer(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    let digits = &bytes[start..];
    match digits.first() {
        None => vec![0x00],
        Some(&first) if first & 0x80 != 0 => {
            let mut out = Vec::with_capacity(digits.len() + 1);
            out.push(0x00);
            out.extend_from_slice(digits);
            out
        }
        Some(_) => digits.to_vec(),
    }
}

/// Full `02 len content` TLV for an unsigned integer.
pub fn encode_integer(bytes: &[u8]) -> Result<Vec<u8>> {
    let content = pack_integer(bytes);
    if content.len() >= LONG_FORM as usize {
        return Err(Error::NotImplemented("DER long-form lengths"));
    }
    let mut out = Vec::with_capacity(content.len() + 2);
    out.push(TAG_INTEGER);
    out.push(content.len() as u8);
    out.extend_from_slice(&content);
    Ok(out)
}

/// `SEQUENCE { INTEGER r, INTEGER s }`.
pub fn encode_signature(r: &[u8], s: &[u8]) -> Result<Vec<u8>> {
    let r = encode_integer(r)?;
    let s = encode_integer(s)?;
    let body_len = r.len() + s.len();
    if body_len >= LONG_FORM as usize {
        return Err(Error::NotImplemented("DER long-form lengths"));
    }
    let mut out = Vec::with_capacity(body_len + 2);
    out.push(TAG_SEQUENCE);
    out.push(body_len as u8);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    Ok(out)
}

/// Read one TLV, returning `(tag, content, rest)`.
fn read_tlv(bytes: &[u8]) -> Result<(u8, &[u8], &[u8])> {
    let (&tag, rest) = bytes
        .split_first()
        .ok_or_else(|| Error::malformed("DER: empty buffer"))?;
    if tag & 0x1f == 0x1f {
        return Err(Error::NotImplemented("DER high-tag-number form"));
    }
    let (&len, rest) = rest
        .split_first()
        .ok_or_else(|| Error::malformed("DER: missing length"))?;
    if len & LONG_FORM != 0 {
        return Err(Error::NotImplemented("DER long-form lengths"));
    }
    let len = len as usize;
    if rest.len() < len {
        return Err(Error::malformed("DER: content shorter than its length"));
    }
    Ok((tag, &rest[..len], &rest[len..]))
}

/// Decode a signature SEQUENCE into the raw `(r, s)` INTEGER contents.
///
/// The SEQUENCE must hold exactly two INTEGERs. Bytes after the SEQUENCE are
/// ignored, so a witness signature with its trailing sighash byte decodes as is.
pub fn decode_signature(der: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let (tag, body, _trailing) = read_tlv(der)?;
    if tag != TAG_SEQUENCE {
        return Err(Error::malformed(format!("DER: expected SEQUENCE, got tag {tag:#04x}")));
    }
    let (r_tag, r, rest) = read_tlv(body)?;
    let (s_tag, s, rest) = read_tlv(rest)?;
    if r_tag != TAG_INTEGER || s_tag != TAG_INTEGER {
        return Err(Error::malformed("DER: signature members must be INTEGERs"));
    }
    if !rest.is_empty() {
        return Err(Error::malformed("DER: signature SEQUENCE holds more than a pair"));
    }
    Ok((r.to_vec(), s.to_vec()))
}

/// Decode and re-encode canonically.
pub fn repack_signature(der: &[u8]) -> Result<Vec<u8>> {
    let (r, s) = decode_signature(der)?;
    encode_signature(&r, &s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_integer() {
        let cases = [
            ("000000", "00"),
            ("ff", "00ff"),
            ("00ce", "00ce"),
            ("1234", "1234"),
            ("0000001234", "1234"),
            ("000000fa", "00fa"),
            ("", "00"),
        ];
        for (src, expected) in cases {
            let packed = pack_integer(&hex::decode(src).unwrap());
            assert_eq!(hex::encode(packed), expected, "packing {src}");
        }
    }

    #[test]
    fn test_encode_signature_pair() {
        let der = encode_signature(&[0x03, 0xbb], &[0xff, 0xff]).unwrap();
        assert_eq!(hex::encode(&der), "3009020203bb020300ffff");
        let (r, s) = decode_signature(&der).unwrap();
        assert_eq!(r, vec![0x03, 0xbb]);
        assert_eq!(s, vec![0x00, 0xff, 0xff]);
    }

    #[test]
    fn test_repack_signature() {
        // Missing sign byte on s, plus trailing bytes after the SEQUENCE
        let repacked = repack_signature(&hex::decode("3008020203bb0202ffffabcd").unwrap()).unwrap();
        assert_eq!(hex::encode(repacked), "3009020203bb020300ffff");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        // Wrong outer tag
        assert!(matches!(
            decode_signature(&hex::decode("3108020203bb0202ffff").unwrap()),
            Err(Error::MalformedInput(_))
        ));
        // Truncated content
        assert!(matches!(
            decode_signature(&hex::decode("3009020203bb0203ffff").unwrap()),
            Err(Error::MalformedInput(_))
        ));
        // Three members
        assert!(matches!(
            decode_signature(&hex::decode("300902010102010102010a").unwrap()),
            Err(Error::MalformedInput(_))
        ));
        // Long-form length
        assert!(matches!(
            decode_signature(&hex::decode("3081").unwrap()),
            Err(Error::NotImplemented(_))
        ));
        assert!(decode_signature(&[]).is_err());
    }

    #[test]
    fn test_full_width_scalars() {
        let r = [0x80u8; 32];
        let s = [0x7fu8; 32];
        let der = encode_signature(&r, &s).unwrap();
        // 33-byte r (sign byte) + 32-byte s
        assert_eq!(der.len(), 2 + 2 + 33 + 2 + 32);
        assert_eq!(der[1] as usize, der.len() - 2);
    }
}
