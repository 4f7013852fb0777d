//! Standard locking-script templates.

use std::fmt;

pub const OP_0: u8 = 0x00;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;

/// Shape of a locking script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    Unknown,
}

impl ScriptKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::P2pkh => "P2PKH",
            ScriptKind::P2sh => "P2SH",
            ScriptKind::P2wpkh => "P2WPKH",
            ScriptKind::P2wsh => "P2WSH",
            ScriptKind::P2tr => "P2TR",
            ScriptKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, 0x14]);
    script.extend_from_slice(pubkey_hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// `OP_HASH160 <20> OP_EQUAL`
pub fn p2sh(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.extend_from_slice(&[OP_HASH160, 0x14]);
    script.extend_from_slice(script_hash);
    script.push(OP_EQUAL);
    script
}

/// `<version opcode> <push len> <program>`.
///
/// The caller is responsible for `version <= 16` and a 2..=40 byte program.
pub fn witness_program(version: u8, program: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(2 + program.len());
    script.push(if version == 0 { OP_0 } else { OP_1 + version - 1 });
    script.push(program.len() as u8);
    script.extend_from_slice(program);
    script
}

pub fn p2wpkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    witness_program(0, pubkey_hash)
}

pub fn p2wsh(script_hash: &[u8; 32]) -> Vec<u8> {
    witness_program(0, script_hash)
}

/// Taproot output for an x-only output key.
pub fn p2tr(output_key: &[u8; 32]) -> Vec<u8> {
    witness_program(1, output_key)
}

/// BIP-143 scriptCode for a P2WPKH input: the P2PKH script of the same hash.
pub fn p2wpkh_script_code(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    p2pkh(pubkey_hash)
}

/// Split a witness-program script into `(version, program)`.
pub fn parse_witness_program(script: &[u8]) -> Option<(u8, &[u8])> {
    if script.len() < 4 || script.len() > 42 {
        return None;
    }
    let version = match script[0] {
        OP_0 => 0,
        op @ OP_1..=OP_16 => op - OP_1 + 1,
        _ => return None,
    };
    let len = script[1] as usize;
    if len + 2 != script.len() {
        return None;
    }
    Some((version, &script[2..]))
}

pub fn classify(script: &[u8]) -> ScriptKind {
    match script {
        [OP_DUP, OP_HASH160, 0x14, .., OP_EQUALVERIFY, OP_CHECKSIG] if script.len() == 25 => {
            ScriptKind::P2pkh
        }
        [OP_HASH160, 0x14, .., OP_EQUAL] if script.len() == 23 => ScriptKind::P2sh,
        [OP_0, 0x14, ..] if script.len() == 22 => ScriptKind::P2wpkh,
        [OP_0, 0x20, ..] if script.len() == 34 => ScriptKind::P2wsh,
        [OP_1, 0x20, ..] if script.len() == 34 => ScriptKind::P2tr,
        _ => ScriptKind::Unknown,
    }
}

/// The hash, program or key a known template commits to.
pub fn payload(script: &[u8]) -> Option<&[u8]> {
    match classify(script) {
        ScriptKind::P2pkh => Some(&script[3..23]),
        ScriptKind::P2sh => Some(&script[2..22]),
        ScriptKind::P2wpkh | ScriptKind::P2wsh | ScriptKind::P2tr => {
            parse_witness_program(script).map(|(_, program)| program)
        }
        ScriptKind::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates() {
        let hash = [0xab; 20];
        assert_eq!(hex::encode(p2pkh(&hash)), format!("76a914{}88ac", "ab".repeat(20)));
        assert_eq!(hex::encode(p2sh(&hash)), format!("a914{}87", "ab".repeat(20)));
        assert_eq!(hex::encode(p2wpkh(&hash)), format!("0014{}", "ab".repeat(20)));
        assert_eq!(hex::encode(p2wsh(&[0xcd; 32])), format!("0020{}", "cd".repeat(32)));
        assert_eq!(hex::encode(p2tr(&[0xef; 32])), format!("5120{}", "ef".repeat(32)));
    }

    #[test]
    fn test_script_code_vector() {
        let hash: [u8; 20] = hex::decode("1d0f172a0ecb48aee1be1f2687d2963ae33f71a1")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(
            hex::encode(p2wpkh_script_code(&hash)),
            "76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac"
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&p2pkh(&[1; 20])), ScriptKind::P2pkh);
        assert_eq!(classify(&p2sh(&[1; 20])), ScriptKind::P2sh);
        assert_eq!(classify(&p2wpkh(&[1; 20])), ScriptKind::P2wpkh);
        assert_eq!(classify(&p2wsh(&[1; 32])), ScriptKind::P2wsh);
        assert_eq!(classify(&p2tr(&[1; 32])), ScriptKind::P2tr);
        assert_eq!(classify(&[]), ScriptKind::Unknown);
        assert_eq!(classify(&witness_program(2, &[1; 32])), ScriptKind::Unknown);
        // OP_RETURN
        assert_eq!(classify(&[0x6a, 0x01, 0x00]), ScriptKind::Unknown);
        assert_eq!(ScriptKind::P2tr.to_string(), "P2TR");
    }

    #[test]
    fn test_parse_witness_program() {
        let script = witness_program(16, &[9; 2]);
        assert_eq!(script[0], OP_16);
        assert_eq!(parse_witness_program(&script), Some((16, &[9u8, 9][..])));
        assert_eq!(parse_witness_program(&p2pkh(&[0; 20])), None);
        assert_eq!(parse_witness_program(&[0x00, 0x05, 1, 2]), None);
        assert_eq!(payload(&p2tr(&[3; 32])), Some(&[3u8; 32][..]));
        assert_eq!(payload(&p2wpkh(&[4; 20])), Some(&[4u8; 20][..]));
        assert_eq!(payload(&p2sh(&[5; 20])), Some(&[5u8; 20][..]));
        assert_eq!(payload(&[0x6a]), None);
    }
}
