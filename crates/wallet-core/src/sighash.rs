//! Signature-hash message construction for segwit v0 (BIP-143) and taproot
//! key-path (BIP-341) inputs.

use std::fmt;

use crate::error::{Error, Result};
use crate::hash::{double_sha256, sha256, tagged_hash};
use crate::transaction::{encode_var_bytes, write_output, Transaction, TxOut};

/// Which outputs a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SighashBase {
    All,
    None,
    Single,
}

/// A raw sighash-type byte.
///
/// The low five bits select the base mode (`2` NONE, `3` SINGLE, anything else
/// ALL); bit `0x80` is ANYONECANPAY. The raw byte is kept so that taproot's
/// `0x00` default and the explicit `0x01` stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SighashType(pub u8);

impl SighashType {
    /// Taproot default, committing like ALL.
    pub const DEFAULT: SighashType = SighashType(0x00);
    pub const ALL: SighashType = SighashType(0x01);
    pub const NONE: SighashType = SighashType(0x02);
    pub const SINGLE: SighashType = SighashType(0x03);
    pub const ANYONECANPAY_FLAG: u8 = 0x80;

    pub fn new(base: SighashBase, anyone_can_pay: bool) -> Self {
        let base = match base {
            SighashBase::All => 0x01,
            SighashBase::None => 0x02,
            SighashBase::Single => 0x03,
        };
        let flag = if anyone_can_pay { Self::ANYONECANPAY_FLAG } else { 0 };
        SighashType(base | flag)
    }

    pub fn base(&self) -> SighashBase {
        match self.0 & 0x1f {
            0x02 => SighashBase::None,
            0x03 => SighashBase::Single,
            _ => SighashBase::All,
        }
    }

    pub fn is_none(&self) -> bool {
        self.base() == SighashBase::None
    }

    pub fn is_single(&self) -> bool {
        self.base() == SighashBase::Single
    }

    pub fn anyone_can_pay(&self) -> bool {
        self.0 & Self::ANYONECANPAY_FLAG != 0
    }

    /// Hash types a taproot signature may carry.
    pub fn is_valid_taproot(&self) -> bool {
        matches!(self.0, 0x00..=0x03 | 0x81..=0x83)
    }
}

impl fmt::Display for SighashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.base() {
            SighashBase::All => "ALL",
            SighashBase::None => "NONE",
            SighashBase::Single => "SINGLE",
        };
        if self.0 == 0x00 {
            write!(f, "DEFAULT")
        } else if self.anyone_can_pay() {
            write!(f, "{base}|ANYONECANPAY")
        } else {
            write!(f, "{base}")
        }
    }
}

fn check_index(tx: &Transaction, index: usize) -> Result<()> {
    if index >= tx.inputs.len() {
        return Err(Error::operand(format!(
            "input index {index} out of range for {} inputs",
            tx.inputs.len()
        )));
    }
    Ok(())
}

fn serialize_prevouts(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(36 * tx.inputs.len());
    for input in &tx.inputs {
        buf.extend_from_slice(&input.previous_output.txid);
        buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
    }
    buf
}

fn serialize_sequences(tx: &Transaction) -> Vec<u8> {
    tx.inputs.iter().flat_map(|input| input.sequence.to_le_bytes()).collect()
}

fn serialize_outputs<'a>(outputs: impl IntoIterator<Item = &'a TxOut>) -> Vec<u8> {
    let mut buf = Vec::new();
    for output in outputs {
        write_output(output, &mut buf);
    }
    buf
}

// =============================================================================
// BIP-143 (segwit v0)
// =============================================================================

/// The BIP-143 preimage for input `index`.
///
/// `script_code` is the bare script; its varint length is added here.
pub fn segwit_v0_preimage(
    tx: &Transaction,
    index: usize,
    script_code: &[u8],
    amount: u64,
    sighash_type: SighashType,
) -> Result<Vec<u8>> {
    check_index(tx, index)?;
    let input = &tx.inputs[index];
    let acp = sighash_type.anyone_can_pay();
    let single = sighash_type.is_single();
    let none = sighash_type.is_none();

    let hash_prevouts = if acp { [0u8; 32] } else { double_sha256(&serialize_prevouts(tx)) };
    let hash_sequence = if acp || single || none {
        [0u8; 32]
    } else {
        double_sha256(&serialize_sequences(tx))
    };
    let hash_outputs = if !single && !none {
        double_sha256(&serialize_outputs(&tx.outputs))
    } else if single && index < tx.outputs.len() {
        double_sha256(&serialize_outputs([&tx.outputs[index]]))
    } else {
        [0u8; 32]
    };

    let mut buf = Vec::with_capacity(160 + script_code.len());
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&hash_prevouts);
    buf.extend_from_slice(&hash_sequence);
    buf.extend_from_slice(&input.previous_output.txid);
    buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
    encode_var_bytes(script_code, &mut buf);
    buf.extend_from_slice(&amount.to_le_bytes());
    buf.extend_from_slice(&input.sequence.to_le_bytes());
    buf.extend_from_slice(&hash_outputs);
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    buf.extend_from_slice(&u32::from(sighash_type.0).to_le_bytes());
    Ok(buf)
}

/// `sha256(preimage)`: the value handed to the ECDSA signer, which hashes it
/// once more before signing.
pub fn segwit_v0_signature_value(
    tx: &Transaction,
    index: usize,
    script_code: &[u8],
    amount: u64,
    sighash_type: SighashType,
) -> Result<[u8; 32]> {
    Ok(sha256(&segwit_v0_preimage(tx, index, script_code, amount, sighash_type)?))
}

/// The BIP-143 digest: double SHA256 of the preimage.
pub fn segwit_v0_sighash(
    tx: &Transaction,
    index: usize,
    script_code: &[u8],
    amount: u64,
    sighash_type: SighashType,
) -> Result<[u8; 32]> {
    Ok(sha256(&segwit_v0_signature_value(tx, index, script_code, amount, sighash_type)?))
}

// =============================================================================
// BIP-341 (taproot key path)
// =============================================================================

/// SigMsg for taproot key-path input `index`, without the leading epoch byte.
///
/// `prevouts` lists the output spent by every input, in input order.
pub fn taproot_sig_msg(
    tx: &Transaction,
    index: usize,
    prevouts: &[TxOut],
    sighash_type: SighashType,
    annex: Option<&[u8]>,
) -> Result<Vec<u8>> {
    if annex.is_some() {
        return Err(Error::NotImplemented("taproot annex"));
    }
    if !sighash_type.is_valid_taproot() {
        return Err(Error::operand(format!("invalid taproot sighash type {:#04x}", sighash_type.0)));
    }
    check_index(tx, index)?;
    if prevouts.len() != tx.inputs.len() {
        return Err(Error::operand(format!(
            "{} prevouts supplied for {} inputs",
            prevouts.len(),
            tx.inputs.len()
        )));
    }
    let acp = sighash_type.anyone_can_pay();
    let single = sighash_type.is_single();
    let none = sighash_type.is_none();
    if single && index >= tx.outputs.len() {
        return Err(Error::operand("SIGHASH_SINGLE without a matching output"));
    }

    let mut buf = Vec::with_capacity(256);
    buf.push(sighash_type.0);
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());

    if !acp {
        buf.extend_from_slice(&sha256(&serialize_prevouts(tx)));
        let amounts: Vec<u8> = prevouts.iter().flat_map(|p| p.value.to_le_bytes()).collect();
        buf.extend_from_slice(&sha256(&amounts));
        let mut scripts = Vec::new();
        for prevout in prevouts {
            encode_var_bytes(&prevout.script_pubkey, &mut scripts);
        }
        buf.extend_from_slice(&sha256(&scripts));
        buf.extend_from_slice(&sha256(&serialize_sequences(tx)));
    }
    if !single && !none {
        buf.extend_from_slice(&sha256(&serialize_outputs(&tx.outputs)));
    }

    // spend_type: key path, no annex
    buf.push(0x00);

    if acp {
        let input = &tx.inputs[index];
        let prevout = &prevouts[index];
        buf.extend_from_slice(&input.previous_output.txid);
        buf.extend_from_slice(&input.previous_output.vout.to_le_bytes());
        write_output(prevout, &mut buf);
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    } else {
        buf.extend_from_slice(&(index as u32).to_le_bytes());
    }

    if single {
        buf.extend_from_slice(&sha256(&serialize_outputs([&tx.outputs[index]])));
    }
    Ok(buf)
}

/// `tagged_hash("TapSighash", 0x00 || SigMsg)`.
pub fn taproot_sighash(
    tx: &Transaction,
    index: usize,
    prevouts: &[TxOut],
    sighash_type: SighashType,
    annex: Option<&[u8]>,
) -> Result<[u8; 32]> {
    let msg = taproot_sig_msg(tx, index, prevouts, sighash_type, annex)?;
    let mut data = Vec::with_capacity(msg.len() + 1);
    data.push(0x00);
    data.extend_from_slice(&msg);
    Ok(tagged_hash("TapSighash", &data))
}
