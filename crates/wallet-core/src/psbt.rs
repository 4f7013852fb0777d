//! Partially Signed Bitcoin Transactions (BIP-174), limited to the fields a
//! segwit co-signer needs: the unsigned transaction and per-input witness UTXOs.

use log::debug;

use crate::error::{Error, Result};
use crate::transaction::{encode_var_bytes, encode_varint, read_output, write_output, Reader, Transaction, TxOut};

pub const PSBT_MAGIC: [u8; 5] = [0x70, 0x73, 0x62, 0x74, 0xff];

const PSBT_GLOBAL_UNSIGNED_TX: u8 = 0x00;
const PSBT_IN_WITNESS_UTXO: u8 = 0x01;
const SEPARATOR: u8 = 0x00;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PsbtInput {
    pub witness_utxo: Option<TxOut>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Psbt {
    pub unsigned_tx: Transaction,
    pub inputs: Vec<PsbtInput>,
}

impl Psbt {
    /// Wrap a transaction whose script_sigs and witnesses are all empty.
    pub fn from_unsigned_tx(unsigned_tx: Transaction) -> Result<Self> {
        check_unsigned(&unsigned_tx).map_err(Error::InvalidOperand)?;
        let inputs = vec![PsbtInput::default(); unsigned_tx.inputs.len()];
        Ok(Psbt { unsigned_tx, inputs })
    }

    pub fn output_count(&self) -> usize {
        self.unsigned_tx.outputs.len()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&PSBT_MAGIC);

        write_pair(&[PSBT_GLOBAL_UNSIGNED_TX], &self.unsigned_tx.serialize_without_witness(), &mut out);
        out.push(SEPARATOR);

        for input in &self.inputs {
            if let Some(utxo) = &input.witness_utxo {
                let mut value = Vec::with_capacity(9 + utxo.script_pubkey.len());
                write_output(utxo, &mut value);
                write_pair(&[PSBT_IN_WITNESS_UTXO], &value, &mut out);
            }
            out.push(SEPARATOR);
        }

        for _ in 0..self.output_count() {
            out.push(SEPARATOR);
        }
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Psbt> {
        let mut reader = Reader::new(bytes);
        if reader.read_array::<5>()? != PSBT_MAGIC {
            return Err(Error::malformed("missing PSBT magic bytes"));
        }

        let mut unsigned_tx = None;
        while let Some((key, value)) = read_pair(&mut reader)? {
            if key == [PSBT_GLOBAL_UNSIGNED_TX] {
                if unsigned_tx.is_some() {
                    return Err(Error::malformed("duplicate PSBT unsigned transaction"));
                }
                let tx = Transaction::parse(&value)?;
                check_unsigned(&tx).map_err(Error::MalformedInput)?;
                unsigned_tx = Some(tx);
            }
        }
        let unsigned_tx =
            unsigned_tx.ok_or_else(|| Error::malformed("PSBT has no unsigned transaction"))?;

        let mut inputs = Vec::with_capacity(unsigned_tx.inputs.len());
        for _ in 0..unsigned_tx.inputs.len() {
            let mut input = PsbtInput::default();
            while let Some((key, value)) = read_pair(&mut reader)? {
                if key == [PSBT_IN_WITNESS_UTXO] {
                    if input.witness_utxo.is_some() {
                        return Err(Error::malformed("duplicate PSBT witness UTXO"));
                    }
                    let mut value_reader = Reader::new(&value);
                    let utxo = read_output(&mut value_reader)?;
                    if !value_reader.is_empty() {
                        return Err(Error::malformed("trailing bytes in PSBT witness UTXO"));
                    }
                    input.witness_utxo = Some(utxo);
                }
            }
            inputs.push(input);
        }

        for _ in 0..unsigned_tx.outputs.len() {
            while read_pair(&mut reader)?.is_some() {}
        }

        if !reader.is_empty() {
            return Err(Error::malformed("trailing bytes after PSBT"));
        }
        debug!(
            "parsed PSBT with {} inputs and {} outputs",
            unsigned_tx.inputs.len(),
            unsigned_tx.outputs.len()
        );
        Ok(Psbt { unsigned_tx, inputs })
    }
}

fn check_unsigned(tx: &Transaction) -> std::result::Result<(), String> {
    if tx.inputs.iter().any(|input| !input.script_sig.is_empty() || !input.witness.is_empty()) {
        return Err("PSBT transaction must have empty script_sigs and witnesses".to_string());
    }
    Ok(())
}

fn write_pair(key: &[u8], value: &[u8], out: &mut Vec<u8>) {
    encode_var_bytes(key, out);
    encode_varint(value.len() as u64, out);
    out.extend_from_slice(value);
}

/// `None` at the map separator.
fn read_pair(reader: &mut Reader<'_>) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let key = reader.read_var_bytes()?;
    if key.is_empty() {
        return Ok(None);
    }
    let value = reader.read_var_bytes()?;
    Ok(Some((key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{OutPoint, TxIn};

    fn unsigned_tx() -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![
                TxIn::new(OutPoint::new([0x11; 32], 0), 0xfffffffd),
                TxIn::new(OutPoint::new([0x22; 32], 3), 0xfffffffd),
            ],
            outputs: vec![
                TxOut { value: 40_000, script_pubkey: vec![0x00, 0x14, 0xaa, 0xbb] },
                TxOut { value: 9_000, script_pubkey: vec![0x51, 0x20, 0xcc] },
            ],
            lock_time: 0,
        }
    }

    #[test]
    fn test_serialize_layout() {
        let mut psbt = Psbt::from_unsigned_tx(unsigned_tx()).unwrap();
        psbt.inputs[0].witness_utxo = Some(TxOut { value: 50_000, script_pubkey: vec![0x00, 0x14, 0x01] });
        let bytes = psbt.serialize();

        assert_eq!(&bytes[..5], b"psbt\xff");
        // key length 1, key type 0x00, then the unsigned tx
        let tx_bytes = unsigned_tx().serialize_without_witness();
        assert_eq!(bytes[5..7], [0x01, 0x00]);
        let mut len = Vec::new();
        encode_varint(tx_bytes.len() as u64, &mut len);
        assert_eq!(bytes[7..7 + len.len()], len[..]);
        let after_tx = 7 + len.len() + tx_bytes.len();
        assert_eq!(bytes[after_tx], SEPARATOR);
        // witness UTXO: key 01 01, value len 12, amount, script len 3, script
        assert_eq!(
            hex::encode(&bytes[after_tx + 1..]),
            "01010c50c30000000000000300140100000000"
        );
    }

    #[test]
    fn test_roundtrip() {
        let mut psbt = Psbt::from_unsigned_tx(unsigned_tx()).unwrap();
        psbt.inputs[1].witness_utxo = Some(TxOut { value: 123, script_pubkey: vec![0x51, 0x20, 0x07] });
        let parsed = Psbt::parse(&psbt.serialize()).unwrap();
        assert_eq!(parsed, psbt);
        assert_eq!(parsed.output_count(), 2);
    }

    #[test]
    fn test_parse_skips_unknown_keys() {
        let psbt = Psbt::from_unsigned_tx(unsigned_tx()).unwrap();
        let mut bytes = PSBT_MAGIC.to_vec();
        write_pair(&[0xfc, 0x01], b"proprietary", &mut bytes);
        write_pair(&[PSBT_GLOBAL_UNSIGNED_TX], &unsigned_tx().serialize_without_witness(), &mut bytes);
        bytes.push(SEPARATOR);
        write_pair(&[0x06, 0xaa], b"bip32", &mut bytes);
        bytes.push(SEPARATOR);
        bytes.push(SEPARATOR);
        write_pair(&[0x02, 0xbb], b"out", &mut bytes);
        bytes.push(SEPARATOR);
        bytes.push(SEPARATOR);
        assert_eq!(Psbt::parse(&bytes).unwrap(), psbt);
    }

    #[test]
    fn test_parse_rejects() {
        let good = Psbt::from_unsigned_tx(unsigned_tx()).unwrap().serialize();

        let mut bad_magic = good.clone();
        bad_magic[4] = 0x00;
        assert!(matches!(Psbt::parse(&bad_magic), Err(Error::MalformedInput(_))));

        assert!(Psbt::parse(&good[..good.len() - 1]).is_err());

        let mut trailing = good.clone();
        trailing.push(0x00);
        assert!(Psbt::parse(&trailing).is_err());

        let mut no_tx = PSBT_MAGIC.to_vec();
        no_tx.push(SEPARATOR);
        assert!(Psbt::parse(&no_tx).is_err());

        let mut signed = unsigned_tx();
        signed.inputs[0].script_sig = vec![0x01];
        assert!(matches!(Psbt::from_unsigned_tx(signed.clone()), Err(Error::InvalidOperand(_))));
        let mut bytes = PSBT_MAGIC.to_vec();
        write_pair(&[PSBT_GLOBAL_UNSIGNED_TX], &signed.serialize_without_witness(), &mut bytes);
        bytes.extend_from_slice(&[SEPARATOR; 5]);
        assert!(matches!(Psbt::parse(&bytes), Err(Error::MalformedInput(_))));
    }
}
