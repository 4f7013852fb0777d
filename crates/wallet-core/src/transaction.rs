//! Bitcoin transaction wire format.
//!
//! Little-endian throughout. When any input carries witness data the
//! serialization gains the `00 01` marker and flag after the version, and the
//! per-input witness stacks follow the outputs. `txid` hashes the form without
//! witness data; `wtxid` hashes the full form.

use std::fmt;

use log::debug;

use crate::error::{Error, Result};
use crate::hash::{double_sha256, hash_to_display_hex};

/// Reference to an output of a previous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    /// Previous txid, internal byte order.
    pub txid: [u8; 32],
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: [u8; 32], vout: u32) -> Self {
        OutPoint { txid, vout }
    }

    /// The all-zero hash with index `0xffffffff` spent by coinbase inputs.
    pub fn null() -> Self {
        OutPoint { txid: [0u8; 32], vout: u32::MAX }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::null()
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hash_to_display_hex(&self.txid), self.vout)
    }
}

/// A transaction input. The witness stack is serialized after all outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
}

impl TxIn {
    /// An unsigned input with empty unlocking data.
    pub fn new(previous_output: OutPoint, sequence: u32) -> Self {
        TxIn { previous_output, script_sig: Vec::new(), sequence, witness: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Value in satoshis.
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Whether any input carries witness data.
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Exactly one input spending the null outpoint.
    pub fn is_coinbase_shaped(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Canonical serialization, including witness data when present.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        self.write(&mut out, self.has_witness());
        out
    }

    /// Serialization without marker, flag or witness stacks.
    pub fn serialize_without_witness(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        self.write(&mut out, false);
        out
    }

    fn write(&self, out: &mut Vec<u8>, include_witness: bool) {
        // Version (4 bytes, little-endian)
        out.extend_from_slice(&self.version.to_le_bytes());

        // Marker and flag (SegWit indicator)
        if include_witness {
            out.push(0x00);
            out.push(0x01);
        }

        encode_varint(self.inputs.len() as u64, out);
        for input in &self.inputs {
            out.extend_from_slice(&input.previous_output.txid);
            out.extend_from_slice(&input.previous_output.vout.to_le_bytes());
            encode_var_bytes(&input.script_sig, out);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        encode_varint(self.outputs.len() as u64, out);
        for output in &self.outputs {
            write_output(output, out);
        }

        // Witness stacks, in input order
        if include_witness {
            for input in &self.inputs {
                encode_varint(input.witness.len() as u64, out);
                for item in &input.witness {
                    encode_var_bytes(item, out);
                }
            }
        }

        // Locktime (4 bytes)
        out.extend_from_slice(&self.lock_time.to_le_bytes());
    }

    /// Double SHA256 of the serialization without witness data.
    pub fn txid(&self) -> [u8; 32] {
        double_sha256(&self.serialize_without_witness())
    }

    /// Double SHA256 of the full serialization.
    ///
    /// Equals the txid when no input has witness data, and is all zeros for a
    /// coinbase-shaped transaction that carries a witness.
    pub fn wtxid(&self) -> [u8; 32] {
        if !self.has_witness() {
            return self.txid();
        }
        if self.is_coinbase_shaped() {
            return [0u8; 32];
        }
        double_sha256(&self.serialize())
    }

    pub fn base_size(&self) -> usize {
        self.serialize_without_witness().len()
    }

    pub fn total_size(&self) -> usize {
        self.serialize().len()
    }

    /// `3 * base_size + total_size`.
    pub fn weight(&self) -> usize {
        3 * self.base_size() + self.total_size()
    }

    /// Virtual size: weight / 4, rounded up.
    pub fn vsize(&self) -> usize {
        self.weight().div_ceil(4)
    }

    /// Parse a complete transaction, rejecting trailing bytes.
    pub fn parse(bytes: &[u8]) -> Result<Transaction> {
        let (tx, rest) = Self::parse_partial(bytes)?;
        if !rest.is_empty() {
            return Err(Error::malformed(format!("{} trailing bytes after transaction", rest.len())));
        }
        Ok(tx)
    }

    /// Parse a transaction from the front of `bytes`, returning the unconsumed rest.
    pub fn parse_partial(bytes: &[u8]) -> Result<(Transaction, &[u8])> {
        let mut reader = Reader::new(bytes);
        let tx = Self::read(&mut reader)?;
        debug!(
            "parsed transaction {} ({} inputs, {} outputs, witness: {})",
            hash_to_display_hex(&tx.txid()),
            tx.inputs.len(),
            tx.outputs.len(),
            tx.has_witness()
        );
        Ok((tx, reader.remaining()))
    }

    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<Transaction> {
        let version = reader.read_u32_le()?;

        let segwit = reader.peek_u8()? == 0x00;
        if segwit {
            reader.read_u8()?;
            let flag = reader.read_u8()?;
            if flag != 0x01 {
                return Err(Error::malformed(format!("unexpected segwit flag {flag:#04x}")));
            }
        }

        let input_count = reader.read_varint()?;
        if input_count == 0 {
            return Err(Error::malformed("transaction has no inputs"));
        }
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            let txid = reader.read_array::<32>()?;
            let vout = reader.read_u32_le()?;
            let script_sig = reader.read_var_bytes()?;
            let sequence = reader.read_u32_le()?;
            inputs.push(TxIn {
                previous_output: OutPoint { txid, vout },
                script_sig,
                sequence,
                witness: Vec::new(),
            });
        }

        let output_count = reader.read_varint()?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            outputs.push(read_output(reader)?);
        }

        if segwit {
            for input in inputs.iter_mut() {
                let items = reader.read_varint()?;
                for _ in 0..items {
                    input.witness.push(reader.read_var_bytes()?);
                }
            }
            if inputs.iter().all(|input| input.witness.is_empty()) {
                return Err(Error::malformed("witness marker present but every witness stack is empty"));
            }
        }

        let lock_time = reader.read_u32_le()?;
        Ok(Transaction { version, inputs, outputs, lock_time })
    }
}

/// Value (8 bytes) followed by the length-prefixed locking script.
pub(crate) fn write_output(output: &TxOut, out: &mut Vec<u8>) {
    out.extend_from_slice(&output.value.to_le_bytes());
    encode_var_bytes(&output.script_pubkey, out);
}

pub(crate) fn read_output(reader: &mut Reader<'_>) -> Result<TxOut> {
    let value = reader.read_u64_le()?;
    let script_pubkey = reader.read_var_bytes()?;
    Ok(TxOut { value, script_pubkey })
}

/// Encode a variable-length integer (Bitcoin varint).
pub fn encode_varint(value: u64, output: &mut Vec<u8>) {
    if value < 0xfd {
        output.push(value as u8);
    } else if value <= 0xffff {
        output.push(0xfd);
        output.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffffffff {
        output.push(0xfe);
        output.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        output.push(0xff);
        output.extend_from_slice(&value.to_le_bytes());
    }
}

/// Varint length prefix followed by the bytes.
pub fn encode_var_bytes(bytes: &[u8], output: &mut Vec<u8>) {
    encode_varint(bytes.len() as u64, output);
    output.extend_from_slice(bytes);
}

/// Forward-only cursor over a byte slice. Every read fails with
/// [`Error::MalformedInput`] on truncation.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                Error::malformed(format!(
                    "truncated: need {len} bytes at offset {}, have {}",
                    self.pos,
                    self.buf.len() - self.pos
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub(crate) fn peek_u8(&self) -> Result<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or_else(|| Error::malformed("truncated: unexpected end of input"))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    pub(crate) fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    /// Read a varint, rejecting encodings longer than necessary.
    pub(crate) fn read_varint(&mut self) -> Result<u64> {
        let (value, min) = match self.read_u8()? {
            0xfd => (u16::from_le_bytes(self.read_array::<2>()?) as u64, 0xfd),
            0xfe => (u32::from_le_bytes(self.read_array::<4>()?) as u64, 0x1_0000),
            0xff => (u64::from_le_bytes(self.read_array::<8>()?), 0x1_0000_0000),
            small => return Ok(small as u64),
        };
        if value < min {
            return Err(Error::malformed(format!("non-canonical varint for {value}")));
        }
        Ok(value)
    }

    /// Varint length followed by that many bytes, copied out.
    pub(crate) fn read_var_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| Error::malformed("length prefix overflows"))?;
        Ok(self.read_bytes(len)?.to_vec())
    }
}
