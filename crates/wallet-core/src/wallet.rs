//! Spend-plan assembly and per-input signing.
//!
//! The caller supplies the outputs to spend (it owns UTXO discovery); this
//! module turns them into a signed, broadcastable transaction or a PSBT.

use log::{debug, info};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::address::validate_address;
use crate::error::{Error, Result};
use crate::hash::hash_to_display_hex;
use crate::keys::PrivateKey;
use crate::network::Network;
use crate::psbt::Psbt;
use crate::script::{self, ScriptKind};
use crate::sighash::{segwit_v0_signature_value, taproot_sighash, SighashType};
use crate::transaction::{OutPoint, Transaction, TxIn, TxOut};

/// Opt-in replace-by-fee sequence.
pub const DEFAULT_SEQUENCE: u32 = 0xfffffffd;
pub const DEFAULT_DUST_LIMIT: u64 = 546;

/// Policy knobs for building transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub network: Network,
    pub version: u32,
    pub sequence: u32,
    pub lock_time: u32,
    /// Outputs at or below this many satoshis are not created.
    pub dust_limit: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            version: 2,
            sequence: DEFAULT_SEQUENCE,
            lock_time: 0,
            dust_limit: DEFAULT_DUST_LIMIT,
        }
    }
}

impl WalletConfig {
    /// Locking script for an address on the configured network.
    pub fn script_for_address(&self, address: &str) -> Result<Vec<u8>> {
        Ok(validate_address(address, self.network)?.script_pubkey)
    }
}

/// A previously received output the caller wants to spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendableOutput {
    pub outpoint: OutPoint,
    pub value: u64,
    pub script_pubkey: Vec<u8>,
    /// Index into the key slice passed to the signer.
    pub key_index: usize,
}

impl SpendableOutput {
    pub fn to_txout(&self) -> TxOut {
        TxOut { value: self.value, script_pubkey: self.script_pubkey.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendRequest {
    pub inputs: Vec<SpendableOutput>,
    pub destination: Vec<u8>,
    pub amount: u64,
    pub fee: u64,
    pub change_script: Vec<u8>,
}

impl SpendRequest {
    fn input_total(&self) -> Result<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |acc, input| acc.checked_add(input.value))
            .ok_or_else(|| Error::operand("input values overflow"))
    }
}

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub raw: Vec<u8>,
    pub txid: [u8; 32],
    pub wtxid: [u8; 32],
    pub vsize: usize,
    pub fee: u64,
}

/// Lay out inputs, the payment and (when above dust) change.
pub fn build_unsigned_transaction(config: &WalletConfig, request: &SpendRequest) -> Result<Transaction> {
    if request.inputs.is_empty() {
        return Err(Error::operand("spend request has no inputs"));
    }
    let available = request.input_total()?;
    let required = request
        .amount
        .checked_add(request.fee)
        .ok_or_else(|| Error::operand("amount plus fee overflows"))?;
    if available < required {
        return Err(Error::InsufficientFunds { required, available });
    }
    if request.amount <= config.dust_limit {
        return Err(Error::operand(format!(
            "amount {} sat is at or below the dust limit of {} sat",
            request.amount, config.dust_limit
        )));
    }

    let mut outputs = vec![TxOut { value: request.amount, script_pubkey: request.destination.clone() }];
    let change = available - required;
    if change > config.dust_limit {
        outputs.push(TxOut { value: change, script_pubkey: request.change_script.clone() });
    } else if change > 0 {
        debug!("folding {change} sat of dust change into the fee");
    }

    Ok(Transaction {
        version: config.version,
        inputs: request
            .inputs
            .iter()
            .map(|input| TxIn::new(input.outpoint, config.sequence))
            .collect(),
        outputs,
        lock_time: config.lock_time,
    })
}

/// Sign every input of `tx` according to the script it spends.
///
/// `prevouts[i]` is the output spent by input `i`.
pub fn sign_transaction<R: RngCore + CryptoRng>(
    tx: &mut Transaction,
    prevouts: &[SpendableOutput],
    keys: &[PrivateKey],
    rng: &mut R,
) -> Result<()> {
    if prevouts.len() != tx.inputs.len() {
        return Err(Error::operand(format!(
            "{} prevouts supplied for {} inputs",
            prevouts.len(),
            tx.inputs.len()
        )));
    }
    let spent: Vec<TxOut> = prevouts.iter().map(SpendableOutput::to_txout).collect();

    // Witnesses stay out of `tx` until every input has signed.
    let mut witnesses: Vec<Vec<Vec<u8>>> = Vec::with_capacity(prevouts.len());
    for (index, prevout) in prevouts.iter().enumerate() {
        let key = keys.get(prevout.key_index).ok_or_else(|| {
            Error::operand(format!("input {index} refers to missing key {}", prevout.key_index))
        })?;
        let kind = script::classify(&prevout.script_pubkey);
        debug!("signing input {index} ({kind}) spending {}", prevout.outpoint);

        let witness = match kind {
            ScriptKind::P2wpkh => {
                let pubkey_hash = key.public_key().hash160();
                if script::payload(&prevout.script_pubkey) != Some(&pubkey_hash[..]) {
                    return Err(Error::operand(format!("key does not match P2WPKH input {index}")));
                }
                let script_code = script::p2wpkh_script_code(&pubkey_hash);
                let value =
                    segwit_v0_signature_value(tx, index, &script_code, prevout.value, SighashType::ALL)?;
                let mut sig = key.sign_ecdsa(&value, rng)?.to_der()?;
                sig.push(SighashType::ALL.0);
                vec![sig, key.public_key().serialize_compressed().to_vec()]
            }
            ScriptKind::P2tr => {
                let output_key = key.public_key().x_only();
                if script::payload(&prevout.script_pubkey) != Some(&output_key[..]) {
                    return Err(Error::operand(format!("key does not match P2TR input {index}")));
                }
                let digest = taproot_sighash(tx, index, &spent, SighashType::DEFAULT, None)?;
                vec![key.sign_schnorr(&digest, rng)?.to_vec()]
            }
            _ => return Err(Error::NotImplemented("signing inputs other than P2WPKH and P2TR key path")),
        };
        witnesses.push(witness);
    }
    for (input, witness) in tx.inputs.iter_mut().zip(witnesses) {
        input.witness = witness;
    }
    Ok(())
}

/// Build and sign a transaction for `request`.
pub fn create_signed_transaction<R: RngCore + CryptoRng>(
    config: &WalletConfig,
    request: &SpendRequest,
    keys: &[PrivateKey],
    rng: &mut R,
) -> Result<SignedTransaction> {
    let mut transaction = build_unsigned_transaction(config, request)?;
    sign_transaction(&mut transaction, &request.inputs, keys, rng)?;

    let output_total: u64 = transaction.outputs.iter().map(|o| o.value).sum();
    let fee = request.input_total()? - output_total;
    let signed = SignedTransaction {
        raw: transaction.serialize(),
        txid: transaction.txid(),
        wtxid: transaction.wtxid(),
        vsize: transaction.vsize(),
        fee,
        transaction,
    };
    info!(
        "signed transaction {} ({} inputs, {} vbytes, fee {} sat)",
        hash_to_display_hex(&signed.txid),
        signed.transaction.inputs.len(),
        signed.vsize,
        signed.fee
    );
    Ok(signed)
}

/// Export the unsigned plan, with witness UTXOs, for an external signer.
pub fn create_psbt(config: &WalletConfig, request: &SpendRequest) -> Result<Psbt> {
    let tx = build_unsigned_transaction(config, request)?;
    let mut psbt = Psbt::from_unsigned_tx(tx)?;
    for (slot, input) in psbt.inputs.iter_mut().zip(&request.inputs) {
        slot.witness_utxo = Some(input.to_txout());
    }
    Ok(psbt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdsa::Signature;
    use crate::hash::sha256;
    use crate::sighash::segwit_v0_sighash;
    use rand_core::OsRng;

    fn key(hex_str: &str) -> PrivateKey {
        PrivateKey::from_bytes(&hex::decode(hex_str).unwrap()).unwrap()
    }

    fn keys() -> Vec<PrivateKey> {
        vec![
            key("619c335025c7f4012e556c2a58b2506e30b8511b53ade95ea316fd8c3286feb9"),
            key("0c28fca386c7a227600b2fe50b7cae11ec86d3bf1fbe471be89827e19d72aa1d"),
        ]
    }

    fn request(keys: &[PrivateKey]) -> SpendRequest {
        SpendRequest {
            inputs: vec![
                SpendableOutput {
                    outpoint: OutPoint::new([0x11; 32], 1),
                    value: 60_000,
                    script_pubkey: script::p2wpkh(&keys[0].public_key().hash160()),
                    key_index: 0,
                },
                SpendableOutput {
                    outpoint: OutPoint::new([0x22; 32], 0),
                    value: 40_000,
                    script_pubkey: script::p2tr(&keys[1].public_key().x_only()),
                    key_index: 1,
                },
            ],
            destination: script::p2wpkh(&[0xaa; 20]),
            amount: 70_000,
            fee: 1_000,
            change_script: script::p2wpkh(&keys[0].public_key().hash160()),
        }
    }

    #[test]
    fn test_config_defaults_and_serde() {
        let config = WalletConfig::default();
        assert_eq!(config.version, 2);
        assert_eq!(config.sequence, 0xfffffffd);
        assert_eq!(config.dust_limit, 546);

        let parsed: WalletConfig = serde_json::from_str(r#"{"network":"testnet4","lock_time":800000}"#).unwrap();
        assert_eq!(parsed.network, Network::Testnet4);
        assert_eq!(parsed.lock_time, 800_000);
        assert_eq!(parsed.version, 2);
    }

    #[test]
    fn test_build_with_change() {
        let keys = keys();
        let req = request(&keys);
        let tx = build_unsigned_transaction(&WalletConfig::default(), &req).unwrap();

        assert_eq!(tx.version, 2);
        assert_eq!(tx.inputs.len(), 2);
        assert!(tx.inputs.iter().all(|i| i.sequence == DEFAULT_SEQUENCE && i.witness.is_empty()));
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 70_000);
        assert_eq!(tx.outputs[1].value, 29_000);
        assert_eq!(tx.outputs[1].script_pubkey, req.change_script);
    }

    #[test]
    fn test_dust_change_joins_fee() {
        let keys = keys();
        let mut req = request(&keys);
        req.amount = 98_500;
        let tx = build_unsigned_transaction(&WalletConfig::default(), &req).unwrap();
        assert_eq!(tx.outputs.len(), 1);

        // change of exactly the dust limit is also dropped
        req.amount = 100_000 - 1_000 - 546;
        let tx = build_unsigned_transaction(&WalletConfig::default(), &req).unwrap();
        assert_eq!(tx.outputs.len(), 1);
    }

    #[test]
    fn test_build_rejections() {
        let keys = keys();
        let mut req = request(&keys);
        req.amount = 99_500;
        assert_eq!(
            build_unsigned_transaction(&WalletConfig::default(), &req),
            Err(Error::InsufficientFunds { required: 100_500, available: 100_000 })
        );

        req.amount = 546;
        assert!(matches!(
            build_unsigned_transaction(&WalletConfig::default(), &req),
            Err(Error::InvalidOperand(_))
        ));

        req.inputs.clear();
        assert!(matches!(
            build_unsigned_transaction(&WalletConfig::default(), &req),
            Err(Error::InvalidOperand(_))
        ));
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let keys = keys();
        let req = request(&keys);
        let signed = create_signed_transaction(&WalletConfig::default(), &req, &keys, &mut OsRng).unwrap();
        let tx = &signed.transaction;

        assert_eq!(signed.fee, 1_000);
        assert_eq!(signed.raw, tx.serialize());
        assert_eq!(Transaction::parse(&signed.raw).unwrap(), *tx);
        assert_eq!(signed.txid, tx.txid());
        assert_ne!(signed.txid, signed.wtxid);

        // P2WPKH: [der || 0x01, compressed pubkey]
        let witness = &tx.inputs[0].witness;
        assert_eq!(witness.len(), 2);
        assert_eq!(*witness[0].last().unwrap(), 0x01);
        assert_eq!(witness[1], keys[0].public_key().serialize_compressed().to_vec());
        let sig = Signature::from_der(&witness[0]).unwrap();
        let script_code = script::p2wpkh_script_code(&keys[0].public_key().hash160());
        let digest = segwit_v0_sighash(tx, 0, &script_code, 60_000, SighashType::ALL).unwrap();
        keys[0].public_key().verify_ecdsa_digest(&digest, &sig).unwrap();
        let value = segwit_v0_signature_value(tx, 0, &script_code, 60_000, SighashType::ALL).unwrap();
        assert_eq!(sha256(&value), digest);

        // P2TR key path: one 64-byte signature with the default sighash
        let witness = &tx.inputs[1].witness;
        assert_eq!(witness.len(), 1);
        let sig: [u8; 64] = witness[0].as_slice().try_into().unwrap();
        let spent: Vec<TxOut> = req.inputs.iter().map(SpendableOutput::to_txout).collect();
        let digest = taproot_sighash(tx, 1, &spent, SighashType::DEFAULT, None).unwrap();
        keys[1].public_key().verify_schnorr(&digest, &sig).unwrap();
    }

    #[test]
    fn test_sign_rejections() {
        let keys = keys();
        let mut req = request(&keys);

        // wrong key for the P2WPKH input
        req.inputs[0].key_index = 1;
        assert!(matches!(
            create_signed_transaction(&WalletConfig::default(), &req, &keys, &mut OsRng),
            Err(Error::InvalidOperand(_))
        ));

        req.inputs[0].key_index = 5;
        assert!(matches!(
            create_signed_transaction(&WalletConfig::default(), &req, &keys, &mut OsRng),
            Err(Error::InvalidOperand(_))
        ));

        req.inputs[0].key_index = 0;
        req.inputs[0].script_pubkey = script::p2pkh(&keys[0].public_key().hash160());
        assert!(matches!(
            create_signed_transaction(&WalletConfig::default(), &req, &keys, &mut OsRng),
            Err(Error::NotImplemented(_))
        ));
    }

    #[test]
    fn test_failed_signing_leaves_witnesses_empty() {
        let keys = keys();
        let mut req = request(&keys);
        req.inputs[1].key_index = 5;

        let mut tx = build_unsigned_transaction(&WalletConfig::default(), &req).unwrap();
        let result = sign_transaction(&mut tx, &req.inputs, &keys, &mut OsRng);
        assert!(matches!(result, Err(Error::InvalidOperand(_))));
        assert!(tx.inputs.iter().all(|input| input.witness.is_empty()));
        assert!(!tx.has_witness());
    }

    #[test]
    fn test_psbt_export() {
        let keys = keys();
        let req = request(&keys);
        let psbt = create_psbt(&WalletConfig::default(), &req).unwrap();
        assert_eq!(psbt.inputs.len(), 2);
        assert_eq!(psbt.inputs[1].witness_utxo.as_ref().unwrap().value, 40_000);
        assert_eq!(psbt.output_count(), 2);
        assert_eq!(Psbt::parse(&psbt.serialize()).unwrap(), psbt);
    }

    #[test]
    fn test_script_for_address() {
        let config = WalletConfig { network: Network::Testnet4, ..WalletConfig::default() };
        assert_eq!(
            hex::encode(config.script_for_address("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx").unwrap()),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
        assert!(config.script_for_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").is_err());
    }
}
