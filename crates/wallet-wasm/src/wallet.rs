//! Key holder and transaction builder exposed to JavaScript.

use log::info;
use rand_core::{CryptoRng, OsRng, RngCore};
use wasm_bindgen::prelude::*;
use wallet_core::{
    address::{p2tr_address, p2wpkh_address},
    hash::hash_from_display_hex,
    script, validate_address,
    wallet::{create_psbt, create_signed_transaction},
    wif::{self, KeyKind},
    Error, Network, OutPoint, PrivateKey, SignedTransaction, SpendRequest, SpendableOutput, Transaction,
    WalletConfig,
};

use crate::state::{SignedTxInfo, TransactionInfo, UtxoInfo};

fn js_error(e: impl core::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// A wallet key and the script type it spends.
struct WalletKey {
    kind: KeyKind,
    key: PrivateKey,
}

impl WalletKey {
    fn script_pubkey(&self) -> Vec<u8> {
        match self.kind {
            KeyKind::P2wpkh => script::p2wpkh(&self.key.public_key().hash160()),
            KeyKind::P2tr => script::p2tr(&self.key.public_key().x_only()),
        }
    }
}

/// In-memory wallet. Keys are never persisted here.
#[wasm_bindgen]
pub struct Wallet {
    config: WalletConfig,
    keys: Vec<WalletKey>,
}

#[wasm_bindgen]
impl Wallet {
    /// Create a wallet.
    ///
    /// # Arguments
    /// * `network` - The network ("mainnet" or "testnet4")
    /// * `config` - Optional `WalletConfig` object; its `network` field is overridden
    #[wasm_bindgen(constructor)]
    pub fn new(network: &str, config: JsValue) -> Result<Wallet, JsValue> {
        let network: Network = network.parse().map_err(js_error)?;
        let mut config: WalletConfig = if config.is_undefined() || config.is_null() {
            WalletConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };
        config.network = network;
        Ok(Wallet::with_config(config))
    }

    /// Import a WIF key, optionally prefixed with `p2wpkh:` or `p2tr:`.
    /// Returns the key index.
    #[wasm_bindgen]
    pub fn import_wif(&mut self, text: &str) -> Result<usize, JsValue> {
        self.import_key(text).map_err(js_error)
    }

    /// Generate a fresh key of the given kind ("p2wpkh" or "p2tr").
    #[wasm_bindgen]
    pub fn generate_key(&mut self, kind: &str) -> Result<usize, JsValue> {
        let kind: KeyKind = kind.parse().map_err(js_error)?;
        self.add_generated_key(kind, &mut OsRng).map_err(js_error)
    }

    /// Export a key as prefixed WIF.
    #[wasm_bindgen]
    pub fn export_wif(&self, index: usize) -> Result<String, JsValue> {
        self.exported_wif(index).map_err(js_error)
    }

    /// Receive address of a key.
    #[wasm_bindgen]
    pub fn address(&self, index: usize) -> Result<String, JsValue> {
        self.key_address(index).map_err(js_error)
    }

    /// Compressed public key hex.
    #[wasm_bindgen]
    pub fn public_key(&self, index: usize) -> Result<String, JsValue> {
        let entry = self.entry(index).map_err(js_error)?;
        Ok(entry.key.public_key().to_string())
    }

    #[wasm_bindgen(getter)]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Get the current network.
    #[wasm_bindgen(getter)]
    pub fn network(&self) -> String {
        self.config.network.name().to_string()
    }

    /// Build and sign a transaction.
    ///
    /// # Arguments
    /// * `utxos` - Array of `{ txid, vout, value, key_index }`
    /// * `destination` - Recipient address
    /// * `amount` - Satoshis to send
    /// * `fee` - Absolute fee in satoshis
    /// * `change_index` - Key whose address receives the change
    #[wasm_bindgen]
    pub fn create_transaction(
        &self,
        utxos: JsValue,
        destination: &str,
        amount: u64,
        fee: u64,
        change_index: usize,
    ) -> Result<JsValue, JsValue> {
        let utxos = utxo_list(utxos)?;
        let request = self
            .spend_request(utxos, destination, amount, fee, change_index)
            .map_err(js_error)?;
        let signed = self.sign_request(&request, &mut OsRng).map_err(js_error)?;
        let info = SignedTxInfo::from_signed(&signed);
        info!("built transaction {} paying {} sat to {}", info.txid, amount, destination);
        info.to_js()
    }

    /// Export the same plan as an unsigned PSBT, hex encoded.
    #[wasm_bindgen]
    pub fn create_psbt(
        &self,
        utxos: JsValue,
        destination: &str,
        amount: u64,
        fee: u64,
        change_index: usize,
    ) -> Result<String, JsValue> {
        let utxos = utxo_list(utxos)?;
        let request = self
            .spend_request(utxos, destination, amount, fee, change_index)
            .map_err(js_error)?;
        self.psbt_hex(&request).map_err(js_error)
    }
}

impl Wallet {
    fn with_config(config: WalletConfig) -> Self {
        Wallet { config, keys: Vec::new() }
    }

    fn import_key(&mut self, text: &str) -> wallet_core::Result<usize> {
        let (kind, decoded) = wif::decode_with_kind(text)?;
        if decoded.network != self.config.network {
            return Err(Error::InvalidOperand(format!(
                "key is for {}, wallet is on {}",
                decoded.network.display_name(),
                self.config.network.display_name()
            )));
        }
        self.keys.push(WalletKey { kind, key: decoded.key });
        Ok(self.keys.len() - 1)
    }

    fn add_generated_key<R: RngCore + CryptoRng>(
        &mut self,
        kind: KeyKind,
        rng: &mut R,
    ) -> wallet_core::Result<usize> {
        let key = PrivateKey::generate(rng)?;
        self.keys.push(WalletKey { kind, key });
        Ok(self.keys.len() - 1)
    }

    fn entry(&self, index: usize) -> wallet_core::Result<&WalletKey> {
        self.keys
            .get(index)
            .ok_or_else(|| Error::InvalidOperand(format!("no key at index {}", index)))
    }

    fn exported_wif(&self, index: usize) -> wallet_core::Result<String> {
        let entry = self.entry(index)?;
        Ok(wif::encode_with_kind(&entry.key, self.config.network, entry.kind))
    }

    fn key_address(&self, index: usize) -> wallet_core::Result<String> {
        let entry = self.entry(index)?;
        let public_key = entry.key.public_key();
        match entry.kind {
            KeyKind::P2wpkh => p2wpkh_address(public_key, self.config.network),
            KeyKind::P2tr => p2tr_address(public_key, self.config.network),
        }
    }

    fn spend_request(
        &self,
        utxos: Vec<UtxoInfo>,
        destination: &str,
        amount: u64,
        fee: u64,
        change_index: usize,
    ) -> wallet_core::Result<SpendRequest> {
        let inputs = utxos
            .into_iter()
            .map(|utxo| -> wallet_core::Result<SpendableOutput> {
                let txid = hash_from_display_hex(&utxo.txid)
                    .ok_or_else(|| Error::MalformedInput(format!("invalid txid: {}", utxo.txid)))?;
                Ok(SpendableOutput {
                    outpoint: OutPoint::new(txid, utxo.vout),
                    value: utxo.value,
                    script_pubkey: self.entry(utxo.key_index)?.script_pubkey(),
                    key_index: utxo.key_index,
                })
            })
            .collect::<wallet_core::Result<Vec<_>>>()?;

        Ok(SpendRequest {
            inputs,
            destination: self.config.script_for_address(destination)?,
            amount,
            fee,
            change_script: self.entry(change_index)?.script_pubkey(),
        })
    }

    fn sign_request<R: RngCore + CryptoRng>(
        &self,
        request: &SpendRequest,
        rng: &mut R,
    ) -> wallet_core::Result<SignedTransaction> {
        let keys: Vec<PrivateKey> = self.keys.iter().map(|k| k.key.clone()).collect();
        create_signed_transaction(&self.config, request, &keys, rng)
    }

    fn psbt_hex(&self, request: &SpendRequest) -> wallet_core::Result<String> {
        let psbt = create_psbt(&self.config, request)?;
        Ok(hex::encode(psbt.serialize()))
    }
}

fn utxo_list(utxos: JsValue) -> Result<Vec<UtxoInfo>, JsValue> {
    serde_wasm_bindgen::from_value(utxos)
        .map_err(|e| JsValue::from_str(&format!("Invalid UTXO list: {}", e)))
}

/// Check an address against a network. Only an unknown network name throws.
#[wasm_bindgen]
pub fn is_valid_address(address: &str, network: &str) -> Result<bool, JsValue> {
    let network: Network = network.parse().map_err(js_error)?;
    Ok(address_is_valid(address, network))
}

fn address_is_valid(address: &str, network: Network) -> bool {
    validate_address(address, network).is_ok()
}

/// Parse raw transaction hex into a display model.
#[wasm_bindgen]
pub fn parse_transaction(tx_hex: &str, network: &str) -> Result<JsValue, JsValue> {
    let network: Network = network.parse().map_err(js_error)?;
    let bytes = hex::decode(tx_hex.trim()).map_err(|_| JsValue::from_str("Invalid transaction hex"))?;
    let tx = Transaction::parse(&bytes).map_err(js_error)?;
    TransactionInfo::from_transaction(&tx, network).to_js()
}

/// Satoshis to an eight-decimal BTC string.
#[wasm_bindgen]
pub fn format_btc(sats: u64) -> String {
    wallet_core::format_btc(sats)
}

/// BTC string to satoshis.
#[wasm_bindgen]
pub fn parse_btc(text: &str) -> Result<u64, JsValue> {
    wallet_core::parse_btc(text).map_err(js_error)
}
