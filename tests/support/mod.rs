#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use bitcoin::hashes::{Hash as _, sha256};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use elements::confidential::{Asset, Nonce, Value};
use elements::script::Script;
use elements::{
    AddressParams, AssetId, LockTime, OutPoint, Sequence, Transaction, TxIn, TxInWitness, TxOut,
    TxOutWitness, Txid, encode,
};
use lightning_invoice::{Currency, InvoiceBuilder, PaymentSecret};
use liquid_peer_swap::error::{ChainError, LightningError, PeerError, WalletError};
use liquid_peer_swap::lightning::{LightningClient, Preimage};
use liquid_peer_swap::liquid::chain::BlockchainService;
use liquid_peer_swap::liquid::wallet::{Utxo, Wallet};
use liquid_peer_swap::swap::messages::PeerMessage;
use liquid_peer_swap::swap::peer::PeerCommunicator;
use liquid_peer_swap::swap::service::{SwapConfig, SwapService};
use liquid_peer_swap::swap::store::SqliteStore;

pub fn test_asset() -> AssetId {
    AssetId::from_slice(&[0x11; 32]).expect("valid asset id")
}

pub fn test_secret(seed: u8) -> SecretKey {
    SecretKey::from_slice(&[seed; 32]).expect("valid secret key")
}

pub fn test_pubkey(seed: u8) -> PublicKey {
    PublicKey::from_secret_key(&Secp256k1::new(), &test_secret(seed))
}

pub fn pubkey_hex(seed: u8) -> String {
    hex::encode(test_pubkey(seed).serialize())
}

pub fn sha256_bytes(bytes: &[u8]) -> [u8; 32] {
    sha256::Hash::hash(bytes).to_byte_array()
}

pub struct MockWallet {
    secret: SecretKey,
    utxos: Mutex<Vec<Utxo>>,
}

impl MockWallet {
    pub fn new(seed: u8) -> Self {
        Self {
            secret: test_secret(seed),
            utxos: Mutex::new(Vec::new()),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(&Secp256k1::new(), &self.secret)
    }

    pub fn add_utxo(&self, txid: Txid, vout: u32, value_sat: u64) {
        self.utxos.lock().unwrap().push(Utxo {
            txid,
            vout,
            value_sat,
        });
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn balance(&self) -> Result<u64, WalletError> {
        Ok(self.utxos.lock().unwrap().iter().map(|u| u.value_sat).sum())
    }

    async fn pubkey(&self) -> Result<PublicKey, WalletError> {
        Ok(self.public_key())
    }

    async fn privkey(&self) -> Result<SecretKey, WalletError> {
        Ok(self.secret)
    }

    async fn select_utxos(&self, amount_sat: u64) -> Result<(Vec<Utxo>, u64), WalletError> {
        let mut utxos = self.utxos.lock().unwrap();
        let mut selected = Vec::new();
        let mut total = 0u64;
        while total < amount_sat {
            let Some(utxo) = utxos.pop() else {
                return Err(WalletError::InsufficientFunds {
                    needed_sat: amount_sat,
                    available_sat: total,
                });
            };
            total += utxo.value_sat;
            selected.push(utxo);
        }
        Ok((selected, total - amount_sat))
    }
}

pub struct MockChain {
    height: Mutex<u32>,
    txs: Mutex<HashMap<String, String>>,
    confs: Mutex<HashMap<String, u32>>,
    broadcasts: Mutex<Vec<String>>,
}

impl MockChain {
    pub fn new(height: u32) -> Self {
        Self {
            height: Mutex::new(height),
            txs: Mutex::new(HashMap::new()),
            confs: Mutex::new(HashMap::new()),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_height(&self, height: u32) {
        *self.height.lock().unwrap() = height;
    }

    pub fn insert_tx(&self, tx: &Transaction) -> Txid {
        let txid = tx.txid();
        self.txs
            .lock()
            .unwrap()
            .insert(txid.to_string(), encode::serialize_hex(tx));
        txid
    }

    pub fn get_tx(&self, txid: &str) -> Option<Transaction> {
        let hex_tx = self.txs.lock().unwrap().get(txid).cloned()?;
        let bytes = hex::decode(hex_tx).ok()?;
        encode::deserialize(&bytes).ok()
    }

    pub fn set_confirmations(&self, txid: &str, confs: u32) {
        self.confs.lock().unwrap().insert(txid.to_string(), confs);
    }

    pub fn tamper_tx(&self, txid: &str, tamper: impl FnOnce(&mut Transaction)) {
        let mut tx = self.get_tx(txid).expect("tx to tamper with");
        tamper(&mut tx);
        self.txs
            .lock()
            .unwrap()
            .insert(txid.to_string(), encode::serialize_hex(&tx));
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlockchainService for MockChain {
    async fn block_height(&self) -> Result<u32, ChainError> {
        Ok(*self.height.lock().unwrap())
    }

    async fn broadcast(&self, tx_hex: &str) -> Result<String, ChainError> {
        let bytes = hex::decode(tx_hex)
            .map_err(|e| ChainError::BroadcastRejected(format!("bad hex: {e}")))?;
        let tx: Transaction = encode::deserialize(&bytes)
            .map_err(|e| ChainError::BroadcastRejected(format!("bad tx: {e}")))?;
        let txid = tx.txid().to_string();
        self.txs
            .lock()
            .unwrap()
            .insert(txid.clone(), tx_hex.to_string());
        self.broadcasts.lock().unwrap().push(txid.clone());
        Ok(txid)
    }

    async fn fetch_tx_hex(&self, txid: &str) -> Result<String, ChainError> {
        self.txs
            .lock()
            .unwrap()
            .get(txid)
            .cloned()
            .ok_or_else(|| ChainError::Unreachable(format!("unknown txid {txid}")))
    }

    async fn tx_confirmations(&self, txid: &str) -> Result<Option<u32>, ChainError> {
        Ok(self.confs.lock().unwrap().get(txid).copied())
    }
}

/// One instance stands in for the Lightning network between both nodes:
/// invoices created by the maker are payable by the taker.
pub struct MockLightning {
    node_secret: SecretKey,
    invoices: Mutex<HashMap<String, Preimage>>,
    paid: Mutex<Vec<String>>,
}

impl MockLightning {
    pub fn new() -> Self {
        Self {
            node_secret: test_secret(99),
            invoices: Mutex::new(HashMap::new()),
            paid: Mutex::new(Vec::new()),
        }
    }

    pub fn make_invoice(&self, amount_msat: u64, payment_hash: [u8; 32]) -> String {
        let secp = Secp256k1::new();
        InvoiceBuilder::new(Currency::Regtest)
            .description("swap".to_string())
            .payment_hash(sha256::Hash::from_byte_array(payment_hash))
            .payment_secret(PaymentSecret([0x42; 32]))
            .amount_milli_satoshis(amount_msat)
            .current_timestamp()
            .min_final_cltv_expiry_delta(18)
            .build_signed(|hash| secp.sign_ecdsa_recoverable(hash, &self.node_secret))
            .expect("build invoice")
            .to_string()
    }

    pub fn paid_invoices(&self) -> Vec<String> {
        self.paid.lock().unwrap().clone()
    }
}

#[async_trait]
impl LightningClient for MockLightning {
    async fn get_payreq(
        &self,
        amount_msat: u64,
        preimage: &Preimage,
        _label: &str,
    ) -> Result<String, LightningError> {
        let payreq = self.make_invoice(amount_msat, preimage.hash());
        self.invoices.lock().unwrap().insert(payreq.clone(), *preimage);
        Ok(payreq)
    }

    async fn pay_invoice(&self, payreq: &str) -> Result<Preimage, LightningError> {
        let preimage = self
            .invoices
            .lock()
            .unwrap()
            .get(payreq)
            .copied()
            .ok_or_else(|| LightningError::PaymentFailed("unknown invoice".to_string()))?;
        self.paid.lock().unwrap().push(payreq.to_string());
        Ok(preimage)
    }
}

#[derive(Default)]
pub struct MockPeers {
    outbox: Mutex<Vec<(String, PeerMessage)>>,
}

impl MockPeers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<(String, PeerMessage)> {
        std::mem::take(&mut self.outbox.lock().unwrap())
    }
}

#[async_trait]
impl PeerCommunicator for MockPeers {
    async fn send_message(
        &self,
        peer_node_id: &str,
        message: PeerMessage,
    ) -> Result<(), PeerError> {
        self.outbox
            .lock()
            .unwrap()
            .push((peer_node_id.to_string(), message));
        Ok(())
    }

    async fn list_peers(&self) -> Result<Vec<String>, PeerError> {
        let mut peers: Vec<String> = self
            .outbox
            .lock()
            .unwrap()
            .iter()
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.dedup();
        Ok(peers)
    }
}

pub struct TestNode {
    pub service: Arc<SwapService>,
    pub wallet: Arc<MockWallet>,
    pub peers: Arc<MockPeers>,
    pub store_path: PathBuf,
    _dir: Option<tempfile::TempDir>,
}

pub fn new_node(
    chain: Arc<MockChain>,
    lightning: Arc<MockLightning>,
    seed: u8,
) -> Result<TestNode> {
    let dir = tempfile::tempdir().context("create tempdir")?;
    let store_path = dir.path().join("swaps.sqlite3");
    let node = node_at(chain, lightning, seed, store_path)?;
    Ok(TestNode {
        _dir: Some(dir),
        ..node
    })
}

/// Reopen a node over an existing store, as after a process restart.
pub fn node_at(
    chain: Arc<MockChain>,
    lightning: Arc<MockLightning>,
    seed: u8,
    store_path: PathBuf,
) -> Result<TestNode> {
    let store = Arc::new(Mutex::new(SqliteStore::open(store_path.clone())?));
    let wallet = Arc::new(MockWallet::new(seed));
    let peers = Arc::new(MockPeers::new());
    let cfg = SwapConfig::new(&AddressParams::ELEMENTS, test_asset());
    let service = Arc::new(SwapService::new(
        cfg,
        store,
        wallet.clone(),
        chain,
        lightning,
        peers.clone(),
    ));
    Ok(TestNode {
        service,
        wallet,
        peers,
        store_path,
        _dir: None,
    })
}

/// Seed the chain with a coin the wallet can spend.
pub fn fund_wallet(chain: &MockChain, wallet: &MockWallet, value_sat: u64) -> Txid {
    let script_pubkey = elements::Address::p2wpkh(
        &bitcoin::PublicKey::new(wallet.public_key()),
        None,
        &AddressParams::ELEMENTS,
    )
    .script_pubkey();

    let funding = Transaction {
        version: 2,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: Txid::from_slice(&[0x09; 32]).expect("valid txid"),
                vout: 0,
            },
            is_pegin: false,
            script_sig: Script::new(),
            sequence: Sequence::MAX,
            asset_issuance: Default::default(),
            witness: TxInWitness::default(),
        }],
        output: vec![TxOut {
            asset: Asset::Explicit(test_asset()),
            value: Value::Explicit(value_sat),
            nonce: Nonce::Null,
            script_pubkey,
            witness: TxOutWitness::default(),
        }],
    };

    let txid = chain.insert_tx(&funding);
    wallet.add_utxo(txid, 0, value_sat);
    txid
}
