use async_trait::async_trait;
use elements::TxIn;

use crate::error::ChainError;
use crate::liquid::tx::tx_inputs_from_utxos;
use crate::liquid::wallet::Utxo;

/// Chain backend capability: broadcast, height and tx lookups. All calls
/// may suspend; transient failures surface as `ChainError::Unreachable`
/// and are retried by the implementation, not by the engine.
#[async_trait]
pub trait BlockchainService: Send + Sync {
    async fn block_height(&self) -> Result<u32, ChainError>;

    /// Broadcast a serialized transaction, returning its txid hex.
    async fn broadcast(&self, tx_hex: &str) -> Result<String, ChainError>;

    async fn fetch_tx_hex(&self, txid: &str) -> Result<String, ChainError>;

    /// Confirmations for a txid, `None` while unknown to the chain.
    async fn tx_confirmations(&self, txid: &str) -> Result<Option<u32>, ChainError>;

    fn utxos_to_tx_inputs(&self, utxos: &[Utxo]) -> Vec<TxIn> {
        tx_inputs_from_utxos(utxos)
    }
}
