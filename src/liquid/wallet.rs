use async_trait::async_trait;
use elements::Txid;
use elements::bitcoin::secp256k1::{PublicKey, SecretKey};

use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value_sat: u64,
}

/// On-chain wallet capability. Production wallets and test doubles both
/// satisfy this; the engine never sees a concrete wallet type.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn balance(&self) -> Result<u64, WalletError>;

    async fn pubkey(&self) -> Result<PublicKey, WalletError>;

    async fn privkey(&self) -> Result<SecretKey, WalletError>;

    /// Select utxos covering `amount_sat`, returning the selection and the
    /// change left over. Implementations must serialize selection against
    /// concurrent spends of the same coins.
    async fn select_utxos(&self, amount_sat: u64) -> Result<(Vec<Utxo>, u64), WalletError>;
}
