pub mod invoice;

use async_trait::async_trait;
use bitcoin::hashes::{Hash as _, sha256};
use rand::RngCore as _;

use crate::error::LightningError;

/// 32-byte secret whose SHA-256 is the swap's payment hash. Revealed to the
/// payer when the Lightning payment settles.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Preimage(pub [u8; 32]);

impl Preimage {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn hash(&self) -> [u8; 32] {
        sha256::Hash::hash(&self.0).to_byte_array()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, LightningError> {
        let bytes = hex::decode(s).map_err(|e| LightningError::Decode(format!("preimage hex: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LightningError::Decode("preimage must be 32 bytes".to_string()))?;
        Ok(Self(bytes))
    }
}

// Debug must not leak the secret into logs.
impl std::fmt::Debug for Preimage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Preimage(..)")
    }
}

#[derive(Debug, Clone)]
pub struct DecodedInvoice {
    pub payment_hash: [u8; 32],
    pub amount_msat: Option<u64>,
}

#[async_trait]
pub trait LightningClient: Send + Sync {
    /// Create an invoice for `amount_msat` whose payment hash commits to
    /// `preimage`.
    async fn get_payreq(
        &self,
        amount_msat: u64,
        preimage: &Preimage,
        label: &str,
    ) -> Result<String, LightningError>;

    /// Pay `payreq` and return the revealed preimage.
    async fn pay_invoice(&self, payreq: &str) -> Result<Preimage, LightningError>;

    /// Decode a BOLT11 invoice. The default parses locally; verification
    /// paths rely on this never being delegated to the counterparty.
    fn decode_payreq(&self, payreq: &str) -> Result<DecodedInvoice, LightningError> {
        invoice::decode_bolt11(payreq)
    }
}
