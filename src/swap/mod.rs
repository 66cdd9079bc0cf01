pub mod messages;
pub mod peer;
pub mod service;
pub mod store;
pub mod watch;

use elements::bitcoin::secp256k1::PublicKey;
use rand::RngCore as _;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::liquid::script::SwapScript;

/// Flat per-transaction fee; the opening, claim and refund transactions
/// each pay exactly this.
pub const FIXED_FEE_SAT: u64 = 500;

/// Blocks between the opening tx and the refund path becoming spendable.
pub const LOCKTIME_DELTA: u32 = 100;

/// Allowed skew, in blocks, between the maker's announced cltv_expiry and
/// the one the taker recomputes from its own chain tip.
pub const CLTV_TOLERANCE: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapType {
    SwapIn,
    SwapOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapState {
    Created,
    RequestSent,
    RequestReceived,
    OpeningTxPrepared,
    OpeningTxBroadcasted,
    WaitingForTx,
    ClaimedPreimage,
    RefundedTimeout,
    Aborted,
}

impl SwapState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SwapState::ClaimedPreimage | SwapState::RefundedTimeout | SwapState::Aborted
        )
    }

    /// The transition graph. Any non-terminal state may abort.
    pub fn can_advance_to(self, next: SwapState) -> bool {
        use SwapState::*;

        if next == Aborted {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Created, RequestSent)
                | (RequestSent, WaitingForTx)
                | (RequestReceived, OpeningTxPrepared)
                | (OpeningTxPrepared, OpeningTxBroadcasted)
                | (OpeningTxBroadcasted, RefundedTimeout)
                | (WaitingForTx, ClaimedPreimage)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swap {
    pub id: String,
    pub swap_type: SwapType,
    pub state: SwapState,
    pub peer_node_id: String,
    pub channel_id: String,
    pub amount_sat: u64,

    pub taker_pubkey_hash: Option<String>,
    pub maker_pubkey_hash: Option<String>,
    pub payment_hash: Option<String>,
    pub payreq: Option<String>,
    pub cltv_expiry: Option<u32>,

    pub opening_tx_id: Option<String>,
    pub claim_tx_id: Option<String>,
}

impl Swap {
    pub fn new(swap_type: SwapType, amount_sat: u64, peer_node_id: &str, channel_id: &str) -> Self {
        Self {
            id: new_swap_id(),
            swap_type,
            state: SwapState::Created,
            peer_node_id: peer_node_id.to_string(),
            channel_id: channel_id.to_string(),
            amount_sat,
            taker_pubkey_hash: None,
            maker_pubkey_hash: None,
            payment_hash: None,
            payreq: None,
            cltv_expiry: None,
            opening_tx_id: None,
            claim_tx_id: None,
        }
    }

    /// Rebuild the on-chain contract from the recorded terms. Fails while
    /// the record is still missing any of the four agreed values.
    pub fn contract(&self) -> Result<SwapScript, ProtocolError> {
        let taker_pubkey = parse_pubkey_hex(self.taker_pubkey_hash.as_deref(), "taker_pubkey_hash")?;
        let maker_pubkey = parse_pubkey_hex(self.maker_pubkey_hash.as_deref(), "maker_pubkey_hash")?;
        let payment_hash = parse_hash_hex(self.payment_hash.as_deref())?;
        let cltv_expiry = self.cltv_expiry.ok_or_else(|| {
            ProtocolError::ContractMismatch("swap record is missing cltv_expiry".to_string())
        })?;

        Ok(SwapScript {
            taker_pubkey,
            maker_pubkey,
            payment_hash,
            cltv_expiry,
        })
    }
}

pub fn new_swap_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn parse_pubkey_hex(hex_pubkey: Option<&str>, field: &str) -> Result<PublicKey, ProtocolError> {
    let hex_pubkey = hex_pubkey.ok_or_else(|| {
        ProtocolError::ContractMismatch(format!("swap record is missing {field}"))
    })?;
    let bytes = hex::decode(hex_pubkey)
        .map_err(|e| ProtocolError::ContractMismatch(format!("{field} hex: {e}")))?;
    PublicKey::from_slice(&bytes)
        .map_err(|e| ProtocolError::ContractMismatch(format!("{field}: {e}")))
}

fn parse_hash_hex(hex_hash: Option<&str>) -> Result<[u8; 32], ProtocolError> {
    let hex_hash = hex_hash.ok_or_else(|| {
        ProtocolError::ContractMismatch("swap record is missing payment_hash".to_string())
    })?;
    let bytes = hex::decode(hex_hash)
        .map_err(|e| ProtocolError::ContractMismatch(format!("payment_hash hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| ProtocolError::ContractMismatch("payment_hash must be 32 bytes".to_string()))
}
