use crate::swap::SwapState;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("swap already exists: {0}")]
    Duplicate(String),
    #[error("swap not found: {0}")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("insufficient funds: need {needed_sat} sat, have {available_sat} sat")]
    InsufficientFunds { needed_sat: u64, available_sat: u64 },
    #[error("wallet key unavailable: {0}")]
    KeyUnavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),
    #[error("chain backend unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LightningError {
    #[error("invoice creation failed: {0}")]
    InvoiceCreate(String),
    #[error("invoice decode failed: {0}")]
    Decode(String),
    #[error("payment failed: {0}")]
    PaymentFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("message sender {got} does not match recorded peer {want}")]
    Mismatch { want: String, got: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("swap {id} in state {state:?} cannot {action}")]
    InvalidState {
        id: String,
        state: SwapState,
        action: String,
    },
    #[error("contract mismatch: {0}")]
    ContractMismatch(String),
    #[error("invoice asks for {invoice_msat} msat, agreed maximum is {max_msat} msat")]
    InvoiceOverpay { invoice_msat: u64, max_msat: u64 },
    #[error("bad message: {0}")]
    BadMessage(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Lightning(#[from] LightningError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
