//! Length-delimited wire records exchanged between swap peers.

use prost::Message as _;

use crate::error::ProtocolError;
use crate::swap::SwapType;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SwapRequest {
    #[prost(string, tag = "1")]
    pub swap_id: String,
    #[prost(string, tag = "2")]
    pub channel_id: String,
    #[prost(uint64, tag = "3")]
    pub amount_sat: u64,
    #[prost(enumeration = "WireSwapType", tag = "4")]
    pub swap_type: i32,
    /// Compressed pubkey hex; empty for swap-in requests, where the
    /// responder takes the taker role.
    #[prost(string, tag = "5")]
    pub taker_pubkey_hash: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MakerResponse {
    #[prost(string, tag = "1")]
    pub swap_id: String,
    #[prost(string, tag = "2")]
    pub maker_pubkey_hash: String,
    #[prost(string, tag = "3")]
    pub invoice: String,
    #[prost(string, tag = "4")]
    pub tx_id: String,
    /// Absolute refund height the maker built the contract with; the
    /// taker recomputes its own and tolerates a small skew.
    #[prost(uint32, tag = "5")]
    pub cltv_expiry: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ::prost::Enumeration)]
#[repr(i32)]
pub enum WireSwapType {
    Unspecified = 0,
    SwapIn = 1,
    SwapOut = 2,
}

impl From<SwapType> for WireSwapType {
    fn from(value: SwapType) -> Self {
        match value {
            SwapType::SwapIn => WireSwapType::SwapIn,
            SwapType::SwapOut => WireSwapType::SwapOut,
        }
    }
}

impl SwapRequest {
    pub fn swap_type_kind(&self) -> Result<SwapType, ProtocolError> {
        match WireSwapType::try_from(self.swap_type) {
            Ok(WireSwapType::SwapIn) => Ok(SwapType::SwapIn),
            Ok(WireSwapType::SwapOut) => Ok(SwapType::SwapOut),
            Ok(WireSwapType::Unspecified) | Err(_) => Err(ProtocolError::BadMessage(format!(
                "invalid swap type: {}",
                self.swap_type
            ))),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(oneof = "PeerMessage", tags = "1, 2")]
    pub payload: Option<PeerMessage>,
}

#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum PeerMessage {
    #[prost(message, tag = "1")]
    SwapRequest(SwapRequest),
    #[prost(message, tag = "2")]
    MakerResponse(MakerResponse),
}

impl PeerMessage {
    pub fn encode_length_delimited(&self) -> Vec<u8> {
        Envelope {
            payload: Some(self.clone()),
        }
        .encode_length_delimited_to_vec()
    }

    pub fn decode_length_delimited(buf: &[u8]) -> Result<Self, ProtocolError> {
        let envelope = Envelope::decode_length_delimited(buf)
            .map_err(|e| ProtocolError::BadMessage(format!("decode envelope: {e}")))?;
        envelope
            .payload
            .ok_or_else(|| ProtocolError::BadMessage("empty envelope".to_string()))
    }
}
