use std::str::FromStr as _;
use std::time::{Duration, SystemTime};

use bitcoin::hashes::Hash as _;
use lightning_invoice::Bolt11Invoice;

use super::DecodedInvoice;
use crate::error::LightningError;

pub fn decode_bolt11(payreq: &str) -> Result<DecodedInvoice, LightningError> {
    let invoice = parse_bolt11(payreq)?;
    Ok(DecodedInvoice {
        payment_hash: invoice.payment_hash().to_byte_array(),
        amount_msat: invoice.amount_milli_satoshis(),
    })
}

pub fn payment_hash_from_bolt11(payreq: &str) -> Result<[u8; 32], LightningError> {
    Ok(parse_bolt11(payreq)?.payment_hash().to_byte_array())
}

pub fn amount_msat_from_bolt11(payreq: &str) -> Result<Option<u64>, LightningError> {
    Ok(parse_bolt11(payreq)?.amount_milli_satoshis())
}

pub fn is_expired_bolt11(payreq: &str) -> Result<bool, LightningError> {
    let invoice = parse_bolt11(payreq)?;
    let Some(expires_at) = invoice.expires_at() else {
        return Ok(false);
    };
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0));
    Ok(now >= expires_at)
}

fn parse_bolt11(payreq: &str) -> Result<Bolt11Invoice, LightningError> {
    Bolt11Invoice::from_str(payreq)
        .map_err(|e| LightningError::Decode(format!("parse BOLT11 invoice: {e:?}")))
}
