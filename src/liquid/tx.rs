use elements::bitcoin::hashes::{Hash as _, hash160};
use elements::bitcoin::secp256k1::ecdsa::Signature;
use elements::bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use elements::confidential::{Asset, Nonce, Value};
use elements::pset::PartiallySignedTransaction;
use elements::script::{Builder, Script};
use elements::sighash::SighashCache;
use elements::{
    AssetId, EcdsaSighashType, LockTime, OutPoint, Sequence, Transaction, TxIn, TxInWitness,
    TxOut, TxOutWitness, Txid, opcodes,
};

use crate::error::ProtocolError;
use crate::lightning::Preimage;
use crate::liquid::script::SwapScript;
use crate::liquid::wallet::Utxo;

pub fn p2pkh_script(pubkey: &PublicKey) -> Script {
    let pkh = hash160::Hash::hash(&pubkey.serialize());
    Builder::new()
        .push_opcode(opcodes::all::OP_DUP)
        .push_opcode(opcodes::all::OP_HASH160)
        .push_slice(&pkh.to_byte_array())
        .push_opcode(opcodes::all::OP_EQUALVERIFY)
        .push_opcode(opcodes::all::OP_CHECKSIG)
        .into_script()
}

pub fn tx_inputs_from_utxos(utxos: &[Utxo]) -> Vec<TxIn> {
    utxos
        .iter()
        .map(|utxo| TxIn {
            previous_output: OutPoint {
                txid: utxo.txid,
                vout: utxo.vout,
            },
            is_pegin: false,
            script_sig: Script::new(),
            sequence: Sequence::MAX,
            asset_issuance: Default::default(),
            witness: TxInWitness::default(),
        })
        .collect()
}

/// Opening transaction: output 0 is the swap contract, followed by the
/// maker's change (omitted when the selection is exact) and the explicit
/// fee output.
pub fn build_opening_tx(
    inputs: Vec<TxIn>,
    script: &SwapScript,
    amount_sat: u64,
    change_sat: u64,
    maker_pubkey: &PublicKey,
    asset: AssetId,
    fee_sat: u64,
) -> Transaction {
    let mut output = vec![TxOut {
        asset: Asset::Explicit(asset),
        value: Value::Explicit(amount_sat),
        nonce: Nonce::Null,
        script_pubkey: script.witness_program(),
        witness: TxOutWitness::default(),
    }];

    if change_sat > 0 {
        output.push(TxOut {
            asset: Asset::Explicit(asset),
            value: Value::Explicit(change_sat),
            nonce: Nonce::Null,
            script_pubkey: p2pkh_script(maker_pubkey),
            witness: TxOutWitness::default(),
        });
    }

    output.push(TxOut::new_fee(fee_sat, asset));

    Transaction {
        version: 2,
        lock_time: LockTime::ZERO,
        input: inputs,
        output,
    }
}

/// Witness for input 0 of the opening transaction, spending a P2WPKH
/// output of the maker key. The spent value is read from the non-witness
/// ancestor fetched from the chain.
pub fn sign_opening_input(
    unsigned: &Transaction,
    ancestor: &Transaction,
    maker_privkey: &SecretKey,
) -> Result<Vec<Vec<u8>>, ProtocolError> {
    let prev = unsigned
        .input
        .first()
        .ok_or_else(|| ProtocolError::ContractMismatch("opening tx has no inputs".to_string()))?
        .previous_output;
    if ancestor.txid() != prev.txid {
        return Err(ProtocolError::ContractMismatch(format!(
            "ancestor txid {} does not match spent outpoint {}",
            ancestor.txid(),
            prev.txid
        )));
    }
    let spent = ancestor.output.get(prev.vout as usize).ok_or_else(|| {
        ProtocolError::ContractMismatch(format!("ancestor has no output {}", prev.vout))
    })?;
    let Value::Explicit(spent_sat) = spent.value else {
        return Err(ProtocolError::ContractMismatch(
            "spent output value is not explicit".to_string(),
        ));
    };

    let secp = Secp256k1::new();
    let maker_pubkey = PublicKey::from_secret_key(&secp, maker_privkey);
    // BIP143 script code for a P2WPKH spend is the P2PKH script of the key.
    let script_code = p2pkh_script(&maker_pubkey);

    let mut cache = SighashCache::new(unsigned);
    let sig = segwit_v0_sign(
        &secp,
        &mut cache,
        0,
        &script_code,
        spent_sat,
        maker_privkey,
        EcdsaSighashType::All,
    )?;

    Ok(vec![sig, maker_pubkey.serialize().to_vec()])
}

/// Attach the ancestor and the final witness to a pset wrapping the
/// unsigned opening transaction, then extract the broadcastable tx.
pub fn finalize_opening_tx(
    unsigned: Transaction,
    ancestor: Transaction,
    witness: Vec<Vec<u8>>,
) -> Result<Transaction, ProtocolError> {
    let mut pset = PartiallySignedTransaction::from_tx(unsigned);
    {
        let input = &mut pset.inputs_mut()[0];
        input.non_witness_utxo = Some(ancestor);
        input.final_script_witness = Some(witness);
    }
    pset.extract_tx()
        .map_err(|e| ProtocolError::ContractMismatch(format!("extract opening tx: {e}")))
}

/// Taker-side check that a received opening transaction matches the agreed
/// terms: output 0 must carry the contract's witness program and exactly
/// the swap amount.
pub fn verify_opening_tx(
    tx: &Transaction,
    script: &SwapScript,
    amount_sat: u64,
) -> Result<(), ProtocolError> {
    let htlc_out = tx.output.first().ok_or_else(|| {
        ProtocolError::ContractMismatch("opening tx has no outputs".to_string())
    })?;

    if htlc_out.script_pubkey != script.witness_program() {
        return Err(ProtocolError::ContractMismatch(
            "opening output script does not match agreed contract".to_string(),
        ));
    }
    if htlc_out.value != Value::Explicit(amount_sat) {
        return Err(ProtocolError::ContractMismatch(format!(
            "opening output value {:?} does not match agreed amount {amount_sat}",
            htlc_out.value
        )));
    }
    Ok(())
}

/// Spend the contract output via the preimage path, paying the taker.
pub fn claim_tx(
    script: &SwapScript,
    opening_txid: Txid,
    htlc_value_sat: u64,
    taker_privkey: &SecretKey,
    preimage: &Preimage,
    asset: AssetId,
    fee_sat: u64,
) -> Result<Transaction, ProtocolError> {
    if fee_sat >= htlc_value_sat {
        return Err(ProtocolError::ContractMismatch(format!(
            "contract value {htlc_value_sat} does not cover fee {fee_sat}"
        )));
    }

    let redeem_script = script.redeem_script();
    let secp = Secp256k1::new();
    let taker_pubkey = PublicKey::from_secret_key(&secp, taker_privkey);

    let mut tx = Transaction {
        version: 2,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: opening_txid,
                vout: 0,
            },
            is_pegin: false,
            script_sig: Script::new(),
            sequence: Sequence::MAX,
            asset_issuance: Default::default(),
            witness: TxInWitness::default(),
        }],
        output: vec![
            TxOut {
                asset: Asset::Explicit(asset),
                value: Value::Explicit(htlc_value_sat - fee_sat),
                nonce: Nonce::Null,
                script_pubkey: p2pkh_script(&taker_pubkey),
                witness: TxOutWitness::default(),
            },
            TxOut::new_fee(fee_sat, asset),
        ],
    };

    let mut cache = SighashCache::new(&tx);
    let sig = segwit_v0_sign(
        &secp,
        &mut cache,
        0,
        &redeem_script,
        htlc_value_sat,
        taker_privkey,
        EcdsaSighashType::All,
    )?;

    // Preimage on top of the stack selects the hash branch.
    tx.input[0].witness.script_witness =
        vec![sig, preimage.0.to_vec(), redeem_script.to_bytes()];

    Ok(tx)
}

/// Spend the contract output via the timeout path, paying the maker.
/// Only valid once the chain reaches `cltv_expiry`.
pub fn refund_tx(
    script: &SwapScript,
    opening_txid: Txid,
    htlc_value_sat: u64,
    maker_privkey: &SecretKey,
    asset: AssetId,
    fee_sat: u64,
) -> Result<Transaction, ProtocolError> {
    if fee_sat >= htlc_value_sat {
        return Err(ProtocolError::ContractMismatch(format!(
            "contract value {htlc_value_sat} does not cover fee {fee_sat}"
        )));
    }

    let redeem_script = script.redeem_script();
    let secp = Secp256k1::new();
    let maker_pubkey = PublicKey::from_secret_key(&secp, maker_privkey);

    let mut tx = Transaction {
        version: 2,
        lock_time: LockTime::from_height(script.cltv_expiry)
            .map_err(|e| ProtocolError::ContractMismatch(format!("invalid cltv_expiry: {e}")))?,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: opening_txid,
                vout: 0,
            },
            is_pegin: false,
            script_sig: Script::new(),
            sequence: Sequence::ENABLE_LOCKTIME_NO_RBF,
            asset_issuance: Default::default(),
            witness: TxInWitness::default(),
        }],
        output: vec![
            TxOut {
                asset: Asset::Explicit(asset),
                value: Value::Explicit(htlc_value_sat - fee_sat),
                nonce: Nonce::Null,
                script_pubkey: p2pkh_script(&maker_pubkey),
                witness: TxOutWitness::default(),
            },
            TxOut::new_fee(fee_sat, asset),
        ],
    };

    let mut cache = SighashCache::new(&tx);
    let sig = segwit_v0_sign(
        &secp,
        &mut cache,
        0,
        &redeem_script,
        htlc_value_sat,
        maker_privkey,
        EcdsaSighashType::All,
    )?;

    // Empty push selects the timeout branch.
    tx.input[0].witness.script_witness = vec![sig, vec![], redeem_script.to_bytes()];

    Ok(tx)
}

fn segwit_v0_sign(
    secp: &Secp256k1<All>,
    cache: &mut SighashCache<&Transaction>,
    input_index: usize,
    script_code: &Script,
    value_sat: u64,
    secret_key: &SecretKey,
    sighash_type: EcdsaSighashType,
) -> Result<Vec<u8>, ProtocolError> {
    let sighash = cache.segwitv0_sighash(
        input_index,
        script_code,
        Value::Explicit(value_sat),
        sighash_type,
    );

    let msg = Message::from_digest_slice(&sighash.to_byte_array())
        .map_err(|e| ProtocolError::ContractMismatch(format!("create sighash message: {e}")))?;
    let sig: Signature = secp.sign_ecdsa(&msg, secret_key);
    let mut sig_bytes = sig.serialize_der().to_vec();
    sig_bytes.push(sighash_type.as_u32() as u8);
    Ok(sig_bytes)
}
