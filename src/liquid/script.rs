use elements::bitcoin::hashes::{Hash as _, sha256};
use elements::bitcoin::secp256k1::PublicKey;
use elements::script::{Builder, Script};
use elements::{Address, AddressParams, opcodes};

use crate::error::ProtocolError;

/// Terms of the on-chain half of a swap. The redeem script derived from
/// these four values is part of the wire compatibility surface: both peers
/// must produce identical bytes from the same terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapScript {
    pub taker_pubkey: PublicKey,
    pub maker_pubkey: PublicKey,
    pub payment_hash: [u8; 32],
    pub cltv_expiry: u32,
}

impl SwapScript {
    /// Two spend paths, selected by the size of the top witness item:
    /// a 32-byte preimage takes the hash branch (taker key, immediate),
    /// an empty push takes the timeout branch (maker key, after
    /// `cltv_expiry`). A signature is only ever checked against the key
    /// of its own branch.
    pub fn redeem_script(&self) -> Script {
        Builder::new()
            .push_opcode(opcodes::all::OP_SIZE)
            .push_int(32)
            .push_opcode(opcodes::all::OP_EQUAL)
            .push_opcode(opcodes::all::OP_IF)
            .push_opcode(opcodes::all::OP_SHA256)
            .push_slice(&self.payment_hash)
            .push_opcode(opcodes::all::OP_EQUALVERIFY)
            .push_slice(&self.taker_pubkey.serialize())
            .push_opcode(opcodes::all::OP_CHECKSIG)
            .push_opcode(opcodes::all::OP_ELSE)
            .push_opcode(opcodes::all::OP_DROP)
            .push_int(self.cltv_expiry as i64)
            .push_opcode(opcodes::all::OP_CLTV)
            .push_opcode(opcodes::all::OP_DROP)
            .push_slice(&self.maker_pubkey.serialize())
            .push_opcode(opcodes::all::OP_CHECKSIG)
            .push_opcode(opcodes::all::OP_ENDIF)
            .into_script()
    }

    /// The scriptPubKey of the opening output (v0 P2WSH).
    pub fn witness_program(&self) -> Script {
        let script_hash = sha256::Hash::hash(self.redeem_script().as_bytes());
        Builder::new()
            .push_int(0)
            .push_slice(&script_hash.to_byte_array())
            .into_script()
    }

    pub fn p2wsh_address(&self, params: &'static AddressParams) -> Address {
        Address::p2wsh(&self.redeem_script(), None, params)
    }

    /// Inverse of `redeem_script`. Rejects anything that is not exactly
    /// the canonical encoding above.
    pub fn parse(redeem_script: &Script) -> Result<Self, ProtocolError> {
        use elements::script::Instruction;

        fn next_instruction<'a>(
            iter: &mut impl Iterator<
                Item = std::result::Result<Instruction<'a>, elements::script::Error>,
            >,
        ) -> Result<Instruction<'a>, ProtocolError> {
            iter.next()
                .transpose()
                .map_err(|e| {
                    ProtocolError::ContractMismatch(format!("decode script instruction: {e:?}"))
                })?
                .ok_or_else(|| {
                    ProtocolError::ContractMismatch("unexpected end of redeem script".to_string())
                })
        }

        fn expect_op(actual: Instruction<'_>, expected: opcodes::All) -> Result<(), ProtocolError> {
            match actual {
                Instruction::Op(op) if op == expected => Ok(()),
                other => Err(ProtocolError::ContractMismatch(format!(
                    "unexpected instruction: expected {expected:?}, got {other:?}"
                ))),
            }
        }

        fn parse_script_num(actual: Instruction<'_>) -> Result<i64, ProtocolError> {
            match actual {
                Instruction::PushBytes(bytes) => decode_script_num(bytes),
                Instruction::Op(op) => {
                    let code = op.into_u8();
                    if code == opcodes::all::OP_PUSHNUM_NEG1.into_u8() {
                        return Ok(-1);
                    }

                    let one = opcodes::all::OP_PUSHNUM_1.into_u8();
                    let sixteen = opcodes::all::OP_PUSHNUM_16.into_u8();
                    if (one..=sixteen).contains(&code) {
                        return Ok((code - one + 1) as i64);
                    }

                    Err(ProtocolError::ContractMismatch(format!(
                        "unexpected opcode where script number expected: {op:?}"
                    )))
                }
            }
        }

        fn decode_script_num(bytes: &[u8]) -> Result<i64, ProtocolError> {
            if bytes.is_empty() {
                return Ok(0);
            }
            if bytes.len() > 8 {
                return Err(ProtocolError::ContractMismatch(format!(
                    "script number too large: {} bytes",
                    bytes.len()
                )));
            }

            let mut magnitude = bytes.to_vec();
            let negative = magnitude.last().is_some_and(|b| (b & 0x80) != 0);
            if let Some(last) = magnitude.last_mut() {
                *last &= 0x7f;
            }

            let mut value: i64 = 0;
            for (i, b) in magnitude.iter().enumerate() {
                value |= (*b as i64) << (8 * i);
            }

            Ok(if negative { -value } else { value })
        }

        fn expect_push<const N: usize>(actual: Instruction<'_>) -> Result<[u8; N], ProtocolError> {
            match actual {
                Instruction::PushBytes(bytes) if bytes.len() == N => {
                    let mut out = [0u8; N];
                    out.copy_from_slice(bytes);
                    Ok(out)
                }
                other => Err(ProtocolError::ContractMismatch(format!(
                    "unexpected instruction: expected push of {N} bytes, got {other:?}"
                ))),
            }
        }

        fn expect_pubkey(actual: Instruction<'_>) -> Result<PublicKey, ProtocolError> {
            let bytes = expect_push::<33>(actual)?;
            PublicKey::from_slice(&bytes)
                .map_err(|e| ProtocolError::ContractMismatch(format!("invalid pubkey: {e}")))
        }

        let mut iter = redeem_script.instructions_minimal();

        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_SIZE)?;
        let size = parse_script_num(next_instruction(&mut iter)?)?;
        if size != 32 {
            return Err(ProtocolError::ContractMismatch(format!(
                "unexpected preimage size check: {size}"
            )));
        }
        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_EQUAL)?;
        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_IF)?;

        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_SHA256)?;
        let payment_hash = expect_push::<32>(next_instruction(&mut iter)?)?;
        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_EQUALVERIFY)?;
        let taker_pubkey = expect_pubkey(next_instruction(&mut iter)?)?;
        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_CHECKSIG)?;

        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_ELSE)?;
        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_DROP)?;
        let cltv_expiry = parse_script_num(next_instruction(&mut iter)?)?;
        if cltv_expiry < 0 || cltv_expiry > u32::MAX as i64 {
            return Err(ProtocolError::ContractMismatch(format!(
                "cltv_expiry out of range: {cltv_expiry}"
            )));
        }
        let cltv_expiry = cltv_expiry as u32;
        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_CLTV)?;
        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_DROP)?;
        let maker_pubkey = expect_pubkey(next_instruction(&mut iter)?)?;
        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_CHECKSIG)?;
        expect_op(next_instruction(&mut iter)?, opcodes::all::OP_ENDIF)?;

        if iter.next().is_some() {
            return Err(ProtocolError::ContractMismatch(
                "unexpected trailing instructions in redeem script".to_string(),
            ));
        }

        Ok(Self {
            taker_pubkey,
            maker_pubkey,
            payment_hash,
            cltv_expiry,
        })
    }
}
