//! transaction related data

use crate::eth::utils::enveloped;
use ethers_core::{
    types::{
        transaction::eip2930::{AccessList, AccessListItem},
        Address, Bytes, Signature, SignatureError, TxHash, H256, U256,
    },
    utils::{
        keccak256, rlp,
        rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream},
    },
};
use serde::{Deserialize, Serialize};

/// Half the secp256k1 group order, the upper bound for a canonical `s`.
const SECP256K1N_HALF: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b,
    0x20, 0xa0,
];

/// Returns true if `s` is at most half the secp256k1 group order.
///
/// Signatures with a high `s` are valid curve-wise but malleable, so the
/// protocol rejects them.
pub fn is_low_s(s: U256) -> bool {
    s <= U256::from_big_endian(&SECP256K1N_HALF)
}

/// Errors that can occur when decoding a transaction from its wire encoding
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum TransactionDecodeError {
    /// The payload is not canonical RLP
    #[error("malformed rlp: {0}")]
    MalformedRlp(#[from] DecoderError),
    /// The outermost item did not consume the entire input
    #[error("unconsumed bytes after transaction payload")]
    TrailingBytes,
    /// The EIP-2718 type byte is not a known transaction type
    #[error("unsupported transaction type {0:#04x}")]
    UnsupportedType(u8),
    /// The legacy `v` fits neither the unprotected nor the EIP-155 scheme
    #[error("unrecognized signature v value {0}")]
    InvalidSignatureEncoding(u64),
    /// The input was empty
    #[error("empty transaction payload")]
    Empty,
}

/// Extracts the chain id and the canonical recovery id from a legacy `v`.
///
/// `v ∈ {27, 28}` is an unprotected pre-EIP-155 signature, `v > 36` carries
/// a chain id as `v = recovery_id + 35 + 2 * chain_id`. Everything else is
/// rejected.
pub fn extract_chain_id(v: u64) -> Result<(Option<u64>, u8), TransactionDecodeError> {
    match v {
        27 | 28 => Ok((None, (v - 27) as u8)),
        v if v > 36 => {
            let chain_id = (v - 35) / 2;
            Ok((Some(chain_id), (v - 35 - 2 * chain_id) as u8))
        }
        v => Err(TransactionDecodeError::InvalidSignatureEncoding(v)),
    }
}

/// Assembles the legacy `v` from a recovery id and an optional chain id.
pub fn legacy_v(recovery_id: u8, chain_id: Option<u64>) -> u64 {
    match chain_id {
        Some(chain_id) => u64::from(recovery_id) + 35 + 2 * chain_id,
        None => u64::from(recovery_id) + 27,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Call(Address),
    Create,
}

// == impl TransactionKind ==

impl TransactionKind {
    /// If this transaction is a call this returns the address of the callee
    pub fn as_call(&self) -> Option<&Address> {
        match self {
            TransactionKind::Call(to) => Some(to),
            TransactionKind::Create => None,
        }
    }
}

impl Encodable for TransactionKind {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            TransactionKind::Call(address) => {
                s.encoder().encode_value(&address[..]);
            }
            TransactionKind::Create => s.encoder().encode_value(&[]),
        }
    }
}

impl Decodable for TransactionKind {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.is_empty() {
            if rlp.is_data() {
                Ok(TransactionKind::Create)
            } else {
                Err(DecoderError::RlpExpectedToBeData)
            }
        } else {
            Ok(TransactionKind::Call(rlp.as_val()?))
        }
    }
}

/// Container type for signed, wire-ready transactions
///
/// Its variants correspond to the supported transaction envelopes:
/// 1. Legacy (pre-EIP-2718), optionally EIP-155 replay protected
/// 2. EIP-2930 (state access lists), type byte `0x01`
/// 3. EIP-1559 (fee market), type byte `0x02`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypedTransaction {
    /// Legacy transaction type
    Legacy(LegacyTransaction),
    /// EIP-2930 transaction
    EIP2930(EIP2930Transaction),
    /// EIP-1559 transaction
    EIP1559(EIP1559Transaction),
}

// == impl TypedTransaction ==

impl TypedTransaction {
    /// Decodes a transaction from its canonical wire encoding.
    ///
    /// A payload starting with a list byte is a legacy transaction, anything
    /// else starts with the one-byte type discriminator. Unconsumed input is
    /// rejected, as is a legacy `v` that fits no recognized scheme.
    pub fn decode(data: &[u8]) -> Result<Self, TransactionDecodeError> {
        let first = *data.first().ok_or(TransactionDecodeError::Empty)?;
        if first >= 0xc0 {
            let tx: LegacyTransaction = decode_exact(data)?;
            // surface a bogus `v` here rather than at sender recovery
            extract_chain_id(tx.signature.v)?;
            return Ok(TypedTransaction::Legacy(tx))
        }
        let payload = data.get(1..).ok_or(TransactionDecodeError::Empty)?;
        match first {
            0x01 => Ok(TypedTransaction::EIP2930(decode_exact(payload)?)),
            0x02 => Ok(TypedTransaction::EIP1559(decode_exact(payload)?)),
            t => Err(TransactionDecodeError::UnsupportedType(t)),
        }
    }

    /// Returns the canonical wire encoding, `rlp(tx)` for legacy and
    /// `type || rlp(payload)` for typed transactions.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            TypedTransaction::Legacy(tx) => rlp::encode(tx).to_vec(),
            TypedTransaction::EIP2930(tx) => {
                let encoded = rlp::encode(tx);
                let mut out = Vec::with_capacity(1 + encoded.len());
                out.push(0x01);
                out.extend_from_slice(&encoded);
                out
            }
            TypedTransaction::EIP1559(tx) => {
                let encoded = rlp::encode(tx);
                let mut out = Vec::with_capacity(1 + encoded.len());
                out.push(0x02);
                out.extend_from_slice(&encoded);
                out
            }
        }
    }

    /// Max gas fee the sender can pay per unit of gas
    pub fn gas_price(&self) -> U256 {
        match self {
            TypedTransaction::Legacy(tx) => tx.gas_price,
            TypedTransaction::EIP2930(tx) => tx.gas_price,
            TypedTransaction::EIP1559(tx) => tx.max_fee_per_gas,
        }
    }

    /// The miner tip cap, only present on fee market transactions
    pub fn max_priority_fee_per_gas(&self) -> Option<U256> {
        match self {
            TypedTransaction::EIP1559(tx) => Some(tx.max_priority_fee_per_gas),
            _ => None,
        }
    }

    /// Amount the miner earns per unit of gas at the given base fee.
    ///
    /// Negative when the fee cap (or gas price) sits below the base fee:
    /// such a transaction ranks below any entry that still pays something,
    /// including a zero-tip one.
    pub fn effective_priority_fee_per_gas(&self, base_fee: U256) -> i128 {
        let base_fee = signed_fee(base_fee);
        match self {
            TypedTransaction::Legacy(tx) => signed_fee(tx.gas_price) - base_fee,
            TypedTransaction::EIP2930(tx) => signed_fee(tx.gas_price) - base_fee,
            TypedTransaction::EIP1559(tx) => signed_fee(tx.max_priority_fee_per_gas)
                .min(signed_fee(tx.max_fee_per_gas) - base_fee),
        }
    }

    pub fn gas_limit(&self) -> U256 {
        match self {
            TypedTransaction::Legacy(tx) => tx.gas_limit,
            TypedTransaction::EIP2930(tx) => tx.gas_limit,
            TypedTransaction::EIP1559(tx) => tx.gas_limit,
        }
    }

    pub fn value(&self) -> U256 {
        match self {
            TypedTransaction::Legacy(tx) => tx.value,
            TypedTransaction::EIP2930(tx) => tx.value,
            TypedTransaction::EIP1559(tx) => tx.value,
        }
    }

    pub fn data(&self) -> &Bytes {
        match self {
            TypedTransaction::Legacy(tx) => &tx.input,
            TypedTransaction::EIP2930(tx) => &tx.input,
            TypedTransaction::EIP1559(tx) => &tx.input,
        }
    }

    pub fn nonce(&self) -> &U256 {
        match self {
            TypedTransaction::Legacy(tx) => &tx.nonce,
            TypedTransaction::EIP2930(tx) => &tx.nonce,
            TypedTransaction::EIP1559(tx) => &tx.nonce,
        }
    }

    /// The access list, empty for legacy transactions
    pub fn access_list(&self) -> Option<&AccessList> {
        match self {
            TypedTransaction::Legacy(_) => None,
            TypedTransaction::EIP2930(tx) => Some(&tx.access_list),
            TypedTransaction::EIP1559(tx) => Some(&tx.access_list),
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match self {
            TypedTransaction::Legacy(tx) => tx.chain_id(),
            TypedTransaction::EIP2930(tx) => Some(tx.chain_id),
            TypedTransaction::EIP1559(tx) => Some(tx.chain_id),
        }
    }

    /// Keccak-256 of the canonical wire encoding
    pub fn hash(&self) -> H256 {
        match self {
            TypedTransaction::Legacy(tx) => tx.hash(),
            TypedTransaction::EIP2930(tx) => tx.hash(),
            TypedTransaction::EIP1559(tx) => tx.hash(),
        }
    }

    /// Recovers the Ethereum address which was used to sign the transaction.
    pub fn recover(&self) -> Result<Address, SignatureError> {
        match self {
            TypedTransaction::Legacy(tx) => tx.recover(),
            TypedTransaction::EIP2930(tx) => tx.recover(),
            TypedTransaction::EIP1559(tx) => tx.recover(),
        }
    }

    /// Returns what kind of transaction this is
    pub fn kind(&self) -> &TransactionKind {
        match self {
            TypedTransaction::Legacy(tx) => &tx.kind,
            TypedTransaction::EIP2930(tx) => &tx.kind,
            TypedTransaction::EIP1559(tx) => &tx.kind,
        }
    }

    /// Returns the callee if this transaction is a call
    pub fn to(&self) -> Option<&Address> {
        self.kind().as_call()
    }

    /// Returns the signature of the transaction, with `v` normalized to the
    /// recovery id for typed transactions
    pub fn signature(&self) -> Signature {
        match self {
            TypedTransaction::Legacy(tx) => tx.signature,
            TypedTransaction::EIP2930(tx) => {
                let v = tx.odd_y_parity as u8;
                let r = U256::from_big_endian(&tx.r[..]);
                let s = U256::from_big_endian(&tx.s[..]);
                Signature { r, s, v: v.into() }
            }
            TypedTransaction::EIP1559(tx) => {
                let v = tx.odd_y_parity as u8;
                let r = U256::from_big_endian(&tx.r[..]);
                let s = U256::from_big_endian(&tx.s[..]);
                Signature { r, s, v: v.into() }
            }
        }
    }

    /// Returns true if the signature's `s` component is canonical
    pub fn has_low_s(&self) -> bool {
        is_low_s(self.signature().s)
    }
}

/// Clamps a fee into the signed range effective-fee arithmetic happens in.
/// Real fees sit far below the clamp, it only guards the subtraction.
fn signed_fee(value: U256) -> i128 {
    if value.bits() <= 127 {
        value.as_u128() as i128
    } else {
        i128::MAX
    }
}

fn decode_exact<T: Decodable>(data: &[u8]) -> Result<T, TransactionDecodeError> {
    let rlp = Rlp::new(data);
    let payload = rlp.payload_info()?;
    if payload.header_len + payload.value_len != data.len() {
        return Err(TransactionDecodeError::TrailingBytes)
    }
    Ok(rlp.as_val()?)
}

impl Encodable for TypedTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            TypedTransaction::Legacy(tx) => tx.rlp_append(s),
            TypedTransaction::EIP2930(tx) => enveloped(1, tx, s),
            TypedTransaction::EIP1559(tx) => enveloped(2, tx, s),
        }
    }
}

impl Decodable for TypedTransaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let data = rlp.data()?;
        let first = *data.first().ok_or(DecoderError::Custom("empty slice"))?;
        if rlp.is_list() {
            return Ok(TypedTransaction::Legacy(rlp.as_val()?))
        }
        let s = data.get(1..).ok_or(DecoderError::Custom("no tx body"))?;
        if first == 0x01 {
            return rlp::decode(s).map(TypedTransaction::EIP2930)
        }
        if first == 0x02 {
            return rlp::decode(s).map(TypedTransaction::EIP1559)
        }
        Err(DecoderError::Custom("invalid tx type"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub kind: TransactionKind,
    pub value: U256,
    pub input: Bytes,
    pub signature: Signature,
}

// == impl LegacyTransaction ==

impl LegacyTransaction {
    pub fn hash(&self) -> H256 {
        H256::from_slice(keccak256(rlp::encode(self)).as_slice())
    }

    /// The chain id bound via EIP-155, `None` for unprotected signatures
    pub fn chain_id(&self) -> Option<u64> {
        if self.signature.v > 36 {
            Some((self.signature.v - 35) / 2)
        } else {
            None
        }
    }

    /// Recovers the Ethereum address which was used to sign the transaction.
    pub fn recover(&self) -> Result<Address, SignatureError> {
        self.signature.recover(LegacyTransactionRequest::from(self.clone()).hash())
    }
}

impl Encodable for LegacyTransaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(9);
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        s.append(&self.kind);
        s.append(&self.value);
        s.append(&self.input.as_ref());
        s.append(&self.signature.v);
        s.append(&self.signature.r);
        s.append(&self.signature.s);
    }
}

impl Decodable for LegacyTransaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 9 {
            return Err(DecoderError::RlpIncorrectListLen)
        }

        Ok(Self {
            nonce: rlp.val_at(0)?,
            gas_price: rlp.val_at(1)?,
            gas_limit: rlp.val_at(2)?,
            kind: rlp.val_at(3)?,
            value: rlp.val_at(4)?,
            input: rlp.val_at::<Vec<u8>>(5)?.into(),
            signature: Signature {
                v: rlp.val_at(6)?,
                r: rlp.val_at::<U256>(7)?,
                s: rlp.val_at::<U256>(8)?,
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EIP2930Transaction {
    pub chain_id: u64,
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub kind: TransactionKind,
    pub value: U256,
    pub input: Bytes,
    pub access_list: AccessList,
    pub odd_y_parity: bool,
    pub r: H256,
    pub s: H256,
}

// == impl EIP2930Transaction ==

impl EIP2930Transaction {
    pub fn hash(&self) -> H256 {
        let encoded = rlp::encode(self);
        let mut out = vec![0; 1 + encoded.len()];
        out[0] = 1;
        out[1..].copy_from_slice(&encoded);
        H256::from_slice(keccak256(&out).as_slice())
    }

    /// Recovers the Ethereum address which was used to sign the transaction.
    pub fn recover(&self) -> Result<Address, SignatureError> {
        let mut sig = [0u8; 65];
        sig[0..32].copy_from_slice(&self.r[..]);
        sig[32..64].copy_from_slice(&self.s[..]);
        sig[64] = self.odd_y_parity as u8;
        let signature = Signature::try_from(&sig[..])?;
        signature.recover(EIP2930TransactionRequest::from(self.clone()).hash())
    }
}

impl Encodable for EIP2930Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(11);
        s.append(&self.chain_id);
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        s.append(&self.kind);
        s.append(&self.value);
        s.append(&self.input.as_ref());
        s.append(&self.access_list);
        s.append(&self.odd_y_parity);
        s.append(&U256::from_big_endian(&self.r[..]));
        s.append(&U256::from_big_endian(&self.s[..]));
    }
}

impl Decodable for EIP2930Transaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 11 {
            return Err(DecoderError::RlpIncorrectListLen)
        }

        Ok(Self {
            chain_id: rlp.val_at(0)?,
            nonce: rlp.val_at(1)?,
            gas_price: rlp.val_at(2)?,
            gas_limit: rlp.val_at(3)?,
            kind: rlp.val_at(4)?,
            value: rlp.val_at(5)?,
            input: rlp.val_at::<Vec<u8>>(6)?.into(),
            access_list: rlp.val_at(7)?,
            odd_y_parity: rlp.val_at(8)?,
            r: u256_to_h256(rlp.val_at::<U256>(9)?),
            s: u256_to_h256(rlp.val_at::<U256>(10)?),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EIP1559Transaction {
    pub chain_id: u64,
    pub nonce: U256,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: U256,
    pub kind: TransactionKind,
    pub value: U256,
    pub input: Bytes,
    pub access_list: AccessList,
    pub odd_y_parity: bool,
    pub r: H256,
    pub s: H256,
}

// == impl EIP1559Transaction ==

impl EIP1559Transaction {
    pub fn hash(&self) -> H256 {
        let encoded = rlp::encode(self);
        let mut out = vec![0; 1 + encoded.len()];
        out[0] = 2;
        out[1..].copy_from_slice(&encoded);
        H256::from_slice(keccak256(&out).as_slice())
    }

    /// Recovers the Ethereum address which was used to sign the transaction.
    pub fn recover(&self) -> Result<Address, SignatureError> {
        let mut sig = [0u8; 65];
        sig[0..32].copy_from_slice(&self.r[..]);
        sig[32..64].copy_from_slice(&self.s[..]);
        sig[64] = self.odd_y_parity as u8;
        let signature = Signature::try_from(&sig[..])?;
        signature.recover(EIP1559TransactionRequest::from(self.clone()).hash())
    }
}

impl Encodable for EIP1559Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(12);
        s.append(&self.chain_id);
        s.append(&self.nonce);
        s.append(&self.max_priority_fee_per_gas);
        s.append(&self.max_fee_per_gas);
        s.append(&self.gas_limit);
        s.append(&self.kind);
        s.append(&self.value);
        s.append(&self.input.as_ref());
        s.append(&self.access_list);
        s.append(&self.odd_y_parity);
        s.append(&U256::from_big_endian(&self.r[..]));
        s.append(&U256::from_big_endian(&self.s[..]));
    }
}

impl Decodable for EIP1559Transaction {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 12 {
            return Err(DecoderError::RlpIncorrectListLen)
        }

        Ok(Self {
            chain_id: rlp.val_at(0)?,
            nonce: rlp.val_at(1)?,
            max_priority_fee_per_gas: rlp.val_at(2)?,
            max_fee_per_gas: rlp.val_at(3)?,
            gas_limit: rlp.val_at(4)?,
            kind: rlp.val_at(5)?,
            value: rlp.val_at(6)?,
            input: rlp.val_at::<Vec<u8>>(7)?.into(),
            access_list: rlp.val_at(8)?,
            odd_y_parity: rlp.val_at(9)?,
            r: u256_to_h256(rlp.val_at::<U256>(10)?),
            s: u256_to_h256(rlp.val_at::<U256>(11)?),
        })
    }
}

fn u256_to_h256(value: U256) -> H256 {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    H256::from(out)
}

/// Unsigned legacy transaction, the preimage of the signing hash
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransactionRequest {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub kind: TransactionKind,
    pub value: U256,
    pub input: Bytes,
    pub chain_id: Option<u64>,
}

// == impl LegacyTransactionRequest ==

impl LegacyTransactionRequest {
    /// The digest the sender signs, EIP-155 style when a chain id is bound
    pub fn hash(&self) -> H256 {
        H256::from_slice(keccak256(rlp::encode(self)).as_slice())
    }
}

impl From<LegacyTransaction> for LegacyTransactionRequest {
    fn from(tx: LegacyTransaction) -> Self {
        let chain_id = tx.chain_id();
        Self {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            kind: tx.kind,
            value: tx.value,
            input: tx.input,
            chain_id,
        }
    }
}

impl Encodable for LegacyTransactionRequest {
    fn rlp_append(&self, s: &mut RlpStream) {
        if let Some(chain_id) = self.chain_id {
            s.begin_list(9);
            s.append(&self.nonce);
            s.append(&self.gas_price);
            s.append(&self.gas_limit);
            s.append(&self.kind);
            s.append(&self.value);
            s.append(&self.input.as_ref());
            s.append(&chain_id);
            s.append(&0u8);
            s.append(&0u8);
        } else {
            s.begin_list(6);
            s.append(&self.nonce);
            s.append(&self.gas_price);
            s.append(&self.gas_limit);
            s.append(&self.kind);
            s.append(&self.value);
            s.append(&self.input.as_ref());
        }
    }
}

/// Unsigned EIP-2930 transaction, the preimage of the signing hash
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EIP2930TransactionRequest {
    pub chain_id: u64,
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub kind: TransactionKind,
    pub value: U256,
    pub input: Bytes,
    pub access_list: Vec<AccessListItem>,
}

// == impl EIP2930TransactionRequest ==

impl EIP2930TransactionRequest {
    pub fn hash(&self) -> H256 {
        let encoded = rlp::encode(self);
        let mut out = vec![0; 1 + encoded.len()];
        out[0] = 1;
        out[1..].copy_from_slice(&encoded);
        H256::from_slice(keccak256(&out).as_slice())
    }
}

impl From<EIP2930Transaction> for EIP2930TransactionRequest {
    fn from(tx: EIP2930Transaction) -> Self {
        Self {
            chain_id: tx.chain_id,
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            kind: tx.kind,
            value: tx.value,
            input: tx.input,
            access_list: tx.access_list.0,
        }
    }
}

impl Encodable for EIP2930TransactionRequest {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(8);
        s.append(&self.chain_id);
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        s.append(&self.kind);
        s.append(&self.value);
        s.append(&self.input.as_ref());
        s.append_list(&self.access_list);
    }
}

/// Unsigned EIP-1559 transaction, the preimage of the signing hash
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EIP1559TransactionRequest {
    pub chain_id: u64,
    pub nonce: U256,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: U256,
    pub kind: TransactionKind,
    pub value: U256,
    pub input: Bytes,
    pub access_list: Vec<AccessListItem>,
}

// == impl EIP1559TransactionRequest ==

impl EIP1559TransactionRequest {
    pub fn hash(&self) -> H256 {
        let encoded = rlp::encode(self);
        let mut out = vec![0; 1 + encoded.len()];
        out[0] = 2;
        out[1..].copy_from_slice(&encoded);
        H256::from_slice(keccak256(&out).as_slice())
    }
}

impl From<EIP1559Transaction> for EIP1559TransactionRequest {
    fn from(tx: EIP1559Transaction) -> Self {
        Self {
            chain_id: tx.chain_id,
            nonce: tx.nonce,
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
            max_fee_per_gas: tx.max_fee_per_gas,
            gas_limit: tx.gas_limit,
            kind: tx.kind,
            value: tx.value,
            input: tx.input,
            access_list: tx.access_list.0,
        }
    }
}

impl Encodable for EIP1559TransactionRequest {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(9);
        s.append(&self.chain_id);
        s.append(&self.nonce);
        s.append(&self.max_priority_fee_per_gas);
        s.append(&self.max_fee_per_gas);
        s.append(&self.gas_limit);
        s.append(&self.kind);
        s.append(&self.value);
        s.append(&self.input.as_ref());
        s.append_list(&self.access_list);
    }
}

/// A transaction whose sender has been recovered and whose hash is known.
///
/// Both fields are pure functions of the immutable transaction, computed
/// once here so the pool and broadcast paths never redo the work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransaction {
    /// The actual transaction
    pub transaction: TypedTransaction,
    /// the recovered sender of this transaction
    sender: Address,
    /// hash of `transaction`, so it can easily be reused without re-encoding
    hash: TxHash,
}

// == impl PendingTransaction ==

impl PendingTransaction {
    /// Creates a new pending transaction and tries to verify transaction and recover sender.
    pub fn new(transaction: TypedTransaction) -> Result<Self, SignatureError> {
        let sender = transaction.recover()?;
        Ok(Self::with_sender(transaction, sender))
    }

    /// Creates a new transaction with the given sender
    pub fn with_sender(transaction: TypedTransaction, sender: Address) -> Self {
        Self { hash: transaction.hash(), transaction, sender }
    }

    pub fn nonce(&self) -> &U256 {
        self.transaction.nonce()
    }

    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }
}
