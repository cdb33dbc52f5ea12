//! Transaction signing for locally managed keys

use ethers_core::{
    k256::ecdsa::SigningKey,
    types::{Address, Signature, H256, U256},
    utils::secret_key_to_address,
};
use bellows_core::eth::transaction::{
    legacy_v, EIP1559Transaction, EIP1559TransactionRequest, EIP2930Transaction,
    EIP2930TransactionRequest, LegacyTransaction, LegacyTransactionRequest, TypedTransaction,
};
use std::collections::HashMap;

/// Errors that can occur while signing
#[derive(thiserror::Error, Debug)]
pub enum SignError {
    /// No key is managed for the requested sender
    #[error("no signer available for {0:?}")]
    NoSuchSigner(Address),
    #[error(transparent)]
    Ecdsa(#[from] ethers_core::k256::ecdsa::Error),
}

/// An unsigned transaction ready to be signed into a [TypedTransaction]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypedTransactionRequest {
    Legacy(LegacyTransactionRequest),
    EIP2930(EIP2930TransactionRequest),
    EIP1559(EIP1559TransactionRequest),
}

/// A signer that holds its keys in memory, used for local submission and in
/// tests.
pub struct DevSigner {
    accounts: HashMap<Address, SigningKey>,
}

// === impl DevSigner ===

impl DevSigner {
    pub fn new(keys: Vec<SigningKey>) -> Self {
        let accounts = keys.into_iter().map(|key| (secret_key_to_address(&key), key)).collect();
        Self { accounts }
    }

    /// All addresses this signer can sign for
    pub fn accounts(&self) -> Vec<Address> {
        self.accounts.keys().copied().collect()
    }

    pub fn is_signer_for(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Signs the request with the key of `from` and assembles the signed,
    /// wire-ready transaction.
    pub fn sign_transaction(
        &self,
        request: TypedTransactionRequest,
        from: &Address,
    ) -> Result<TypedTransaction, SignError> {
        let key = self.accounts.get(from).ok_or(SignError::NoSuchSigner(*from))?;
        match request {
            TypedTransactionRequest::Legacy(tx) => {
                let (recovery_id, r, s) = sign_digest(key, tx.hash())?;
                let v = legacy_v(recovery_id, tx.chain_id);
                Ok(TypedTransaction::Legacy(LegacyTransaction {
                    nonce: tx.nonce,
                    gas_price: tx.gas_price,
                    gas_limit: tx.gas_limit,
                    kind: tx.kind,
                    value: tx.value,
                    input: tx.input,
                    signature: Signature { v, r, s },
                }))
            }
            TypedTransactionRequest::EIP2930(tx) => {
                let (recovery_id, r, s) = sign_digest(key, tx.hash())?;
                Ok(TypedTransaction::EIP2930(EIP2930Transaction {
                    chain_id: tx.chain_id,
                    nonce: tx.nonce,
                    gas_price: tx.gas_price,
                    gas_limit: tx.gas_limit,
                    kind: tx.kind,
                    value: tx.value,
                    input: tx.input,
                    access_list: tx.access_list.into(),
                    odd_y_parity: recovery_id != 0,
                    r: u256_to_h256(r),
                    s: u256_to_h256(s),
                }))
            }
            TypedTransactionRequest::EIP1559(tx) => {
                let (recovery_id, r, s) = sign_digest(key, tx.hash())?;
                Ok(TypedTransaction::EIP1559(EIP1559Transaction {
                    chain_id: tx.chain_id,
                    nonce: tx.nonce,
                    max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
                    max_fee_per_gas: tx.max_fee_per_gas,
                    gas_limit: tx.gas_limit,
                    kind: tx.kind,
                    value: tx.value,
                    input: tx.input,
                    access_list: tx.access_list.into(),
                    odd_y_parity: recovery_id != 0,
                    r: u256_to_h256(r),
                    s: u256_to_h256(s),
                }))
            }
        }
    }
}

/// Produces a recoverable low-s signature over the given digest.
fn sign_digest(
    key: &SigningKey,
    digest: H256,
) -> Result<(u8, U256, U256), ethers_core::k256::ecdsa::Error> {
    let (signature, recovery_id) = key.sign_prehash_recoverable(digest.as_bytes())?;
    let bytes = signature.to_bytes();
    let r = U256::from_big_endian(&bytes[..32]);
    let s = U256::from_big_endian(&bytes[32..]);
    Ok((u8::from(recovery_id), r, s))
}

fn u256_to_h256(value: U256) -> H256 {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    H256::from(out)
}
