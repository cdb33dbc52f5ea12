//! Support for validating transactions at certain stages

use crate::eth::error::InvalidTransactionError;
use bellows_core::eth::transaction::{PendingTransaction, TransactionKind, TypedTransaction};
use ethers_core::types::{Address, U256};

/// Base cost of any transaction.
const TX_GAS: u64 = 21_000;
/// Additional cost of a contract creation.
const TX_CREATE_GAS: u64 = 32_000;
/// Cost per zero byte of payload.
const TX_DATA_ZERO_GAS: u64 = 4;
/// Cost per non-zero byte of payload, post EIP-2028.
const TX_DATA_NON_ZERO_GAS: u64 = 16;
/// Cost per address in the access list.
const ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
/// Cost per storage key in the access list.
const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

/// A trait for validating transactions against chain state
#[auto_impl::auto_impl(&, Box, Arc)]
pub trait TransactionValidator: Send + Sync {
    /// Validates the transaction's validity when it comes to nonce, payment
    ///
    /// This is intended to be checked before the transaction makes it into the pool and whether it
    /// should rather be outright rejected if the sender has insufficient funds.
    fn validate_pool_transaction(
        &self,
        tx: &PendingTransaction,
    ) -> Result<(), InvalidTransactionError>;
}

/// Validates sender nonces against an account-state lookup.
///
/// This is the minimal chain-state check a node wires into the pool; richer
/// validators also cover balances.
pub struct AccountNonceValidator<N> {
    lookup: N,
}

// === impl AccountNonceValidator ===

impl<N> AccountNonceValidator<N>
where
    N: Fn(&Address) -> u64 + Send + Sync,
{
    pub fn new(lookup: N) -> Self {
        Self { lookup }
    }
}

impl<N> TransactionValidator for AccountNonceValidator<N>
where
    N: Fn(&Address) -> u64 + Send + Sync,
{
    fn validate_pool_transaction(
        &self,
        tx: &PendingTransaction,
    ) -> Result<(), InvalidTransactionError> {
        let on_chain = (self.lookup)(tx.sender());
        if *tx.nonce() < U256::from(on_chain) {
            return Err(InvalidTransactionError::NonceTooLow)
        }
        Ok(())
    }
}

/// Runs the stateless admission checks every transaction must pass: chain id
/// binding, signature canonicality, fee ordering and intrinsic gas.
pub fn check_transaction(
    tx: &PendingTransaction,
    chain_id: u64,
) -> Result<(), InvalidTransactionError> {
    if let Some(tx_chain_id) = tx.transaction.chain_id() {
        if tx_chain_id != chain_id {
            return Err(InvalidTransactionError::InvalidChainId)
        }
    }
    if !tx.transaction.has_low_s() {
        return Err(InvalidTransactionError::InvalidSignature)
    }
    if *tx.nonce() > U256::from(u64::MAX) {
        return Err(InvalidTransactionError::NonceMaxValue)
    }
    if let Some(tip) = tx.transaction.max_priority_fee_per_gas() {
        if tip > tx.transaction.gas_price() {
            return Err(InvalidTransactionError::TipAboveFeeCap)
        }
    }
    if tx.transaction.gas_limit() < U256::from(intrinsic_gas(&tx.transaction)) {
        return Err(InvalidTransactionError::GasTooLow)
    }
    Ok(())
}

/// The gas a transaction consumes before a single EVM instruction runs.
pub fn intrinsic_gas(tx: &TypedTransaction) -> u64 {
    let mut gas = TX_GAS;
    if matches!(*tx.kind(), TransactionKind::Create) {
        gas = gas.saturating_add(TX_CREATE_GAS);
    }
    for byte in tx.data().as_ref() {
        gas = gas.saturating_add(if *byte == 0 { TX_DATA_ZERO_GAS } else { TX_DATA_NON_ZERO_GAS });
    }
    if let Some(access_list) = tx.access_list() {
        for item in &access_list.0 {
            gas = gas
                .saturating_add(ACCESS_LIST_ADDRESS_GAS)
                .saturating_add(ACCESS_LIST_STORAGE_KEY_GAS * item.storage_keys.len() as u64);
        }
    }
    gas
}
