//! Aggregated error types for pool admission

use ethers_core::types::SignatureError;

/// Errors that can occur in the transaction pool
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    /// The transaction failed an admission check
    #[error(transparent)]
    InvalidTransaction(#[from] InvalidTransactionError),
    /// Sender recovery failed
    #[error(transparent)]
    SignatureError(#[from] SignatureError),
}

/// An error due to an invalid transaction
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum InvalidTransactionError {
    /// returned if the nonce of a transaction is lower than the one tracked
    /// for the sender
    #[error("nonce too low")]
    NonceTooLow,
    /// Returned if the nonce of a transaction does not fit the pool's
    /// per-sender tracking. Incrementing it would overflow.
    #[error("nonce has max value")]
    NonceMaxValue,
    /// returned if the transaction declares less gas than its intrinsic cost
    #[error("intrinsic gas too low")]
    GasTooLow,
    /// Thrown to ensure no one is able to specify a transaction with a tip
    /// higher than the total fee cap.
    #[error("max priority fee per gas higher than max fee per gas")]
    TipAboveFeeCap,
    /// Thrown when a tx was signed for a different chain
    #[error("invalid chain id for signer")]
    InvalidChainId,
    /// Thrown when the signature is not canonical or cannot recover a sender
    #[error("invalid transaction signature")]
    InvalidSignature,
}
