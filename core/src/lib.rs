//! Wire-facing Ethereum types: transactions, signatures and block headers.
//!
//! This crate holds the data model shared between the networking layer and
//! the transaction pool, most importantly the [TypedTransaction] envelope
//! codec and the sender recovery machinery built on top of it.
//!
//! [TypedTransaction]: eth::transaction::TypedTransaction

pub mod eth;
