//! A fee-market aware Ethereum transaction pool.
//!
//! The pool admits signed transactions coming in over gossip or local RPC,
//! keeps them ordered by what a miner would earn at the current base fee,
//! and hands the block producer an executable, nonce-ordered sequence via
//! [select_transactions](eth::pool::Pool::select_transactions).
//!
//! Around the pool itself this crate carries the pieces a node wires it up
//! with: stateless admission validation, a dev signer for locally managed
//! keys, EIP-1559 base fee arithmetic, fork identification for the
//! handshake and the background task that ages out stale transactions.
//!
//! Wire-facing data types live in the companion `bellows-core` crate.

/// pool configuration
pub mod config;

/// ethereum related implementations
pub mod eth;

/// fork identification for peer compatibility
pub mod forkid;

/// background maintenance tasks
pub mod service;

pub use config::PoolConfig;
