//! Container types the pool tracks transactions in

use bellows_core::eth::transaction::PendingTransaction;
use ethers_core::types::{Address, TxHash, U256};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet, VecDeque},
    sync::Arc,
};

/// A transaction queued in the pool together with its bookkeeping state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolTransaction {
    /// The validated transaction
    pub pending_transaction: PendingTransaction,
    /// Whether the transaction came in via local RPC rather than gossip.
    /// Locals rank above all remotes and are never the first eviction victim.
    pub is_local: bool,
    /// unix seconds when the pool admitted the transaction
    pub added_at: u64,
    /// insertion counter, the final ordering tie breaker
    pub sequence: u64,
}

// == impl PoolTransaction ==

impl PoolTransaction {
    pub fn hash(&self) -> &TxHash {
        self.pending_transaction.hash()
    }

    pub fn sender(&self) -> &Address {
        self.pending_transaction.sender()
    }

    /// The nonce as the pool tracks it. Admission rejects nonces that do not
    /// fit, so the narrowing here cannot lose bits.
    pub fn nonce(&self) -> u64 {
        self.pending_transaction.nonce().as_u64()
    }

    /// Amount the miner earns per unit of gas at the given base fee,
    /// negative for entries whose cap no longer covers it
    pub fn effective_priority_fee_per_gas(&self, base_fee: U256) -> i128 {
        self.pending_transaction.transaction.effective_priority_fee_per_gas(base_fee)
    }

    /// The miner tip cap, only present on fee market transactions
    pub fn max_priority_fee_per_gas(&self) -> Option<U256> {
        self.pending_transaction.transaction.max_priority_fee_per_gas()
    }

    /// The fee the transaction is ranked by while its tip is clipped: the
    /// gas price, or the fee cap for fee market transactions. Unlike the
    /// effective priority fee this does not depend on the base fee, so a
    /// range keyed by it never needs re-sorting when the base fee moves.
    pub fn fee_cap(&self) -> U256 {
        self.pending_transaction.transaction.gas_price()
    }

    /// True if the tip is not clipped by the fee cap at the given base fee.
    /// Only fee market transactions can be unclipped.
    pub fn is_unclipped_at(&self, base_fee: U256) -> bool {
        match self.max_priority_fee_per_gas() {
            Some(tip) => base_fee
                .checked_add(tip)
                .map_or(false, |required| self.fee_cap() >= required),
            None => false,
        }
    }
}

/// Orders range entries from best to worst: locals first, then the higher
/// fee, newer submissions winning ties within the same fee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PriorityKey {
    pub is_local: bool,
    pub fee: U256,
    pub sequence: u64,
}

// == impl PriorityKey ==

impl PriorityKey {
    pub fn for_static_range(tx: &PoolTransaction) -> Self {
        let tip = tx
            .max_priority_fee_per_gas()
            .expect("only fee market transactions enter the static range");
        Self { is_local: tx.is_local, fee: tip, sequence: tx.sequence }
    }

    pub fn for_dynamic_range(tx: &PoolTransaction) -> Self {
        Self { is_local: tx.is_local, fee: tx.fee_cap(), sequence: tx.sequence }
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .is_local
            .cmp(&self.is_local)
            .then_with(|| other.fee.cmp(&self.fee))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// All pooled transactions of a single sender, keyed by nonce
#[derive(Debug, Default)]
pub struct SenderTransactions {
    by_nonce: BTreeMap<u64, Arc<PoolTransaction>>,
}

// == impl SenderTransactions ==

impl SenderTransactions {
    pub fn get(&self, nonce: u64) -> Option<&Arc<PoolTransaction>> {
        self.by_nonce.get(&nonce)
    }

    pub fn insert(&mut self, nonce: u64, tx: Arc<PoolTransaction>) {
        // replacement decisions happen before this point
        self.by_nonce.insert(nonce, tx);
    }

    pub fn remove(&mut self, nonce: u64) -> Option<Arc<PoolTransaction>> {
        self.by_nonce.remove(&nonce)
    }

    pub fn is_empty(&self) -> bool {
        self.by_nonce.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_nonce.len()
    }

    /// All transactions up to and including the given nonce, ascending
    pub fn up_to(&self, nonce: u64) -> impl Iterator<Item = &Arc<PoolTransaction>> {
        self.by_nonce.range(..=nonce).map(|(_, tx)| tx)
    }

    /// One past the highest nonce reachable without a gap from the lowest
    /// tracked entry, `None` if the sender has no entries
    pub fn next_nonce(&self) -> Option<u64> {
        let mut expected = *self.by_nonce.keys().next()?;
        for nonce in self.by_nonce.keys() {
            if *nonce != expected {
                break
            }
            expected += 1;
        }
        Some(expected)
    }
}

/// Bounded FIFO of hashes that still need to be announced to peers.
///
/// When the queue is full the oldest hash is silently dropped, bounding how
/// far announcements can lag behind admissions.
#[derive(Debug)]
pub(crate) struct AnnouncedTransactions {
    capacity: usize,
    order: VecDeque<TxHash>,
    known: HashSet<TxHash>,
}

// == impl AnnouncedTransactions ==

impl AnnouncedTransactions {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, order: VecDeque::new(), known: HashSet::new() }
    }

    pub fn push(&mut self, hash: TxHash) {
        if !self.known.insert(hash) {
            return
        }
        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.known.remove(&evicted);
            }
        }
        self.order.push_back(hash);
    }

    pub fn drain(&mut self) -> Vec<TxHash> {
        self.known.clear();
        self.order.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
