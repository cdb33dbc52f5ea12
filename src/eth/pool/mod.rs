//! # Transaction Pool implementation
//!
//! The transaction pool keeps the set of pending transactions and prepares
//! the ordered view a block producer selects from.
//!
//! Ordering is fee-market aware. Every pooled transaction lives in exactly
//! one of two ranges:
//!   * the _static_ range holds fee market transactions whose tip is not
//!     clipped by their fee cap at the current base fee; they are ranked by
//!     the tip itself
//!   * the _dynamic_ range holds everything else, ranked by gas price (the
//!     fee cap for clipped fee market transactions); within the range that
//!     order does not depend on the base fee
//!
//! A base fee change therefore only migrates entries whose clipping status
//! flips, it never re-sorts a range. Selection merges both ranges by the
//! effective priority fee and walks every sender's nonces in ascending
//! order, so the produced sequence is always executable.
//!
//! Local submissions outrank all gossip, which also makes them the last
//! candidates for capacity eviction.

use crate::{
    config::PoolConfig,
    eth::{
        error::PoolError,
        pool::transactions::{
            AnnouncedTransactions, PoolTransaction, PriorityKey, SenderTransactions,
        },
        time::Clock,
        validate::{self, TransactionValidator},
    },
};
use bellows_core::eth::{block::Header, transaction::PendingTransaction};
use ethers_core::types::{Address, TxHash, U256};
use futures::channel::mpsc::{channel, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};
use tracing::{debug, trace, warn};

pub mod transactions;

/// Outcome of asking the pool to admit a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddedTransaction {
    /// transaction was admitted
    Added {
        /// the hash of the submitted transaction
        hash: TxHash,
    },
    /// the pool already tracks this hash, nothing changed
    AlreadyKnown { hash: TxHash },
    /// a transaction with the same sender and nonce exists and the new fees
    /// do not clear the configured price bump
    ReplacementUnderpriced { hash: TxHash },
}

// === impl AddedTransaction ===

impl AddedTransaction {
    pub fn hash(&self) -> &TxHash {
        match self {
            AddedTransaction::Added { hash } |
            AddedTransaction::AlreadyKnown { hash } |
            AddedTransaction::ReplacementUnderpriced { hash } => hash,
        }
    }
}

/// Instruction the selection callback returns for each offered candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionSelection {
    /// keep the transaction pooled and continue with the next candidate
    Keep,
    /// drop the transaction from the pool and continue
    DropAndContinue,
    /// stop iterating
    Stop,
}

/// Backpressure bound for ready-listener channels
const READY_LISTENER_BUFFER: usize = 2048;

/// Handle returned on subscription, used to unsubscribe
pub type ListenerId = u64;

type Listener = Arc<dyn Fn(Arc<PoolTransaction>) + Send + Sync>;

#[derive(Default)]
struct PoolListeners {
    next_id: ListenerId,
    added: HashMap<ListenerId, Listener>,
    dropped: HashMap<ListenerId, Listener>,
}

/// Notifications gathered while the write lock is held. Listeners only run
/// after the lock is released, so a listener may re-enter the pool.
#[derive(Default)]
struct PoolEvents {
    added: Vec<Arc<PoolTransaction>>,
    dropped: Vec<Arc<PoolTransaction>>,
}

/// Transaction pool that performs validation and fee-market aware ordering.
pub struct Pool {
    /// structural state; every mutating operation holds the write lock for
    /// its entire duration
    inner: RwLock<PoolInner>,
    /// listeners for admitted and dropped transactions
    listeners: Mutex<PoolListeners>,
    /// channels that receive the hash of every admitted transaction
    ready_listeners: Mutex<Vec<Sender<TxHash>>>,
    /// hashes awaiting announcement to peers
    announced: Mutex<AnnouncedTransactions>,
    /// chain-state validation hook, consulted on admission
    validator: Option<Arc<dyn TransactionValidator>>,
    clock: Clock,
    config: PoolConfig,
}

// == impl Pool ==

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self::with_parts(config, None, Clock::default())
    }

    pub fn with_validator(config: PoolConfig, validator: Arc<dyn TransactionValidator>) -> Self {
        Self::with_parts(config, Some(validator), Clock::default())
    }

    pub fn with_parts(
        config: PoolConfig,
        validator: Option<Arc<dyn TransactionValidator>>,
        clock: Clock,
    ) -> Self {
        Self {
            inner: RwLock::new(PoolInner::default()),
            listeners: Mutex::new(PoolListeners::default()),
            ready_listeners: Mutex::new(Vec::new()),
            announced: Mutex::new(AnnouncedTransactions::new(config.announcement_capacity)),
            validator,
            clock,
            config,
        }
    }

    /// Returns the number of transactions currently tracked
    pub fn len(&self) -> usize {
        self.inner.read().by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_hash.is_empty()
    }

    /// Returns true if this pool already contains the transaction
    pub fn contains(&self, tx_hash: &TxHash) -> bool {
        self.inner.read().by_hash.contains_key(tx_hash)
    }

    /// Returns the pooled transaction for that `hash` if it exists
    pub fn get_transaction(&self, hash: &TxHash) -> Option<PendingTransaction> {
        Some(self.inner.read().by_hash.get(hash)?.pending_transaction.clone())
    }

    /// The base fee ordering is currently anchored on
    pub fn base_fee(&self) -> U256 {
        self.inner.read().base_fee
    }

    /// One past the highest gapless nonce the pool holds for the sender
    pub fn next_nonce(&self, sender: &Address) -> Option<u64> {
        self.inner.read().by_sender.get(sender)?.next_nonce()
    }

    /// Adds a transaction received from a peer
    pub fn add_remote_transaction(
        &self,
        tx: PendingTransaction,
    ) -> Result<AddedTransaction, PoolError> {
        self.add_transaction(tx, false)
    }

    /// Adds a transaction submitted via local RPC
    pub fn add_local_transaction(
        &self,
        tx: PendingTransaction,
    ) -> Result<AddedTransaction, PoolError> {
        self.add_transaction(tx, true)
    }

    fn add_transaction(
        &self,
        tx: PendingTransaction,
        is_local: bool,
    ) -> Result<AddedTransaction, PoolError> {
        validate::check_transaction(&tx, self.config.chain_id)?;
        if let Some(validator) = &self.validator {
            validator.validate_pool_transaction(&tx)?;
        }

        let now = self.clock.now();
        let (outcome, events) =
            self.inner.write().add_transaction(tx, is_local, now, &self.config);

        if let AddedTransaction::Added { hash } = &outcome {
            trace!(target: "txpool", ?is_local, "[{:?}] added", hash);
            self.announced.lock().push(*hash);
            self.notify_ready(*hash);
        }
        self.notify(events);
        Ok(outcome)
    }

    /// Removes a single transaction, notifying drop listeners.
    pub fn remove_transaction(&self, hash: &TxHash) -> Option<Arc<PoolTransaction>> {
        let (removed, events) = {
            let mut pool = self.inner.write();
            let removed = pool.remove_by_hash(hash);
            let mut events = PoolEvents::default();
            events.dropped.extend(removed.clone());
            (removed, events)
        };
        self.notify(events);
        removed
    }

    /// Invoked when a new block was mined. Purges the included transactions
    /// without treating them as drops and re-anchors ordering on the block's
    /// base fee.
    pub fn on_mined_block(&self, header: &Header, included: impl IntoIterator<Item = TxHash>) {
        let mut pool = self.inner.write();
        for hash in included {
            pool.remove_by_hash(&hash);
        }
        pool.update_base_fee(header.base_fee());
        debug!(target: "txpool", block = ?header.number, "pruned mined transactions");
    }

    /// Re-partitions the ranges for the new base fee. A no-op if unchanged.
    pub fn update_base_fee(&self, base_fee: U256) {
        self.inner.write().update_base_fee(base_fee)
    }

    /// Drops every transaction that has outlived the configured retention
    /// period, notifying drop listeners.
    pub fn evict_old(&self) {
        let cutoff = self.clock.now().saturating_sub(self.config.retention.as_secs());
        let events = self.inner.write().evict_older_than(cutoff);
        self.notify(events)
    }

    /// Offers transactions to the callback in priority order, each sender's
    /// nonces strictly ascending. Requested drops are applied after the
    /// iteration finished.
    pub fn select_transactions<F>(&self, f: F)
    where
        F: FnMut(&Arc<PoolTransaction>) -> TransactionSelection,
    {
        let events = self.inner.write().select_transactions(f);
        self.notify(events)
    }

    /// Registers a listener invoked for every admitted transaction
    pub fn subscribe_added(
        &self,
        listener: impl Fn(Arc<PoolTransaction>) + Send + Sync + 'static,
    ) -> ListenerId {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.added.insert(id, Arc::new(listener));
        id
    }

    /// Registers a listener invoked for every dropped transaction.
    /// Transactions removed because a block included them do not count.
    pub fn subscribe_dropped(
        &self,
        listener: impl Fn(Arc<PoolTransaction>) + Send + Sync + 'static,
    ) -> ListenerId {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.dropped.insert(id, Arc::new(listener));
        id
    }

    pub fn unsubscribe_added(&self, id: ListenerId) {
        self.listeners.lock().added.remove(&id);
    }

    pub fn unsubscribe_dropped(&self, id: ListenerId) {
        self.listeners.lock().dropped.remove(&id);
    }

    /// Takes the hashes queued for announcement since the last call
    pub fn take_announcements(&self) -> Vec<TxHash> {
        self.announced.lock().drain()
    }

    /// Adds a new listener channel to the pool that receives the hash of
    /// every admitted transaction
    pub fn add_ready_listener(&self) -> Receiver<TxHash> {
        let (tx, rx) = channel(READY_LISTENER_BUFFER);
        self.ready_listeners.lock().push(tx);
        rx
    }

    /// Forwards the hash to every channel listener. A full channel merely
    /// loses this notification, only disconnected channels are pruned.
    fn notify_ready(&self, hash: TxHash) {
        self.ready_listeners.lock().retain_mut(|listener| match listener.try_send(hash) {
            Ok(()) => true,
            Err(err) if err.is_full() => {
                warn!(target: "txpool", "[{:?}] ready listener channel is full, hash skipped", hash);
                true
            }
            Err(_) => false,
        })
    }

    /// Dispatches collected notifications. Must only be called without
    /// holding the structural lock.
    fn notify(&self, events: PoolEvents) {
        if events.added.is_empty() && events.dropped.is_empty() {
            return
        }
        let (added, dropped) = {
            let listeners = self.listeners.lock();
            (
                listeners.added.values().cloned().collect::<Vec<_>>(),
                listeners.dropped.values().cloned().collect::<Vec<_>>(),
            )
        };
        for tx in events.added {
            for listener in &added {
                listener(tx.clone());
            }
        }
        for tx in events.dropped {
            trace!(target: "txpool", "[{:?}] dropped", tx.hash());
            for listener in &dropped {
                listener(tx.clone());
            }
        }
    }
}

/// The structural pool state. All three indices plus the ranges must agree:
/// a transaction is in `by_hash` iff it is in its sender's map iff it is in
/// exactly one range.
#[derive(Default)]
struct PoolInner {
    by_hash: HashMap<TxHash, Arc<PoolTransaction>>,
    by_sender: HashMap<Address, SenderTransactions>,
    static_range: BTreeMap<PriorityKey, Arc<PoolTransaction>>,
    dynamic_range: BTreeMap<PriorityKey, Arc<PoolTransaction>>,
    base_fee: U256,
    next_sequence: u64,
}

// == impl PoolInner ==

impl PoolInner {
    fn add_transaction(
        &mut self,
        tx: PendingTransaction,
        is_local: bool,
        now: u64,
        config: &PoolConfig,
    ) -> (AddedTransaction, PoolEvents) {
        let hash = *tx.hash();
        let mut events = PoolEvents::default();

        if self.by_hash.contains_key(&hash) {
            trace!(target: "txpool", "[{:?}] already imported", hash);
            return (AddedTransaction::AlreadyKnown { hash }, events)
        }

        let sender = *tx.sender();
        let nonce = tx.nonce().as_u64();

        if let Some(old) = self.by_sender.get(&sender).and_then(|txs| txs.get(nonce)).cloned() {
            if !meets_price_bump(&old, &tx, config.price_bump) {
                debug!(
                    target: "txpool",
                    "[{:?}] insufficient price bump to replace [{:?}]", hash, old.hash()
                );
                return (AddedTransaction::ReplacementUnderpriced { hash }, events)
            }
            self.remove_entry(&old);
            events.dropped.push(old);
        }

        let tx = Arc::new(PoolTransaction {
            pending_transaction: tx,
            is_local,
            added_at: now,
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;

        self.by_hash.insert(hash, tx.clone());
        self.by_sender.entry(sender).or_default().insert(nonce, tx.clone());
        self.insert_into_range(tx.clone());
        events.added.push(tx);

        // capacity pressure: shed the lowest priority entry, which may well
        // be the one just admitted
        while self.by_hash.len() > config.max_pending {
            let victim = self.lowest_priority();
            warn!(target: "txpool", "[{:?}] evicted over capacity", victim.hash());
            self.remove_entry(&victim);
            events.dropped.push(victim);
        }

        (AddedTransaction::Added { hash }, events)
    }

    fn remove_by_hash(&mut self, hash: &TxHash) -> Option<Arc<PoolTransaction>> {
        let tx = self.by_hash.get(hash)?.clone();
        self.remove_entry(&tx);
        Some(tx)
    }

    /// Removes the transaction from all indices
    fn remove_entry(&mut self, tx: &Arc<PoolTransaction>) {
        let removed = self.by_hash.remove(tx.hash());
        assert!(removed.is_some(), "transaction missing from hash index {:?}", tx.hash());

        let sender = tx.sender();
        let txs = self
            .by_sender
            .get_mut(sender)
            .unwrap_or_else(|| panic!("sender index missing for {sender:?}"));
        txs.remove(tx.nonce());
        if txs.is_empty() {
            self.by_sender.remove(sender);
        }

        self.remove_from_range(tx);
    }

    fn insert_into_range(&mut self, tx: Arc<PoolTransaction>) {
        if tx.is_unclipped_at(self.base_fee) {
            self.static_range.insert(PriorityKey::for_static_range(&tx), tx);
        } else {
            self.dynamic_range.insert(PriorityKey::for_dynamic_range(&tx), tx);
        }
    }

    fn remove_from_range(&mut self, tx: &Arc<PoolTransaction>) {
        let mut hits = 0;
        if tx.max_priority_fee_per_gas().is_some() &&
            self.static_range.remove(&PriorityKey::for_static_range(tx)).is_some()
        {
            hits += 1;
        }
        if self.dynamic_range.remove(&PriorityKey::for_dynamic_range(tx)).is_some() {
            hits += 1;
        }
        // an entry in neither or both ranges means ordering is corrupted and
        // nothing the pool hands out can be trusted anymore
        assert_eq!(hits, 1, "range membership corrupted for {:?}", tx.hash());
    }

    /// The entry capacity eviction removes next: the worse of the two range
    /// tails at the current base fee.
    fn lowest_priority(&self) -> Arc<PoolTransaction> {
        let static_tail = self.static_range.values().next_back();
        let dynamic_tail = self.dynamic_range.values().next_back();
        match (static_tail, dynamic_tail) {
            (Some(s), Some(d)) => {
                if precedes(s, d, self.base_fee) {
                    d.clone()
                } else {
                    s.clone()
                }
            }
            (Some(s), None) => s.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) => unreachable!("eviction on an empty pool"),
        }
    }

    fn update_base_fee(&mut self, base_fee: U256) {
        if base_fee == self.base_fee {
            return
        }
        if base_fee > self.base_fee {
            // rising base fee can only clip static entries
            let demoted: Vec<_> = self
                .static_range
                .values()
                .filter(|tx| !tx.is_unclipped_at(base_fee))
                .cloned()
                .collect();
            for tx in demoted {
                self.static_range.remove(&PriorityKey::for_static_range(&tx));
                self.dynamic_range.insert(PriorityKey::for_dynamic_range(&tx), tx);
            }
        } else {
            // falling base fee can only unclip fee market entries
            let promoted: Vec<_> = self
                .dynamic_range
                .values()
                .filter(|tx| tx.is_unclipped_at(base_fee))
                .cloned()
                .collect();
            for tx in promoted {
                self.dynamic_range.remove(&PriorityKey::for_dynamic_range(&tx));
                self.static_range.insert(PriorityKey::for_static_range(&tx), tx);
            }
        }
        trace!(target: "txpool", old = ?self.base_fee, new = ?base_fee, "re-anchored base fee");
        self.base_fee = base_fee;
    }

    fn evict_older_than(&mut self, cutoff: u64) -> PoolEvents {
        let mut events = PoolEvents::default();
        let stale: Vec<_> =
            self.by_hash.values().filter(|tx| tx.added_at < cutoff).cloned().collect();
        for tx in stale {
            trace!(target: "txpool", "[{:?}] aged out", tx.hash());
            self.remove_entry(&tx);
            events.dropped.push(tx);
        }
        events
    }

    fn select_transactions<F>(&mut self, mut f: F) -> PoolEvents
    where
        F: FnMut(&Arc<PoolTransaction>) -> TransactionSelection,
    {
        let mut to_drop = Vec::new();
        {
            let mut offered: HashSet<TxHash> = HashSet::new();
            let mut statics = self.static_range.values().peekable();
            let mut dynamics = self.dynamic_range.values().peekable();

            'selection: loop {
                let candidate = match (statics.peek(), dynamics.peek()) {
                    (None, None) => break,
                    (Some(_), None) => statics.next().expect("peeked"),
                    (None, Some(_)) => dynamics.next().expect("peeked"),
                    (Some(s), Some(d)) => {
                        if precedes(s, d, self.base_fee) {
                            statics.next().expect("peeked")
                        } else {
                            dynamics.next().expect("peeked")
                        }
                    }
                };

                // a candidate surfaces its sender's lower nonces first, so
                // the sequence stays executable regardless of their own
                // position in the ranges
                let sender_txs = self
                    .by_sender
                    .get(candidate.sender())
                    .unwrap_or_else(|| panic!("sender index missing for {:?}", candidate.sender()));
                for tx in sender_txs.up_to(candidate.nonce()) {
                    if !offered.insert(*tx.hash()) {
                        continue
                    }
                    match f(tx) {
                        TransactionSelection::Keep => {}
                        TransactionSelection::DropAndContinue => to_drop.push(tx.clone()),
                        TransactionSelection::Stop => break 'selection,
                    }
                }
            }
        }

        let mut events = PoolEvents::default();
        for tx in to_drop {
            if self.by_hash.contains_key(tx.hash()) {
                self.remove_entry(&tx);
                events.dropped.push(tx);
            }
        }
        events
    }
}

/// True if `a` outranks `b` at the given base fee: the higher effective
/// priority fee wins, then local beats remote, then the earlier submission.
/// The effective fee is signed, so a zero-tip entry outranks one whose cap
/// is underwater on the base fee.
fn precedes(a: &Arc<PoolTransaction>, b: &Arc<PoolTransaction>, base_fee: U256) -> bool {
    let fee_a = a.effective_priority_fee_per_gas(base_fee);
    let fee_b = b.effective_priority_fee_per_gas(base_fee);
    if fee_a != fee_b {
        return fee_a > fee_b
    }
    if a.is_local != b.is_local {
        return a.is_local
    }
    a.sequence < b.sequence
}

/// Whether `new` clears the price bump over the entry it wants to replace.
///
/// Both the tip and the fee cap must be outbid. For transactions without
/// fee market fields the gas price stands in for both, which reduces the
/// check to a plain gas price bump between two legacy transactions.
fn meets_price_bump(old: &PoolTransaction, new: &PendingTransaction, price_bump: u64) -> bool {
    fn bumped(fee: U256, price_bump: u64) -> U256 {
        fee.saturating_mul(U256::from(100 + price_bump)) / U256::from(100u64)
    }
    let old_tx = &old.pending_transaction.transaction;
    let new_tx = &new.transaction;

    let old_tip = old_tx.max_priority_fee_per_gas().unwrap_or_else(|| old_tx.gas_price());
    let new_tip = new_tx.max_priority_fee_per_gas().unwrap_or_else(|| new_tx.gas_price());

    new_tip >= bumped(old_tip, price_bump) &&
        new_tx.gas_price() >= bumped(old_tx.gas_price(), price_bump)
}
