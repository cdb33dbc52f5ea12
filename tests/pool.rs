//! pool admission, ordering and eviction behavior

use bellows::{
    config::PoolConfig,
    eth::{
        error::{InvalidTransactionError, PoolError},
        pool::{AddedTransaction, Pool, TransactionSelection},
        sign::{DevSigner, TypedTransactionRequest},
        time::Clock,
        validate::AccountNonceValidator,
    },
};
use bellows_core::eth::{
    block::Header,
    transaction::{
        EIP1559TransactionRequest, LegacyTransactionRequest, PendingTransaction, TransactionKind,
    },
};
use ethers_core::{
    k256::ecdsa::SigningKey,
    types::{Address, Bytes, TxHash, U256},
    utils::secret_key_to_address,
};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

fn signer(byte: u8) -> (DevSigner, Address) {
    let key = SigningKey::from_slice(&[byte; 32]).unwrap();
    let address = secret_key_to_address(&key);
    (DevSigner::new(vec![key]), address)
}

fn fee_market_tx(
    signer: &DevSigner,
    from: &Address,
    nonce: u64,
    tip: u64,
    cap: u64,
) -> PendingTransaction {
    let request = TypedTransactionRequest::EIP1559(EIP1559TransactionRequest {
        chain_id: 1,
        nonce: nonce.into(),
        max_priority_fee_per_gas: tip.into(),
        max_fee_per_gas: cap.into(),
        gas_limit: U256::from(21_000u64),
        kind: TransactionKind::Call(Address::repeat_byte(0x99)),
        value: U256::zero(),
        input: Bytes::default(),
        access_list: vec![],
    });
    PendingTransaction::new(signer.sign_transaction(request, from).unwrap()).unwrap()
}

fn legacy_tx(
    signer: &DevSigner,
    from: &Address,
    nonce: u64,
    gas_price: u64,
) -> PendingTransaction {
    let request = TypedTransactionRequest::Legacy(LegacyTransactionRequest {
        nonce: nonce.into(),
        gas_price: gas_price.into(),
        gas_limit: U256::from(21_000u64),
        kind: TransactionKind::Call(Address::repeat_byte(0x99)),
        value: U256::zero(),
        input: Bytes::default(),
        chain_id: Some(1),
    });
    PendingTransaction::new(signer.sign_transaction(request, from).unwrap()).unwrap()
}

fn selection_order(pool: &Pool) -> Vec<TxHash> {
    let mut order = Vec::new();
    pool.select_transactions(|tx| {
        order.push(*tx.hash());
        TransactionSelection::Keep
    });
    order
}

fn dropped_recorder(pool: &Pool) -> Arc<Mutex<Vec<TxHash>>> {
    let dropped = Arc::new(Mutex::new(Vec::new()));
    let sink = dropped.clone();
    pool.subscribe_dropped(move |tx| sink.lock().push(*tx.hash()));
    dropped
}

#[test]
fn orders_by_miner_reward_across_base_fee_shifts() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);
    let (s2, a2) = signer(0x02);
    let (s3, a3) = signer(0x03);

    let clipped_late = fee_market_tx(&s1, &a1, 0, 2, 10);
    let clipped_early = fee_market_tx(&s2, &a2, 0, 3, 5);
    let wide_cap = fee_market_tx(&s3, &a3, 0, 1, 20);
    let hashes = [*clipped_late.hash(), *clipped_early.hash(), *wide_cap.hash()];

    for tx in [clipped_late, clipped_early, wide_cap] {
        assert!(matches!(
            pool.add_remote_transaction(tx).unwrap(),
            AddedTransaction::Added { .. }
        ));
    }

    // with no base fee every tip is unclipped, the plain tip order decides
    assert_eq!(selection_order(&pool), vec![hashes[1], hashes[0], hashes[2]]);

    // at base fee 6 the (3, 5) transaction is clipped below everything else
    pool.update_base_fee(U256::from(6u64));
    assert_eq!(selection_order(&pool), vec![hashes[0], hashes[2], hashes[1]]);

    // dropping the base fee restores the original order
    pool.update_base_fee(U256::zero());
    assert_eq!(selection_order(&pool), vec![hashes[1], hashes[0], hashes[2]]);
}

#[test]
fn zero_tip_outranks_underwater_entries_in_selection() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);
    let (s2, a2) = signer(0x02);

    // admitted first, so a fee tie would wrongly favor it on sequence
    let underwater = legacy_tx(&s1, &a1, 0, 5);
    let zero_tip = fee_market_tx(&s2, &a2, 0, 0, 10);
    let underwater_hash = *underwater.hash();
    let zero_tip_hash = *zero_tip.hash();
    pool.add_remote_transaction(underwater).unwrap();
    pool.add_remote_transaction(zero_tip).unwrap();

    // at base fee 6 the legacy entry earns the miner -1, the zero tip still
    // covers the base fee and must come first
    pool.update_base_fee(U256::from(6u64));
    assert_eq!(selection_order(&pool), vec![zero_tip_hash, underwater_hash]);
}

#[test]
fn eviction_sheds_underwater_entries_before_zero_tip_ones() {
    let config = PoolConfig { max_pending: 1, ..Default::default() };
    let pool = Pool::new(config);
    pool.update_base_fee(U256::from(6u64));
    let (s1, a1) = signer(0x01);
    let (s2, a2) = signer(0x02);

    let underwater = legacy_tx(&s1, &a1, 0, 5);
    let underwater_hash = *underwater.hash();
    pool.add_remote_transaction(underwater).unwrap();

    let zero_tip = fee_market_tx(&s2, &a2, 0, 0, 10);
    let zero_tip_hash = *zero_tip.hash();
    pool.add_remote_transaction(zero_tip).unwrap();

    assert_eq!(pool.len(), 1);
    assert!(pool.contains(&zero_tip_hash));
    assert!(!pool.contains(&underwater_hash));
}

#[test]
fn double_add_is_a_no_op() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);
    let tx = legacy_tx(&s1, &a1, 0, 100);
    let hash = *tx.hash();

    assert_eq!(
        pool.add_remote_transaction(tx.clone()).unwrap(),
        AddedTransaction::Added { hash }
    );
    assert_eq!(
        pool.add_remote_transaction(tx).unwrap(),
        AddedTransaction::AlreadyKnown { hash }
    );
    assert_eq!(pool.len(), 1);
}

#[test]
fn replacement_requires_price_bump() {
    let pool = Pool::new(PoolConfig::default());
    let dropped = dropped_recorder(&pool);
    let (s1, a1) = signer(0x01);

    let original = legacy_tx(&s1, &a1, 0, 100);
    let original_hash = *original.hash();
    pool.add_remote_transaction(original).unwrap();

    // 9% over the old gas price is not enough
    let cheap = legacy_tx(&s1, &a1, 0, 109);
    let cheap_hash = *cheap.hash();
    assert_eq!(
        pool.add_remote_transaction(cheap).unwrap(),
        AddedTransaction::ReplacementUnderpriced { hash: cheap_hash }
    );
    assert!(pool.contains(&original_hash));
    assert!(dropped.lock().is_empty());

    // 10% clears the bump and displaces the old entry
    let replacement = legacy_tx(&s1, &a1, 0, 110);
    let replacement_hash = *replacement.hash();
    assert_eq!(
        pool.add_remote_transaction(replacement).unwrap(),
        AddedTransaction::Added { hash: replacement_hash }
    );
    assert_eq!(pool.len(), 1);
    assert!(!pool.contains(&original_hash));
    assert!(pool.contains(&replacement_hash));
    assert_eq!(*dropped.lock(), vec![original_hash]);
}

#[test]
fn cross_type_replacement_bumps_both_fees() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);

    pool.add_remote_transaction(legacy_tx(&s1, &a1, 0, 100)).unwrap();

    // a generous tip does not help while the fee cap stays under the bump
    let low_cap = fee_market_tx(&s1, &a1, 0, 105, 105);
    assert!(matches!(
        pool.add_remote_transaction(low_cap).unwrap(),
        AddedTransaction::ReplacementUnderpriced { .. }
    ));

    let replacement = fee_market_tx(&s1, &a1, 0, 110, 110);
    assert!(matches!(
        pool.add_remote_transaction(replacement).unwrap(),
        AddedTransaction::Added { .. }
    ));
    assert_eq!(pool.len(), 1);
}

#[test]
fn capacity_eviction_spares_local_submissions() {
    let config = PoolConfig { max_pending: 2, ..Default::default() };
    let pool = Pool::new(config);
    let dropped = dropped_recorder(&pool);
    let (s1, a1) = signer(0x01);
    let (s2, a2) = signer(0x02);
    let (s3, a3) = signer(0x03);

    let cheap_remote = legacy_tx(&s1, &a1, 0, 5);
    let rich_remote = legacy_tx(&s2, &a2, 0, 6);
    let cheapest_local = legacy_tx(&s3, &a3, 0, 1);
    let cheap_remote_hash = *cheap_remote.hash();
    let local_hash = *cheapest_local.hash();

    pool.add_remote_transaction(cheap_remote).unwrap();
    pool.add_remote_transaction(rich_remote).unwrap();
    // the local outranks both remotes despite the lowest fee
    assert!(matches!(
        pool.add_local_transaction(cheapest_local).unwrap(),
        AddedTransaction::Added { .. }
    ));

    assert_eq!(pool.len(), 2);
    assert!(pool.contains(&local_hash));
    assert!(!pool.contains(&cheap_remote_hash));
    assert_eq!(*dropped.lock(), vec![cheap_remote_hash]);
}

#[test]
fn overfull_admission_can_evict_itself() {
    let config = PoolConfig { max_pending: 1, ..Default::default() };
    let pool = Pool::new(config);
    let (s1, a1) = signer(0x01);
    let (s2, a2) = signer(0x02);

    let rich = legacy_tx(&s1, &a1, 0, 100);
    let rich_hash = *rich.hash();
    pool.add_remote_transaction(rich).unwrap();

    // admitted, immediately shed as the lowest priority entry
    let poor = legacy_tx(&s2, &a2, 0, 1);
    let poor_hash = *poor.hash();
    assert_eq!(
        pool.add_remote_transaction(poor).unwrap(),
        AddedTransaction::Added { hash: poor_hash }
    );
    assert_eq!(pool.len(), 1);
    assert!(pool.contains(&rich_hash));
    assert!(!pool.contains(&poor_hash));
}

#[test]
fn selection_walks_sender_nonces_in_order() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);
    let (s2, a2) = signer(0x02);

    let first = legacy_tx(&s1, &a1, 0, 1);
    let second = legacy_tx(&s1, &a1, 1, 50);
    let other = legacy_tx(&s2, &a2, 0, 10);
    let hashes = [*first.hash(), *second.hash(), *other.hash()];

    for tx in [first, second, other] {
        pool.add_remote_transaction(tx).unwrap();
    }

    // the rich nonce-1 transaction surfaces first but must pull its
    // sender's nonce 0 ahead of itself
    assert_eq!(selection_order(&pool), vec![hashes[0], hashes[1], hashes[2]]);
}

#[test]
fn selection_applies_drops_and_stops() {
    let pool = Pool::new(PoolConfig::default());
    let dropped = dropped_recorder(&pool);
    let (s1, a1) = signer(0x01);
    let (s2, a2) = signer(0x02);
    let (s3, a3) = signer(0x03);

    let doomed = legacy_tx(&s1, &a1, 0, 30);
    let kept = legacy_tx(&s2, &a2, 0, 20);
    let unseen = legacy_tx(&s3, &a3, 0, 10);
    let doomed_hash = *doomed.hash();
    let kept_hash = *kept.hash();

    for tx in [doomed, kept, unseen] {
        pool.add_remote_transaction(tx).unwrap();
    }

    let mut offered = Vec::new();
    pool.select_transactions(|tx| {
        offered.push(*tx.hash());
        if *tx.hash() == doomed_hash {
            TransactionSelection::DropAndContinue
        } else {
            TransactionSelection::Stop
        }
    });

    // iteration stopped on the second candidate, the third was never offered
    assert_eq!(offered, vec![doomed_hash, kept_hash]);
    assert_eq!(pool.len(), 2);
    assert!(!pool.contains(&doomed_hash));
    assert_eq!(*dropped.lock(), vec![doomed_hash]);
}

#[test]
fn tracks_next_nonce_up_to_first_gap() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);

    assert_eq!(pool.next_nonce(&a1), None);
    for nonce in [0, 1, 3] {
        pool.add_remote_transaction(legacy_tx(&s1, &a1, nonce, 10)).unwrap();
    }
    assert_eq!(pool.next_nonce(&a1), Some(2));

    pool.add_remote_transaction(legacy_tx(&s1, &a1, 2, 10)).unwrap();
    assert_eq!(pool.next_nonce(&a1), Some(4));
}

#[test]
fn ages_out_transactions_past_retention() {
    let clock = Clock::default();
    let config = PoolConfig { retention: Duration::from_secs(60 * 60), ..Default::default() };
    let pool = Pool::with_parts(config, None, clock.clone());
    let dropped = dropped_recorder(&pool);
    let (s1, a1) = signer(0x01);

    let stale = legacy_tx(&s1, &a1, 0, 10);
    let stale_hash = *stale.hash();
    pool.add_remote_transaction(stale).unwrap();

    // nothing to do while the entry is fresh
    pool.evict_old();
    assert_eq!(pool.len(), 1);

    clock.advance(2 * 60 * 60);
    let fresh = legacy_tx(&s1, &a1, 1, 10);
    let fresh_hash = *fresh.hash();
    pool.add_remote_transaction(fresh).unwrap();

    pool.evict_old();
    assert_eq!(pool.len(), 1);
    assert!(!pool.contains(&stale_hash));
    assert!(pool.contains(&fresh_hash));
    assert_eq!(*dropped.lock(), vec![stale_hash]);
}

#[test]
fn mined_blocks_prune_silently_and_update_base_fee() {
    let pool = Pool::new(PoolConfig::default());
    let dropped = dropped_recorder(&pool);
    let (s1, a1) = signer(0x01);

    let mined = fee_market_tx(&s1, &a1, 0, 3, 5);
    let mined_hash = *mined.hash();
    pool.add_remote_transaction(mined).unwrap();
    let survivor = fee_market_tx(&s1, &a1, 1, 2, 10);
    let survivor_hash = *survivor.hash();
    pool.add_remote_transaction(survivor).unwrap();

    let header = Header {
        parent_hash: Default::default(),
        ommers_hash: Default::default(),
        beneficiary: Default::default(),
        state_root: Default::default(),
        transactions_root: Default::default(),
        receipts_root: Default::default(),
        logs_bloom: Default::default(),
        difficulty: Default::default(),
        number: 1u64.into(),
        gas_limit: Default::default(),
        gas_used: Default::default(),
        timestamp: 0,
        extra_data: Default::default(),
        mix_hash: Default::default(),
        nonce: Default::default(),
        base_fee_per_gas: Some(6u64.into()),
    };
    pool.on_mined_block(&header, [mined_hash]);

    assert_eq!(pool.len(), 1);
    assert!(pool.contains(&survivor_hash));
    // inclusion is not a drop
    assert!(dropped.lock().is_empty());
    assert_eq!(pool.base_fee(), U256::from(6u64));
}

#[test]
fn listener_lifecycle() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);

    let added = Arc::new(Mutex::new(Vec::new()));
    let sink = added.clone();
    let id = pool.subscribe_added(move |tx| sink.lock().push(*tx.hash()));

    let first = legacy_tx(&s1, &a1, 0, 10);
    let first_hash = *first.hash();
    pool.add_remote_transaction(first).unwrap();
    assert_eq!(*added.lock(), vec![first_hash]);

    pool.unsubscribe_added(id);
    pool.add_remote_transaction(legacy_tx(&s1, &a1, 1, 10)).unwrap();
    assert_eq!(*added.lock(), vec![first_hash]);
}

#[test]
fn announces_admitted_hashes_once() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);

    let first = legacy_tx(&s1, &a1, 0, 10);
    let second = legacy_tx(&s1, &a1, 1, 10);
    let hashes = vec![*first.hash(), *second.hash()];
    pool.add_remote_transaction(first.clone()).unwrap();
    pool.add_remote_transaction(second).unwrap();
    // duplicates do not queue another announcement
    pool.add_remote_transaction(first).unwrap();

    assert_eq!(pool.take_announcements(), hashes);
    assert!(pool.take_announcements().is_empty());
}

#[test]
fn ready_listener_receives_admitted_hashes() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);
    let mut listener = pool.add_ready_listener();

    let tx = legacy_tx(&s1, &a1, 0, 10);
    let hash = *tx.hash();
    pool.add_remote_transaction(tx.clone()).unwrap();
    // a duplicate admission is not re-announced
    pool.add_remote_transaction(tx).unwrap();

    assert_eq!(listener.try_next().unwrap(), Some(hash));
    assert!(listener.try_next().is_err());
}

#[test]
fn consults_the_chain_state_validator() {
    let validator = AccountNonceValidator::new(|_: &Address| 1u64);
    let pool = Pool::with_validator(PoolConfig::default(), Arc::new(validator));
    let (s1, a1) = signer(0x01);

    let err = pool.add_remote_transaction(legacy_tx(&s1, &a1, 0, 10)).unwrap_err();
    assert!(matches!(
        err,
        PoolError::InvalidTransaction(InvalidTransactionError::NonceTooLow)
    ));
    assert!(pool.is_empty());

    pool.add_remote_transaction(legacy_tx(&s1, &a1, 1, 10)).unwrap();
    assert_eq!(pool.len(), 1);
}

#[test]
fn rejects_transactions_for_other_chains() {
    let pool = Pool::new(PoolConfig::default());
    let (s1, a1) = signer(0x01);

    let request = TypedTransactionRequest::Legacy(LegacyTransactionRequest {
        nonce: U256::zero(),
        gas_price: U256::from(10u64),
        gas_limit: U256::from(21_000u64),
        kind: TransactionKind::Call(Address::repeat_byte(0x99)),
        value: U256::zero(),
        input: Bytes::default(),
        chain_id: Some(5),
    });
    let tx = PendingTransaction::new(s1.sign_transaction(request, &a1).unwrap()).unwrap();

    let err = pool.add_remote_transaction(tx).unwrap_err();
    assert!(matches!(
        err,
        PoolError::InvalidTransaction(InvalidTransactionError::InvalidChainId)
    ));
}
