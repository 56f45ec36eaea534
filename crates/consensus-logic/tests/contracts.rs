//! Scenarios for the storage-contract lifecycle: creation and tax,
//! revision, proof resolution, and missed-proof expiry.

mod common;

use common::{addr, TestChain};
use silica_chain_types::{
    contract_missed_payout_id, contract_valid_payout_id, CoinInput, CoinOutput, ContractRevision,
    StorageContract, StorageProof, Transaction,
};
use silica_consensus_logic::{ConsensusError, TxValidationError};
use silica_primitives::{BlockHeight, ContractId, Currency, OutputId};
use silica_state::DiffDirection;

const PAYOUT: u128 = 2_500;
const NET: u128 = 2_400; // payout minus the 4% tax

fn contract(window_end: BlockHeight, revision: u64) -> StorageContract {
    StorageContract::new(
        Currency::new(PAYOUT),
        vec![CoinOutput::new(Currency::new(NET), addr(5))],
        vec![CoinOutput::new(Currency::new(NET), addr(6))],
        window_end,
        revision,
    )
}

fn create_contract_tx(parent: OutputId, window_end: BlockHeight) -> Transaction {
    Transaction::new(
        vec![CoinInput::new(parent)],
        vec![],
        vec![contract(window_end, 0)],
        vec![],
        vec![],
        vec![],
        vec![],
    )
}

fn proof_tx(parent: ContractId) -> Transaction {
    Transaction::new(
        vec![],
        vec![],
        vec![],
        vec![],
        vec![StorageProof::new(parent)],
        vec![],
        vec![],
    )
}

fn revision_tx(parent: ContractId, revised: StorageContract) -> Transaction {
    Transaction::new(
        vec![],
        vec![],
        vec![],
        vec![ContractRevision::new(parent, revised)],
        vec![],
        vec![],
        vec![],
    )
}

/// Creates a contract in a fresh chain and returns its ID.
fn setup_contract(chain: &mut TestChain, window_end: BlockHeight) -> ContractId {
    let tx = create_contract_tx(chain.genesis_coin_id(1), window_end);
    let cid = tx.contract_id(0);
    let block = chain.next_block(vec![tx]);
    chain.apply_block(block).unwrap();
    cid
}

#[test]
fn test_contract_creation_collects_tax() {
    let mut chain = TestChain::new();
    assert_eq!(chain.db().pool().unwrap(), Currency::ZERO);

    let cid = setup_contract(&mut chain, 20);

    let stored = chain.db().contract(&cid).unwrap().unwrap();
    assert_eq!(stored.payout(), Currency::new(PAYOUT));
    assert_eq!(chain.db().pool().unwrap(), Currency::new(100));
    assert_eq!(chain.db().contracts_expiring_at(20).unwrap(), vec![cid]);
}

#[test]
fn test_storage_proof_resolves_contract() {
    let mut chain = TestChain::new();
    let cid = setup_contract(&mut chain, 20);

    let block = chain.next_block(vec![proof_tx(cid)]);
    chain.apply_block(block).unwrap();

    assert!(chain.db().contract(&cid).unwrap().is_none());
    assert!(chain.db().contracts_expiring_at(20).unwrap().is_empty());

    // The valid payout matures one delay after the proof.
    let payout_id = contract_valid_payout_id(&cid, 0);
    let maturity = 2 + common::DELAY;
    assert!(chain
        .db()
        .delayed_output(maturity, &payout_id)
        .unwrap()
        .is_some());

    chain.mine_until(maturity);
    let payout = chain.db().coin_output(&payout_id).unwrap().unwrap();
    assert_eq!(payout.value(), Currency::new(NET));
    assert_eq!(*payout.recipient(), addr(5));

    // Resolution pays out of escrow; the pool keeps only the tax.
    assert_eq!(chain.db().pool().unwrap(), Currency::new(100));
}

#[test]
fn test_missed_proof_pays_missed_outputs() {
    let mut chain = TestChain::new();
    let window_end = 6;
    let cid = setup_contract(&mut chain, window_end);

    // Nobody proves the contract; the block at the window end resolves it.
    chain.mine_until(window_end);
    assert!(chain.db().contract(&cid).unwrap().is_none());
    assert!(chain
        .db()
        .contracts_expiring_at(window_end)
        .unwrap()
        .is_empty());

    let payout_id = contract_missed_payout_id(&cid, 0);
    let maturity = window_end + common::DELAY;
    assert!(chain
        .db()
        .delayed_output(maturity, &payout_id)
        .unwrap()
        .is_some());

    chain.mine_until(maturity);
    let payout = chain.db().coin_output(&payout_id).unwrap().unwrap();
    assert_eq!(payout.value(), Currency::new(NET));
    assert_eq!(*payout.recipient(), addr(6));
}

#[test]
fn test_revision_swaps_contract_and_reverts() {
    let mut chain = TestChain::new();
    let cid = setup_contract(&mut chain, 20);

    let block = chain.next_block(vec![revision_tx(cid, contract(25, 1))]);
    let node = chain.apply_block(block).unwrap();

    let revised = chain.db().contract(&cid).unwrap().unwrap();
    assert_eq!(revised.revision(), 1);
    assert_eq!(revised.window_end(), 25);
    assert!(chain.db().contracts_expiring_at(20).unwrap().is_empty());
    assert_eq!(chain.db().contracts_expiring_at(25).unwrap(), vec![cid]);

    chain
        .engine
        .commit_diff_set(&node, DiffDirection::Revert)
        .unwrap();
    let original = chain.db().contract(&cid).unwrap().unwrap();
    assert_eq!(original.revision(), 0);
    assert_eq!(original.window_end(), 20);
    assert_eq!(chain.db().contracts_expiring_at(20).unwrap(), vec![cid]);
}

#[test]
fn test_stale_revision_rejected() {
    let mut chain = TestChain::new();
    let cid = setup_contract(&mut chain, 20);
    let digest_before = chain.db().state_digest().unwrap();

    // Same revision number as the active contract.
    let block = chain.next_block(vec![revision_tx(cid, contract(25, 0))]);
    let err = chain.apply_block(block).unwrap_err();
    assert!(matches!(
        err,
        ConsensusError::InvalidTransaction {
            source: TxValidationError::StaleRevision { .. },
            ..
        }
    ));
    assert_eq!(chain.db().state_digest().unwrap(), digest_before);
}

#[test]
fn test_bad_payout_split_rejected() {
    let mut chain = TestChain::new();
    let bad_contract = StorageContract::new(
        Currency::new(PAYOUT),
        // Claims the gross payout, ignoring the tax.
        vec![CoinOutput::new(Currency::new(PAYOUT), addr(5))],
        vec![CoinOutput::new(Currency::new(NET), addr(6))],
        20,
        0,
    );
    let tx = Transaction::new(
        vec![CoinInput::new(chain.genesis_coin_id(1))],
        vec![],
        vec![bad_contract],
        vec![],
        vec![],
        vec![],
        vec![],
    );
    let block = chain.next_block(vec![tx]);
    let err = chain.apply_block(block).unwrap_err();
    assert!(matches!(
        err,
        ConsensusError::InvalidTransaction {
            source: TxValidationError::BadPayoutSplit { .. },
            ..
        }
    ));
}

#[test]
fn test_pool_never_decreases() {
    let mut chain = TestChain::new();
    let mut last_pool = chain.db().pool().unwrap();

    let cid = setup_contract(&mut chain, 20);
    let pool = chain.db().pool().unwrap();
    assert!(pool >= last_pool);
    last_pool = pool;

    let block = chain.next_block(vec![proof_tx(cid)]);
    chain.apply_block(block).unwrap();
    for _ in 0..4 {
        chain.mine();
        let pool = chain.db().pool().unwrap();
        assert!(pool >= last_pool);
        last_pool = pool;
    }
}
