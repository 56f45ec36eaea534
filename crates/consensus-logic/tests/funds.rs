//! Scenarios for the fund asset: spending fund outputs claims the accrued
//! pool share as a delayed coin output.

mod common;

use common::{addr, TestChain, DELAY, FUND_UNITS};
use silica_chain_types::{
    fund_claim_output_id, CoinInput, CoinOutput, FundInput, FundOutput, StorageContract,
    Transaction,
};
use silica_consensus_logic::{ConsensusError, TxValidationError};
use silica_primitives::{Currency, OutputId};
use silica_state::DiffDirection;

fn spend_fund(parent: OutputId, units: u64, recipient: u8) -> Transaction {
    Transaction::new(
        vec![],
        vec![],
        vec![],
        vec![],
        vec![],
        vec![FundInput::new(parent)],
        vec![FundOutput::new(units, addr(recipient), Currency::ZERO)],
    )
}

/// Grows the pool by creating a taxed contract (2500 payout, 100 tax).
fn grow_pool(chain: &mut TestChain) {
    let contract = StorageContract::new(
        Currency::new(2_500),
        vec![CoinOutput::new(Currency::new(2_400), addr(5))],
        vec![CoinOutput::new(Currency::new(2_400), addr(6))],
        50,
        0,
    );
    let tx = Transaction::new(
        vec![CoinInput::new(chain.genesis_coin_id(1))],
        vec![],
        vec![contract],
        vec![],
        vec![],
        vec![],
        vec![],
    );
    let block = chain.next_block(vec![tx]);
    chain.apply_block(block).unwrap();
}

#[test]
fn test_fund_spend_claims_pool_share() {
    let mut chain = TestChain::new();
    grow_pool(&mut chain);
    assert_eq!(chain.db().pool().unwrap(), Currency::new(100));

    let fund_id = chain.genesis_fund_id(0);
    let tx = spend_fund(fund_id, FUND_UNITS, 7);
    let new_fund_id = tx.fund_output_id(0);
    let block = chain.next_block(vec![tx]);
    let node = chain.apply_block(block).unwrap();
    let spend_height = node.height();

    // The spent output is gone; the replacement's claim start is pinned to
    // the pool value at creation, whatever the author wrote.
    assert!(chain.db().fund_output(&fund_id).unwrap().is_none());
    let new_fund = chain.db().fund_output(&new_fund_id).unwrap().unwrap();
    assert_eq!(new_fund.units(), FUND_UNITS);
    assert_eq!(new_fund.claim_start(), Currency::new(100));

    // The full accrual since genesis is claimed as a delayed output owned
    // by the spent output's recipient.
    let claim_id = fund_claim_output_id(&fund_id);
    let maturity = spend_height + DELAY;
    let claim = chain
        .db()
        .delayed_output(maturity, &claim_id)
        .unwrap()
        .unwrap();
    assert_eq!(claim.value(), Currency::new(100));
    assert_eq!(*claim.recipient(), addr(2));

    chain.mine_until(maturity);
    assert!(chain.db().coin_output(&claim_id).unwrap().is_some());
}

#[test]
fn test_fund_spend_reverts_cleanly() {
    let mut chain = TestChain::new();
    grow_pool(&mut chain);
    let digest_before = chain.db().state_digest().unwrap();

    let fund_id = chain.genesis_fund_id(0);
    let tx = spend_fund(fund_id, FUND_UNITS, 7);
    let block = chain.next_block(vec![tx]);
    let node = chain.apply_block(block).unwrap();

    chain
        .engine
        .commit_diff_set(&node, DiffDirection::Revert)
        .unwrap();
    assert_eq!(chain.db().state_digest().unwrap(), digest_before);
    let restored = chain.db().fund_output(&fund_id).unwrap().unwrap();
    assert_eq!(restored.claim_start(), Currency::ZERO);
}

#[test]
fn test_partial_claim_accrues_from_claim_start() {
    let mut chain = TestChain::new();
    grow_pool(&mut chain);

    // Reshuffle the fund at pool = 100; the replacement accrues nothing
    // until the pool grows again.
    let tx = spend_fund(chain.genesis_fund_id(0), FUND_UNITS, 7);
    let new_fund_id = tx.fund_output_id(0);
    let block = chain.next_block(vec![tx]);
    chain.apply_block(block).unwrap();

    // Another taxed contract grows the pool to 200.
    let contract = StorageContract::new(
        Currency::new(2_500),
        vec![CoinOutput::new(Currency::new(2_400), addr(5))],
        vec![CoinOutput::new(Currency::new(2_400), addr(6))],
        60,
        0,
    );
    let funding = chain.next_block(vec![Transaction::new(
        vec![CoinInput::new(chain.genesis_coin_id(0))],
        vec![CoinOutput::new(Currency::new(7_500), addr(1))],
        vec![contract],
        vec![],
        vec![],
        vec![],
        vec![],
    )]);
    chain.apply_block(funding).unwrap();
    assert_eq!(chain.db().pool().unwrap(), Currency::new(200));

    // Spending the replacement claims only the accrual since its creation.
    let tx = spend_fund(new_fund_id, FUND_UNITS, 8);
    let block = chain.next_block(vec![tx]);
    let node = chain.apply_block(block).unwrap();

    let claim_id = fund_claim_output_id(&new_fund_id);
    let claim = chain
        .db()
        .delayed_output(node.height() + DELAY, &claim_id)
        .unwrap()
        .unwrap();
    assert_eq!(claim.value(), Currency::new(100));
}

#[test]
fn test_fund_imbalance_rejected() {
    let mut chain = TestChain::new();
    let tx = spend_fund(chain.genesis_fund_id(0), FUND_UNITS - 1, 7);
    let block = chain.next_block(vec![tx]);
    let err = chain.apply_block(block).unwrap_err();
    assert!(matches!(
        err,
        ConsensusError::InvalidTransaction {
            source: TxValidationError::FundImbalance { .. },
            ..
        }
    ));
}
