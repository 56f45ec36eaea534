//! End-of-block maintenance: output maturation, missed-proof resolution,
//! and block-reward issuance.
//!
//! Each task pre-scans committed state for its work list, then commits the
//! resulting diffs in one transaction and appends them to the node. Work
//! lists come back in key order, which keeps replay deterministic.

use silica_chain_types::contract_missed_payout_id;
use silica_db::{ConsensusDb, ConsensusTxn, DbError};
use silica_params::ConsensusParams;
use silica_state::{
    BlockNode, CoinOutputDiff, ContractDiff, DelayedOutputDiff, DiffBatch, DiffDirection,
};

use crate::{
    diffs::{commit_coin_output_diff, commit_contract_diff, commit_delayed_output_diff},
    errors::ConsensusError,
};

/// Moves every delayed output maturing at the node's height into spendable
/// storage, draining the height's bucket. Once drained, the bucket is
/// destroyed (buckets at or below the maturity delay are left behind; they
/// were seeded at genesis and nothing recreates them on revert).
pub(crate) fn apply_matured_outputs(
    db: &ConsensusDb,
    params: &ConsensusParams,
    node: &mut BlockNode,
) -> Result<(), ConsensusError> {
    let height = node.height();
    if height < params.maturity_delay {
        // No bucket exists yet this early in the chain.
        return Ok(());
    }

    let matured = db.delayed_outputs_at(height)?;
    let batch = db.with_txn(|txn: &ConsensusTxn<'_>| -> Result<DiffBatch, ConsensusError> {
        let mut batch = DiffBatch::new();
        for (id, output) in &matured {
            let coin = CoinOutputDiff::new(DiffDirection::Apply, *id, output.clone());
            commit_coin_output_diff(txn, &coin, DiffDirection::Apply)?;
            batch.coin_outputs.push(coin);

            let delayed =
                DelayedOutputDiff::new(DiffDirection::Revert, *id, output.clone(), height);
            commit_delayed_output_diff(txn, &delayed, DiffDirection::Apply)?;
            batch.delayed_outputs.push(delayed);
        }
        if height > params.maturity_delay {
            txn.remove_bucket(height)?;
        }
        Ok(batch)
    })?;
    node.extend_diffs(batch);
    Ok(())
}

/// Resolves every contract whose proof window ends at the node's height
/// with a missed proof: the missed payouts become delayed outputs and the
/// contract leaves active storage.
pub(crate) fn apply_missed_contracts(
    db: &ConsensusDb,
    params: &ConsensusParams,
    node: &mut BlockNode,
) -> Result<(), ConsensusError> {
    let height = node.height();
    let expiring = db.contracts_expiring_at(height)?;
    if expiring.is_empty() {
        return Ok(());
    }

    let batch = db.with_txn(|txn: &ConsensusTxn<'_>| -> Result<DiffBatch, ConsensusError> {
        let mut batch = DiffBatch::new();
        for id in &expiring {
            let contract = txn.contract(id)?.ok_or(DbError::ContractMissing(*id))?;

            for (index, output) in contract.missed_outputs().iter().enumerate() {
                let diff = DelayedOutputDiff::new(
                    DiffDirection::Apply,
                    contract_missed_payout_id(id, index),
                    output.clone(),
                    height + params.maturity_delay,
                );
                commit_delayed_output_diff(txn, &diff, DiffDirection::Apply)?;
                batch.delayed_outputs.push(diff);
            }

            let remove = ContractDiff::new(DiffDirection::Revert, *id, contract);
            commit_contract_diff(txn, &remove, DiffDirection::Apply)?;
            batch.contracts.push(remove);
        }
        Ok(batch)
    })?;
    node.extend_diffs(batch);
    Ok(())
}

/// Adds the block's reward payouts as delayed outputs maturing one maturity
/// delay ahead.
pub(crate) fn apply_reward_payouts(
    db: &ConsensusDb,
    params: &ConsensusParams,
    node: &mut BlockNode,
) -> Result<(), ConsensusError> {
    let height = node.height();
    let batch = db.with_txn(|txn: &ConsensusTxn<'_>| -> Result<DiffBatch, ConsensusError> {
        let mut batch = DiffBatch::new();
        for (index, payout) in node.block().reward_payouts().iter().enumerate() {
            let diff = DelayedOutputDiff::new(
                DiffDirection::Apply,
                node.block().reward_payout_id(index),
                payout.clone(),
                height + params.maturity_delay,
            );
            commit_delayed_output_diff(txn, &diff, DiffDirection::Apply)?;
            batch.delayed_outputs.push(diff);
        }
        Ok(batch)
    })?;
    node.extend_diffs(batch);
    Ok(())
}
