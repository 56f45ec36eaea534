//! Applies a validated transaction to the ledger, generating its diffs.
//!
//! Every storage change goes through the commit engine with the `Apply`
//! direction and is recorded in a [`DiffBatch`] in causal order, so the
//! batch replays (and reverses) exactly.

use silica_chain_types::{
    contract_valid_payout_id, fund_claim_output_id, CoinOutput, Transaction,
};
use silica_db::{ConsensusTxn, DbError};
use silica_params::ConsensusParams;
use silica_primitives::BlockHeight;
use silica_state::{
    CoinOutputDiff, ContractDiff, DelayedOutputDiff, DiffBatch, DiffDirection, FundOutputDiff,
    PoolDiff,
};

use crate::{
    diffs::{
        commit_coin_output_diff, commit_contract_diff, commit_delayed_output_diff,
        commit_fund_output_diff, commit_pool_diff,
    },
    errors::{ConsensusError, InvariantError},
};

/// Applies one transaction's effects to the ledger, returning the generated
/// diffs. The transaction has already been validated against the same view.
pub fn apply_transaction(
    txn: &ConsensusTxn<'_>,
    params: &ConsensusParams,
    height: BlockHeight,
    tx: &Transaction,
    sanity: bool,
) -> Result<DiffBatch, ConsensusError> {
    let mut batch = DiffBatch::new();
    apply_coin_inputs(txn, &mut batch, tx)?;
    apply_coin_outputs(txn, &mut batch, tx)?;
    apply_contracts(txn, &mut batch, params, tx, sanity)?;
    apply_revisions(txn, &mut batch, tx)?;
    apply_storage_proofs(txn, &mut batch, params, height, tx)?;
    apply_fund_inputs(txn, &mut batch, params, height, tx)?;
    apply_fund_outputs(txn, &mut batch, tx)?;
    Ok(batch)
}

/// Spends the transaction's coin inputs. The diff carries the full spent
/// output so the spend is reversible.
fn apply_coin_inputs(
    txn: &ConsensusTxn<'_>,
    batch: &mut DiffBatch,
    tx: &Transaction,
) -> Result<(), ConsensusError> {
    for input in tx.coin_inputs() {
        let output = txn
            .coin_output(input.parent())?
            .ok_or(DbError::CoinOutputMissing(*input.parent()))?;
        let diff = CoinOutputDiff::new(DiffDirection::Revert, *input.parent(), output);
        commit_coin_output_diff(txn, &diff, DiffDirection::Apply)?;
        batch.coin_outputs.push(diff);
    }
    Ok(())
}

fn apply_coin_outputs(
    txn: &ConsensusTxn<'_>,
    batch: &mut DiffBatch,
    tx: &Transaction,
) -> Result<(), ConsensusError> {
    for (index, output) in tx.coin_outputs().iter().enumerate() {
        let diff = CoinOutputDiff::new(
            DiffDirection::Apply,
            tx.coin_output_id(index),
            output.clone(),
        );
        commit_coin_output_diff(txn, &diff, DiffDirection::Apply)?;
        batch.coin_outputs.push(diff);
    }
    Ok(())
}

/// Adds new contracts and credits each contract's tax to the fund pool.
fn apply_contracts(
    txn: &ConsensusTxn<'_>,
    batch: &mut DiffBatch,
    params: &ConsensusParams,
    tx: &Transaction,
    sanity: bool,
) -> Result<(), ConsensusError> {
    for (index, contract) in tx.contracts().iter().enumerate() {
        let diff = ContractDiff::new(
            DiffDirection::Apply,
            tx.contract_id(index),
            contract.clone(),
        );
        commit_contract_diff(txn, &diff, DiffDirection::Apply)?;
        batch.contracts.push(diff);

        let tax = params.contract_tax(contract.payout());
        let previous = txn.pool()?;
        let adjusted = previous
            .checked_add(tax)
            .ok_or(InvariantError::CurrencyOverflow("growing the fund pool"))?;
        let pool_diff = PoolDiff::new(previous, adjusted).map_err(InvariantError::from)?;
        commit_pool_diff(txn, &pool_diff, DiffDirection::Apply, sanity)?;
        batch.pool.push(pool_diff);
    }
    Ok(())
}

/// Swaps an active contract for its revised version.
fn apply_revisions(
    txn: &ConsensusTxn<'_>,
    batch: &mut DiffBatch,
    tx: &Transaction,
) -> Result<(), ConsensusError> {
    for revision in tx.revisions() {
        let id = revision.parent();
        let existing = txn.contract(id)?.ok_or(DbError::ContractMissing(*id))?;

        let remove = ContractDiff::new(DiffDirection::Revert, *id, existing);
        commit_contract_diff(txn, &remove, DiffDirection::Apply)?;
        batch.contracts.push(remove);

        let add = ContractDiff::new(DiffDirection::Apply, *id, revision.contract().clone());
        commit_contract_diff(txn, &add, DiffDirection::Apply)?;
        batch.contracts.push(add);
    }
    Ok(())
}

/// Resolves proven contracts: the valid payouts become delayed outputs and
/// the contract leaves active storage.
fn apply_storage_proofs(
    txn: &ConsensusTxn<'_>,
    batch: &mut DiffBatch,
    params: &ConsensusParams,
    height: BlockHeight,
    tx: &Transaction,
) -> Result<(), ConsensusError> {
    for proof in tx.proofs() {
        let id = proof.parent();
        let contract = txn.contract(id)?.ok_or(DbError::ContractMissing(*id))?;

        for (index, output) in contract.valid_outputs().iter().enumerate() {
            let diff = DelayedOutputDiff::new(
                DiffDirection::Apply,
                contract_valid_payout_id(id, index),
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
    Ok(())
}

/// Spends fund outputs. Each spend claims the output's accrued share of the
/// pool as a delayed coin output maturing one maturity delay ahead.
fn apply_fund_inputs(
    txn: &ConsensusTxn<'_>,
    batch: &mut DiffBatch,
    params: &ConsensusParams,
    height: BlockHeight,
    tx: &Transaction,
) -> Result<(), ConsensusError> {
    for input in tx.fund_inputs() {
        let id = input.parent();
        let output = txn.fund_output(id)?.ok_or(DbError::FundOutputMissing(*id))?;

        // The pool is monotonic, so the accrual since claim_start cannot
        // underflow unless state is corrupt.
        let pool = txn.pool()?;
        let accrued = pool
            .checked_sub(output.claim_start())
            .ok_or(InvariantError::CurrencyOverflow("computing pool accrual"))?;
        let claim = accrued
            .checked_mul_units(output.units())
            .and_then(|c| c.checked_div_units(params.total_fund_units))
            .ok_or(InvariantError::CurrencyOverflow("computing fund claim"))?;

        let claim_diff = DelayedOutputDiff::new(
            DiffDirection::Apply,
            fund_claim_output_id(id),
            CoinOutput::new(claim, *output.recipient()),
            height + params.maturity_delay,
        );
        commit_delayed_output_diff(txn, &claim_diff, DiffDirection::Apply)?;
        batch.delayed_outputs.push(claim_diff);

        let remove = FundOutputDiff::new(DiffDirection::Revert, *id, output);
        commit_fund_output_diff(txn, &remove, DiffDirection::Apply)?;
        batch.fund_outputs.push(remove);
    }
    Ok(())
}

/// Adds new fund outputs with their claim start pinned to the current pool
/// value, whatever the transaction author put in the field.
fn apply_fund_outputs(
    txn: &ConsensusTxn<'_>,
    batch: &mut DiffBatch,
    tx: &Transaction,
) -> Result<(), ConsensusError> {
    for (index, output) in tx.fund_outputs().iter().enumerate() {
        let pool = txn.pool()?;
        let diff = FundOutputDiff::new(
            DiffDirection::Apply,
            tx.fund_output_id(index),
            output.with_claim_start(pool),
        );
        commit_fund_output_diff(txn, &diff, DiffDirection::Apply)?;
        batch.fund_outputs.push(diff);
    }
    Ok(())
}
