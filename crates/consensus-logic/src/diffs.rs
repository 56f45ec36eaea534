//! The diff commit engine.
//!
//! Each block changes the consensus set in a deterministic way; those
//! changes are recorded as diffs for easy rewinding and reapplying. One
//! commit function per diff kind both applies and reverts: if the diff's
//! own direction matches the requested direction the forward action runs,
//! otherwise the inverse. The functions here also manage the maturity
//! bucket window and the canonical path around a diff set.

use silica_db::ConsensusTxn;
use silica_primitives::BlockHeight;
use silica_state::{
    BlockNode, CoinOutputDiff, ContractDiff, DelayedOutputDiff, DiffDirection, FundOutputDiff,
    PoolDiff,
};

use crate::errors::{ConsensusError, InvariantError};

/// Applies or reverts a coin output diff.
pub fn commit_coin_output_diff(
    txn: &ConsensusTxn<'_>,
    diff: &CoinOutputDiff,
    dir: DiffDirection,
) -> Result<(), ConsensusError> {
    if diff.direction() == dir {
        txn.create_coin_output(diff.id(), diff.output())?;
    } else {
        txn.remove_coin_output(diff.id())?;
    }
    Ok(())
}

/// Applies or reverts a contract diff.
pub fn commit_contract_diff(
    txn: &ConsensusTxn<'_>,
    diff: &ContractDiff,
    dir: DiffDirection,
) -> Result<(), ConsensusError> {
    if diff.direction() == dir {
        txn.create_contract(diff.id(), diff.contract())?;
    } else {
        txn.remove_contract(diff.id())?;
    }
    Ok(())
}

/// Applies or reverts a fund output diff.
pub fn commit_fund_output_diff(
    txn: &ConsensusTxn<'_>,
    diff: &FundOutputDiff,
    dir: DiffDirection,
) -> Result<(), ConsensusError> {
    if diff.direction() == dir {
        txn.create_fund_output(diff.id(), diff.output())?;
    } else {
        txn.remove_fund_output(diff.id())?;
    }
    Ok(())
}

/// Applies or reverts a delayed output diff against the bucket for its
/// maturity height. The bucket must exist in either direction.
pub fn commit_delayed_output_diff(
    txn: &ConsensusTxn<'_>,
    diff: &DelayedOutputDiff,
    dir: DiffDirection,
) -> Result<(), ConsensusError> {
    if diff.direction() == dir {
        txn.add_delayed_output(diff.maturity_height(), diff.id(), diff.output())?;
    } else {
        txn.remove_delayed_output(diff.maturity_height(), diff.id())?;
    }
    Ok(())
}

/// Applies or reverts a pool diff.
///
/// The stored pool value must match the diff's expectation exactly; a
/// mismatch means the pool diff ledger has desynchronized from applied
/// state, which is unrecoverable.
pub fn commit_pool_diff(
    txn: &ConsensusTxn<'_>,
    diff: &PoolDiff,
    dir: DiffDirection,
    sanity: bool,
) -> Result<(), ConsensusError> {
    if sanity {
        // Re-run the generation-time checks: the pool only ever grows, and
        // pool diffs are only generated in the apply direction.
        PoolDiff::new(diff.previous(), diff.adjusted()).map_err(InvariantError::from)?;
        if diff.direction() != DiffDirection::Apply {
            return Err(InvariantError::NonApplyPoolDiff.into());
        }
    }

    match dir {
        DiffDirection::Apply => {
            if sanity {
                let pool = txn.pool()?;
                if pool != diff.previous() {
                    return Err(InvariantError::PoolApplyMismatch {
                        expected: diff.previous(),
                        actual: pool,
                    }
                    .into());
                }
            }
            txn.set_pool(diff.adjusted())?;
        }
        DiffDirection::Revert => {
            if sanity {
                let pool = txn.pool()?;
                if pool != diff.adjusted() {
                    return Err(InvariantError::PoolRevertMismatch {
                        expected: diff.adjusted(),
                        actual: pool,
                    }
                    .into());
                }
            }
            txn.set_pool(diff.previous())?;
        }
    }
    Ok(())
}

/// Commits all of the diffs in a block node, in fixed category order: coin
/// outputs, contracts, fund outputs, delayed outputs, pool. Reverting walks
/// each category in reverse insertion order, undoing the causally-latest
/// diff first.
pub fn commit_node_diffs(
    txn: &ConsensusTxn<'_>,
    node: &BlockNode,
    dir: DiffDirection,
    sanity: bool,
) -> Result<(), ConsensusError> {
    match dir {
        DiffDirection::Apply => {
            for diff in node.coin_output_diffs() {
                commit_coin_output_diff(txn, diff, dir)?;
            }
            for diff in node.contract_diffs() {
                commit_contract_diff(txn, diff, dir)?;
            }
            for diff in node.fund_output_diffs() {
                commit_fund_output_diff(txn, diff, dir)?;
            }
            for diff in node.delayed_output_diffs() {
                commit_delayed_output_diff(txn, diff, dir)?;
            }
            for diff in node.pool_diffs() {
                commit_pool_diff(txn, diff, dir, sanity)?;
            }
        }
        DiffDirection::Revert => {
            for diff in node.coin_output_diffs().iter().rev() {
                commit_coin_output_diff(txn, diff, dir)?;
            }
            for diff in node.contract_diffs().iter().rev() {
                commit_contract_diff(txn, diff, dir)?;
            }
            for diff in node.fund_output_diffs().iter().rev() {
                commit_fund_output_diff(txn, diff, dir)?;
            }
            for diff in node.delayed_output_diffs().iter().rev() {
                commit_delayed_output_diff(txn, diff, dir)?;
            }
            for diff in node.pool_diffs().iter().rev() {
                commit_pool_diff(txn, diff, dir, sanity)?;
            }
        }
    }
    Ok(())
}

/// Creates the maturity bucket that the diff set is about to target:
/// applying needs the upcoming bucket one maturity delay ahead, reverting
/// needs the block's own bucket back (it was drained and destroyed when the
/// block was applied).
pub fn create_upcoming_buckets(
    txn: &ConsensusTxn<'_>,
    height: BlockHeight,
    maturity_delay: u64,
    dir: DiffDirection,
) -> Result<(), ConsensusError> {
    match dir {
        DiffDirection::Apply => txn.create_bucket(height + maturity_delay)?,
        // No outputs mature in the first maturity_delay blocks, so there is
        // no bucket to restore below that height.
        DiffDirection::Revert if height > maturity_delay => txn.create_bucket(height)?,
        DiffDirection::Revert => {}
    }
    Ok(())
}

/// Destroys the maturity bucket the diff set has drained, asserting it is
/// empty.
pub fn remove_obsolete_buckets(
    txn: &ConsensusTxn<'_>,
    height: BlockHeight,
    maturity_delay: u64,
    dir: DiffDirection,
) -> Result<(), ConsensusError> {
    match dir {
        DiffDirection::Apply if height > maturity_delay => txn.remove_bucket(height)?,
        DiffDirection::Apply => {}
        DiffDirection::Revert => txn.remove_bucket(height + maturity_delay)?,
    }
    Ok(())
}

/// Updates the canonical path: appends the node as the new tip when
/// applying, removes the tip entry when reverting. Runs strictly after the
/// node's diffs have been committed.
pub fn update_chain_path(
    txn: &ConsensusTxn<'_>,
    node: &BlockNode,
    dir: DiffDirection,
    sanity: bool,
) -> Result<(), ConsensusError> {
    match dir {
        DiffDirection::Apply => {
            let height = txn.push_path(&node.block_id())?;
            if sanity && height != node.height() {
                return Err(InvariantError::PathHeightMismatch {
                    expected: node.height(),
                    actual: height,
                }
                .into());
            }
        }
        DiffDirection::Revert => {
            let (_, id) = txn.pop_path()?;
            if sanity && id != node.block_id() {
                return Err(InvariantError::PathTipMismatch {
                    expected: node.block_id(),
                    actual: id,
                }
                .into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use silica_chain_types::{CoinOutput, FundOutput, StorageContract};
    use silica_db::{ConsensusDb, DbError};
    use silica_primitives::{Buf32, ContractId, Currency, OutputId};

    use super::*;

    fn test_db() -> ConsensusDb {
        let db = ConsensusDb::temporary().unwrap();
        db.with_txn(|txn: &ConsensusTxn<'_>| {
            txn.set_pool(Currency::new(500))?;
            txn.create_bucket(10)
        })
        .unwrap();
        db
    }

    fn coin_diff(dir: DiffDirection, seed: u8, value: u128) -> CoinOutputDiff {
        CoinOutputDiff::new(
            dir,
            OutputId::from([seed; 32]),
            CoinOutput::new(Currency::new(value), Buf32::new([seed; 32])),
        )
    }

    #[test]
    fn test_coin_output_diff_roundtrip() {
        let db = test_db();
        let diff = coin_diff(DiffDirection::Apply, 1, 42);

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_coin_output_diff(txn, &diff, DiffDirection::Apply)
        })
        .unwrap();
        assert!(db.coin_output(diff.id()).unwrap().is_some());

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_coin_output_diff(txn, &diff, DiffDirection::Revert)
        })
        .unwrap();
        assert!(db.coin_output(diff.id()).unwrap().is_none());
    }

    #[test]
    fn test_coin_output_diff_double_apply_is_fatal() {
        let db = test_db();
        let diff = coin_diff(DiffDirection::Apply, 1, 42);
        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_coin_output_diff(txn, &diff, DiffDirection::Apply)
        })
        .unwrap();

        let err = db
            .with_txn(|txn: &ConsensusTxn<'_>| {
                commit_coin_output_diff(txn, &diff, DiffDirection::Apply)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Db(DbError::CoinOutputExists(_))
        ));
    }

    #[test]
    fn test_contract_diff_roundtrip() {
        let db = test_db();
        let id = ContractId::from([2u8; 32]);
        let contract = StorageContract::new(
            Currency::new(100),
            vec![CoinOutput::new(Currency::new(96), Buf32::zero())],
            vec![CoinOutput::new(Currency::new(96), Buf32::zero())],
            30,
            0,
        );
        let diff = ContractDiff::new(DiffDirection::Apply, id, contract);

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_contract_diff(txn, &diff, DiffDirection::Apply)
        })
        .unwrap();
        assert!(db.contract(&id).unwrap().is_some());
        assert_eq!(db.contracts_expiring_at(30).unwrap(), vec![id]);

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_contract_diff(txn, &diff, DiffDirection::Revert)
        })
        .unwrap();
        assert!(db.contract(&id).unwrap().is_none());
        assert!(db.contracts_expiring_at(30).unwrap().is_empty());
    }

    #[test]
    fn test_fund_output_diff_roundtrip() {
        let db = test_db();
        let id = OutputId::from([4u8; 32]);
        let output = FundOutput::new(25, Buf32::new([4u8; 32]), Currency::new(500));
        let diff = FundOutputDiff::new(DiffDirection::Apply, id, output);

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_fund_output_diff(txn, &diff, DiffDirection::Apply)
        })
        .unwrap();
        assert!(db.fund_output(&id).unwrap().is_some());

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_fund_output_diff(txn, &diff, DiffDirection::Revert)
        })
        .unwrap();
        assert!(db.fund_output(&id).unwrap().is_none());
    }

    #[test]
    fn test_delayed_output_diff_roundtrip() {
        let db = test_db();
        let diff = DelayedOutputDiff::new(
            DiffDirection::Apply,
            OutputId::from([3u8; 32]),
            CoinOutput::new(Currency::new(7), Buf32::zero()),
            10,
        );

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_delayed_output_diff(txn, &diff, DiffDirection::Apply)
        })
        .unwrap();
        assert_eq!(db.bucket_count(10).unwrap(), Some(1));

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_delayed_output_diff(txn, &diff, DiffDirection::Revert)
        })
        .unwrap();
        assert_eq!(db.bucket_count(10).unwrap(), Some(0));
    }

    #[test]
    fn test_delayed_output_diff_bad_maturity_height() {
        let db = test_db();
        let diff = DelayedOutputDiff::new(
            DiffDirection::Apply,
            OutputId::from([3u8; 32]),
            CoinOutput::new(Currency::new(7), Buf32::zero()),
            11, // no bucket exists for this height
        );
        let err = db
            .with_txn(|txn: &ConsensusTxn<'_>| {
                commit_delayed_output_diff(txn, &diff, DiffDirection::Apply)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Db(DbError::BadMaturityHeight(11))
        ));
    }

    #[test]
    fn test_pool_diff_roundtrip() {
        let db = test_db();
        let diff = PoolDiff::new(Currency::new(500), Currency::new(600)).unwrap();

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_pool_diff(txn, &diff, DiffDirection::Apply, true)
        })
        .unwrap();
        assert_eq!(db.pool().unwrap(), Currency::new(600));

        db.with_txn(|txn: &ConsensusTxn<'_>| {
            commit_pool_diff(txn, &diff, DiffDirection::Revert, true)
        })
        .unwrap();
        assert_eq!(db.pool().unwrap(), Currency::new(500));
    }

    #[test]
    fn test_pool_diff_mismatch_is_fatal() {
        let db = test_db();
        // stored pool is 500, diff expects 400
        let diff = PoolDiff::new(Currency::new(400), Currency::new(450)).unwrap();
        let err = db
            .with_txn(|txn: &ConsensusTxn<'_>| {
                commit_pool_diff(txn, &diff, DiffDirection::Apply, true)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Invariant(InvariantError::PoolApplyMismatch { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Round-trip law: committing a diff and then committing it in the
        // opposite direction restores the prior storage state exactly.
        #[test]
        fn prop_coin_diff_roundtrip(seed in 1u8..=255, value in 0u128..u128::MAX) {
            let db = test_db();
            let before = db.state_digest().unwrap();
            let diff = coin_diff(DiffDirection::Apply, seed, value);

            db.with_txn(|txn: &ConsensusTxn<'_>| {
                commit_coin_output_diff(txn, &diff, DiffDirection::Apply)
            })
            .unwrap();
            db.with_txn(|txn: &ConsensusTxn<'_>| {
                commit_coin_output_diff(txn, &diff, DiffDirection::Revert)
            })
            .unwrap();

            prop_assert_eq!(db.state_digest().unwrap(), before);
        }
    }
}
