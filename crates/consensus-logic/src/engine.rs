//! The block processor: validates and applies blocks one at a time,
//! generating their diffs, and replays already-generated diff sets during
//! reorganizations.

use silica_db::{ConsensusDb, ConsensusTxn};
use silica_params::ConsensusParams;
use silica_state::{BlockNode, DiffBatch, DiffDirection};
use tracing::{debug, error, info, warn};

use crate::{
    apply_tx::apply_transaction,
    diffs::{
        commit_node_diffs, create_upcoming_buckets, remove_obsolete_buckets, update_chain_path,
    },
    errors::{ConsensusError, InvariantError},
    maintenance::{apply_matured_outputs, apply_missed_contracts, apply_reward_payouts},
    validation::{TransactionValidator, TxValidationError, TxnStateView},
};

/// Engine knobs that are not consensus parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enables the pre/post-condition checks of the commit paths (wrong-tip
    /// detection, pool expectation matching, path position checks) and the
    /// per-block state digest. Cost-sensitive builds may turn this off;
    /// tests never do. Entity-level integrity checks always run.
    pub sanity_checks: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sanity_checks: true,
        }
    }
}

/// The consensus engine. One engine owns the consensus database; callers
/// are expected to serialize access (all block processing goes through
/// `&mut self`).
#[derive(Debug)]
pub struct ConsensusEngine<V> {
    db: ConsensusDb,
    params: ConsensusParams,
    validator: V,
    config: EngineConfig,
}

impl<V: TransactionValidator> ConsensusEngine<V> {
    pub fn new(db: ConsensusDb, params: ConsensusParams, validator: V, config: EngineConfig) -> Self {
        Self {
            db,
            params,
            validator,
            config,
        }
    }

    pub fn db(&self) -> &ConsensusDb {
        &self.db
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Validates a block and integrates it into the consensus state,
    /// generating its diffs. This is the sole entry point for extending the
    /// chain by one block.
    ///
    /// Validation and application happen together, transaction by
    /// transaction, because later transactions may depend on the effects of
    /// earlier ones in the same block. If any transaction turns out
    /// invalid, everything the block did so far is reverted, the block is
    /// remembered as invalid, and the validation failure is returned; the
    /// store is left exactly as it was. Any other error is fatal and the
    /// caller must halt instead of processing further blocks
    /// ([`ConsensusError::is_fatal`]).
    pub fn generate_and_apply_block(&mut self, node: &mut BlockNode) -> Result<(), ConsensusError> {
        let block_id = node.block_id();
        if self.db.is_invalid(&block_id)? {
            return Err(ConsensusError::KnownInvalidBlock(block_id));
        }
        if self.config.sanity_checks {
            if node.diffs_generated() {
                return Err(InvariantError::DiffsAlreadyGenerated(block_id).into());
            }
            let (tip_height, tip_id) = self.db.tip()?;
            if *node.parent() != tip_id || node.height() != tip_height + 1 {
                return Err(InvariantError::InvalidSuccessor {
                    parent: *node.parent(),
                    tip: tip_id,
                }
                .into());
            }
        }

        // Point the chain at the new block and pre-create the maturity
        // bucket its delayed outputs will target.
        self.db.push_path(&block_id)?;
        self.db
            .create_delayed_bucket(node.height() + self.params.maturity_delay)?;

        // From here on diffs exist for this node; whatever happens, they
        // end up either fully committed or fully reverted.
        node.set_diffs_generated();

        let height = node.height();
        let tx_count = node.block().transactions().len();
        for index in 0..tx_count {
            let tx = node.block().transactions()[index].clone();
            let txid = tx.txid();
            let result = self
                .db
                .with_txn(|txn: &ConsensusTxn<'_>| -> Result<DiffBatch, ConsensusError> {
                    let view = TxnStateView::new(txn, height);
                    self.validator
                        .validate(&view, &tx)
                        .map_err(|source| match source {
                            TxValidationError::StateUnavailable(err) => ConsensusError::Db(err),
                            source => ConsensusError::InvalidTransaction {
                                index,
                                txid,
                                source,
                            },
                        })?;
                    apply_transaction(txn, &self.params, height, &tx, self.config.sanity_checks)
                });
            match result {
                Ok(batch) => node.extend_diffs(batch),
                Err(cause @ ConsensusError::InvalidTransaction { .. }) => {
                    warn!(%block_id, index, %txid, "rejecting block: invalid transaction");
                    return self.reject_block(node, cause);
                }
                Err(err) => {
                    error!(%block_id, %err, "block application failed");
                    return Err(err);
                }
            }
        }

        self.apply_maintenance(node)?;

        if self.config.sanity_checks {
            node.set_state_digest(self.db.state_digest()?);
        }

        // Replace the unprocessed node in the block map with the processed
        // one, diffs included.
        self.db.put_block_node(node)?;
        info!(%block_id, height, txs = tx_count, "applied block");
        Ok(())
    }

    /// Applies or reverts an already-generated diff set. Used during
    /// reorganizations to replay blocks without revalidating their
    /// transactions.
    pub fn commit_diff_set(
        &self,
        node: &BlockNode,
        direction: DiffDirection,
    ) -> Result<(), ConsensusError> {
        self.commit_diff_set_sanity(node, direction)?;
        debug!(block_id = %node.block_id(), ?direction, "committing diff set");
        self.db
            .with_txn(|txn: &ConsensusTxn<'_>| -> Result<(), ConsensusError> {
                create_upcoming_buckets(txn, node.height(), self.params.maturity_delay, direction)?;
                commit_node_diffs(txn, node, direction, self.config.sanity_checks)?;
                remove_obsolete_buckets(txn, node.height(), self.params.maturity_delay, direction)?;
                update_chain_path(txn, node, direction, self.config.sanity_checks)?;
                Ok(())
            })
    }

    /// Pre-commit sanity: the node must have its diffs generated, and must
    /// sit at the right position relative to the current tip for the
    /// requested direction. Getting this wrong means the caller is replaying
    /// blocks out of order, which is a fatal defect.
    fn commit_diff_set_sanity(
        &self,
        node: &BlockNode,
        direction: DiffDirection,
    ) -> Result<(), ConsensusError> {
        if !self.config.sanity_checks {
            return Ok(());
        }
        if !node.diffs_generated() {
            return Err(InvariantError::DiffsNotGenerated(node.block_id()).into());
        }
        let (_, tip_id) = self.db.tip()?;
        match direction {
            DiffDirection::Apply => {
                if *node.parent() != tip_id {
                    return Err(InvariantError::WrongApplyTarget {
                        parent: *node.parent(),
                        tip: tip_id,
                    }
                    .into());
                }
            }
            DiffDirection::Revert => {
                if node.block_id() != tip_id {
                    return Err(InvariantError::WrongRevertTarget {
                        block: node.block_id(),
                        tip: tip_id,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Rolls back a block that contained an invalid transaction.
    ///
    /// Maturation is re-applied first so the maturity bucket bookkeeping in
    /// the diff set stays structurally consistent, then the whole diff set
    /// is reverted and the block is remembered as permanently invalid. If
    /// the maturation step itself fails, both causes are reported together
    /// and nothing further is attempted.
    fn reject_block(
        &self,
        node: &mut BlockNode,
        cause: ConsensusError,
    ) -> Result<(), ConsensusError> {
        if let Err(maintenance) = apply_matured_outputs(&self.db, &self.params, node) {
            return Err(ConsensusError::RejectedBlockMaintenance {
                maintenance: Box::new(maintenance),
                validation: Box::new(cause),
            });
        }
        self.commit_diff_set(node, DiffDirection::Revert)?;
        self.db.mark_invalid(&node.block_id())?;
        Err(cause)
    }

    /// End-of-block maintenance: mature delayed outputs, resolve expiring
    /// contracts with missed proofs, and issue the block's reward payouts.
    fn apply_maintenance(&self, node: &mut BlockNode) -> Result<(), ConsensusError> {
        apply_matured_outputs(&self.db, &self.params, node)?;
        apply_missed_contracts(&self.db, &self.params, node)?;
        apply_reward_payouts(&self.db, &self.params, node)?;
        Ok(())
    }
}
