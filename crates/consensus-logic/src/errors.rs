use silica_db::DbError;
use silica_primitives::{BlockHeight, BlockId, Currency, TxId};
use silica_state::NegativePoolAdjustment;
use thiserror::Error;

use crate::validation::TxValidationError;

/// A consensus invariant was violated.
///
/// These mean the engine was invoked outside its documented contract or
/// that persisted state has been corrupted. They are never recovered from;
/// the caller halts block processing instead of continuing on state that
/// may have silently diverged.
#[derive(Debug, Error)]
pub enum InvariantError {
    #[error("diffs were already generated for block {0}")]
    DiffsAlreadyGenerated(BlockId),

    #[error("diffs have not been generated for block {0}")]
    DiffsNotGenerated(BlockId),

    #[error("block parent {parent} does not extend the current tip {tip}")]
    InvalidSuccessor { parent: BlockId, tip: BlockId },

    #[error("applying a diff set whose parent {parent} is not the current tip {tip}")]
    WrongApplyTarget { parent: BlockId, tip: BlockId },

    #[error("reverting a diff set {block} that is not the current tip {tip}")]
    WrongRevertTarget { block: BlockId, tip: BlockId },

    #[error("pool diff 'previous' value {expected} does not match the stored pool {actual}")]
    PoolApplyMismatch { expected: Currency, actual: Currency },

    #[error("pool diff 'adjusted' value {expected} does not match the stored pool {actual}")]
    PoolRevertMismatch { expected: Currency, actual: Currency },

    #[error(transparent)]
    PoolShrink(#[from] NegativePoolAdjustment),

    #[error("pool diff carries the revert direction")]
    NonApplyPoolDiff,

    #[error("path update landed at height {actual}, expected {expected}")]
    PathHeightMismatch {
        expected: BlockHeight,
        actual: BlockHeight,
    },

    #[error("path pop removed {actual}, expected {expected}")]
    PathTipMismatch { expected: BlockId, actual: BlockId },

    #[error("currency overflow while {0}")]
    CurrencyOverflow(&'static str),
}

/// Errors surfaced by block processing.
///
/// Only two of these are expected outcomes: [`ConsensusError::InvalidTransaction`]
/// (the block was rejected, fully reverted, and remembered as invalid) and
/// [`ConsensusError::KnownInvalidBlock`]. Everything else is fatal; see
/// [`ConsensusError::is_fatal`].
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("block {0} was already found invalid")]
    KnownInvalidBlock(BlockId),

    #[error("transaction {index} ({txid}) is invalid: {source}")]
    InvalidTransaction {
        index: usize,
        txid: TxId,
        #[source]
        source: TxValidationError,
    },

    /// Maintenance failed while a rejected block was being rolled back.
    /// Both causes are preserved; the maintenance failure leads because it
    /// means the rollback itself is suspect.
    #[error("maintenance failed while rejecting a block: {maintenance} (rejection cause: {validation})")]
    RejectedBlockMaintenance {
        maintenance: Box<ConsensusError>,
        validation: Box<ConsensusError>,
    },

    #[error("consensus invariant violated: {0}")]
    Invariant(#[from] InvariantError),

    #[error("store error: {0}")]
    Db(#[from] DbError),
}

impl ConsensusError {
    /// Whether processing must halt rather than treat this as an ordinary
    /// rejected block.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ConsensusError::InvalidTransaction { .. } | ConsensusError::KnownInvalidBlock(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let recoverable = ConsensusError::KnownInvalidBlock(BlockId::null());
        assert!(!recoverable.is_fatal());

        let fatal = ConsensusError::Invariant(InvariantError::NonApplyPoolDiff);
        assert!(fatal.is_fatal());

        let db = ConsensusError::Db(DbError::PathEmpty);
        assert!(db.is_fatal());
    }
}
