use silica_primitives::{BlockHeight, BlockId, ContractId, OutputId};
use sled::transaction::UnabortableTransactionError;
use thiserror::Error;

use crate::codec::CodecError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("consensus database not initialized")]
    NotInitialized,

    #[error("consensus database already initialized")]
    AlreadyInitialized,

    #[error("coin output {0} already exists")]
    CoinOutputExists(OutputId),

    #[error("coin output {0} does not exist")]
    CoinOutputMissing(OutputId),

    #[error("fund output {0} already exists")]
    FundOutputExists(OutputId),

    #[error("fund output {0} does not exist")]
    FundOutputMissing(OutputId),

    #[error("contract {0} already exists")]
    ContractExists(ContractId),

    #[error("contract {0} does not exist")]
    ContractMissing(ContractId),

    #[error("expiry pointer for contract {id} at height {height} already exists")]
    ExpiryPointerExists { height: BlockHeight, id: ContractId },

    #[error("contract {id} has no expiry pointer at height {height}")]
    ExpiryPointerMissing { height: BlockHeight, id: ContractId },

    #[error("no maturity bucket exists for height {0}")]
    BadMaturityHeight(BlockHeight),

    #[error("delayed output {id} already exists in bucket {height}")]
    DelayedOutputExists { height: BlockHeight, id: OutputId },

    #[error("delayed output {id} does not exist in bucket {height}")]
    DelayedOutputMissing { height: BlockHeight, id: OutputId },

    #[error("maturity bucket {0} already exists")]
    BucketExists(BlockHeight),

    #[error("maturity bucket {0} does not exist")]
    BucketMissing(BlockHeight),

    #[error("maturity bucket {height} is not empty ({remaining} outputs remain)")]
    BucketNotEmpty {
        height: BlockHeight,
        remaining: u64,
    },

    #[error("maturity bucket {0} count underflowed")]
    BucketUnderflow(BlockHeight),

    #[error("canonical path is empty")]
    PathEmpty,

    #[error("canonical path has no entry at height {0}")]
    PathEntryMissing(BlockHeight),

    #[error("canonical path already has an entry at height {0}")]
    PathEntryExists(BlockHeight),

    #[error("fund pool value is missing from storage")]
    PoolUninitialized,

    #[error("block node {0} is not in the block map")]
    BlockNodeMissing(BlockId),

    #[error("transaction conflict on single-writer store")]
    TransactionConflict,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
}

impl From<UnabortableTransactionError> for DbError {
    fn from(value: UnabortableTransactionError) -> Self {
        match value {
            UnabortableTransactionError::Conflict => DbError::TransactionConflict,
            UnabortableTransactionError::Storage(err) => DbError::Sled(err),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
