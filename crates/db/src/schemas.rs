//! Key-space definitions for the consensus tree.

use silica_chain_types::{CoinOutput, FundOutput, StorageContract};
use silica_primitives::{BlockId, ContractId, Currency, OutputId};
use silica_state::BlockNode;

use crate::keyspace::define_keyspace;

define_keyspace!(
    /// Spendable coin outputs keyed by output ID.
    (CoinOutputs, "coin:") OutputId => CoinOutput
);

define_keyspace!(
    /// Spendable fund outputs keyed by output ID.
    (FundOutputs, "fund:") OutputId => FundOutput
);

define_keyspace!(
    /// Active storage contracts keyed by contract ID.
    (Contracts, "contract:") ContractId => StorageContract
);

define_keyspace!(
    /// Index of active contracts by proof-window end, so expiring contracts
    /// can be found without scanning the whole contract space.
    (ContractExpiry, "expiry:") (u64, ContractId) => ()
);

define_keyspace!(
    /// Not-yet-spendable coin outputs keyed by (maturity height, output ID).
    (DelayedOutputs, "delayed:") (u64, OutputId) => CoinOutput
);

define_keyspace!(
    /// Maturity bucket registry: live delayed-output count per height. An
    /// entry existing is what makes the bucket "present"; delayed outputs
    /// may only target present buckets.
    (DelayedBuckets, "bucket:") u64 => u64
);

define_keyspace!(
    /// The fund pool accumulator (singleton).
    (FundPool, "pool:") () => Currency
);

define_keyspace!(
    /// Current chain height (singleton). Kept alongside the path so a
    /// transaction can extend the path without scanning it.
    (ChainHeight, "height:") () => u64
);

define_keyspace!(
    /// The canonical chain: block IDs by height.
    (ChainPath, "path:") u64 => BlockId
);

define_keyspace!(
    /// Processed and unprocessed block nodes by block ID. Not part of the
    /// state fingerprint; nodes are never deleted.
    (BlockNodes, "block:") BlockId => BlockNode
);

define_keyspace!(
    /// Blocks that failed validation and must never be reprocessed. Not
    /// part of the state fingerprint.
    (InvalidBlocks, "invalid:") BlockId => ()
);
