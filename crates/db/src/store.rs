//! The consensus database: one sled tree holding the whole consensus state.

use std::path::Path;

use sha2::{Digest, Sha256};
use silica_chain_types::{
    genesis_coin_output_id, genesis_fund_output_id, Block, CoinOutput, FundOutput, StorageContract,
};
use silica_params::ConsensusParams;
use silica_primitives::{BlockHeight, BlockId, Buf32, ContractId, Currency, OutputId};
use silica_state::BlockNode;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use tracing::debug;

use crate::{
    error::{DbError, DbResult},
    keyspace::{decode_full_key, full_key, KeySpace},
    schemas::{
        BlockNodes, ChainHeight, ChainPath, CoinOutputs, ContractExpiry, Contracts,
        DelayedBuckets, DelayedOutputs, FundOutputs, FundPool, InvalidBlocks,
    },
    txn::ConsensusTxn,
    ValueCodec,
};

/// Name of the sled tree holding consensus state.
const CONSENSUS_TREE: &str = "consensus";

/// Opens the consensus database under a data directory.
pub fn open_consensus_db(datadir: &Path) -> anyhow::Result<ConsensusDb> {
    let sled_db = sled::open(datadir.join(CONSENSUS_TREE))?;
    Ok(ConsensusDb::new(&sled_db)?)
}

/// Handle to the consensus tree.
///
/// Point reads and scans run against the committed tree; every mutation of
/// consensus state goes through [`ConsensusDb::with_txn`] so it commits or
/// aborts atomically.
#[derive(Debug, Clone)]
pub struct ConsensusDb {
    tree: sled::Tree,
}

impl ConsensusDb {
    pub fn new(db: &sled::Db) -> DbResult<Self> {
        let tree = db.open_tree(CONSENSUS_TREE)?;
        Ok(Self { tree })
    }

    /// Opens a throwaway in-memory database, for tests.
    pub fn temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::new(&db)
    }

    fn get<S: KeySpace>(&self, key: &S::Key) -> DbResult<Option<S::Value>> {
        let raw = self.tree.get(full_key::<S>(key)?)?;
        raw.map(|v| S::Value::decode_value(&v))
            .transpose()
            .map_err(DbError::from)
    }

    fn put<S: KeySpace>(&self, key: &S::Key, value: &S::Value) -> DbResult<()> {
        self.tree
            .insert(full_key::<S>(key)?, value.encode_value()?)?;
        self.tree.flush()?;
        Ok(())
    }

    /// Runs `f` against a transactional view of the tree. Everything the
    /// closure writes commits atomically, or not at all if it errors.
    ///
    /// The store serves one writer, so transactional conflicts are surfaced
    /// as errors rather than retried.
    pub fn with_txn<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<DbError>,
        F: Fn(&ConsensusTxn<'_>) -> Result<R, E>,
    {
        let result = self.tree.transaction(|ttree| {
            let txn = ConsensusTxn::new(ttree);
            f(&txn).map_err(ConflictableTransactionError::Abort)
        });
        match result {
            Ok(value) => {
                self.tree.flush().map_err(|e| E::from(DbError::from(e)))?;
                Ok(value)
            }
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(E::from(DbError::from(err))),
        }
    }

    // Committed-state point reads.

    pub fn coin_output(&self, id: &OutputId) -> DbResult<Option<CoinOutput>> {
        self.get::<CoinOutputs>(id)
    }

    pub fn fund_output(&self, id: &OutputId) -> DbResult<Option<FundOutput>> {
        self.get::<FundOutputs>(id)
    }

    pub fn contract(&self, id: &ContractId) -> DbResult<Option<StorageContract>> {
        self.get::<Contracts>(id)
    }

    pub fn delayed_output(
        &self,
        height: BlockHeight,
        id: &OutputId,
    ) -> DbResult<Option<CoinOutput>> {
        self.get::<DelayedOutputs>(&(height, *id))
    }

    pub fn bucket_count(&self, height: BlockHeight) -> DbResult<Option<u64>> {
        self.get::<DelayedBuckets>(&height)
    }

    pub fn pool(&self) -> DbResult<Currency> {
        self.get::<FundPool>(&())?.ok_or(DbError::PoolUninitialized)
    }

    pub fn height(&self) -> DbResult<BlockHeight> {
        self.get::<ChainHeight>(&())?.ok_or(DbError::NotInitialized)
    }

    pub fn tip(&self) -> DbResult<(BlockHeight, BlockId)> {
        let height = self.height()?;
        let id = self
            .get::<ChainPath>(&height)?
            .ok_or(DbError::PathEntryMissing(height))?;
        Ok((height, id))
    }

    pub fn path_block(&self, height: BlockHeight) -> DbResult<Option<BlockId>> {
        self.get::<ChainPath>(&height)
    }

    /// Number of entries in the canonical path. Always current height + 1.
    pub fn path_len(&self) -> DbResult<u64> {
        let mut len = 0;
        for entry in self.tree.scan_prefix(ChainPath::PREFIX.as_bytes()) {
            entry?;
            len += 1;
        }
        Ok(len)
    }

    pub fn is_initialized(&self) -> DbResult<bool> {
        Ok(self.get::<ChainHeight>(&())?.is_some())
    }

    // Block map and known-invalid set.

    pub fn put_block_node(&self, node: &BlockNode) -> DbResult<()> {
        self.put::<BlockNodes>(&node.block_id(), node)
    }

    pub fn block_node(&self, id: &BlockId) -> DbResult<Option<BlockNode>> {
        self.get::<BlockNodes>(id)
    }

    pub fn mark_invalid(&self, id: &BlockId) -> DbResult<()> {
        self.put::<InvalidBlocks>(id, &())
    }

    pub fn is_invalid(&self, id: &BlockId) -> DbResult<bool> {
        Ok(self.get::<InvalidBlocks>(id)?.is_some())
    }

    // Scans used by maintenance pre-passes. Results come back in key order,
    // which keeps replay deterministic.

    /// The delayed outputs maturing at exactly `height`.
    pub fn delayed_outputs_at(
        &self,
        height: BlockHeight,
    ) -> DbResult<Vec<(OutputId, CoinOutput)>> {
        let mut prefix = DelayedOutputs::PREFIX.as_bytes().to_vec();
        prefix.extend_from_slice(&height.to_be_bytes());
        let mut outputs = Vec::new();
        for entry in self.tree.scan_prefix(prefix) {
            let (k, v) = entry?;
            let (_, id) = decode_full_key::<DelayedOutputs>(&k)?;
            outputs.push((id, CoinOutput::decode_value(&v)?));
        }
        Ok(outputs)
    }

    /// The contracts whose proof window ends at exactly `height`.
    pub fn contracts_expiring_at(&self, height: BlockHeight) -> DbResult<Vec<ContractId>> {
        let mut prefix = ContractExpiry::PREFIX.as_bytes().to_vec();
        prefix.extend_from_slice(&height.to_be_bytes());
        let mut contracts = Vec::new();
        for entry in self.tree.scan_prefix(prefix) {
            let (k, _) = entry?;
            let (_, id) = decode_full_key::<ContractExpiry>(&k)?;
            contracts.push(id);
        }
        Ok(contracts)
    }

    /// Fingerprint of the full consensus state: height, pool, canonical
    /// path, and every ledger entity, hashed in key order. The block map
    /// and known-invalid set are excluded; they record history, not state.
    pub fn state_digest(&self) -> DbResult<Buf32> {
        let mut hasher = Sha256::new();
        for prefix in [
            ChainHeight::PREFIX,
            FundPool::PREFIX,
            ChainPath::PREFIX,
            CoinOutputs::PREFIX,
            FundOutputs::PREFIX,
            Contracts::PREFIX,
            ContractExpiry::PREFIX,
            DelayedOutputs::PREFIX,
            DelayedBuckets::PREFIX,
        ] {
            for entry in self.tree.scan_prefix(prefix.as_bytes()) {
                let (k, v) = entry?;
                hasher.update((k.len() as u64).to_be_bytes());
                hasher.update(&k);
                hasher.update((v.len() as u64).to_be_bytes());
                hasher.update(&v);
            }
        }
        Ok(Buf32::new(hasher.finalize().into()))
    }

    /// Seeds an empty database with the genesis state: the genesis path
    /// entry, a zero pool, the first maturity bucket (holding the genesis
    /// reward payouts), and the configured coin and fund allocations.
    pub fn initialize(&self, genesis: &Block, params: &ConsensusParams) -> DbResult<()> {
        if self.is_initialized()? {
            return Err(DbError::AlreadyInitialized);
        }
        let genesis_id = genesis.block_id();
        self.with_txn(|txn: &ConsensusTxn<'_>| -> DbResult<()> {
            txn.push_path(&genesis_id)?;
            txn.set_pool(Currency::ZERO)?;
            txn.create_bucket(params.maturity_delay)?;
            for (i, payout) in genesis.reward_payouts().iter().enumerate() {
                txn.add_delayed_output(
                    params.maturity_delay,
                    &genesis.reward_payout_id(i),
                    payout,
                )?;
            }
            for (i, alloc) in params.genesis_coin_allocation.iter().enumerate() {
                let output = CoinOutput::new(alloc.value, alloc.recipient);
                txn.create_coin_output(&genesis_coin_output_id(&genesis_id, i), &output)?;
            }
            for (i, alloc) in params.genesis_fund_allocation.iter().enumerate() {
                let output = FundOutput::new(alloc.units, alloc.recipient, Currency::ZERO);
                txn.create_fund_output(&genesis_fund_output_id(&genesis_id, i), &output)?;
            }
            let mut node = BlockNode::new_unprocessed(genesis.clone(), 0);
            node.set_diffs_generated();
            txn.put_block_node(&node)?;
            Ok(())
        })?;
        debug!(%genesis_id, "initialized consensus database");
        Ok(())
    }

    // Thin transactional wrappers for the standalone bookkeeping steps of
    // block processing.

    pub fn create_delayed_bucket(&self, height: BlockHeight) -> DbResult<()> {
        self.with_txn(|txn: &ConsensusTxn<'_>| txn.create_bucket(height))
    }

    pub fn push_path(&self, id: &BlockId) -> DbResult<BlockHeight> {
        self.with_txn(|txn: &ConsensusTxn<'_>| txn.push_path(id))
    }

    pub fn pop_path(&self) -> DbResult<(BlockHeight, BlockId)> {
        self.with_txn(|txn: &ConsensusTxn<'_>| txn.pop_path())
    }
}
