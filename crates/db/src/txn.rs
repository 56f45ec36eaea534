//! Typed transactional view of the consensus tree.

use silica_chain_types::{CoinOutput, FundOutput, StorageContract};
use silica_primitives::{BlockHeight, BlockId, ContractId, Currency, OutputId};
use silica_state::BlockNode;
use sled::transaction::TransactionalTree;

use crate::{
    error::{DbError, DbResult},
    keyspace::{full_key, KeySpace},
    schemas::{
        BlockNodes, ChainHeight, ChainPath, CoinOutputs, ContractExpiry, Contracts,
        DelayedBuckets, DelayedOutputs, FundOutputs, FundPool, InvalidBlocks,
    },
    ValueCodec,
};

/// View of the consensus tree inside an open sled transaction.
///
/// All writes made through this view commit or abort together. The store
/// serves a single writer, so a sled conflict is surfaced as an error
/// rather than retried.
///
/// The `create_*`/`remove_*` accessors enforce entity-level integrity:
/// creating an entity that exists or removing one that doesn't is reported
/// as a distinct error, since it means a diff and the stored state have
/// diverged.
pub struct ConsensusTxn<'a> {
    tree: &'a TransactionalTree,
}

impl<'a> ConsensusTxn<'a> {
    pub(crate) fn new(tree: &'a TransactionalTree) -> Self {
        Self { tree }
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
        Ok(())
    }

    fn delete<S: KeySpace>(&self, key: &S::Key) -> DbResult<()> {
        self.tree.remove(full_key::<S>(key)?)?;
        Ok(())
    }

    // Coin outputs.

    pub fn coin_output(&self, id: &OutputId) -> DbResult<Option<CoinOutput>> {
        self.get::<CoinOutputs>(id)
    }

    pub fn create_coin_output(&self, id: &OutputId, output: &CoinOutput) -> DbResult<()> {
        if self.get::<CoinOutputs>(id)?.is_some() {
            return Err(DbError::CoinOutputExists(*id));
        }
        self.put::<CoinOutputs>(id, output)
    }

    pub fn remove_coin_output(&self, id: &OutputId) -> DbResult<()> {
        if self.get::<CoinOutputs>(id)?.is_none() {
            return Err(DbError::CoinOutputMissing(*id));
        }
        self.delete::<CoinOutputs>(id)
    }

    // Fund outputs.

    pub fn fund_output(&self, id: &OutputId) -> DbResult<Option<FundOutput>> {
        self.get::<FundOutputs>(id)
    }

    pub fn create_fund_output(&self, id: &OutputId, output: &FundOutput) -> DbResult<()> {
        if self.get::<FundOutputs>(id)?.is_some() {
            return Err(DbError::FundOutputExists(*id));
        }
        self.put::<FundOutputs>(id, output)
    }

    pub fn remove_fund_output(&self, id: &OutputId) -> DbResult<()> {
        if self.get::<FundOutputs>(id)?.is_none() {
            return Err(DbError::FundOutputMissing(*id));
        }
        self.delete::<FundOutputs>(id)
    }

    // Contracts. The expiry index entry lives and dies with the contract.

    pub fn contract(&self, id: &ContractId) -> DbResult<Option<StorageContract>> {
        self.get::<Contracts>(id)
    }

    pub fn create_contract(&self, id: &ContractId, contract: &StorageContract) -> DbResult<()> {
        if self.get::<Contracts>(id)?.is_some() {
            return Err(DbError::ContractExists(*id));
        }
        let expiry = (contract.window_end(), *id);
        if self.get::<ContractExpiry>(&expiry)?.is_some() {
            return Err(DbError::ExpiryPointerExists {
                height: contract.window_end(),
                id: *id,
            });
        }
        self.put::<Contracts>(id, contract)?;
        self.put::<ContractExpiry>(&expiry, &())
    }

    pub fn remove_contract(&self, id: &ContractId) -> DbResult<()> {
        let Some(contract) = self.get::<Contracts>(id)? else {
            return Err(DbError::ContractMissing(*id));
        };
        let expiry = (contract.window_end(), *id);
        if self.get::<ContractExpiry>(&expiry)?.is_none() {
            return Err(DbError::ExpiryPointerMissing {
                height: contract.window_end(),
                id: *id,
            });
        }
        self.delete::<ContractExpiry>(&expiry)?;
        self.delete::<Contracts>(id)
    }

    // Delayed outputs and the maturity bucket registry.

    pub fn delayed_output(
        &self,
        height: BlockHeight,
        id: &OutputId,
    ) -> DbResult<Option<CoinOutput>> {
        self.get::<DelayedOutputs>(&(height, *id))
    }

    pub fn add_delayed_output(
        &self,
        height: BlockHeight,
        id: &OutputId,
        output: &CoinOutput,
    ) -> DbResult<()> {
        let Some(count) = self.get::<DelayedBuckets>(&height)? else {
            return Err(DbError::BadMaturityHeight(height));
        };
        if self.get::<DelayedOutputs>(&(height, *id))?.is_some() {
            return Err(DbError::DelayedOutputExists { height, id: *id });
        }
        self.put::<DelayedOutputs>(&(height, *id), output)?;
        self.put::<DelayedBuckets>(&height, &(count + 1))
    }

    pub fn remove_delayed_output(&self, height: BlockHeight, id: &OutputId) -> DbResult<()> {
        let Some(count) = self.get::<DelayedBuckets>(&height)? else {
            return Err(DbError::BadMaturityHeight(height));
        };
        if self.get::<DelayedOutputs>(&(height, *id))?.is_none() {
            return Err(DbError::DelayedOutputMissing { height, id: *id });
        }
        let count = count.checked_sub(1).ok_or(DbError::BucketUnderflow(height))?;
        self.delete::<DelayedOutputs>(&(height, *id))?;
        self.put::<DelayedBuckets>(&height, &count)
    }

    pub fn bucket_count(&self, height: BlockHeight) -> DbResult<Option<u64>> {
        self.get::<DelayedBuckets>(&height)
    }

    pub fn create_bucket(&self, height: BlockHeight) -> DbResult<()> {
        if self.get::<DelayedBuckets>(&height)?.is_some() {
            return Err(DbError::BucketExists(height));
        }
        self.put::<DelayedBuckets>(&height, &0)
    }

    pub fn remove_bucket(&self, height: BlockHeight) -> DbResult<()> {
        let Some(remaining) = self.get::<DelayedBuckets>(&height)? else {
            return Err(DbError::BucketMissing(height));
        };
        if remaining != 0 {
            return Err(DbError::BucketNotEmpty { height, remaining });
        }
        self.delete::<DelayedBuckets>(&height)
    }

    // Fund pool.

    pub fn pool(&self) -> DbResult<Currency> {
        self.get::<FundPool>(&())?.ok_or(DbError::PoolUninitialized)
    }

    pub fn set_pool(&self, value: Currency) -> DbResult<()> {
        self.put::<FundPool>(&(), &value)
    }

    // Canonical path.

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

    /// Appends a block ID at the next height and returns that height.
    pub fn push_path(&self, id: &BlockId) -> DbResult<BlockHeight> {
        let next = match self.get::<ChainHeight>(&())? {
            Some(height) => height + 1,
            None => 0,
        };
        if self.get::<ChainPath>(&next)?.is_some() {
            return Err(DbError::PathEntryExists(next));
        }
        self.put::<ChainPath>(&next, id)?;
        self.put::<ChainHeight>(&(), &next)?;
        Ok(next)
    }

    /// Removes the tip entry and returns it. The genesis entry cannot be
    /// popped.
    pub fn pop_path(&self) -> DbResult<(BlockHeight, BlockId)> {
        let height = self.height()?;
        if height == 0 {
            return Err(DbError::PathEmpty);
        }
        let id = self
            .get::<ChainPath>(&height)?
            .ok_or(DbError::PathEntryMissing(height))?;
        self.delete::<ChainPath>(&height)?;
        self.put::<ChainHeight>(&(), &(height - 1))?;
        Ok((height, id))
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
}
