use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use silica_chain_types::Block;
use silica_primitives::{BlockHeight, BlockId, Buf32};

use crate::{
    CoinOutputDiff, ContractDiff, DelayedOutputDiff, DiffBatch, FundOutputDiff, PoolDiff,
};

/// A block together with its processing metadata and the diffs it generated.
///
/// The node is created unprocessed when a candidate block arrives. Its diffs
/// are generated exactly once while the block is validated and applied; from
/// then on the node is replayed forward or backward using the stored diffs,
/// never regenerated. Nodes are persisted with their diffs and are never
/// deleted.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct BlockNode {
    block: Block,
    height: BlockHeight,
    diffs_generated: bool,
    coin_output_diffs: Vec<CoinOutputDiff>,
    contract_diffs: Vec<ContractDiff>,
    fund_output_diffs: Vec<FundOutputDiff>,
    delayed_output_diffs: Vec<DelayedOutputDiff>,
    pool_diffs: Vec<PoolDiff>,
    state_digest: Option<Buf32>,
}

impl BlockNode {
    /// Wraps a received block that has not been processed yet.
    pub fn new_unprocessed(block: Block, height: BlockHeight) -> Self {
        Self {
            block,
            height,
            diffs_generated: false,
            coin_output_diffs: Vec::new(),
            contract_diffs: Vec::new(),
            fund_output_diffs: Vec::new(),
            delayed_output_diffs: Vec::new(),
            pool_diffs: Vec::new(),
            state_digest: None,
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn block_id(&self) -> BlockId {
        self.block.block_id()
    }

    pub fn parent(&self) -> &BlockId {
        self.block.header().parent()
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn diffs_generated(&self) -> bool {
        self.diffs_generated
    }

    /// Marks the start of diff generation. From this point the node's diffs
    /// exist in storage and must end up either fully committed or fully
    /// reverted.
    pub fn set_diffs_generated(&mut self) {
        self.diffs_generated = true;
    }

    pub fn coin_output_diffs(&self) -> &[CoinOutputDiff] {
        &self.coin_output_diffs
    }

    pub fn contract_diffs(&self) -> &[ContractDiff] {
        &self.contract_diffs
    }

    pub fn fund_output_diffs(&self) -> &[FundOutputDiff] {
        &self.fund_output_diffs
    }

    pub fn delayed_output_diffs(&self) -> &[DelayedOutputDiff] {
        &self.delayed_output_diffs
    }

    pub fn pool_diffs(&self) -> &[PoolDiff] {
        &self.pool_diffs
    }

    /// Appends a generated batch to the node's diff collections, preserving
    /// generation order within each category.
    pub fn extend_diffs(&mut self, batch: DiffBatch) {
        self.coin_output_diffs.extend(batch.coin_outputs);
        self.contract_diffs.extend(batch.contracts);
        self.fund_output_diffs.extend(batch.fund_outputs);
        self.delayed_output_diffs.extend(batch.delayed_outputs);
        self.pool_diffs.extend(batch.pool);
    }

    pub fn state_digest(&self) -> Option<&Buf32> {
        self.state_digest.as_ref()
    }

    pub fn set_state_digest(&mut self, digest: Buf32) {
        self.state_digest = Some(digest);
    }
}

#[cfg(test)]
mod tests {
    use silica_chain_types::{BlockHeader, CoinOutput};
    use silica_primitives::{Buf32, Currency, OutputId};

    use super::*;
    use crate::DiffDirection;

    fn sample_node() -> BlockNode {
        let block = Block::new(BlockHeader::new(BlockId::null(), 0, 0), vec![], vec![]);
        BlockNode::new_unprocessed(block, 1)
    }

    #[test]
    fn test_new_unprocessed() {
        let node = sample_node();
        assert!(!node.diffs_generated());
        assert!(node.coin_output_diffs().is_empty());
        assert!(node.state_digest().is_none());
    }

    #[test]
    fn test_extend_preserves_order() {
        let mut node = sample_node();
        let mut batch = DiffBatch::new();
        for i in 0..3u8 {
            batch.coin_outputs.push(CoinOutputDiff::new(
                DiffDirection::Apply,
                OutputId::from([i; 32]),
                CoinOutput::new(Currency::new(i as u128), Buf32::zero()),
            ));
        }
        node.extend_diffs(batch);
        let ids: Vec<_> = node.coin_output_diffs().iter().map(|d| *d.id()).collect();
        assert_eq!(
            ids,
            vec![
                OutputId::from([0u8; 32]),
                OutputId::from([1u8; 32]),
                OutputId::from([2u8; 32])
            ]
        );
    }

    #[test]
    fn test_borsh_roundtrip() {
        let mut node = sample_node();
        node.set_diffs_generated();
        node.set_state_digest(Buf32::new([5u8; 32]));
        let buf = borsh::to_vec(&node).unwrap();
        let decoded: BlockNode = borsh::from_slice(&buf).unwrap();
        assert_eq!(node, decoded);
    }
}
