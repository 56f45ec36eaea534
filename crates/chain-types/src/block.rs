use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use silica_primitives::{
    hash::{hash_borsh, tagged_hash},
    BlockId, Buf32, OutputId,
};

use crate::{CoinOutput, Transaction};

/// Header of a block. The block's ID is the hash of this structure.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct BlockHeader {
    parent: BlockId,
    timestamp: u64,
    nonce: u64,
}

impl BlockHeader {
    pub fn new(parent: BlockId, timestamp: u64, nonce: u64) -> Self {
        Self {
            parent,
            timestamp,
            nonce,
        }
    }

    pub fn parent(&self) -> &BlockId {
        &self.parent
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }
}

/// A candidate block: header, the reward payouts the producer claims, and
/// the ordered transaction list.
///
/// Proof-of-work and header-level checks happen before a block reaches the
/// state transition and are not represented here.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct Block {
    header: BlockHeader,
    reward_payouts: Vec<CoinOutput>,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        header: BlockHeader,
        reward_payouts: Vec<CoinOutput>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            header,
            reward_payouts,
            transactions,
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn reward_payouts(&self) -> &[CoinOutput] {
        &self.reward_payouts
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The block's ID, the hash of its header.
    pub fn block_id(&self) -> BlockId {
        BlockId::from(hash_borsh(&self.header))
    }

    /// ID of the delayed output paying out the i-th block reward.
    pub fn reward_payout_id(&self, index: usize) -> OutputId {
        derive_block_output_id("silica/block-reward", &self.block_id(), index)
    }
}

/// ID of the i-th coin output seeded directly at genesis.
pub fn genesis_coin_output_id(genesis: &BlockId, index: usize) -> OutputId {
    derive_block_output_id("silica/genesis-coin", genesis, index)
}

/// ID of the i-th fund output seeded directly at genesis.
pub fn genesis_fund_output_id(genesis: &BlockId, index: usize) -> OutputId {
    derive_block_output_id("silica/genesis-fund", genesis, index)
}

fn derive_block_output_id(tag: &str, block: &BlockId, index: usize) -> OutputId {
    let index = index as u64;
    let base: &Buf32 = block.inner();
    OutputId::from(tagged_hash(tag, &[base.as_slice(), &index.to_be_bytes()]))
}

#[cfg(test)]
mod tests {
    use silica_primitives::Currency;

    use super::*;

    fn sample_block() -> Block {
        Block::new(
            BlockHeader::new(BlockId::null(), 1_700_000_000, 42),
            vec![CoinOutput::new(Currency::new(1000), Buf32::new([1u8; 32]))],
            vec![],
        )
    }

    #[test]
    fn test_block_id_ignores_body() {
        let a = sample_block();
        let mut b = sample_block();
        b.transactions.push(Transaction::default());
        assert_eq!(a.block_id(), b.block_id());
    }

    #[test]
    fn test_block_id_tracks_header() {
        let a = sample_block();
        let b = Block::new(
            BlockHeader::new(BlockId::null(), 1_700_000_000, 43),
            a.reward_payouts.clone(),
            vec![],
        );
        assert_ne!(a.block_id(), b.block_id());
    }

    #[test]
    fn test_reward_payout_ids_distinct() {
        let block = sample_block();
        assert_ne!(block.reward_payout_id(0), block.reward_payout_id(1));
    }
}
