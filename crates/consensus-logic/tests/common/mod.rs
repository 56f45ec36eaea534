//! Shared harness for the block-processing scenario tests.

use silica_chain_types::{
    genesis_coin_output_id, genesis_fund_output_id, Block, BlockHeader, CoinOutput, Transaction,
};
use silica_consensus_logic::{ConsensusEngine, ConsensusError, EngineConfig, UtxoValidator};
use silica_db::ConsensusDb;
use silica_params::{ConsensusParams, GenesisCoinAllocation, GenesisFundAllocation};
use silica_primitives::{BlockHeight, BlockId, Buf32, Currency, OutputId};
use silica_state::BlockNode;

pub const DELAY: u64 = 3;
pub const FUND_UNITS: u64 = 100;

pub fn addr(seed: u8) -> Buf32 {
    Buf32::new([seed; 32])
}

pub fn test_params() -> ConsensusParams {
    ConsensusParams {
        maturity_delay: DELAY,
        total_fund_units: FUND_UNITS,
        contract_tax_divisor: 25,
        initial_block_reward: Currency::new(1_000),
        block_reward_decay: Currency::new(10),
        minimum_block_reward: Currency::new(100),
        genesis_coin_allocation: vec![
            GenesisCoinAllocation {
                recipient: addr(1),
                value: Currency::new(10_000),
            },
            GenesisCoinAllocation {
                recipient: addr(1),
                value: Currency::new(2_500),
            },
        ],
        genesis_fund_allocation: vec![GenesisFundAllocation {
            recipient: addr(2),
            units: FUND_UNITS,
        }],
    }
}

pub fn genesis_block() -> Block {
    Block::new(
        BlockHeader::new(BlockId::null(), 1_700_000_000, 0),
        vec![CoinOutput::new(Currency::new(1_000), addr(9))],
        vec![],
    )
}

/// A chain with an initialized store and a running height counter, so tests
/// read as sequences of blocks.
pub struct TestChain {
    pub engine: ConsensusEngine<UtxoValidator>,
    pub genesis: Block,
    timestamp: u64,
}

impl TestChain {
    pub fn new() -> Self {
        let params = test_params();
        params.validate().unwrap();
        let db = ConsensusDb::temporary().unwrap();
        let genesis = genesis_block();
        db.initialize(&genesis, &params).unwrap();
        let validator = UtxoValidator::new(params.clone());
        let engine = ConsensusEngine::new(db, params, validator, EngineConfig::default());
        Self {
            engine,
            genesis,
            timestamp: 1_700_000_000,
        }
    }

    pub fn db(&self) -> &ConsensusDb {
        self.engine.db()
    }

    pub fn tip(&self) -> (BlockHeight, BlockId) {
        self.db().tip().unwrap()
    }

    /// Builds a block extending the current tip, claiming the full reward.
    pub fn next_block(&mut self, txs: Vec<Transaction>) -> Block {
        let (height, tip) = self.tip();
        self.timestamp += 1;
        let reward = self.engine.params().block_reward(height + 1);
        Block::new(
            BlockHeader::new(tip, self.timestamp, 0),
            vec![CoinOutput::new(reward, addr(9))],
            txs,
        )
    }

    pub fn apply_block(&mut self, block: Block) -> Result<BlockNode, ConsensusError> {
        let (height, _) = self.tip();
        let mut node = BlockNode::new_unprocessed(block, height + 1);
        self.engine.generate_and_apply_block(&mut node)?;
        Ok(node)
    }

    /// Mines one empty block.
    pub fn mine(&mut self) -> BlockNode {
        let block = self.next_block(vec![]);
        self.apply_block(block).unwrap()
    }

    /// Mines empty blocks until the tip reaches `height`.
    pub fn mine_until(&mut self, height: BlockHeight) {
        while self.tip().0 < height {
            self.mine();
        }
    }

    pub fn genesis_coin_id(&self, index: usize) -> OutputId {
        genesis_coin_output_id(&self.genesis.block_id(), index)
    }

    pub fn genesis_fund_id(&self, index: usize) -> OutputId {
        genesis_fund_output_id(&self.genesis.block_id(), index)
    }
}
