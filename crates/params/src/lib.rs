//! Consensus parameters: the constants that define a chain instance.

use serde::{Deserialize, Serialize};
use silica_primitives::{BlockHeight, Buf32, Currency};

/// A coin balance seeded directly into spendable storage at genesis.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct GenesisCoinAllocation {
    pub recipient: Buf32,
    pub value: Currency,
}

/// A share of the fund supply assigned at genesis.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct GenesisFundAllocation {
    pub recipient: Buf32,
    pub units: u64,
}

/// Consensus parameters for a chain instance.
///
/// These are loaded from configuration once at startup and never change for
/// the lifetime of the chain.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ConsensusParams {
    /// Number of blocks an output waits after creation before it becomes
    /// spendable.
    pub maturity_delay: u64,

    /// Total fund supply, used as the divisor when computing a fund
    /// output's share of the pool.
    pub total_fund_units: u64,

    /// Divisor of the contract tax: creating a contract credits
    /// `payout / contract_tax_divisor` to the fund pool.
    pub contract_tax_divisor: u64,

    /// Block reward paid at height 0.
    pub initial_block_reward: Currency,

    /// Amount the block reward shrinks per block.
    pub block_reward_decay: Currency,

    /// Floor the block reward never decays below.
    pub minimum_block_reward: Currency,

    /// Coin outputs seeded at genesis.
    pub genesis_coin_allocation: Vec<GenesisCoinAllocation>,

    /// Fund outputs seeded at genesis. Unit totals must sum to
    /// `total_fund_units`.
    pub genesis_fund_allocation: Vec<GenesisFundAllocation>,
}

/// Rejected parameter set.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("maturity_delay must be at least 1")]
    ZeroMaturityDelay,

    #[error("total_fund_units must be at least 1")]
    ZeroFundSupply,

    #[error("contract_tax_divisor must be at least 1")]
    ZeroTaxDivisor,

    #[error("genesis fund allocation sums to {allocated}, expected {expected}")]
    FundAllocationMismatch { allocated: u64, expected: u64 },
}

impl ConsensusParams {
    /// Checks the internal consistency of the parameter set.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.maturity_delay == 0 {
            return Err(ParamsError::ZeroMaturityDelay);
        }
        if self.total_fund_units == 0 {
            return Err(ParamsError::ZeroFundSupply);
        }
        if self.contract_tax_divisor == 0 {
            return Err(ParamsError::ZeroTaxDivisor);
        }
        let allocated = self
            .genesis_fund_allocation
            .iter()
            .map(|a| a.units)
            .sum::<u64>();
        if allocated != self.total_fund_units {
            return Err(ParamsError::FundAllocationMismatch {
                allocated,
                expected: self.total_fund_units,
            });
        }
        Ok(())
    }

    /// The reward a block at `height` pays out, decaying linearly down to
    /// the floor.
    pub fn block_reward(&self, height: BlockHeight) -> Currency {
        let decayed = self
            .block_reward_decay
            .checked_mul_units(height)
            .and_then(|d| self.initial_block_reward.checked_sub(d));
        match decayed {
            Some(reward) if reward > self.minimum_block_reward => reward,
            _ => self.minimum_block_reward,
        }
    }

    /// The protocol tax a contract with the given payout contributes to the
    /// fund pool at creation.
    pub fn contract_tax(&self, payout: Currency) -> Currency {
        payout
            .checked_div_units(self.contract_tax_divisor)
            .unwrap_or(Currency::ZERO)
    }
}
