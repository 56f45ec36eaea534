use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use silica_chain_types::{CoinOutput, FundOutput, StorageContract};
use silica_primitives::{BlockHeight, ContractId, Currency, OutputId};

/// Direction a diff is committed in.
///
/// A diff's own direction tag records the action that generated it; a commit
/// in the matching direction performs that action, a commit in the opposite
/// direction undoes it.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Arbitrary,
    BorshDeserialize,
    BorshSerialize,
    Deserialize,
    Serialize,
)]
pub enum DiffDirection {
    Apply,
    Revert,
}

impl DiffDirection {
    pub fn inverse(self) -> DiffDirection {
        match self {
            DiffDirection::Apply => DiffDirection::Revert,
            DiffDirection::Revert => DiffDirection::Apply,
        }
    }
}

/// A coin output entering (`Apply`) or leaving (`Revert`) spendable storage.
///
/// The full output value is carried so the change is reversible without any
/// other context.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct CoinOutputDiff {
    direction: DiffDirection,
    id: OutputId,
    output: CoinOutput,
}

impl CoinOutputDiff {
    pub fn new(direction: DiffDirection, id: OutputId, output: CoinOutput) -> Self {
        Self {
            direction,
            id,
            output,
        }
    }

    pub fn direction(&self) -> DiffDirection {
        self.direction
    }

    pub fn id(&self) -> &OutputId {
        &self.id
    }

    pub fn output(&self) -> &CoinOutput {
        &self.output
    }
}

/// A storage contract entering or leaving active storage.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct ContractDiff {
    direction: DiffDirection,
    id: ContractId,
    contract: StorageContract,
}

impl ContractDiff {
    pub fn new(direction: DiffDirection, id: ContractId, contract: StorageContract) -> Self {
        Self {
            direction,
            id,
            contract,
        }
    }

    pub fn direction(&self) -> DiffDirection {
        self.direction
    }

    pub fn id(&self) -> &ContractId {
        &self.id
    }

    pub fn contract(&self) -> &StorageContract {
        &self.contract
    }
}

/// A fund output entering or leaving spendable storage.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct FundOutputDiff {
    direction: DiffDirection,
    id: OutputId,
    output: FundOutput,
}

impl FundOutputDiff {
    pub fn new(direction: DiffDirection, id: OutputId, output: FundOutput) -> Self {
        Self {
            direction,
            id,
            output,
        }
    }

    pub fn direction(&self) -> DiffDirection {
        self.direction
    }

    pub fn id(&self) -> &OutputId {
        &self.id
    }

    pub fn output(&self) -> &FundOutput {
        &self.output
    }
}

/// A not-yet-spendable coin output entering or leaving the maturity bucket
/// for `maturity_height`.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct DelayedOutputDiff {
    direction: DiffDirection,
    id: OutputId,
    output: CoinOutput,
    maturity_height: BlockHeight,
}

impl DelayedOutputDiff {
    pub fn new(
        direction: DiffDirection,
        id: OutputId,
        output: CoinOutput,
        maturity_height: BlockHeight,
    ) -> Self {
        Self {
            direction,
            id,
            output,
            maturity_height,
        }
    }

    pub fn direction(&self) -> DiffDirection {
        self.direction
    }

    pub fn id(&self) -> &OutputId {
        &self.id
    }

    pub fn output(&self) -> &CoinOutput {
        &self.output
    }

    pub fn maturity_height(&self) -> BlockHeight {
        self.maturity_height
    }
}

/// One step of the fund pool accumulator.
///
/// The pool only ever grows, so a generated pool diff always has the `Apply`
/// direction and `adjusted >= previous`; the constructor rejects shrinkage
/// outright rather than letting a malformed diff into a block node.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct PoolDiff {
    direction: DiffDirection,
    previous: Currency,
    adjusted: Currency,
}

/// Rejected pool adjustment: the accumulator is monotonic.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("pool adjustment would shrink the pool ({previous} -> {adjusted})")]
pub struct NegativePoolAdjustment {
    previous: Currency,
    adjusted: Currency,
}

impl PoolDiff {
    pub fn new(previous: Currency, adjusted: Currency) -> Result<Self, NegativePoolAdjustment> {
        if adjusted < previous {
            return Err(NegativePoolAdjustment { previous, adjusted });
        }
        Ok(Self {
            direction: DiffDirection::Apply,
            previous,
            adjusted,
        })
    }

    pub fn direction(&self) -> DiffDirection {
        self.direction
    }

    pub fn previous(&self) -> Currency {
        self.previous
    }

    pub fn adjusted(&self) -> Currency {
        self.adjusted
    }
}

/// The diffs generated by one step of block processing (a single
/// transaction's effects, or one maintenance task), in generation order per
/// category.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiffBatch {
    pub coin_outputs: Vec<CoinOutputDiff>,
    pub contracts: Vec<ContractDiff>,
    pub fund_outputs: Vec<FundOutputDiff>,
    pub delayed_outputs: Vec<DelayedOutputDiff>,
    pub pool: Vec<PoolDiff>,
}

impl DiffBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.coin_outputs.is_empty()
            && self.contracts.is_empty()
            && self.fund_outputs.is_empty()
            && self.delayed_outputs.is_empty()
            && self.pool.is_empty()
    }
}
