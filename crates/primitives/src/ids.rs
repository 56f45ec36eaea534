//! Identifier newtypes for the entities tracked by consensus.

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::buf::Buf32;

/// ID of a block, the hash of its header.
#[derive(
    Copy,
    Clone,
    Eq,
    Default,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct BlockId(Buf32);

impl_buf_wrapper!(BlockId, Buf32, 32);

impl BlockId {
    /// Returns the all-zeroes blkid used as the genesis block's parent.
    pub fn null() -> Self {
        Self::from(Buf32::zero())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_zero()
    }
}

/// ID of a transaction, the hash of its contents.
#[derive(
    Copy,
    Clone,
    Eq,
    Default,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct TxId(Buf32);

impl_buf_wrapper!(TxId, Buf32, 32);

/// ID of a coin or fund output.
#[derive(
    Copy,
    Clone,
    Eq,
    Default,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct OutputId(Buf32);

impl_buf_wrapper!(OutputId, Buf32, 32);

/// ID of a storage contract.
#[derive(
    Copy,
    Clone,
    Eq,
    Default,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct ContractId(Buf32);

impl_buf_wrapper!(ContractId, Buf32, 32);
