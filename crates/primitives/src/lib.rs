//! Collection of generic internal data types that are used widely.

#[macro_use]
mod macros;

pub mod buf;
pub mod currency;
pub mod hash;
pub mod ids;

pub use buf::Buf32;
pub use currency::Currency;
pub use ids::{BlockId, ContractId, OutputId, TxId};

/// Chain height measured in blocks from genesis.
pub type BlockHeight = u64;
