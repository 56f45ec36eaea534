//! Records of the state changes a block makes to the ledger.
//!
//! Each block mutates consensus state in a deterministic way; every mutation
//! is captured as a direction-tagged diff so the block can be rewound and
//! reapplied during chain reorganizations without recomputing anything.

mod block_node;
mod diff;

pub use block_node::*;
pub use diff::*;
