//! Value types carried by blocks: transactions and their components, plus
//! the block container itself. These are the inputs to the consensus state
//! transition; the diff records it produces live in `silica-state`.

mod block;
mod transaction;

pub use block::*;
pub use transaction::*;
