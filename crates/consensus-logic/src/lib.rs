//! The consensus state-transition engine.
//!
//! A block's effects on the ledger are recorded as direction-tagged diffs
//! while its transactions are validated and applied. The stored diffs make
//! every block reversible: reorganizations replay them forward or backward
//! without revalidating anything. Any mismatch between a diff and the state
//! it is applied to means the diff ledger and the store have diverged, and
//! processing halts rather than continue on corrupted state.

pub mod apply_tx;
pub mod diffs;
pub mod engine;
pub mod errors;
pub mod maintenance;
pub mod validation;

pub use engine::{ConsensusEngine, EngineConfig};
pub use errors::{ConsensusError, InvariantError};
pub use validation::{StateView, TransactionValidator, TxValidationError, UtxoValidator};
