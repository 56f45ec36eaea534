//! The transaction-validator collaborator interface.
//!
//! The engine validates each transaction against current state, including
//! the effects of earlier transactions in the same block, before applying
//! it. What exactly "valid" means is the validator's business; the engine
//! only distinguishes valid from invalid and treats a rejection as an
//! expected, recoverable outcome.

use std::collections::HashSet;

use silica_chain_types::{CoinOutput, FundOutput, StorageContract, Transaction};
use silica_db::{ConsensusTxn, DbError, DbResult};
use silica_params::ConsensusParams;
use silica_primitives::{BlockHeight, ContractId, Currency, OutputId};
use thiserror::Error;

/// Read-only view of consensus state at a point inside block processing.
pub trait StateView {
    /// Height of the block currently being processed.
    fn height(&self) -> BlockHeight;

    fn pool(&self) -> DbResult<Currency>;

    fn coin_output(&self, id: &OutputId) -> DbResult<Option<CoinOutput>>;

    fn fund_output(&self, id: &OutputId) -> DbResult<Option<FundOutput>>;

    fn contract(&self, id: &ContractId) -> DbResult<Option<StorageContract>>;
}

/// [`StateView`] over an open store transaction.
pub struct TxnStateView<'a, 't> {
    txn: &'a ConsensusTxn<'t>,
    height: BlockHeight,
}

impl<'a, 't> TxnStateView<'a, 't> {
    pub fn new(txn: &'a ConsensusTxn<'t>, height: BlockHeight) -> Self {
        Self { txn, height }
    }
}

impl StateView for TxnStateView<'_, '_> {
    fn height(&self) -> BlockHeight {
        self.height
    }

    fn pool(&self) -> DbResult<Currency> {
        self.txn.pool()
    }

    fn coin_output(&self, id: &OutputId) -> DbResult<Option<CoinOutput>> {
        self.txn.coin_output(id)
    }

    fn fund_output(&self, id: &OutputId) -> DbResult<Option<FundOutput>> {
        self.txn.fund_output(id)
    }

    fn contract(&self, id: &ContractId) -> DbResult<Option<StorageContract>> {
        self.txn.contract(id)
    }
}

/// Why a transaction was rejected.
///
/// `StateUnavailable` is the one exception to "rejected": it reports that
/// the state itself could not be read, and the engine escalates it instead
/// of blaming the transaction.
#[derive(Debug, Error)]
pub enum TxValidationError {
    #[error("coin input {0} does not exist")]
    MissingCoinInput(OutputId),

    #[error("coin input {0} is spent twice")]
    RepeatedCoinInput(OutputId),

    #[error("coin values do not balance (in {inputs}, out {outputs})")]
    CoinImbalance { inputs: Currency, outputs: Currency },

    #[error("contract proof window ends at {window_end}, at or before height {height}")]
    WindowElapsed {
        window_end: BlockHeight,
        height: BlockHeight,
    },

    #[error("contract {index} payouts do not sum to the payout net of tax")]
    BadPayoutSplit { index: usize },

    #[error("contract {0} does not exist")]
    MissingContract(ContractId),

    #[error("contract {0} is resolved or revised twice")]
    RepeatedContract(ContractId),

    #[error("revision {proposed} does not supersede revision {current}")]
    StaleRevision { current: u64, proposed: u64 },

    #[error("revision changes the contract payout")]
    PayoutChanged,

    #[error("storage proof window ended at {window_end}, before height {height}")]
    ProofWindowClosed {
        window_end: BlockHeight,
        height: BlockHeight,
    },

    #[error("fund input {0} does not exist")]
    MissingFundInput(OutputId),

    #[error("fund input {0} is spent twice")]
    RepeatedFundInput(OutputId),

    #[error("fund units do not balance (in {inputs}, out {outputs})")]
    FundImbalance { inputs: u64, outputs: u64 },

    #[error("currency overflow while validating")]
    Overflow,

    #[error("state read failed during validation: {0}")]
    StateUnavailable(#[from] DbError),
}

/// A validator deciding whether a transaction may be applied to the ledger.
pub trait TransactionValidator {
    /// Checks a transaction against current state. The view already
    /// reflects the effects of earlier transactions in the same block.
    fn validate(&self, view: &dyn StateView, tx: &Transaction) -> Result<(), TxValidationError>;
}

/// Structural ledger validation: existence, double-spends, value
/// conservation, payout splits, and window bounds.
///
/// Signature and script checking is not part of this validator; a
/// production deployment layers it on top through the same trait.
#[derive(Debug, Clone)]
pub struct UtxoValidator {
    params: ConsensusParams,
}

impl UtxoValidator {
    pub fn new(params: ConsensusParams) -> Self {
        Self { params }
    }

    fn validate_coin_flows(
        &self,
        view: &dyn StateView,
        tx: &Transaction,
    ) -> Result<(), TxValidationError> {
        let mut spent = HashSet::new();
        let mut inputs = Currency::ZERO;
        for input in tx.coin_inputs() {
            if !spent.insert(*input.parent()) {
                return Err(TxValidationError::RepeatedCoinInput(*input.parent()));
            }
            let output = view
                .coin_output(input.parent())?
                .ok_or(TxValidationError::MissingCoinInput(*input.parent()))?;
            inputs = inputs
                .checked_add(output.value())
                .ok_or(TxValidationError::Overflow)?;
        }

        let created = Currency::checked_sum(tx.coin_outputs().iter().map(|o| o.value()))
            .ok_or(TxValidationError::Overflow)?;
        let escrowed = Currency::checked_sum(tx.contracts().iter().map(|c| c.payout()))
            .ok_or(TxValidationError::Overflow)?;
        let outputs = created
            .checked_add(escrowed)
            .ok_or(TxValidationError::Overflow)?;

        if inputs != outputs {
            return Err(TxValidationError::CoinImbalance { inputs, outputs });
        }
        Ok(())
    }

    fn validate_contract(
        &self,
        height: BlockHeight,
        index: usize,
        contract: &StorageContract,
    ) -> Result<(), TxValidationError> {
        if contract.window_end() <= height {
            return Err(TxValidationError::WindowElapsed {
                window_end: contract.window_end(),
                height,
            });
        }
        let tax = self.params.contract_tax(contract.payout());
        let net = contract
            .payout()
            .checked_sub(tax)
            .ok_or(TxValidationError::Overflow)?;
        let valid = Currency::checked_sum(contract.valid_outputs().iter().map(|o| o.value()))
            .ok_or(TxValidationError::Overflow)?;
        let missed = Currency::checked_sum(contract.missed_outputs().iter().map(|o| o.value()))
            .ok_or(TxValidationError::Overflow)?;
        if valid != net || missed != net {
            return Err(TxValidationError::BadPayoutSplit { index });
        }
        Ok(())
    }

    fn validate_contract_updates(
        &self,
        view: &dyn StateView,
        tx: &Transaction,
    ) -> Result<(), TxValidationError> {
        let height = view.height();
        let mut touched = HashSet::new();

        for revision in tx.revisions() {
            let id = revision.parent();
            if !touched.insert(*id) {
                return Err(TxValidationError::RepeatedContract(*id));
            }
            let existing = view
                .contract(id)?
                .ok_or(TxValidationError::MissingContract(*id))?;
            let proposed = revision.contract();
            if proposed.revision() <= existing.revision() {
                return Err(TxValidationError::StaleRevision {
                    current: existing.revision(),
                    proposed: proposed.revision(),
                });
            }
            if proposed.payout() != existing.payout() {
                return Err(TxValidationError::PayoutChanged);
            }
            // The revised split must stay consistent too.
            self.validate_contract(height, 0, proposed)?;
        }

        for proof in tx.proofs() {
            let id = proof.parent();
            if !touched.insert(*id) {
                return Err(TxValidationError::RepeatedContract(*id));
            }
            let existing = view
                .contract(id)?
                .ok_or(TxValidationError::MissingContract(*id))?;
            if existing.window_end() < height {
                return Err(TxValidationError::ProofWindowClosed {
                    window_end: existing.window_end(),
                    height,
                });
            }
        }
        Ok(())
    }

    fn validate_fund_flows(
        &self,
        view: &dyn StateView,
        tx: &Transaction,
    ) -> Result<(), TxValidationError> {
        let mut spent = HashSet::new();
        let mut inputs: u64 = 0;
        for input in tx.fund_inputs() {
            if !spent.insert(*input.parent()) {
                return Err(TxValidationError::RepeatedFundInput(*input.parent()));
            }
            let output = view
                .fund_output(input.parent())?
                .ok_or(TxValidationError::MissingFundInput(*input.parent()))?;
            inputs = inputs
                .checked_add(output.units())
                .ok_or(TxValidationError::Overflow)?;
        }
        let mut outputs: u64 = 0;
        for output in tx.fund_outputs() {
            outputs = outputs
                .checked_add(output.units())
                .ok_or(TxValidationError::Overflow)?;
        }
        if inputs != outputs {
            return Err(TxValidationError::FundImbalance { inputs, outputs });
        }
        Ok(())
    }
}

impl TransactionValidator for UtxoValidator {
    fn validate(&self, view: &dyn StateView, tx: &Transaction) -> Result<(), TxValidationError> {
        self.validate_coin_flows(view, tx)?;
        for (index, contract) in tx.contracts().iter().enumerate() {
            self.validate_contract(view.height(), index, contract)?;
        }
        self.validate_contract_updates(view, tx)?;
        self.validate_fund_flows(view, tx)?;
        Ok(())
    }
}
