use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use silica_primitives::{
    hash::{hash_borsh, tagged_hash},
    BlockHeight, Buf32, ContractId, Currency, OutputId, TxId,
};

/// A spendable amount of currency owned by `recipient`.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct CoinOutput {
    value: Currency,
    recipient: Buf32,
}

impl CoinOutput {
    pub fn new(value: Currency, recipient: Buf32) -> Self {
        Self { value, recipient }
    }

    pub fn value(&self) -> Currency {
        self.value
    }

    pub fn recipient(&self) -> &Buf32 {
        &self.recipient
    }
}

/// Spends an existing coin output.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct CoinInput {
    parent: OutputId,
}

impl CoinInput {
    pub fn new(parent: OutputId) -> Self {
        Self { parent }
    }

    pub fn parent(&self) -> &OutputId {
        &self.parent
    }
}

/// A quantity of the fixed-supply fund asset.
///
/// `claim_start` records the fund-pool value at the moment the output was
/// created; the pool growth since then, scaled by the unit share, is the
/// revenue claimable when the output is spent. The field is assigned by
/// consensus when the output enters the ledger, not by the transaction
/// author.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct FundOutput {
    units: u64,
    recipient: Buf32,
    claim_start: Currency,
}

impl FundOutput {
    pub fn new(units: u64, recipient: Buf32, claim_start: Currency) -> Self {
        Self {
            units,
            recipient,
            claim_start,
        }
    }

    pub fn units(&self) -> u64 {
        self.units
    }

    pub fn recipient(&self) -> &Buf32 {
        &self.recipient
    }

    pub fn claim_start(&self) -> Currency {
        self.claim_start
    }

    /// Copy of this output with `claim_start` pinned to the given pool value.
    pub fn with_claim_start(&self, claim_start: Currency) -> Self {
        Self {
            units: self.units,
            recipient: self.recipient,
            claim_start,
        }
    }
}

/// Spends an existing fund output, claiming its accrued pool share.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct FundInput {
    parent: OutputId,
}

impl FundInput {
    pub fn new(parent: OutputId) -> Self {
        Self { parent }
    }

    pub fn parent(&self) -> &OutputId {
        &self.parent
    }
}

/// An escrowed storage agreement.
///
/// The contract locks `payout` coins. If a storage proof arrives before the
/// proof window closes at `window_end`, the `valid_outputs` are paid out;
/// if the window closes unproven, the `missed_outputs` are paid instead.
/// Either set sums to the payout net of the protocol tax collected at
/// creation.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct StorageContract {
    payout: Currency,
    valid_outputs: Vec<CoinOutput>,
    missed_outputs: Vec<CoinOutput>,
    window_end: BlockHeight,
    revision: u64,
}

impl StorageContract {
    pub fn new(
        payout: Currency,
        valid_outputs: Vec<CoinOutput>,
        missed_outputs: Vec<CoinOutput>,
        window_end: BlockHeight,
        revision: u64,
    ) -> Self {
        Self {
            payout,
            valid_outputs,
            missed_outputs,
            window_end,
            revision,
        }
    }

    pub fn payout(&self) -> Currency {
        self.payout
    }

    pub fn valid_outputs(&self) -> &[CoinOutput] {
        &self.valid_outputs
    }

    pub fn missed_outputs(&self) -> &[CoinOutput] {
        &self.missed_outputs
    }

    pub fn window_end(&self) -> BlockHeight {
        self.window_end
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Replaces an active contract with a higher-revision version.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct ContractRevision {
    parent: ContractId,
    contract: StorageContract,
}

impl ContractRevision {
    pub fn new(parent: ContractId, contract: StorageContract) -> Self {
        Self { parent, contract }
    }

    pub fn parent(&self) -> &ContractId {
        &self.parent
    }

    pub fn contract(&self) -> &StorageContract {
        &self.contract
    }
}

/// Resolves a contract with its valid payouts.
///
/// The proof data itself is opaque to the state transition; checking it is
/// the transaction validator's concern.
#[derive(
    Clone, Debug, Eq, PartialEq, Arbitrary, BorshDeserialize, BorshSerialize, Deserialize, Serialize,
)]
pub struct StorageProof {
    parent: ContractId,
}

impl StorageProof {
    pub fn new(parent: ContractId) -> Self {
        Self { parent }
    }

    pub fn parent(&self) -> &ContractId {
        &self.parent
    }
}

/// A ledger transaction.
#[derive(
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Arbitrary,
    BorshDeserialize,
    BorshSerialize,
    Deserialize,
    Serialize,
)]
pub struct Transaction {
    coin_inputs: Vec<CoinInput>,
    coin_outputs: Vec<CoinOutput>,
    contracts: Vec<StorageContract>,
    revisions: Vec<ContractRevision>,
    proofs: Vec<StorageProof>,
    fund_inputs: Vec<FundInput>,
    fund_outputs: Vec<FundOutput>,
}

impl Transaction {
    pub fn new(
        coin_inputs: Vec<CoinInput>,
        coin_outputs: Vec<CoinOutput>,
        contracts: Vec<StorageContract>,
        revisions: Vec<ContractRevision>,
        proofs: Vec<StorageProof>,
        fund_inputs: Vec<FundInput>,
        fund_outputs: Vec<FundOutput>,
    ) -> Self {
        Self {
            coin_inputs,
            coin_outputs,
            contracts,
            revisions,
            proofs,
            fund_inputs,
            fund_outputs,
        }
    }

    pub fn coin_inputs(&self) -> &[CoinInput] {
        &self.coin_inputs
    }

    pub fn coin_outputs(&self) -> &[CoinOutput] {
        &self.coin_outputs
    }

    pub fn contracts(&self) -> &[StorageContract] {
        &self.contracts
    }

    pub fn revisions(&self) -> &[ContractRevision] {
        &self.revisions
    }

    pub fn proofs(&self) -> &[StorageProof] {
        &self.proofs
    }

    pub fn fund_inputs(&self) -> &[FundInput] {
        &self.fund_inputs
    }

    pub fn fund_outputs(&self) -> &[FundOutput] {
        &self.fund_outputs
    }

    /// The transaction's ID, the hash of its full contents.
    pub fn txid(&self) -> TxId {
        TxId::from(hash_borsh(self))
    }

    /// ID of the i-th coin output this transaction creates.
    pub fn coin_output_id(&self, index: usize) -> OutputId {
        OutputId::from(derive_indexed(
            "silica/coin-output",
            self.txid().inner(),
            index,
        ))
    }

    /// ID of the i-th fund output this transaction creates.
    pub fn fund_output_id(&self, index: usize) -> OutputId {
        OutputId::from(derive_indexed(
            "silica/fund-output",
            self.txid().inner(),
            index,
        ))
    }

    /// ID of the i-th storage contract this transaction creates.
    pub fn contract_id(&self, index: usize) -> ContractId {
        ContractId::from(derive_indexed(
            "silica/contract",
            self.txid().inner(),
            index,
        ))
    }
}

/// ID of the i-th valid payout of a proven contract.
pub fn contract_valid_payout_id(contract: &ContractId, index: usize) -> OutputId {
    OutputId::from(derive_indexed(
        "silica/contract/valid-payout",
        contract.inner(),
        index,
    ))
}

/// ID of the i-th missed payout of an expired contract.
pub fn contract_missed_payout_id(contract: &ContractId, index: usize) -> OutputId {
    OutputId::from(derive_indexed(
        "silica/contract/missed-payout",
        contract.inner(),
        index,
    ))
}

/// ID of the delayed coin output claiming the pool share of a spent fund
/// output.
pub fn fund_claim_output_id(parent: &OutputId) -> OutputId {
    OutputId::from(tagged_hash("silica/fund-claim", &[parent.inner().as_slice()]))
}

fn derive_indexed(tag: &str, base: &Buf32, index: usize) -> Buf32 {
    let index = index as u64;
    tagged_hash(tag, &[base.as_slice(), &index.to_be_bytes()])
}
