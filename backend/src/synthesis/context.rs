//! Pipeline plumbing shared by the synthesis stages
//!
//! A run is two phases:
//!
//! ```text
//! plan:    every stage draws its slots and amounts (PlanContext)
//!          → schedule errors surface here, ledger untouched
//! execute: stages run in order against the ledger (SynthesisContext)
//! ```
//!
//! Slots published to the `ScheduleBook` during planning let later stages
//! anchor on earlier ones (the treasury seed follows the first consolidation).

use crate::core::calendar::{Calendar, Slot};
use crate::ledger::{HeightRange, Selection, SelectionRequest, SelectionStrategy, WalletRegistry};
use crate::models::transaction::{Transaction, TransactionDraft, TxInput};
use crate::models::utxo::OutPoint;
use crate::models::wallet::WalletLabel;
use crate::rates::ExchangeRateTable;
use crate::rng::RngManager;
use crate::synthesis::config::{FeePolicy, FeeSchedule, SynthConfig};
use crate::synthesis::engine::SynthesisError;
use std::collections::BTreeMap;
use tracing::trace;

// ============================================================================
// Stage interface
// ============================================================================

/// One pass of the synthesis pipeline
pub trait SynthesisStage {
    /// Stage name, also the key of its slots in the `ScheduleBook`
    fn name(&self) -> &'static str;

    /// Wallets whose funds the stage spends
    fn reads(&self) -> &'static [WalletLabel];

    /// Wallets the stage credits
    fn writes(&self) -> &'static [WalletLabel];

    /// Draw slots and amounts; must not depend on ledger state
    fn plan(&mut self, ctx: &mut PlanContext<'_>) -> Result<(), SynthesisError>;

    /// Produce this stage's transactions against the shared ledger
    fn execute(&mut self, ctx: &mut SynthesisContext<'_>)
        -> Result<Vec<Transaction>, SynthesisError>;
}

/// Ordered list of stages with checked wallet dependencies
pub struct Pipeline {
    stages: Vec<Box<dyn SynthesisStage>>,
}

impl Pipeline {
    /// Build a pipeline, rejecting a stage that reads a wallet no earlier stage writes
    pub fn new(stages: Vec<Box<dyn SynthesisStage>>) -> Result<Self, SynthesisError> {
        Self::validate(&stages)?;
        Ok(Self { stages })
    }

    pub fn validate(stages: &[Box<dyn SynthesisStage>]) -> Result<(), SynthesisError> {
        let mut funded: Vec<WalletLabel> = Vec::new();
        for stage in stages {
            if let Some(missing) = stage.reads().iter().find(|w| !funded.contains(w)) {
                return Err(SynthesisError::InvalidConfig(format!(
                    "stage '{}' reads {} before any stage writes it",
                    stage.name(),
                    missing
                )));
            }
            funded.extend_from_slice(stage.writes());
        }
        Ok(())
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn stages_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn SynthesisStage>> {
        self.stages.iter_mut()
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Slots planned so far, keyed by stage name
#[derive(Debug, Clone, Default)]
pub struct ScheduleBook {
    slots: BTreeMap<&'static str, Vec<Slot>>,
}

impl ScheduleBook {
    pub fn publish(&mut self, stage: &'static str, slots: Vec<Slot>) {
        self.slots.insert(stage, slots);
    }

    pub fn slots(&self, stage: &str) -> &[Slot] {
        self.slots.get(stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, stage: &str) -> Option<&Slot> {
        self.slots(stage).first()
    }
}

/// Read-only world plus the RNG, available while planning
pub struct PlanContext<'a> {
    pub config: &'a SynthConfig,
    pub calendar: &'a Calendar,
    pub rng: &'a mut RngManager,
    pub book: &'a mut ScheduleBook,
}

// ============================================================================
// Execution
// ============================================================================

/// Inputs funding a payment, with the fee and change they imply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funding {
    pub inputs: Vec<TxInput>,
    pub total_sats: i64,
    pub fee_sats: i64,
    pub change_sats: i64,
}

/// Mutable run state handed to `SynthesisStage::execute`
pub struct SynthesisContext<'a> {
    pub registry: &'a mut WalletRegistry,
    pub rates: &'a ExchangeRateTable,
    pub calendar: &'a Calendar,
    pub rng: &'a mut RngManager,
    pub fees: &'a FeeSchedule,

    /// Sequence number of the next sealed transaction
    next_sequence: u64,
}

impl<'a> SynthesisContext<'a> {
    pub fn new(
        registry: &'a mut WalletRegistry,
        rates: &'a ExchangeRateTable,
        calendar: &'a Calendar,
        rng: &'a mut RngManager,
        fees: &'a FeeSchedule,
    ) -> Self {
        Self {
            registry,
            rates,
            calendar,
            rng,
            fees,
            next_sequence: 0,
        }
    }

    /// Rate on the slot's date
    pub fn rate_at(&self, slot: &Slot) -> Result<i64, SynthesisError> {
        Ok(self.rates.rate_on(slot.date)?)
    }

    /// Never-used receive address of a tracked wallet
    pub fn fresh_address(&mut self, wallet: WalletLabel) -> String {
        self.registry.wallet_mut(wallet).fresh_address()
    }

    /// Address drawn from the wallet's rotating pool
    pub fn pooled_address(&mut self, wallet: WalletLabel) -> String {
        let pool = self.registry.wallet(wallet).address_pool() as usize;
        let index = self.rng.index(pool) as u32;
        self.registry.wallet_mut(wallet).pooled_address(index)
    }

    /// Seal a draft and credit its tracked outputs to the ledger
    pub fn commit(&mut self, draft: TransactionDraft) -> Result<Transaction, SynthesisError> {
        let tx = draft.seal(self.next_sequence)?;
        self.next_sequence += 1;

        let ledger = self.registry.ledger_mut();
        for output in tx.outputs() {
            if let Some(wallet) = output.wallet {
                ledger.credit(
                    wallet,
                    output.value_sats,
                    OutPoint::new(tx.txid(), output.vout),
                    output.address.clone(),
                    tx.timestamp(),
                    tx.block_height(),
                )?;
            }
        }
        trace!(txid = tx.txid(), category = tx.category().as_str(), "committed");
        Ok(tx)
    }

    /// Spend every eligible UTXO of `wallet` created inside `eligible`
    pub fn sweep(
        &mut self,
        wallet: WalletLabel,
        eligible: HeightRange,
        at_height: u64,
    ) -> Result<Vec<TxInput>, SynthesisError> {
        let request = SelectionRequest {
            wallet,
            target_sats: 0,
            strategy: SelectionStrategy::ExactSet,
            eligible,
        };
        let selection = self.registry.ledger_mut().select_and_spend(&request, at_height)?;
        Ok(self.registry.ledger().inputs_for(&selection.ids)?)
    }

    /// What `sweep` would consume, without spending it
    pub fn sweepable(
        &self,
        wallet: WalletLabel,
        eligible: HeightRange,
    ) -> Result<Selection, SynthesisError> {
        let request = SelectionRequest {
            wallet,
            target_sats: 0,
            strategy: SelectionStrategy::ExactSet,
            eligible,
        };
        Ok(self.registry.ledger().select_inputs(&request)?)
    }

    /// Select and spend inputs covering `amount_sats` plus the policy's fee
    ///
    /// When the fee depends on the input count, selection is repeated with
    /// the fee for the current count until the count stops growing. Only
    /// UTXOs created strictly before `at_height` are eligible.
    pub fn fund_payment(
        &mut self,
        wallet: WalletLabel,
        amount_sats: i64,
        fee_policy: FeePolicy,
        strategy: SelectionStrategy,
        at_height: u64,
    ) -> Result<Funding, SynthesisError> {
        let mut fee = fee_policy.fee_for(1);
        let request = loop {
            let request = SelectionRequest {
                wallet,
                target_sats: amount_sats + fee,
                strategy,
                eligible: HeightRange::before(at_height),
            };
            let selection = self.registry.ledger().select_inputs(&request)?;
            let needed = fee_policy.fee_for(selection.len());
            if needed <= fee {
                break request;
            }
            fee = needed;
        };

        let selection = self.registry.ledger_mut().select_and_spend(&request, at_height)?;
        let inputs = self.registry.ledger().inputs_for(&selection.ids)?;
        Ok(Funding {
            inputs,
            total_sats: selection.total_sats,
            fee_sats: fee,
            change_sats: selection.total_sats - amount_sats - fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        name: &'static str,
        reads: &'static [WalletLabel],
        writes: &'static [WalletLabel],
    }

    impl SynthesisStage for Dummy {
        fn name(&self) -> &'static str {
            self.name
        }
        fn reads(&self) -> &'static [WalletLabel] {
            self.reads
        }
        fn writes(&self) -> &'static [WalletLabel] {
            self.writes
        }
        fn plan(&mut self, _ctx: &mut PlanContext<'_>) -> Result<(), SynthesisError> {
            Ok(())
        }
        fn execute(
            &mut self,
            _ctx: &mut SynthesisContext<'_>,
        ) -> Result<Vec<Transaction>, SynthesisError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_pipeline_rejects_unfunded_read() {
        let stages: Vec<Box<dyn SynthesisStage>> = vec![
            Box::new(Dummy {
                name: "spender",
                reads: &[WalletLabel::Treasury],
                writes: &[],
            }),
            Box::new(Dummy {
                name: "funder",
                reads: &[],
                writes: &[WalletLabel::Treasury],
            }),
        ];
        assert!(matches!(
            Pipeline::new(stages),
            Err(SynthesisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_pipeline_accepts_ordered_stages() {
        let stages: Vec<Box<dyn SynthesisStage>> = vec![
            Box::new(Dummy {
                name: "funder",
                reads: &[],
                writes: &[WalletLabel::Treasury],
            }),
            Box::new(Dummy {
                name: "spender",
                reads: &[WalletLabel::Treasury],
                writes: &[WalletLabel::Checking],
            }),
        ];
        let pipeline = Pipeline::new(stages).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["funder", "spender"]);
    }

    #[test]
    fn test_schedule_book_missing_stage_is_empty() {
        let book = ScheduleBook::default();
        assert!(book.slots("consolidation").is_empty());
        assert!(book.first("consolidation").is_none());
    }
}
