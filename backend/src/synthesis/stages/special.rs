//! Special treasury transfers
//!
//! Inbound: large external deposits credited to treasury with no tracked
//! inputs, spread uniformly over the horizon.
//!
//! Outbound: large withdrawals to external, untracked addresses, evenly
//! spaced after the first consolidation and funded largest-first from
//! treasury with change returned to treasury.

use crate::core::calendar::{Slot, SpacingPolicy};
use crate::ledger::SelectionStrategy;
use crate::models::transaction::{Transaction, TransactionDraft, TxCategory, TxOrigin};
use crate::models::wallet::{external_address, WalletLabel};
use crate::rates::usd_cents_to_sats;
use crate::synthesis::context::{PlanContext, SynthesisContext, SynthesisStage};
use crate::synthesis::engine::SynthesisError;
use crate::synthesis::stages::consolidation;
use tracing::{debug, info};

pub const STAGE_NAME: &str = "special_transfers";

#[derive(Debug, Clone, Copy)]
struct PlannedTransfer {
    slot: Slot,
    usd_cents: i64,
}

#[derive(Debug, Default)]
pub struct SpecialTransferStage {
    inbound: Vec<PlannedTransfer>,
    outbound: Vec<PlannedTransfer>,
}

impl SpecialTransferStage {
    pub fn new() -> Self {
        Self::default()
    }

    fn deposit(
        ctx: &mut SynthesisContext<'_>,
        index: usize,
        planned: &PlannedTransfer,
    ) -> Result<Transaction, SynthesisError> {
        let rate = ctx.rate_at(&planned.slot)?;
        let sats = usd_cents_to_sats(planned.usd_cents, rate)?;
        let address = ctx.pooled_address(WalletLabel::Treasury);

        let draft = TransactionDraft::new(TxCategory::Special, planned.slot, rate)
            .with_origin(TxOrigin::ExternalDeposit {
                source: external_address("deposit", index as u64),
            })
            .pay_to(Some(WalletLabel::Treasury), address, sats)
            .flow(None, Some(WalletLabel::Treasury))
            .quoted_usd(planned.usd_cents);
        ctx.commit(draft)
    }

    fn withdraw(
        ctx: &mut SynthesisContext<'_>,
        index: usize,
        planned: &PlannedTransfer,
    ) -> Result<Transaction, SynthesisError> {
        let rate = ctx.rate_at(&planned.slot)?;
        let sats = usd_cents_to_sats(planned.usd_cents, rate)?;
        let funding = ctx.fund_payment(
            WalletLabel::Treasury,
            sats,
            ctx.fees.special_outbound,
            SelectionStrategy::LargestFirst,
            planned.slot.block_height,
        )?;

        let mut draft = TransactionDraft::new(TxCategory::Special, planned.slot, rate)
            .with_inputs(funding.inputs)
            .pay_to(None, external_address("withdrawal", index as u64), sats)
            .flow(Some(WalletLabel::Treasury), None)
            .quoted_usd(planned.usd_cents);
        if funding.change_sats > 0 {
            let change_address = ctx.pooled_address(WalletLabel::Treasury);
            draft = draft.pay_to(Some(WalletLabel::Treasury), change_address, funding.change_sats);
        }
        ctx.commit(draft)
    }
}

impl SynthesisStage for SpecialTransferStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn reads(&self) -> &'static [WalletLabel] {
        &[WalletLabel::Treasury]
    }

    fn writes(&self) -> &'static [WalletLabel] {
        &[WalletLabel::Treasury]
    }

    fn plan(&mut self, ctx: &mut PlanContext<'_>) -> Result<(), SynthesisError> {
        let config = &ctx.config.special_transfers;

        let inbound_slots = ctx.calendar.schedule_blocks(
            config.inbound_usd_cents.len(),
            ctx.calendar.horizon_window(),
            SpacingPolicy::UniformRandom,
            ctx.rng,
        )?;
        self.inbound = inbound_slots
            .iter()
            .zip(&config.inbound_usd_cents)
            .map(|(&slot, &usd_cents)| PlannedTransfer { slot, usd_cents })
            .collect();

        let mut outbound_slots = Vec::new();
        if config.outbound_count > 0 {
            let anchor = ctx
                .book
                .first(consolidation::STAGE_NAME)
                .map(|slot| slot.block_height)
                .ok_or_else(|| {
                    SynthesisError::InvalidConfig(
                        "treasury withdrawals need a consolidation to follow".to_string(),
                    )
                })?;
            let window = ctx.calendar.window_after(anchor)?;
            outbound_slots = ctx.calendar.schedule_blocks(
                config.outbound_count,
                window,
                SpacingPolicy::FixedInterval,
                ctx.rng,
            )?;
        }
        self.outbound = outbound_slots
            .iter()
            .map(|&slot| PlannedTransfer {
                slot,
                usd_cents: ctx.rng.range_inclusive(
                    config.outbound_usd_min_cents,
                    config.outbound_usd_max_cents,
                ),
            })
            .collect();

        let mut slots: Vec<Slot> = inbound_slots.into_iter().chain(outbound_slots).collect();
        slots.sort();
        ctx.book.publish(STAGE_NAME, slots);
        Ok(())
    }

    fn execute(
        &mut self,
        ctx: &mut SynthesisContext<'_>,
    ) -> Result<Vec<Transaction>, SynthesisError> {
        let mut transactions = Vec::with_capacity(self.inbound.len() + self.outbound.len());

        // Deposits first so withdrawals dated after them may spend them
        for (i, planned) in self.inbound.iter().enumerate() {
            let tx = Self::deposit(ctx, i, planned)?;
            debug!(date = %planned.slot.date, value_sats = tx.value_sats(), "treasury deposit");
            transactions.push(tx);
        }
        for (i, planned) in self.outbound.iter().enumerate() {
            let tx = Self::withdraw(ctx, i, planned)?;
            debug!(date = %planned.slot.date, value_sats = tx.value_sats(), "treasury withdrawal");
            transactions.push(tx);
        }

        info!(
            deposits = self.inbound.len(),
            withdrawals = self.outbound.len(),
            treasury_balance = ctx.registry.balance(WalletLabel::Treasury),
            "special transfers complete"
        );
        Ok(transactions)
    }
}
