//! Vendor payments from the checking wallet
//!
//! Payments are scheduled strictly after the seed transfer and funded
//! oldest-first from checking. A shortfall is fatal: the checking float is
//! never topped up and a payment is never retried.

use crate::core::calendar::{Slot, SpacingPolicy};
use crate::ledger::SelectionStrategy;
use crate::models::transaction::{Transaction, TransactionDraft, TxCategory};
use crate::models::wallet::{external_address, WalletLabel};
use crate::rates::usd_cents_to_sats;
use crate::synthesis::context::{PlanContext, SynthesisContext, SynthesisStage};
use crate::synthesis::engine::SynthesisError;
use crate::synthesis::stages::treasury_seed;
use tracing::{debug, info};

pub const STAGE_NAME: &str = "vendor_payments";

#[derive(Debug, Clone, Copy)]
struct PlannedPayment {
    slot: Slot,
    usd_cents: i64,
}

#[derive(Debug, Default)]
pub struct VendorPaymentStage {
    planned: Vec<PlannedPayment>,
}

impl VendorPaymentStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SynthesisStage for VendorPaymentStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn reads(&self) -> &'static [WalletLabel] {
        &[WalletLabel::Checking]
    }

    fn writes(&self) -> &'static [WalletLabel] {
        &[WalletLabel::Checking]
    }

    fn plan(&mut self, ctx: &mut PlanContext<'_>) -> Result<(), SynthesisError> {
        let config = &ctx.config.vendor_payments;
        if config.count == 0 {
            ctx.book.publish(STAGE_NAME, Vec::new());
            return Ok(());
        }

        let seed_height = ctx
            .book
            .first(treasury_seed::STAGE_NAME)
            .map(|slot| slot.block_height)
            .ok_or_else(|| {
                SynthesisError::InvalidConfig(
                    "vendor payments need a seed transfer to follow".to_string(),
                )
            })?;
        let window = ctx.calendar.window_after(seed_height)?;
        let slots = ctx.calendar.schedule_blocks(
            config.count,
            window,
            SpacingPolicy::UniformRandom,
            ctx.rng,
        )?;

        self.planned = slots
            .iter()
            .map(|&slot| PlannedPayment {
                slot,
                usd_cents: ctx
                    .rng
                    .range_inclusive(config.usd_min_cents, config.usd_max_cents),
            })
            .collect();
        ctx.book.publish(STAGE_NAME, slots);
        Ok(())
    }

    fn execute(
        &mut self,
        ctx: &mut SynthesisContext<'_>,
    ) -> Result<Vec<Transaction>, SynthesisError> {
        let mut transactions = Vec::with_capacity(self.planned.len());

        for (i, payment) in self.planned.iter().enumerate() {
            let rate = ctx.rate_at(&payment.slot)?;
            let sats = usd_cents_to_sats(payment.usd_cents, rate)?;
            let funding = ctx.fund_payment(
                WalletLabel::Checking,
                sats,
                ctx.fees.vendor_payment,
                SelectionStrategy::OldestFirst,
                payment.slot.block_height,
            )?;

            let mut draft = TransactionDraft::new(TxCategory::VendorPayment, payment.slot, rate)
                .with_inputs(funding.inputs)
                .pay_to(None, external_address("vendor", i as u64), sats)
                .flow(Some(WalletLabel::Checking), None)
                .quoted_usd(payment.usd_cents);
            if funding.change_sats > 0 {
                let change_address = ctx.pooled_address(WalletLabel::Checking);
                draft = draft.pay_to(Some(WalletLabel::Checking), change_address, funding.change_sats);
            }
            let tx = ctx.commit(draft)?;

            debug!(
                date = %payment.slot.date,
                height = payment.slot.block_height,
                value_sats = sats,
                change_sats = funding.change_sats,
                "vendor paid"
            );
            transactions.push(tx);
        }

        info!(
            payments = transactions.len(),
            checking_balance = ctx.registry.balance(WalletLabel::Checking),
            "vendor payments complete"
        );
        Ok(transactions)
    }
}
