//! Invoicing stage
//!
//! Customer payments into the invoicing wallet: one no-input transaction per
//! invoice, at a never-used receive address, for a USD amount drawn
//! uniformly and converted at that day's rate.

use crate::core::calendar::{Slot, SpacingPolicy};
use crate::models::transaction::{Transaction, TransactionDraft, TxCategory, TxOrigin};
use crate::models::wallet::{external_address, WalletLabel};
use crate::rates::usd_cents_to_sats;
use crate::synthesis::context::{PlanContext, SynthesisContext, SynthesisStage};
use crate::synthesis::engine::SynthesisError;
use tracing::info;

pub const STAGE_NAME: &str = "invoicing";

/// Planned invoice: when, and how many USD cents
#[derive(Debug, Clone, Copy)]
struct PlannedInvoice {
    slot: Slot,
    usd_cents: i64,
}

#[derive(Debug, Default)]
pub struct InvoicingStage {
    planned: Vec<PlannedInvoice>,
}

impl InvoicingStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SynthesisStage for InvoicingStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn reads(&self) -> &'static [WalletLabel] {
        &[]
    }

    fn writes(&self) -> &'static [WalletLabel] {
        &[WalletLabel::Invoicing]
    }

    fn plan(&mut self, ctx: &mut PlanContext<'_>) -> Result<(), SynthesisError> {
        let config = &ctx.config.invoices;
        let slots = ctx.calendar.schedule_blocks(
            config.count,
            ctx.calendar.horizon_window(),
            SpacingPolicy::UniformRandom,
            ctx.rng,
        )?;

        self.planned = slots
            .iter()
            .map(|&slot| PlannedInvoice {
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
        let mut total_sats = 0i64;

        for (i, invoice) in self.planned.iter().enumerate() {
            let rate = ctx.rate_at(&invoice.slot)?;
            let sats = usd_cents_to_sats(invoice.usd_cents, rate)?;
            let address = ctx.fresh_address(WalletLabel::Invoicing);

            let draft = TransactionDraft::new(TxCategory::Invoice, invoice.slot, rate)
                .with_origin(TxOrigin::Invoice {
                    payer: external_address("payer", i as u64),
                })
                .pay_to(Some(WalletLabel::Invoicing), address, sats)
                .flow(None, Some(WalletLabel::Invoicing))
                .quoted_usd(invoice.usd_cents);

            total_sats += sats;
            transactions.push(ctx.commit(draft)?);
        }

        info!(
            invoices = transactions.len(),
            total_sats,
            "invoicing receipts generated"
        );
        Ok(transactions)
    }
}
