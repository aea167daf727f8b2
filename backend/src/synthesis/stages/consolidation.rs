//! Consolidation stage
//!
//! Every `interval_months` the invoicing wallet is swept into treasury. The
//! sweep at height h consumes exactly the invoicing UTXOs created in
//! `[previous sweep height, h)`: nothing older is left behind and nothing
//! created at or after h is touched.
//!
//! The horizon is cut into groups of `interval_months` calendar months and
//! each sweep lands on the last block of its group's last day, so the
//! default bimonthly run sweeps on Feb 29, Apr 30 and so on to Dec 31. A
//! trailing partial group ends at the horizon end. An invoice mined in the
//! sweep block itself is not yet spendable and rolls into the next period.

use crate::core::calendar::Slot;
use crate::ledger::{HeightRange, LedgerError};
use crate::models::transaction::{Transaction, TransactionDraft, TxCategory};
use crate::models::wallet::WalletLabel;
use crate::synthesis::context::{PlanContext, SynthesisContext, SynthesisStage};
use crate::synthesis::engine::SynthesisError;
use tracing::{debug, info, warn};

pub const STAGE_NAME: &str = "consolidation";

#[derive(Debug, Default)]
pub struct ConsolidationStage {
    slots: Vec<Slot>,
}

impl ConsolidationStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SynthesisStage for ConsolidationStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn reads(&self) -> &'static [WalletLabel] {
        &[WalletLabel::Invoicing]
    }

    fn writes(&self) -> &'static [WalletLabel] {
        &[WalletLabel::Treasury]
    }

    fn plan(&mut self, ctx: &mut PlanContext<'_>) -> Result<(), SynthesisError> {
        let periods = ctx
            .calendar
            .month_periods(ctx.config.consolidation.interval_months);
        self.slots = periods
            .iter()
            .map(|&(first, last)| {
                let window = ctx.calendar.window_for_dates(first, last)?;
                ctx.calendar.slot(window.last)
            })
            .collect::<Result<_, _>>()?;

        debug!(
            months = ctx.calendar.num_months(),
            sweeps = self.slots.len(),
            "consolidation planned"
        );
        ctx.book.publish(STAGE_NAME, self.slots.clone());
        Ok(())
    }

    fn execute(
        &mut self,
        ctx: &mut SynthesisContext<'_>,
    ) -> Result<Vec<Transaction>, SynthesisError> {
        let mut transactions = Vec::with_capacity(self.slots.len());
        let mut window_start = ctx.calendar.horizon_window().first;

        for slot in &self.slots {
            let eligible = HeightRange::between(window_start, slot.block_height);
            window_start = slot.block_height;

            let preview = ctx.sweepable(WalletLabel::Invoicing, eligible)?;
            if preview.is_empty() {
                warn!(
                    date = %slot.date,
                    height = slot.block_height,
                    "no invoicing UTXOs in period, consolidation skipped"
                );
                continue;
            }

            let fee = ctx.fees.consolidation.fee_for(preview.len());
            if preview.total_sats <= fee {
                return Err(LedgerError::InsufficientFunds {
                    wallet: WalletLabel::Invoicing,
                    required: fee + 1,
                    available: preview.total_sats,
                }
                .into());
            }

            let rate = ctx.rate_at(slot)?;
            let inputs = ctx.sweep(WalletLabel::Invoicing, eligible, slot.block_height)?;
            let address = ctx.pooled_address(WalletLabel::Treasury);

            let draft = TransactionDraft::new(TxCategory::Consolidation, *slot, rate)
                .with_inputs(inputs)
                .pay_to(Some(WalletLabel::Treasury), address, preview.total_sats - fee)
                .flow(Some(WalletLabel::Invoicing), Some(WalletLabel::Treasury));
            let tx = ctx.commit(draft)?;

            debug!(
                date = %slot.date,
                height = slot.block_height,
                inputs = tx.inputs().len(),
                value_sats = tx.value_sats(),
                fee_sats = tx.fee_sats(),
                "consolidated invoicing into treasury"
            );
            transactions.push(tx);
        }

        info!(consolidations = transactions.len(), "consolidation complete");
        Ok(transactions)
    }
}
