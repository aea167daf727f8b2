//! Treasury → checking seed transfer
//!
//! Funds the checking wallet once, `delay_blocks` after the first
//! consolidation (the earliest block treasury holds anything).

use crate::core::calendar::Slot;
use crate::ledger::SelectionStrategy;
use crate::models::transaction::{Transaction, TransactionDraft, TxCategory};
use crate::models::wallet::WalletLabel;
use crate::synthesis::context::{PlanContext, SynthesisContext, SynthesisStage};
use crate::synthesis::engine::SynthesisError;
use crate::synthesis::stages::consolidation;
use tracing::info;

pub const STAGE_NAME: &str = "treasury_seed";

#[derive(Debug, Default)]
pub struct TreasurySeedStage {
    slot: Option<Slot>,
    amount_sats: i64,
}

impl TreasurySeedStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SynthesisStage for TreasurySeedStage {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    fn reads(&self) -> &'static [WalletLabel] {
        &[WalletLabel::Treasury]
    }

    fn writes(&self) -> &'static [WalletLabel] {
        &[WalletLabel::Checking, WalletLabel::Treasury]
    }

    fn plan(&mut self, ctx: &mut PlanContext<'_>) -> Result<(), SynthesisError> {
        let anchor = ctx.book.first(consolidation::STAGE_NAME).ok_or_else(|| {
            SynthesisError::InvalidConfig(
                "treasury seed needs a consolidation to follow".to_string(),
            )
        })?;
        let height = anchor.block_height + ctx.config.seed_transfer.delay_blocks;
        let horizon = ctx.calendar.horizon_window();
        if height > horizon.last {
            return Err(SynthesisError::InvalidConfig(format!(
                "horizon too short for the seed transfer: first consolidation at height {} \
                 plus {} blocks lands at {}, past the last block {} ({}); extend end_date \
                 or shorten consolidation.interval_months",
                anchor.block_height,
                ctx.config.seed_transfer.delay_blocks,
                height,
                horizon.last,
                ctx.calendar.end(),
            )));
        }
        let slot = ctx.calendar.slot(height)?;

        self.slot = Some(slot);
        self.amount_sats = ctx.config.seed_transfer.amount_sats;
        ctx.book.publish(STAGE_NAME, vec![slot]);
        Ok(())
    }

    fn execute(
        &mut self,
        ctx: &mut SynthesisContext<'_>,
    ) -> Result<Vec<Transaction>, SynthesisError> {
        let Some(slot) = self.slot else {
            return Ok(Vec::new());
        };

        let rate = ctx.rate_at(&slot)?;
        let funding = ctx.fund_payment(
            WalletLabel::Treasury,
            self.amount_sats,
            ctx.fees.transfer,
            SelectionStrategy::LargestFirst,
            slot.block_height,
        )?;

        let checking_address = ctx.pooled_address(WalletLabel::Checking);
        let mut draft = TransactionDraft::new(TxCategory::Transfer, slot, rate)
            .with_inputs(funding.inputs)
            .pay_to(Some(WalletLabel::Checking), checking_address, self.amount_sats)
            .flow(Some(WalletLabel::Treasury), Some(WalletLabel::Checking));
        if funding.change_sats > 0 {
            let change_address = ctx.pooled_address(WalletLabel::Treasury);
            draft = draft.pay_to(Some(WalletLabel::Treasury), change_address, funding.change_sats);
        }
        let tx = ctx.commit(draft)?;

        info!(
            date = %slot.date,
            height = slot.block_height,
            amount_sats = self.amount_sats,
            change_sats = funding.change_sats,
            "checking wallet seeded from treasury"
        );
        Ok(vec![tx])
    }
}
