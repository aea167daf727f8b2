//! The five synthesis passes
//!
//! Stage order matters: each stage only spends from wallets an earlier stage
//! funds (checked by `Pipeline::new`).
//!
//! 1. **Invoicing**: customer receipts into Invoicing
//! 2. **Consolidation**: periodic sweeps Invoicing → Treasury
//! 3. **TreasurySeed**: one-off float Treasury → Checking
//! 4. **VendorPayments**: Checking → external vendors
//! 5. **SpecialTransfers**: large deposits into and withdrawals from Treasury

pub mod consolidation;
pub mod invoicing;
pub mod special;
pub mod treasury_seed;
pub mod vendor;

pub use consolidation::ConsolidationStage;
pub use invoicing::InvoicingStage;
pub use special::SpecialTransferStage;
pub use treasury_seed::TreasurySeedStage;
pub use vendor::VendorPaymentStage;

use crate::synthesis::context::SynthesisStage;

/// The standard pipeline, in execution order
pub fn default_stages() -> Vec<Box<dyn SynthesisStage>> {
    vec![
        Box::new(InvoicingStage::new()),
        Box::new(ConsolidationStage::new()),
        Box::new(TreasurySeedStage::new()),
        Box::new(VendorPaymentStage::new()),
        Box::new(SpecialTransferStage::new()),
    ]
}
