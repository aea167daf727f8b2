//! Transaction synthesis
//!
//! Drives the stage pipeline over the shared wallet registry and produces
//! the verified dataset.

pub mod config;
pub mod context;
pub mod engine;
pub mod snapshot;
pub mod stages;
pub mod summary;

pub use config::{
    ConsolidationConfig, FeePolicy, FeeSchedule, InvoiceConfig, SeedTransferConfig,
    SpecialTransferConfig, SynthConfig, VendorConfig,
};
pub use context::{
    Funding, Pipeline, PlanContext, ScheduleBook, SynthesisContext, SynthesisStage,
};
pub use engine::{SynthesisError, SynthesisOutput, Synthesizer};
pub use snapshot::{compute_config_hash, verify_output, VerificationError, WalletSnapshot};
pub use stages::default_stages;
pub use summary::{SummaryStats, WalletStats};
