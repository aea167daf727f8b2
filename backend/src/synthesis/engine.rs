//! Synthesizer - Main Synthesis Run
//!
//! Builds the run context from a `SynthConfig`, drives the stage pipeline and
//! returns a verified `SynthesisOutput`.
//!
//! # Run Flow
//!
//! ```text
//! 1. Validate config
//! 2. Build calendar, RNG, exchange rates, wallet registry
//! 3. Plan every stage          (schedule errors stop the run here)
//! 4. Execute stages in order   invoicing → consolidation → treasury seed
//!                              → vendor payments → special transfers
//! 5. Stable sort by (date, block height)
//! 6. Ledger audit + output verification
//! 7. Summary
//! ```
//!
//! # Critical Invariants
//!
//! - **Determinism**: same config (seed included) gives identical output
//! - **No partial output**: `run` returns a complete verified output or an error
//! - **Single decision point**: stages consume funds only via
//!   `UtxoLedger::select_and_spend`

use crate::core::calendar::{Calendar, ScheduleError};
use crate::ledger::{LedgerError, WalletRegistry};
use crate::models::transaction::{Transaction, TransactionError, TxCategory};
use crate::models::wallet::WalletLabel;
use crate::rates::{usd_cents_to_sats, ExchangeRateEntry, ExchangeRateTable, RateError};
use crate::rng::RngManager;
use crate::synthesis::config::SynthConfig;
use crate::synthesis::context::{
    Pipeline, PlanContext, ScheduleBook, SynthesisContext, SynthesisStage,
};
use crate::synthesis::snapshot::{
    compute_config_hash, verify_output, VerificationError, WalletSnapshot,
};
use crate::synthesis::stages::default_stages;
use crate::synthesis::summary::SummaryStats;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

// ============================================================================
// Errors
// ============================================================================

/// Any failure of a synthesis run; all are terminal
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("exchange rate error: {0}")]
    Rate(#[from] RateError),

    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("output verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Output
// ============================================================================

/// Everything a run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOutput {
    pub config: SynthConfig,

    /// SHA-256 of the canonical config JSON
    pub config_hash: String,

    /// All transactions in chronological order
    pub transactions: Vec<Transaction>,

    pub exchange_rates: Vec<ExchangeRateEntry>,
    pub wallets: Vec<WalletSnapshot>,
    pub summary: SummaryStats,
}

impl SynthesisOutput {
    /// Audit the finished dataset
    pub fn verify(&self) -> Result<(), VerificationError> {
        verify_output(self)
    }

    pub fn by_category(&self, category: TxCategory) -> impl Iterator<Item = &Transaction> {
        self.transactions
            .iter()
            .filter(move |tx| tx.category() == category)
    }

    pub fn wallet(&self, label: WalletLabel) -> Option<&WalletSnapshot> {
        self.wallets.iter().find(|w| w.label == label)
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

/// Synthesis run context
///
/// # Example
///
/// ```
/// use txgen_core_rs::synthesis::{SynthConfig, Synthesizer};
///
/// let mut config = SynthConfig::default();
/// config.invoices.count = 1_000;
/// config.vendor_payments.count = 5;
/// config.special_transfers.outbound_count = 0;
///
/// let output = Synthesizer::new(config).unwrap().run().unwrap();
/// assert_eq!(output.summary.total_transactions, output.transactions.len());
/// ```
pub struct Synthesizer {
    config: SynthConfig,
    calendar: Calendar,
    rates: ExchangeRateTable,
    registry: WalletRegistry,
    rng: RngManager,
    pipeline: Pipeline,
}

impl Synthesizer {
    /// Create a synthesizer with the standard five-stage pipeline
    pub fn new(config: SynthConfig) -> Result<Self, SynthesisError> {
        Self::with_stages(config, default_stages())
    }

    /// Create a synthesizer with a custom stage list
    pub fn with_stages(
        config: SynthConfig,
        stages: Vec<Box<dyn SynthesisStage>>,
    ) -> Result<Self, SynthesisError> {
        Self::validate_config(&config)?;

        let calendar = Calendar::new(config.start_date, config.end_date, config.calendar)?;
        let mut rng = RngManager::new(config.seed);
        let rates =
            ExchangeRateTable::generate(config.start_date, config.end_date, &config.rates, &mut rng)?;
        let registry = WalletRegistry::from_seed(config.seed, config.address_pool_size);
        let pipeline = Pipeline::new(stages)?;

        debug!(
            days = calendar.num_days(),
            blocks = calendar.horizon_window().len(),
            stages = ?pipeline.stage_names(),
            "synthesizer ready"
        );

        Ok(Self {
            config,
            calendar,
            rates,
            registry,
            rng,
            pipeline,
        })
    }

    fn validate_config(config: &SynthConfig) -> Result<(), SynthesisError> {
        if config.end_date < config.start_date {
            return Err(SynthesisError::InvalidConfig(format!(
                "end_date {} precedes start_date {}",
                config.end_date, config.start_date
            )));
        }

        if config.address_pool_size == 0 {
            return Err(SynthesisError::InvalidConfig(
                "address_pool_size must be > 0".to_string(),
            ));
        }

        config.rates.validate()?;
        let floor = config.rates.floor_price_cents;
        check_usd_range(
            "invoices",
            config.invoices.usd_min_cents,
            config.invoices.usd_max_cents,
            floor,
        )?;
        check_usd_range(
            "vendor_payments",
            config.vendor_payments.usd_min_cents,
            config.vendor_payments.usd_max_cents,
            floor,
        )?;
        check_usd_range(
            "special_transfers.outbound",
            config.special_transfers.outbound_usd_min_cents,
            config.special_transfers.outbound_usd_max_cents,
            floor,
        )?;

        if let Some(bad) = config
            .special_transfers
            .inbound_usd_cents
            .iter()
            .find(|&&usd| usd <= 0)
        {
            return Err(SynthesisError::InvalidConfig(format!(
                "special_transfers.inbound_usd_cents must be > 0, got {}",
                bad
            )));
        }
        for &usd in &config.special_transfers.inbound_usd_cents {
            check_convertible("special_transfers.inbound", usd, floor)?;
        }

        if config.consolidation.interval_months == 0 {
            return Err(SynthesisError::InvalidConfig(
                "consolidation.interval_months must be > 0".to_string(),
            ));
        }

        if config.seed_transfer.amount_sats <= 0 {
            return Err(SynthesisError::InvalidConfig(
                "seed_transfer.amount_sats must be > 0".to_string(),
            ));
        }

        // Outputs of the first consolidation are only spendable in a later block
        if config.seed_transfer.delay_blocks == 0 {
            return Err(SynthesisError::InvalidConfig(
                "seed_transfer.delay_blocks must be > 0".to_string(),
            ));
        }

        if let Some(category) = config.fees.negative_policy() {
            return Err(SynthesisError::InvalidConfig(format!(
                "fee policy for {} must not be negative",
                category
            )));
        }

        Ok(())
    }

    /// Execute the full run
    pub fn run(mut self) -> Result<SynthesisOutput, SynthesisError> {
        info!(
            seed = self.config.seed,
            start = %self.config.start_date,
            end = %self.config.end_date,
            "synthesis started"
        );

        // Phase 1: plan every stage before touching the ledger
        let mut book = ScheduleBook::default();
        for stage in self.pipeline.stages_mut() {
            let mut plan_ctx = PlanContext {
                config: &self.config,
                calendar: &self.calendar,
                rng: &mut self.rng,
                book: &mut book,
            };
            stage.plan(&mut plan_ctx)?;
            debug!(
                stage = stage.name(),
                slots = book.slots(stage.name()).len(),
                "stage planned"
            );
        }

        // Phase 2: execute in pipeline order
        let mut transactions: Vec<Transaction> = Vec::new();
        {
            let mut ctx = SynthesisContext::new(
                &mut self.registry,
                &self.rates,
                &self.calendar,
                &mut self.rng,
                &self.config.fees,
            );
            for stage in self.pipeline.stages_mut() {
                let produced = stage.execute(&mut ctx)?;
                info!(
                    stage = stage.name(),
                    transactions = produced.len(),
                    "stage complete"
                );
                transactions.extend(produced);
            }
        }

        // Stable: ties keep stage insertion order
        transactions.sort_by_key(|tx| tx.chrono_key());

        self.registry.ledger().audit()?;

        let summary = SummaryStats::compute(&transactions, &self.registry)?;
        let wallets = self
            .registry
            .wallets()
            .map(|w| WalletSnapshot::from((w, self.registry.ledger())))
            .collect();
        let config_hash = compute_config_hash(&self.config)?;

        let output = SynthesisOutput {
            config: self.config,
            config_hash,
            transactions,
            exchange_rates: self.rates.entries().collect(),
            wallets,
            summary,
        };
        output.verify()?;

        info!(
            transactions = output.transactions.len(),
            config_hash = %output.config_hash,
            "synthesis complete"
        );
        Ok(output)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn rates(&self) -> &ExchangeRateTable {
        &self.rates
    }

    pub fn registry(&self) -> &WalletRegistry {
        &self.registry
    }

    pub fn horizon(&self) -> (NaiveDate, NaiveDate) {
        (self.config.start_date, self.config.end_date)
    }
}

fn check_usd_range(section: &str, min: i64, max: i64, floor: i64) -> Result<(), SynthesisError> {
    if min <= 0 || max < min {
        return Err(SynthesisError::InvalidConfig(format!(
            "{} USD range [{}, {}] must be positive and ordered",
            section, min, max
        )));
    }
    check_convertible(section, max, floor)
}

/// The largest amount must still fit in satoshis at the lowest possible price
fn check_convertible(section: &str, usd_cents: i64, floor: i64) -> Result<(), SynthesisError> {
    usd_cents_to_sats(usd_cents, floor).map_err(|e| {
        SynthesisError::InvalidConfig(format!(
            "{} amount of {} cents cannot be expressed in sats: {}",
            section, usd_cents, e
        ))
    })?;
    Ok(())
}
