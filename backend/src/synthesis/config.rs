//! Synthesis configuration
//!
//! Every section is `#[serde(default)]`, so a JSON config only needs the
//! fields it overrides. `SynthConfig::default()` is the reference scenario:
//! one year of 2024, seed 42, 10,000 invoices, bi-monthly consolidation,
//! a 1 BTC checking float and 20 vendor payments.

use crate::core::calendar::CalendarConfig;
use crate::rates::{RateWalkConfig, SATS_PER_BTC};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Top-level configuration of a synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// RNG seed; same seed and config give byte-identical output
    pub seed: u64,

    /// First day of the horizon
    pub start_date: NaiveDate,

    /// Last day of the horizon (inclusive)
    pub end_date: NaiveDate,

    pub calendar: CalendarConfig,
    pub rates: RateWalkConfig,

    /// Size of the rotating address pool for non-invoice credits
    pub address_pool_size: u32,

    pub invoices: InvoiceConfig,
    pub consolidation: ConsolidationConfig,
    pub seed_transfer: SeedTransferConfig,
    pub vendor_payments: VendorConfig,
    pub special_transfers: SpecialTransferConfig,
    pub fees: FeeSchedule,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            calendar: CalendarConfig::default(),
            rates: RateWalkConfig::default(),
            address_pool_size: 100,
            invoices: InvoiceConfig::default(),
            consolidation: ConsolidationConfig::default(),
            seed_transfer: SeedTransferConfig::default(),
            vendor_payments: VendorConfig::default(),
            special_transfers: SpecialTransferConfig::default(),
            fees: FeeSchedule::default(),
        }
    }
}

/// Customer payments into the invoicing wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceConfig {
    pub count: usize,
    pub usd_min_cents: i64,
    pub usd_max_cents: i64,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            count: 10_000,
            usd_min_cents: 10_000,  // $100
            usd_max_cents: 200_000, // $2,000
        }
    }
}

/// Periodic sweeps from invoicing into treasury
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Calendar months per consolidation period
    pub interval_months: u32,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self { interval_months: 2 }
    }
}

/// One-off treasury → checking float
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedTransferConfig {
    pub amount_sats: i64,

    /// Blocks after the first consolidation
    pub delay_blocks: u64,
}

impl Default for SeedTransferConfig {
    fn default() -> Self {
        Self {
            amount_sats: SATS_PER_BTC,
            delay_blocks: 6,
        }
    }
}

/// Checking wallet payments to vendors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    pub count: usize,
    pub usd_min_cents: i64,
    pub usd_max_cents: i64,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            count: 20,
            usd_min_cents: 5_000,   // $50
            usd_max_cents: 500_000, // $5,000
        }
    }
}

/// Large treasury movements outside the invoicing cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialTransferConfig {
    /// USD amounts of external deposits into treasury
    pub inbound_usd_cents: Vec<i64>,

    pub outbound_count: usize,
    pub outbound_usd_min_cents: i64,
    pub outbound_usd_max_cents: i64,
}

impl Default for SpecialTransferConfig {
    fn default() -> Self {
        Self {
            inbound_usd_cents: vec![10_000_000, 20_000_000], // $100k, $200k
            outbound_count: 5,
            outbound_usd_min_cents: 5_000_000,  // $50k
            outbound_usd_max_cents: 30_000_000, // $300k
        }
    }
}

/// Fee charged by one category of spending transaction
///
/// `fee = flat_sats + per_input_sats × inputs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeePolicy {
    pub flat_sats: i64,
    pub per_input_sats: i64,
}

impl FeePolicy {
    pub fn flat(flat_sats: i64) -> Self {
        Self {
            flat_sats,
            per_input_sats: 0,
        }
    }

    pub fn fee_for(&self, inputs: usize) -> i64 {
        self.flat_sats + self.per_input_sats * inputs as i64
    }

    pub fn depends_on_inputs(&self) -> bool {
        self.per_input_sats != 0
    }
}

/// Fee policy per spending category
///
/// Only consolidations pay a fee by default, which keeps the checking
/// wallet's closing balance at exactly float − Σ payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub consolidation: FeePolicy,
    pub transfer: FeePolicy,
    pub vendor_payment: FeePolicy,
    pub special_outbound: FeePolicy,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            consolidation: FeePolicy {
                flat_sats: 1_000,
                per_input_sats: 68,
            },
            transfer: FeePolicy::default(),
            vendor_payment: FeePolicy::default(),
            special_outbound: FeePolicy::default(),
        }
    }
}

impl FeeSchedule {
    /// All categories free
    pub fn zero() -> Self {
        Self {
            consolidation: FeePolicy::default(),
            transfer: FeePolicy::default(),
            vendor_payment: FeePolicy::default(),
            special_outbound: FeePolicy::default(),
        }
    }

    fn all(&self) -> [(&'static str, FeePolicy); 4] {
        [
            ("consolidation", self.consolidation),
            ("transfer", self.transfer),
            ("vendor_payment", self.vendor_payment),
            ("special_outbound", self.special_outbound),
        ]
    }

    /// First policy with a negative component, if any
    pub fn negative_policy(&self) -> Option<&'static str> {
        self.all()
            .into_iter()
            .find(|(_, p)| p.flat_sats < 0 || p.per_input_sats < 0)
            .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_reference_scenario() {
        let config = SynthConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(config.end_date, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(config.invoices.count, 10_000);
        assert_eq!(config.vendor_payments.count, 20);
        assert_eq!(config.seed_transfer.amount_sats, 100_000_000);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SynthConfig =
            serde_json::from_str(r#"{"seed": 7, "invoices": {"count": 50}}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.invoices.count, 50);
        assert_eq!(config.invoices.usd_max_cents, 200_000);
        assert_eq!(config.consolidation.interval_months, 2);
    }

    #[test]
    fn test_fee_for_inputs() {
        let policy = FeeSchedule::default().consolidation;
        assert_eq!(policy.fee_for(10), 1_680);
        assert!(policy.depends_on_inputs());
        assert!(!FeePolicy::flat(500).depends_on_inputs());
    }

    #[test]
    fn test_negative_policy_detected() {
        let mut fees = FeeSchedule::zero();
        assert_eq!(fees.negative_policy(), None);
        fees.vendor_payment.flat_sats = -1;
        assert_eq!(fees.negative_policy(), Some("vendor_payment"));
    }
}
