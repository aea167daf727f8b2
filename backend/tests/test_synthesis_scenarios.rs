//! End-to-end synthesis scenarios
//!
//! Critical invariants tested:
//! - Default run: 10,000 invoices, 6 bimonthly sweeps, checking float spent by vendors
//! - Each sweep consumes exactly the invoices of its period
//! - Schedule errors stop the run before any ledger mutation
//! - Same seed → identical dataset
//! - Summary flows reconcile with final wallet balances

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveTime};
use txgen_core_rs::ledger::LedgerError;
use txgen_core_rs::models::TxOrigin;
use txgen_core_rs::synthesis::stages::InvoicingStage;
use txgen_core_rs::synthesis::{
    default_stages, PlanContext, SynthesisContext, SynthesisOutput, SynthesisStage,
};
use txgen_core_rs::{
    OutPoint, ScheduleError, SynthConfig, SynthesisError, Synthesizer, Transaction, TxCategory,
    WalletLabel, SATS_PER_BTC,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn default_output() -> &'static SynthesisOutput {
    static OUTPUT: OnceLock<SynthesisOutput> = OnceLock::new();
    OUTPUT.get_or_init(|| run(SynthConfig::default()))
}

fn run(config: SynthConfig) -> SynthesisOutput {
    Synthesizer::new(config).unwrap().run().unwrap()
}

fn small_config(seed: u64) -> SynthConfig {
    let mut config = SynthConfig {
        seed,
        ..SynthConfig::default()
    };
    config.invoices.count = 1_000;
    config.vendor_payments.count = 5;
    config.special_transfers.outbound_count = 0;
    config
}

fn of(output: &SynthesisOutput, category: TxCategory) -> Vec<&Transaction> {
    output.by_category(category).collect()
}

/// Stage that records whether it was ever executed
struct ExecutionRecorder {
    executed: Rc<Cell<bool>>,
}

impl SynthesisStage for ExecutionRecorder {
    fn name(&self) -> &'static str {
        "execution_recorder"
    }

    fn reads(&self) -> &'static [WalletLabel] {
        &[]
    }

    fn writes(&self) -> &'static [WalletLabel] {
        &[]
    }

    fn plan(&mut self, _ctx: &mut PlanContext<'_>) -> Result<(), SynthesisError> {
        Ok(())
    }

    fn execute(
        &mut self,
        _ctx: &mut SynthesisContext<'_>,
    ) -> Result<Vec<Transaction>, SynthesisError> {
        self.executed.set(true);
        Ok(Vec::new())
    }
}

// ============================================================================
// Default run
// ============================================================================

#[test]
fn test_default_run_invoices() {
    let output = default_output();
    let invoices = of(output, TxCategory::Invoice);
    assert_eq!(invoices.len(), 10_000);

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    for tx in invoices {
        assert!(tx.inputs().is_empty());
        assert!(matches!(tx.origin(), TxOrigin::Invoice { .. }));
        assert_eq!(tx.wallet_to(), Some(WalletLabel::Invoicing));
        assert!(tx.date() >= start && tx.date() <= end);

        let quoted = tx.quoted_usd_cents().unwrap();
        assert!((10_000..=200_000).contains(&quoted));
        assert_eq!(tx.value_usd_cents(), quoted);
    }
}

#[test]
fn test_invoice_addresses_never_reused() {
    let output = default_output();
    let addresses: BTreeSet<&str> = output
        .by_category(TxCategory::Invoice)
        .map(|tx| tx.outputs()[0].address.as_str())
        .collect();
    assert_eq!(addresses.len(), 10_000);
}

#[test]
fn test_six_bimonthly_consolidations() {
    let output = default_output();
    let sweeps = of(output, TxCategory::Consolidation);
    let dates: Vec<NaiveDate> = sweeps.iter().map(|tx| tx.date()).collect();
    let expected: Vec<NaiveDate> = [(2, 29), (4, 30), (6, 30), (8, 31), (10, 31), (12, 31)]
        .iter()
        .map(|&(m, d)| NaiveDate::from_ymd_opt(2024, m, d).unwrap())
        .collect();
    assert_eq!(dates, expected);
    // Feb 29 is day 59 of the horizon; its last block is 100 + 60 * 144 - 1
    assert_eq!(sweeps[0].block_height(), 8_739);
    assert_eq!(sweeps[5].block_height(), 100 + 366 * 144 - 1);
    for tx in &sweeps {
        assert_eq!(tx.timestamp().time(), NaiveTime::from_hms_opt(23, 50, 0).unwrap());
        assert_eq!(tx.wallet_from(), Some(WalletLabel::Invoicing));
        assert_eq!(tx.wallet_to(), Some(WalletLabel::Treasury));
        assert_eq!(tx.outputs().len(), 1);
    }
}

#[test]
fn test_each_sweep_consumes_exactly_its_period() {
    let output = default_output();
    let invoices = of(output, TxCategory::Invoice);
    let mut period_start = 100u64;

    for sweep in of(output, TxCategory::Consolidation) {
        let expected: BTreeSet<OutPoint> = invoices
            .iter()
            .filter(|tx| tx.block_height() >= period_start && tx.block_height() < sweep.block_height())
            .map(|tx| OutPoint::new(tx.txid(), 0))
            .collect();
        let consumed: BTreeSet<OutPoint> = sweep.inputs().iter().map(|i| i.outpoint()).collect();
        assert_eq!(consumed, expected, "sweep at height {}", sweep.block_height());
        period_start = sweep.block_height();
    }
}

#[test]
fn test_every_invoice_swept_by_year_end() {
    let output = default_output();
    let invoicing = output.wallet(WalletLabel::Invoicing).unwrap();
    let last_sweep = of(output, TxCategory::Consolidation).last().unwrap().block_height();
    let late = output
        .by_category(TxCategory::Invoice)
        .filter(|tx| tx.block_height() >= last_sweep)
        .map(|tx| tx.value_sats())
        .sum::<i64>();
    assert_eq!(invoicing.balance_sats, late);
}

#[test]
fn test_single_seed_transfer_after_first_sweep() {
    let output = default_output();
    let transfers = of(output, TxCategory::Transfer);
    assert_eq!(transfers.len(), 1);

    let seed = transfers[0];
    let first_sweep = of(output, TxCategory::Consolidation)[0];
    assert_eq!(seed.value_sats(), SATS_PER_BTC);
    assert_eq!(seed.block_height(), first_sweep.block_height() + 6);
    assert_eq!(seed.wallet_from(), Some(WalletLabel::Treasury));
    assert_eq!(seed.wallet_to(), Some(WalletLabel::Checking));
}

#[test]
fn test_checking_balance_is_float_minus_vendor_payments() {
    let output = default_output();
    let payments = of(output, TxCategory::VendorPayment);
    assert_eq!(payments.len(), 20);

    let seed_height = of(output, TxCategory::Transfer)[0].block_height();
    let mut paid = 0i64;
    for tx in &payments {
        assert!(tx.block_height() > seed_height);
        assert_eq!(tx.wallet_from(), Some(WalletLabel::Checking));
        assert_eq!(tx.wallet_to(), None);
        assert!(tx.inputs().iter().all(|i| i.wallet == WalletLabel::Checking));
        paid += tx.value_sats() + tx.fee_sats();
    }
    let checking = output.wallet(WalletLabel::Checking).unwrap();
    assert_eq!(checking.balance_sats, SATS_PER_BTC - paid);
}

#[test]
fn test_special_transfers() {
    let output = default_output();
    let special = of(output, TxCategory::Special);
    let deposits: Vec<_> = special.iter().filter(|tx| tx.is_receipt()).collect();
    let withdrawals: Vec<_> = special.iter().filter(|tx| !tx.is_receipt()).collect();
    assert_eq!(deposits.len(), 2);
    assert_eq!(withdrawals.len(), 5);

    let mut quoted: Vec<i64> = deposits
        .iter()
        .map(|tx| tx.quoted_usd_cents().unwrap())
        .collect();
    quoted.sort_unstable();
    assert_eq!(quoted, vec![10_000_000, 20_000_000]);

    let first_sweep = of(output, TxCategory::Consolidation)[0].block_height();
    for tx in withdrawals {
        assert!(tx.block_height() > first_sweep);
        assert!(tx.inputs().iter().all(|i| i.wallet == WalletLabel::Treasury));
        // Destination is external and untracked
        assert_eq!(tx.outputs()[0].wallet, None);
    }
}

#[test]
fn test_summary_reconciles_with_balances() {
    let output = default_output();
    assert_eq!(output.summary.total_transactions, output.transactions.len());
    assert_eq!(output.summary.count(TxCategory::Invoice), 10_000);
    assert_eq!(output.summary.count(TxCategory::Consolidation), 6);

    for label in WalletLabel::ALL {
        let stats = output.summary.wallet(label);
        let snapshot = output.wallet(label).unwrap();
        assert_eq!(stats.net_sats(), snapshot.balance_sats, "{}", label);
        assert_eq!(stats.final_balance_sats, snapshot.balance_sats, "{}", label);
    }
    assert_eq!(output.summary.total_fees_sats, {
        output.transactions.iter().map(|tx| tx.fee_sats()).sum::<i64>()
    });
}

#[test]
fn test_transactions_in_chronological_order() {
    let output = default_output();
    for pair in output.transactions.windows(2) {
        assert!(pair[0].chrono_key() <= pair[1].chrono_key());
    }
    output.verify().unwrap();
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_same_seed_identical_output() {
    let a = run(small_config(7));
    let b = run(small_config(7));
    let ids_a: Vec<&str> = a.transactions.iter().map(|tx| tx.txid()).collect();
    let ids_b: Vec<&str> = b.transactions.iter().map(|tx| tx.txid()).collect();
    assert_eq!(ids_a, ids_b);
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.summary, b.summary);
}

#[test]
fn test_different_seed_different_output() {
    let a = run(small_config(7));
    let b = run(small_config(43));
    assert_ne!(a.transactions[0].txid(), b.transactions[0].txid());
    assert_ne!(a.config_hash, b.config_hash);
}

// ============================================================================
// Configuration variants
// ============================================================================

#[test]
fn test_monthly_consolidation() {
    let mut config = SynthConfig::default();
    config.consolidation.interval_months = 1;
    let output = run(config);
    assert_eq!(output.summary.count(TxCategory::Consolidation), 12);

    let sweeps = of(&output, TxCategory::Consolidation);
    for (month, tx) in (1..=12).zip(&sweeps) {
        let date = tx.date();
        assert_eq!(date.month(), month);
        assert_ne!(date.succ_opt().unwrap().month(), month, "{} is not a month end", date);
    }
    output.verify().unwrap();
}

#[test]
fn test_horizon_too_short_for_seed_transfer() {
    let mut config = small_config(3);
    config.end_date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

    let result = Synthesizer::new(config).unwrap().run();
    match result {
        Err(SynthesisError::InvalidConfig(message)) => {
            assert!(message.contains("seed transfer"), "{}", message);
        }
        other => panic!("expected InvalidConfig, got {:?}", other.map(|o| o.transactions.len())),
    }
}

#[test]
fn test_wallet_address_lists() {
    let output = default_output();
    let count = |label| output.wallet(label).unwrap().addresses.len();
    assert_eq!(count(WalletLabel::Invoicing), 10_000);
    assert_eq!(count(WalletLabel::Treasury), 100);
    assert_eq!(count(WalletLabel::Checking), 100);
}

#[test]
fn test_no_vendor_payments_keeps_float() {
    let mut config = SynthConfig::default();
    config.vendor_payments.count = 0;
    let output = run(config);
    assert_eq!(output.summary.count(TxCategory::VendorPayment), 0);
    assert_eq!(
        output.wallet(WalletLabel::Checking).unwrap().balance_sats,
        SATS_PER_BTC
    );
}

#[test]
fn test_oversized_vendor_payments_exhaust_checking() {
    let mut config = SynthConfig::default();
    config.vendor_payments.usd_min_cents = 5_000_000;
    config.vendor_payments.usd_max_cents = 10_000_000;

    let result = Synthesizer::new(config).unwrap().run();
    assert!(matches!(
        result,
        Err(SynthesisError::Ledger(LedgerError::InsufficientFunds {
            wallet: WalletLabel::Checking,
            ..
        }))
    ));
}

#[test]
fn test_overfull_horizon_fails_before_execution() {
    let mut config = SynthConfig::default();
    config.invoices.count = 60_000;

    let executed = Rc::new(Cell::new(false));
    let mut stages = default_stages();
    stages.insert(
        0,
        Box::new(ExecutionRecorder {
            executed: Rc::clone(&executed),
        }),
    );

    let result = Synthesizer::with_stages(config, stages).unwrap().run();
    assert!(matches!(
        result,
        Err(SynthesisError::Schedule(ScheduleError::Range {
            requested: 60_000,
            ..
        }))
    ));
    assert!(!executed.get());
}

#[test]
fn test_misordered_pipeline_rejected() {
    let mut stages = default_stages();
    // Consolidation ahead of invoicing reads an unfunded wallet
    stages.swap(0, 1);
    assert!(matches!(
        Synthesizer::with_stages(SynthConfig::default(), stages),
        Err(SynthesisError::InvalidConfig(_))
    ));
}

#[test]
fn test_invoicing_only_pipeline() {
    let stages: Vec<Box<dyn SynthesisStage>> = vec![Box::new(InvoicingStage::new())];
    let output = Synthesizer::with_stages(small_config(1), stages)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(output.transactions.len(), 1_000);
    let total: i64 = output.transactions.iter().map(|tx| tx.value_sats()).sum();
    assert_eq!(
        output.wallet(WalletLabel::Invoicing).unwrap().balance_sats,
        total
    );
}
