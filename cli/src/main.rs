//! txgen - synthetic multi-wallet ledger generator
//!
//! Usage:
//!   txgen --seed 42 --start 2024-01-01 --end 2024-12-31 --out-dir data/
//!   txgen --config scenario.json --invoices 2000
//!
//! Flags override values from `--config`. Files are written only after the
//! run completes and passes verification.

mod export;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use txgen_core_rs::{SynthConfig, Synthesizer, TxCategory, WalletLabel};

/// Synthesize a self-consistent BTC ledger across invoicing, treasury and checking wallets
#[derive(Parser, Debug)]
#[command(name = "txgen")]
#[command(about = "Generate a synthetic multi-wallet UTXO ledger for reconciliation testing")]
struct Cli {
    /// RNG seed (same seed and config give identical output)
    #[arg(long)]
    seed: Option<u64>,

    /// First day of the horizon (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of the horizon, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Number of invoice receipts
    #[arg(long)]
    invoices: Option<usize>,

    /// Number of vendor payments from the checking wallet
    #[arg(long)]
    vendor_payments: Option<usize>,

    /// Months between invoicing → treasury consolidations
    #[arg(long)]
    consolidation_interval_months: Option<u32>,

    /// JSON file with a full or partial synthesis config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,
}

impl Cli {
    fn synth_config(&self) -> Result<SynthConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config: {:?}", path))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse config: {:?}", path))?
            }
            None => SynthConfig::default(),
        };

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(start) = self.start {
            config.start_date = start;
        }
        if let Some(end) = self.end {
            config.end_date = end;
        }
        if let Some(invoices) = self.invoices {
            config.invoices.count = invoices;
        }
        if let Some(vendor_payments) = self.vendor_payments {
            config.vendor_payments.count = vendor_payments;
        }
        if let Some(months) = self.consolidation_interval_months {
            config.consolidation.interval_months = months;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("txgen=info,txgen_core_rs=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.synth_config()?;

    let output = Synthesizer::new(config)
        .context("Invalid synthesis config")?
        .run()
        .context("Synthesis failed")?;

    let written = export::write_all(&output, &cli.out_dir)
        .with_context(|| format!("Failed to export to {:?}", cli.out_dir))?;

    let summary = &output.summary;
    info!(
        invoices = summary.count(TxCategory::Invoice),
        consolidations = summary.count(TxCategory::Consolidation),
        vendor_payments = summary.count(TxCategory::VendorPayment),
        special = summary.count(TxCategory::Special),
        "generated {} transactions",
        summary.total_transactions
    );
    for label in WalletLabel::ALL {
        info!(
            wallet = label.as_str(),
            final_balance_btc = export::sats_to_btc(summary.wallet(label).final_balance_sats),
            "closing balance"
        );
    }
    info!(files = written.len(), out_dir = ?cli.out_dir, "export complete");

    Ok(())
}
