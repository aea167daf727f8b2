//! JSON exporter
//!
//! Renders a finished `SynthesisOutput` as the file set consumed by
//! reconciliation fixtures. Amounts are written in BTC / USD units here;
//! everything upstream stays in satoshis and cents.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use txgen_core_rs::models::{ExportBatch, Transaction, TxInput, TxOutput};
use txgen_core_rs::synthesis::{SummaryStats, SynthesisOutput, WalletSnapshot};
use txgen_core_rs::{ExchangeRateEntry, SATS_PER_BTC};

pub fn sats_to_btc(sats: i64) -> f64 {
    sats as f64 / SATS_PER_BTC as f64
}

fn cents_to_usd(cents: i64) -> f64 {
    cents as f64 / 100.0
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Serialize)]
pub struct InputRecord {
    pub txid: String,
    pub vout: u32,
    pub wallet: String,
    pub value_btc: f64,
}

impl From<&TxInput> for InputRecord {
    fn from(input: &TxInput) -> Self {
        InputRecord {
            txid: input.txid.clone(),
            vout: input.vout,
            wallet: input.wallet.as_str().to_string(),
            value_btc: sats_to_btc(input.value_sats),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutputRecord {
    pub vout: u32,
    /// None for external, untracked addresses
    pub wallet: Option<String>,
    pub address: String,
    pub value_btc: f64,
}

impl From<&TxOutput> for OutputRecord {
    fn from(output: &TxOutput) -> Self {
        OutputRecord {
            vout: output.vout,
            wallet: output.wallet.map(|w| w.as_str().to_string()),
            address: output.address.clone(),
            value_btc: sats_to_btc(output.value_sats),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionRecord {
    pub id: String,
    pub date: String,
    pub timestamp: String,
    pub block_height: u64,
    pub category: String,
    pub inputs: Vec<InputRecord>,
    pub outputs: Vec<OutputRecord>,
    pub value_btc: f64,
    pub value_usd: f64,
    pub fee_btc: f64,
    pub rate_usd: f64,
    pub wallet_from: Option<String>,
    pub wallet_to: Option<String>,
}

impl From<&Transaction> for TransactionRecord {
    fn from(tx: &Transaction) -> Self {
        TransactionRecord {
            id: tx.txid().to_string(),
            date: tx.date().format("%Y-%m-%d").to_string(),
            timestamp: tx.timestamp().format("%Y-%m-%dT%H:%M:%S").to_string(),
            block_height: tx.block_height(),
            category: tx.category().as_str().to_string(),
            inputs: tx.inputs().iter().map(InputRecord::from).collect(),
            outputs: tx.outputs().iter().map(OutputRecord::from).collect(),
            value_btc: sats_to_btc(tx.value_sats()),
            value_usd: cents_to_usd(tx.value_usd_cents()),
            fee_btc: sats_to_btc(tx.fee_sats()),
            rate_usd: cents_to_usd(tx.rate_cents()),
            wallet_from: tx.wallet_from().map(|w| w.as_str().to_string()),
            wallet_to: tx.wallet_to().map(|w| w.as_str().to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct WalletRecord {
    label: String,
    code: char,
    derivation_root: String,
    receive_address: String,
    addresses_used: usize,
    addresses: Vec<String>,
    unspent_count: usize,
    final_balance_btc: f64,
}

impl From<&WalletSnapshot> for WalletRecord {
    fn from(wallet: &WalletSnapshot) -> Self {
        WalletRecord {
            label: wallet.label.as_str().to_string(),
            code: wallet.label.code(),
            derivation_root: wallet.derivation_root.clone(),
            receive_address: wallet.receive_address.clone(),
            addresses_used: wallet.addresses_used,
            addresses: wallet.addresses.clone(),
            unspent_count: wallet.unspent_count,
            final_balance_btc: sats_to_btc(wallet.balance_sats),
        }
    }
}

#[derive(Debug, Serialize)]
struct RateRecord {
    date: String,
    price_usd: f64,
}

impl From<&ExchangeRateEntry> for RateRecord {
    fn from(entry: &ExchangeRateEntry) -> Self {
        RateRecord {
            date: entry.date.format("%Y-%m-%d").to_string(),
            price_usd: cents_to_usd(entry.price_cents),
        }
    }
}

#[derive(Debug, Serialize)]
struct Manifest {
    seed: u64,
    start_date: String,
    end_date: String,
    config_hash: String,
    transaction_count: usize,
    files: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SummaryFile<'a> {
    manifest: Manifest,
    stats: &'a SummaryStats,
}

// ============================================================================
// Writers
// ============================================================================

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to serialize {:?}", path))?;
    writer.flush()?;
    Ok(())
}

fn records<'a>(txs: impl Iterator<Item = &'a Transaction>) -> Vec<TransactionRecord> {
    txs.map(TransactionRecord::from).collect()
}

/// Write the full file set into `out_dir`; returns the paths written
pub fn write_all(output: &SynthesisOutput, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir).with_context(|| format!("Failed to create {:?}", out_dir))?;
    let mut written = Vec::new();

    let wallets: Vec<WalletRecord> = output.wallets.iter().map(WalletRecord::from).collect();
    let path = out_dir.join("wallets.json");
    write_json(&path, &wallets)?;
    written.push(path);

    let rates: Vec<RateRecord> = output.exchange_rates.iter().map(RateRecord::from).collect();
    let path = out_dir.join("exchange_rates.json");
    write_json(&path, &rates)?;
    written.push(path);

    for batch in ExportBatch::ALL {
        let batch_records = records(
            output
                .transactions
                .iter()
                .filter(|tx| tx.category().batch() == batch),
        );
        let path = out_dir.join(format!("{}.json", batch.file_stem()));
        write_json(&path, &batch_records)?;
        written.push(path);
    }

    let path = out_dir.join("all_transactions.json");
    write_json(&path, &records(output.transactions.iter()))?;
    written.push(path);

    let path = out_dir.join("summary.json");
    let mut files: Vec<String> = written
        .iter()
        .filter_map(|p| p.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    files.push("summary.json".to_string());
    let summary = SummaryFile {
        manifest: Manifest {
            seed: output.config.seed,
            start_date: output.config.start_date.format("%Y-%m-%d").to_string(),
            end_date: output.config.end_date.format("%Y-%m-%d").to_string(),
            config_hash: output.config_hash.clone(),
            transaction_count: output.transactions.len(),
            files,
        },
        stats: &output.summary,
    };
    write_json(&path, &summary)?;
    written.push(path);

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use txgen_core_rs::{SynthConfig, Synthesizer};

    fn small_output() -> SynthesisOutput {
        let mut config = SynthConfig::default();
        config.invoices.count = 1_000;
        config.vendor_payments.count = 5;
        config.special_transfers.outbound_count = 0;
        Synthesizer::new(config).unwrap().run().unwrap()
    }

    #[test]
    fn test_write_all_creates_every_file() {
        let output = small_output();
        let dir = std::env::temp_dir().join(format!("txgen-export-{}", std::process::id()));

        let written = write_all(&output, &dir).unwrap();
        assert_eq!(written.len(), 8);
        for name in [
            "wallets.json",
            "exchange_rates.json",
            "invoice_transactions.json",
            "consolidation_transactions.json",
            "checking_transactions.json",
            "special_treasury_transactions.json",
            "all_transactions.json",
            "summary.json",
        ] {
            assert!(dir.join(name).exists(), "missing {}", name);
        }

        let all: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(dir.join("all_transactions.json")).unwrap())
                .unwrap();
        assert_eq!(all.len(), output.transactions.len());
        assert!(all[0].get("value_usd").is_some());

        let invoices: Vec<serde_json::Value> = serde_json::from_str(
            &fs::read_to_string(dir.join("invoice_transactions.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(invoices.len(), 1_000);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_wallet_file_lists_every_receiving_address() {
        let output = small_output();
        let dir = std::env::temp_dir().join(format!("txgen-wallets-{}", std::process::id()));
        write_all(&output, &dir).unwrap();

        let wallets: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(dir.join("wallets.json")).unwrap()).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        let mut listed: HashMap<String, HashSet<String>> = HashMap::new();
        for wallet in &wallets {
            assert!(wallet.get("final_balance_btc").is_some());
            assert!(wallet.get("balance_btc").is_none());
            let addresses: Vec<String> =
                serde_json::from_value(wallet["addresses"].clone()).unwrap();
            let label = wallet["label"].as_str().unwrap().to_string();
            listed.insert(label, addresses.into_iter().collect());
        }
        assert_eq!(listed["invoicing"].len(), 1_000);
        assert_eq!(listed["treasury"].len(), 100);
        assert_eq!(listed["checking"].len(), 100);

        for tx in &output.transactions {
            for out in tx.outputs() {
                if let Some(wallet) = out.wallet {
                    assert!(
                        listed[wallet.as_str()].contains(&out.address),
                        "{} not listed for {}",
                        out.address,
                        wallet
                    );
                }
            }
        }
    }

    #[test]
    fn test_record_uses_btc_units() {
        let output = small_output();
        let transfer = output
            .transactions
            .iter()
            .find(|tx| tx.category() == txgen_core_rs::TxCategory::Transfer)
            .unwrap();
        let record = TransactionRecord::from(transfer);
        assert_eq!(record.value_btc, 1.0);
        assert_eq!(record.category, "transfer");
        assert_eq!(record.wallet_to.as_deref(), Some("checking"));
    }
}
