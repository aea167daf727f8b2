//! Snapshots, config hashing and output verification
//!
//! # Critical Invariants
//!
//! - **Chronology**: transactions are ordered by (date, block height)
//! - **Causality**: every input was created by an earlier transaction at a
//!   strictly lower height
//! - **Single spend**: no outpoint is consumed twice
//! - **Value balance**: inputs = outputs + fee for every spend
//! - **Rate coverage**: every transaction date has a rate, and it is the one used
//! - **Balance conservation**: tracked outputs minus tracked spends equal the
//!   reported wallet balances

use crate::ledger::UtxoLedger;
use crate::models::utxo::OutPoint;
use crate::models::wallet::{Wallet, WalletLabel};
use crate::synthesis::engine::SynthesisOutput;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Closing state of one wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub label: WalletLabel,
    pub derivation_root: String,
    pub receive_address: String,
    pub addresses_used: usize,
    /// Receive addresses in derivation order
    pub addresses: Vec<String>,
    pub unspent_count: usize,
    pub balance_sats: i64,
}

impl From<(&Wallet, &UtxoLedger)> for WalletSnapshot {
    fn from((wallet, ledger): (&Wallet, &UtxoLedger)) -> Self {
        WalletSnapshot {
            label: wallet.label(),
            derivation_root: wallet.derivation_root().to_string(),
            receive_address: wallet.receive_address(),
            addresses_used: wallet.addresses_used(),
            addresses: wallet.known_addresses(),
            unspent_count: ledger.unspent_count(wallet.label()),
            balance_sats: ledger.balance(wallet.label()),
        }
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// SHA-256 over the config's JSON with recursively sorted keys
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, serde_json::Error> {
    use serde_json::Value;

    let value = serde_json::to_value(config)?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Verification
// ============================================================================

/// Invariant violations found in a finished dataset
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("transaction {index} ({txid}) is out of chronological order")]
    OutOfOrder { index: usize, txid: String },

    #[error("transaction {txid} spends {outpoint}, which no earlier transaction created")]
    UnknownInput { txid: String, outpoint: OutPoint },

    #[error("outpoint {outpoint} spent twice (second time by {txid})")]
    DoubleSpend { txid: String, outpoint: OutPoint },

    #[error(
        "transaction {txid} at height {spent_height} spends {outpoint} created at height {created_height}"
    )]
    CausalityViolated {
        txid: String,
        outpoint: OutPoint,
        created_height: u64,
        spent_height: u64,
    },

    #[error("transaction {txid} does not balance: {detail}")]
    ValueImbalance { txid: String, detail: String },

    #[error("transaction {txid} on {date} has no matching exchange rate")]
    MissingRate { txid: String, date: NaiveDate },

    #[error("{wallet} balance mismatch: derived {derived}, reported {reported}")]
    BalanceMismatch {
        wallet: WalletLabel,
        derived: i64,
        reported: i64,
    },
}

/// A tracked output as seen while replaying the transaction list
struct Created {
    height: u64,
    value_sats: i64,
    wallet: Option<WalletLabel>,
}

/// Replay the transactions in order and check every dataset invariant
pub fn verify_output(output: &SynthesisOutput) -> Result<(), VerificationError> {
    let rates: HashMap<NaiveDate, i64> = output
        .exchange_rates
        .iter()
        .map(|e| (e.date, e.price_cents))
        .collect();

    let mut created: HashMap<OutPoint, Created> = HashMap::new();
    let mut spent: HashSet<OutPoint> = HashSet::new();
    let mut balances: BTreeMap<WalletLabel, i64> = BTreeMap::new();

    for (index, tx) in output.transactions.iter().enumerate() {
        // 1. Chronology
        if index > 0 && output.transactions[index - 1].chrono_key() > tx.chrono_key() {
            return Err(VerificationError::OutOfOrder {
                index,
                txid: tx.txid().to_string(),
            });
        }

        // 2. Rate coverage
        if rates.get(&tx.date()) != Some(&tx.rate_cents()) {
            return Err(VerificationError::MissingRate {
                txid: tx.txid().to_string(),
                date: tx.date(),
            });
        }

        // 3. Value balance
        if tx.is_receipt() {
            if tx.fee_sats() != 0 {
                return Err(imbalance(tx.txid(), "receipt carries a fee"));
            }
        } else if tx.fee_sats() < 0 || tx.input_total() != tx.output_total() + tx.fee_sats() {
            return Err(imbalance(
                tx.txid(),
                &format!(
                    "inputs {} != outputs {} + fee {}",
                    tx.input_total(),
                    tx.output_total(),
                    tx.fee_sats()
                ),
            ));
        }

        // 4. Inputs: existence, causality, single spend
        for input in tx.inputs() {
            let outpoint = input.outpoint();
            let origin = created
                .get(&outpoint)
                .ok_or_else(|| VerificationError::UnknownInput {
                    txid: tx.txid().to_string(),
                    outpoint: outpoint.clone(),
                })?;
            if origin.height >= tx.block_height() {
                return Err(VerificationError::CausalityViolated {
                    txid: tx.txid().to_string(),
                    outpoint,
                    created_height: origin.height,
                    spent_height: tx.block_height(),
                });
            }
            if origin.value_sats != input.value_sats || origin.wallet != Some(input.wallet) {
                return Err(imbalance(
                    tx.txid(),
                    &format!("input {} does not match its source output", outpoint),
                ));
            }
            if !spent.insert(outpoint.clone()) {
                return Err(VerificationError::DoubleSpend {
                    txid: tx.txid().to_string(),
                    outpoint,
                });
            }
            *balances.entry(input.wallet).or_insert(0) -= input.value_sats;
        }

        // 5. Outputs become spendable for later transactions
        for out in tx.outputs() {
            created.insert(
                OutPoint::new(tx.txid(), out.vout),
                Created {
                    height: tx.block_height(),
                    value_sats: out.value_sats,
                    wallet: out.wallet,
                },
            );
            if let Some(wallet) = out.wallet {
                *balances.entry(wallet).or_insert(0) += out.value_sats;
            }
        }
    }

    // 6. Balance conservation against the reported wallets
    for snapshot in &output.wallets {
        let derived = balances.get(&snapshot.label).copied().unwrap_or(0);
        if derived != snapshot.balance_sats {
            return Err(VerificationError::BalanceMismatch {
                wallet: snapshot.label,
                derived,
                reported: snapshot.balance_sats,
            });
        }
    }

    Ok(())
}

fn imbalance(txid: &str, detail: &str) -> VerificationError {
    VerificationError::ValueImbalance {
        txid: txid.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::config::SynthConfig;

    #[test]
    fn test_config_hash_is_stable() {
        let a = compute_config_hash(&SynthConfig::default()).unwrap();
        let b = compute_config_hash(&SynthConfig::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_config_hash_tracks_seed() {
        let other = SynthConfig {
            seed: 43,
            ..SynthConfig::default()
        };
        assert_ne!(
            compute_config_hash(&SynthConfig::default()).unwrap(),
            compute_config_hash(&other).unwrap()
        );
    }
}
