//! Summary statistics derived from the transaction list
//!
//! Per-wallet flows count the principal (`value_sats`) on the receiving side
//! and principal + fee on the paying side, so `sats_in - sats_out` equals the
//! wallet's closing balance.

use crate::ledger::WalletRegistry;
use crate::models::transaction::{Transaction, TxCategory};
use crate::models::wallet::WalletLabel;
use crate::rates::{sats_to_usd_cents, RateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flows of one wallet over the horizon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletStats {
    pub incoming_count: usize,
    pub outgoing_count: usize,
    pub sats_in: i64,
    pub sats_out: i64,
    pub usd_cents_in: i64,
    pub usd_cents_out: i64,
    pub final_balance_sats: i64,
}

impl WalletStats {
    pub fn net_sats(&self) -> i64 {
        self.sats_in - self.sats_out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_transactions: usize,
    pub by_category: BTreeMap<TxCategory, usize>,
    pub wallets: BTreeMap<WalletLabel, WalletStats>,

    /// Σ principal over all transactions
    pub total_sats_moved: i64,
    pub total_usd_cents_moved: i64,
    pub total_fees_sats: i64,

    pub min_tx_sats: i64,
    pub max_tx_sats: i64,
    pub mean_tx_sats: i64,
}

impl SummaryStats {
    pub fn compute(
        transactions: &[Transaction],
        registry: &WalletRegistry,
    ) -> Result<Self, RateError> {
        let mut stats = SummaryStats {
            total_transactions: transactions.len(),
            ..SummaryStats::default()
        };

        for category in TxCategory::ALL {
            stats.by_category.insert(category, 0);
        }
        for label in WalletLabel::ALL {
            stats.wallets.insert(
                label,
                WalletStats {
                    final_balance_sats: registry.balance(label),
                    ..WalletStats::default()
                },
            );
        }

        for tx in transactions {
            *stats.by_category.entry(tx.category()).or_insert(0) += 1;
            stats.total_sats_moved += tx.value_sats();
            stats.total_usd_cents_moved += tx.value_usd_cents();
            stats.total_fees_sats += tx.fee_sats();

            if let Some(to) = tx.wallet_to() {
                let entry = stats.wallets.entry(to).or_default();
                entry.incoming_count += 1;
                entry.sats_in += tx.value_sats();
                entry.usd_cents_in += tx.value_usd_cents();
            }
            if let Some(from) = tx.wallet_from() {
                let paid = tx.value_sats() + tx.fee_sats();
                let entry = stats.wallets.entry(from).or_default();
                entry.outgoing_count += 1;
                entry.sats_out += paid;
                entry.usd_cents_out += sats_to_usd_cents(paid, tx.rate_cents())?;
            }
        }

        let sizes = transactions.iter().map(|tx| tx.value_sats());
        stats.min_tx_sats = sizes.clone().min().unwrap_or(0);
        stats.max_tx_sats = sizes.max().unwrap_or(0);
        if !transactions.is_empty() {
            stats.mean_tx_sats = stats.total_sats_moved / transactions.len() as i64;
        }

        Ok(stats)
    }

    pub fn count(&self, category: TxCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    pub fn wallet(&self, label: WalletLabel) -> WalletStats {
        self.wallets.get(&label).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_run_has_zeroed_stats() {
        let registry = WalletRegistry::from_seed(1, 10);
        let stats = SummaryStats::compute(&[], &registry).unwrap();
        assert_eq!(stats.total_transactions, 0);
        assert_eq!(stats.count(TxCategory::Invoice), 0);
        assert_eq!(stats.mean_tx_sats, 0);
        assert_eq!(stats.wallet(WalletLabel::Checking).final_balance_sats, 0);
    }
}
