//! Coin Selection Policies
//!
//! Decides **which** eligible UTXOs fund a spend. Policies never mutate the
//! ledger: they receive the eligible candidates (already filtered by wallet,
//! spent state and height window) and return the ids to consume.
//!
//! Available policies:
//! 1. **LargestFirst**: fewest inputs; treasury withdrawals and transfers
//! 2. **OldestFirst**: drains the oldest coins; vendor payments
//! 3. **ExactSet**: every candidate; consolidation sweeps
//!
//! Sufficiency (sum ≥ target) is checked by the ledger, not by the policy.

use crate::models::utxo::{Utxo, UtxoId};
use serde::{Deserialize, Serialize};

/// Coin selection interface
pub trait CoinSelector: Send {
    /// Policy name for logs
    fn name(&self) -> &'static str;

    /// Choose inputs from `candidates` (in creation order) to cover `target_sats`
    ///
    /// May return a set worth less than the target when the candidates are
    /// insufficient; the caller reports the shortfall.
    fn select(&self, candidates: &[&Utxo], target_sats: i64) -> Vec<UtxoId>;
}

/// Named selection strategy, resolved to a policy with [`SelectionStrategy::selector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    LargestFirst,
    OldestFirst,
    ExactSet,
}

impl SelectionStrategy {
    /// Policy implementing this strategy
    pub fn selector(&self) -> Box<dyn CoinSelector> {
        match self {
            SelectionStrategy::LargestFirst => Box::new(LargestFirst),
            SelectionStrategy::OldestFirst => Box::new(OldestFirst),
            SelectionStrategy::ExactSet => Box::new(ExactSet),
        }
    }
}

/// Greedy by value, largest first; creation order breaks ties
///
/// # Example
///
/// ```
/// use txgen_core_rs::ledger::selection::{CoinSelector, LargestFirst};
/// use txgen_core_rs::ledger::UtxoLedger;
/// use txgen_core_rs::models::{OutPoint, WalletLabel};
/// use chrono::NaiveDate;
///
/// let at = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let mut ledger = UtxoLedger::new();
/// for (vout, value) in [10, 50, 30].into_iter().enumerate() {
///     ledger
///         .credit(WalletLabel::Treasury, value, OutPoint::new("aa", vout as u32), "bcrt1q".into(), at, 100)
///         .unwrap();
/// }
///
/// let candidates: Vec<_> = ledger.unspent(WalletLabel::Treasury).collect();
/// let chosen = LargestFirst.select(&candidates, 60);
/// assert_eq!(chosen.len(), 2); // 50 + 30
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestFirst;

impl CoinSelector for LargestFirst {
    fn name(&self) -> &'static str {
        "largest_first"
    }

    fn select(&self, candidates: &[&Utxo], target_sats: i64) -> Vec<UtxoId> {
        let mut ordered = candidates.to_vec();
        ordered.sort_by(|a, b| {
            b.value_sats()
                .cmp(&a.value_sats())
                .then_with(|| a.id().cmp(&b.id()))
        });
        take_until(&ordered, target_sats)
    }
}

/// Greedy by age: lowest creation height first
#[derive(Debug, Clone, Copy, Default)]
pub struct OldestFirst;

impl CoinSelector for OldestFirst {
    fn name(&self) -> &'static str {
        "oldest_first"
    }

    fn select(&self, candidates: &[&Utxo], target_sats: i64) -> Vec<UtxoId> {
        let mut ordered = candidates.to_vec();
        ordered.sort_by_key(|u| (u.created_height(), u.id()));
        take_until(&ordered, target_sats)
    }
}

/// Every candidate, regardless of target
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactSet;

impl CoinSelector for ExactSet {
    fn name(&self) -> &'static str {
        "exact_set"
    }

    fn select(&self, candidates: &[&Utxo], _target_sats: i64) -> Vec<UtxoId> {
        candidates.iter().map(|u| u.id()).collect()
    }
}

fn take_until(ordered: &[&Utxo], target_sats: i64) -> Vec<UtxoId> {
    let mut chosen = Vec::new();
    let mut total = 0i64;
    for utxo in ordered {
        if total >= target_sats {
            break;
        }
        total += utxo.value_sats();
        chosen.push(utxo.id());
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::utxo::OutPoint;
    use crate::models::wallet::WalletLabel;
    use chrono::NaiveDate;

    fn utxo(id: usize, value: i64, height: u64) -> Utxo {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Utxo::new(
            UtxoId(id),
            WalletLabel::Checking,
            value,
            OutPoint::new(format!("{:064x}", id), 0),
            "bcrt1qtest".to_string(),
            at,
            height,
        )
    }

    #[test]
    fn test_largest_first_tie_break_is_creation_order() {
        let pool = [utxo(0, 5, 10), utxo(1, 9, 11), utxo(2, 9, 12)];
        let refs: Vec<&Utxo> = pool.iter().collect();
        assert_eq!(LargestFirst.select(&refs, 9), vec![UtxoId(1)]);
        assert_eq!(
            LargestFirst.select(&refs, 10),
            vec![UtxoId(1), UtxoId(2)]
        );
    }

    #[test]
    fn test_oldest_first_orders_by_height() {
        let pool = [utxo(0, 5, 30), utxo(1, 9, 10), utxo(2, 1, 20)];
        let refs: Vec<&Utxo> = pool.iter().collect();
        assert_eq!(OldestFirst.select(&refs, 10), vec![UtxoId(1), UtxoId(2)]);
    }

    #[test]
    fn test_exact_set_ignores_target() {
        let pool = [utxo(0, 5, 30), utxo(1, 9, 10)];
        let refs: Vec<&Utxo> = pool.iter().collect();
        assert_eq!(ExactSet.select(&refs, 0).len(), 2);
    }

    #[test]
    fn test_insufficient_candidates_return_everything() {
        let pool = [utxo(0, 5, 30), utxo(1, 9, 10)];
        let refs: Vec<&Utxo> = pool.iter().collect();
        assert_eq!(OldestFirst.select(&refs, 1_000).len(), 2);
    }

    #[test]
    fn test_factory_names() {
        assert_eq!(SelectionStrategy::LargestFirst.selector().name(), "largest_first");
        assert_eq!(SelectionStrategy::ExactSet.selector().name(), "exact_set");
    }
}
