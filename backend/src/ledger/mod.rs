//! UTXO Ledger
//!
//! Owns the spent/unspent state of every output created for the three
//! tracked wallets.
//!
//! # Spend Flow
//!
//! ```text
//! SelectionRequest ─→ select_inputs (read-only) ─→ Selection
//!                                                      ↓
//!                              spend(ids, at_height) (all-or-nothing)
//! ```
//!
//! `select_and_spend` runs both steps as one decision; it is the only path
//! stages use to consume funds.
//!
//! # Critical Invariants
//!
//! - **Conservation**: `total_unspent + total_spent == total_credited`,
//!   checked after every mutation
//! - **Single spend**: a UTXO flips to spent exactly once
//! - **Causality**: a UTXO is only spent at a height strictly above its
//!   creation height
//! - **Atomicity**: a failed `spend` leaves the ledger untouched

pub mod registry;
pub mod selection;

pub use registry::WalletRegistry;
pub use selection::{CoinSelector, ExactSet, LargestFirst, OldestFirst, SelectionStrategy};

use crate::models::transaction::TxInput;
use crate::models::utxo::{OutPoint, Utxo, UtxoId};
use crate::models::wallet::WalletLabel;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Errors raised by ledger operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds in {wallet}: required {required} sats, available {available} sats")]
    InsufficientFunds {
        wallet: WalletLabel,
        required: i64,
        available: i64,
    },

    #[error("{utxo} ({outpoint}) already spent at height {spent_at}")]
    AlreadySpent {
        utxo: UtxoId,
        outpoint: OutPoint,
        spent_at: u64,
    },

    #[error("unknown {0}")]
    UnknownUtxo(UtxoId),

    #[error("{utxo} created at height {created_height} cannot be spent at height {at_height}")]
    SpentBeforeCreation {
        utxo: UtxoId,
        created_height: u64,
        at_height: u64,
    },

    #[error("credit of {0} sats rejected: value must be positive")]
    NonPositiveCredit(i64),

    #[error("outpoint {0} already exists")]
    DuplicateOutPoint(OutPoint),

    #[error("conservation violated: credited {credited}, spent {spent}, unspent {unspent}")]
    ConservationViolated {
        credited: i64,
        spent: i64,
        unspent: i64,
    },
}

/// Half-open range of creation heights `[from, before)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRange {
    pub from: u64,
    pub before: u64,
}

impl HeightRange {
    /// Everything created strictly before `height`
    pub fn before(height: u64) -> Self {
        Self {
            from: 0,
            before: height,
        }
    }

    pub fn between(from: u64, before: u64) -> Self {
        Self { from, before }
    }

    pub fn contains(&self, height: u64) -> bool {
        height >= self.from && height < self.before
    }
}

/// What to fund and from where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRequest {
    pub wallet: WalletLabel,
    pub target_sats: i64,
    pub strategy: SelectionStrategy,
    pub eligible: HeightRange,
}

/// Chosen inputs and their total value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub ids: Vec<UtxoId>,
    pub total_sats: i64,
}

impl Selection {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Ledger of UTXOs across the tracked wallets
#[derive(Debug, Clone, Default)]
pub struct UtxoLedger {
    /// Every UTXO ever created, indexed by `UtxoId`
    utxos: Vec<Utxo>,

    /// Unspent ids per wallet (indexed by `WalletLabel::index`)
    unspent: [BTreeSet<UtxoId>; 3],

    /// Unspent value per wallet
    balances: [i64; 3],

    outpoints: HashMap<OutPoint, UtxoId>,

    total_credited: i64,
    total_spent: i64,
}

impl UtxoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Register a new unspent output
    pub fn credit(
        &mut self,
        wallet: WalletLabel,
        value_sats: i64,
        outpoint: OutPoint,
        address: String,
        created_at: NaiveDateTime,
        created_height: u64,
    ) -> Result<UtxoId, LedgerError> {
        if value_sats <= 0 {
            return Err(LedgerError::NonPositiveCredit(value_sats));
        }
        if self.outpoints.contains_key(&outpoint) {
            return Err(LedgerError::DuplicateOutPoint(outpoint));
        }

        let id = UtxoId(self.utxos.len());
        self.outpoints.insert(outpoint.clone(), id);
        self.utxos.push(Utxo::new(
            id,
            wallet,
            value_sats,
            outpoint,
            address,
            created_at,
            created_height,
        ));
        self.unspent[wallet.index()].insert(id);
        self.balances[wallet.index()] += value_sats;
        self.total_credited += value_sats;

        self.check_conservation()?;
        Ok(id)
    }

    /// Mark `ids` spent by a transaction at `at_height`; returns their total value
    ///
    /// Every id is validated before any state changes.
    pub fn spend(&mut self, ids: &[UtxoId], at_height: u64) -> Result<i64, LedgerError> {
        let mut seen = HashSet::with_capacity(ids.len());
        for &id in ids {
            let utxo = self.utxos.get(id.0).ok_or(LedgerError::UnknownUtxo(id))?;
            if let Some(spent_at) = utxo.spent_at() {
                return Err(LedgerError::AlreadySpent {
                    utxo: id,
                    outpoint: utxo.outpoint().clone(),
                    spent_at,
                });
            }
            if !seen.insert(id) {
                return Err(LedgerError::AlreadySpent {
                    utxo: id,
                    outpoint: utxo.outpoint().clone(),
                    spent_at: at_height,
                });
            }
            if at_height <= utxo.created_height() {
                return Err(LedgerError::SpentBeforeCreation {
                    utxo: id,
                    created_height: utxo.created_height(),
                    at_height,
                });
            }
        }

        let mut total = 0i64;
        for &id in ids {
            let utxo = &mut self.utxos[id.0];
            utxo.mark_spent(at_height);
            let wallet = utxo.wallet().index();
            let value = utxo.value_sats();
            self.unspent[wallet].remove(&id);
            self.balances[wallet] -= value;
            self.total_spent += value;
            total += value;
        }

        self.check_conservation()?;
        Ok(total)
    }

    /// Select then spend as one decision
    pub fn select_and_spend(
        &mut self,
        request: &SelectionRequest,
        at_height: u64,
    ) -> Result<Selection, LedgerError> {
        let selection = self.select_inputs(request)?;
        self.spend(&selection.ids, at_height)?;
        Ok(selection)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Choose inputs without touching state
    pub fn select_inputs(&self, request: &SelectionRequest) -> Result<Selection, LedgerError> {
        let candidates: Vec<&Utxo> = self
            .unspent(request.wallet)
            .filter(|u| request.eligible.contains(u.created_height()))
            .collect();
        let available: i64 = candidates.iter().map(|u| u.value_sats()).sum();
        if available < request.target_sats {
            return Err(LedgerError::InsufficientFunds {
                wallet: request.wallet,
                required: request.target_sats,
                available,
            });
        }

        let ids = request
            .strategy
            .selector()
            .select(&candidates, request.target_sats);
        let total_sats = ids.iter().map(|id| self.utxos[id.0].value_sats()).sum();
        Ok(Selection { ids, total_sats })
    }

    /// Unspent outputs of `wallet` in creation order
    pub fn unspent(&self, wallet: WalletLabel) -> impl Iterator<Item = &Utxo> + '_ {
        self.unspent[wallet.index()]
            .iter()
            .map(move |id| &self.utxos[id.0])
    }

    pub fn unspent_count(&self, wallet: WalletLabel) -> usize {
        self.unspent[wallet.index()].len()
    }

    pub fn balance(&self, wallet: WalletLabel) -> i64 {
        self.balances[wallet.index()]
    }

    pub fn utxo(&self, id: UtxoId) -> Option<&Utxo> {
        self.utxos.get(id.0)
    }

    pub fn find(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.outpoints.get(outpoint).map(|id| &self.utxos[id.0])
    }

    /// Transaction inputs describing the given UTXOs
    pub fn inputs_for(&self, ids: &[UtxoId]) -> Result<Vec<TxInput>, LedgerError> {
        ids.iter()
            .map(|&id| {
                let utxo = self.utxo(id).ok_or(LedgerError::UnknownUtxo(id))?;
                Ok(TxInput {
                    txid: utxo.outpoint().txid.clone(),
                    vout: utxo.outpoint().vout,
                    wallet: utxo.wallet(),
                    value_sats: utxo.value_sats(),
                    created_height: utxo.created_height(),
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn total_credited(&self) -> i64 {
        self.total_credited
    }

    pub fn total_spent(&self) -> i64 {
        self.total_spent
    }

    pub fn total_unspent(&self) -> i64 {
        self.balances.iter().sum()
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    fn check_conservation(&self) -> Result<(), LedgerError> {
        let unspent = self.total_unspent();
        if unspent + self.total_spent != self.total_credited {
            return Err(LedgerError::ConservationViolated {
                credited: self.total_credited,
                spent: self.total_spent,
                unspent,
            });
        }
        Ok(())
    }

    /// Recompute every counter from the UTXO set and compare
    pub fn audit(&self) -> Result<(), LedgerError> {
        let mut credited = 0i64;
        let mut spent = 0i64;
        let mut balances = [0i64; 3];
        let mut unspent: [BTreeSet<UtxoId>; 3] = Default::default();

        for utxo in &self.utxos {
            credited += utxo.value_sats();
            match utxo.spent_at() {
                Some(spent_at) => {
                    if spent_at <= utxo.created_height() {
                        return Err(LedgerError::SpentBeforeCreation {
                            utxo: utxo.id(),
                            created_height: utxo.created_height(),
                            at_height: spent_at,
                        });
                    }
                    spent += utxo.value_sats();
                }
                None => {
                    balances[utxo.wallet().index()] += utxo.value_sats();
                    unspent[utxo.wallet().index()].insert(utxo.id());
                }
            }
        }

        let unspent_total: i64 = balances.iter().sum();
        if credited != self.total_credited
            || spent != self.total_spent
            || balances != self.balances
            || unspent != self.unspent
            || unspent_total + spent != credited
        {
            return Err(LedgerError::ConservationViolated {
                credited,
                spent,
                unspent: unspent_total,
            });
        }
        Ok(())
    }
}
