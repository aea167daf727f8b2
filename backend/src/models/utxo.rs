//! Unspent transaction outputs
//!
//! A UTXO is created once (when its transaction commits outputs) and spent
//! at most once. Only `ledger::UtxoLedger::spend` flips the spent marker.
//!
//! CRITICAL: All values are i64 satoshis

use crate::models::wallet::WalletLabel;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense ledger-local identifier (creation order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtxoId(pub usize);

impl fmt::Display for UtxoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utxo#{}", self.0)
    }
}

/// Reference to a transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, vout: u32) -> Self {
        Self {
            txid: txid.into(),
            vout,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// An output owned by one of the tracked wallets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    id: UtxoId,
    wallet: WalletLabel,
    value_sats: i64,
    outpoint: OutPoint,
    address: String,
    created_at: NaiveDateTime,
    created_height: u64,

    /// Height of the spending transaction, once spent
    spent_at: Option<u64>,
}

impl Utxo {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: UtxoId,
        wallet: WalletLabel,
        value_sats: i64,
        outpoint: OutPoint,
        address: String,
        created_at: NaiveDateTime,
        created_height: u64,
    ) -> Self {
        Self {
            id,
            wallet,
            value_sats,
            outpoint,
            address,
            created_at,
            created_height,
            spent_at: None,
        }
    }

    pub fn id(&self) -> UtxoId {
        self.id
    }

    pub fn wallet(&self) -> WalletLabel {
        self.wallet
    }

    pub fn value_sats(&self) -> i64 {
        self.value_sats
    }

    pub fn outpoint(&self) -> &OutPoint {
        &self.outpoint
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn created_height(&self) -> u64 {
        self.created_height
    }

    pub fn spent_at(&self) -> Option<u64> {
        self.spent_at
    }

    pub fn is_spent(&self) -> bool {
        self.spent_at.is_some()
    }

    pub(crate) fn mark_spent(&mut self, height: u64) {
        self.spent_at = Some(height);
    }
}
