//! Transaction Generator Core - Rust Engine
//!
//! Synthesizes a self-consistent multi-wallet UTXO ledger with deterministic
//! execution, for testing accounting reconciliation.
//!
//! # Architecture
//!
//! - **core**: Calendar, block heights and event scheduling
//! - **rates**: Daily BTC/USD exchange rate table
//! - **models**: Domain types (Wallet, Utxo, Transaction)
//! - **ledger**: UTXO ledger, coin selection, wallet registry
//! - **synthesis**: Stage pipeline, summary and output verification
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All BTC values are i64 satoshis, all USD values i64 cents
//! 2. All randomness is deterministic (seeded RNG)
//! 3. Every input references a real, unspent, earlier-created output
//! 4. FFI boundary is minimal and safe

// Module declarations
pub mod core;
pub mod ledger;
pub mod models;
pub mod rates;
pub mod rng;
pub mod synthesis;

// Re-exports for convenience
pub use crate::core::calendar::{Calendar, CalendarConfig, ScheduleError, Slot, SpacingPolicy};
pub use ledger::{
    HeightRange, LedgerError, Selection, SelectionRequest, SelectionStrategy, UtxoLedger,
    WalletRegistry,
};
pub use models::{
    transaction::{Transaction, TransactionError, TxCategory},
    utxo::{OutPoint, Utxo, UtxoId},
    wallet::{Wallet, WalletLabel},
};
pub use rates::{ExchangeRateEntry, ExchangeRateTable, RateError, SATS_PER_BTC};
pub use rng::RngManager;
pub use synthesis::{
    SummaryStats, SynthConfig, SynthesisError, SynthesisOutput, Synthesizer, VerificationError,
};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn txgen_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::synthesizer::PySynthesizer>()?;
    Ok(())
}
