//! Domain models for the ledger synthesizer

pub mod transaction;
pub mod utxo;
pub mod wallet;

// Re-exports
pub use transaction::{
    ExportBatch, Transaction, TransactionDraft, TransactionError, TxCategory, TxInput, TxOrigin,
    TxOutput,
};
pub use utxo::{OutPoint, Utxo, UtxoId};
pub use wallet::{external_address, AddressSource, HashedIdentity, Wallet, WalletLabel};
