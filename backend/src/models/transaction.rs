//! Transaction model
//!
//! A synthesized transaction has:
//! - Category (invoice, consolidation, transfer, vendor payment, special)
//! - Slot (timestamp, date, block height)
//! - Inputs consuming tracked UTXOs (empty for receipts)
//! - Outputs to tracked wallets or external, untracked addresses
//! - USD valuation at the day's exchange rate
//!
//! Transactions are assembled as a `TransactionDraft` and sealed into an
//! immutable `Transaction`; sealing validates the value balance and derives
//! the txid.
//!
//! CRITICAL: All BTC values are i64 satoshis, all USD values i64 cents

use crate::core::calendar::Slot;
use crate::models::utxo::OutPoint;
use crate::models::wallet::WalletLabel;
use crate::rates::sats_to_usd_cents;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// What a transaction represents in the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxCategory {
    /// Customer payment into Invoicing
    Invoice,
    /// Invoicing sweep into Treasury
    Consolidation,
    /// Treasury float into Checking
    Transfer,
    /// Checking payment to a vendor
    VendorPayment,
    /// Large external deposit into / withdrawal from Treasury
    Special,
}

impl TxCategory {
    pub const ALL: [TxCategory; 5] = [
        TxCategory::Invoice,
        TxCategory::Consolidation,
        TxCategory::Transfer,
        TxCategory::VendorPayment,
        TxCategory::Special,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TxCategory::Invoice => "invoice",
            TxCategory::Consolidation => "consolidation",
            TxCategory::Transfer => "transfer",
            TxCategory::VendorPayment => "vendor_payment",
            TxCategory::Special => "special",
        }
    }

    /// Export batch the category is written to
    pub fn batch(&self) -> ExportBatch {
        match self {
            TxCategory::Invoice => ExportBatch::Invoice,
            TxCategory::Consolidation => ExportBatch::Consolidation,
            TxCategory::Transfer | TxCategory::VendorPayment => ExportBatch::Checking,
            TxCategory::Special => ExportBatch::Special,
        }
    }
}

/// Per-category output files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportBatch {
    Invoice,
    Consolidation,
    Checking,
    Special,
}

impl ExportBatch {
    pub const ALL: [ExportBatch; 4] = [
        ExportBatch::Invoice,
        ExportBatch::Consolidation,
        ExportBatch::Checking,
        ExportBatch::Special,
    ];

    pub fn file_stem(&self) -> &'static str {
        match self {
            ExportBatch::Invoice => "invoice_transactions",
            ExportBatch::Consolidation => "consolidation_transactions",
            ExportBatch::Checking => "checking_transactions",
            ExportBatch::Special => "special_treasury_transactions",
        }
    }
}

/// Where the value of a transaction came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxOrigin {
    /// Spends tracked UTXOs
    Spend,
    /// Customer payment; the payer's coins are not tracked
    Invoice { payer: String },
    /// Deposit from an untracked external source
    ExternalDeposit { source: String },
}

impl TxOrigin {
    pub fn is_spend(&self) -> bool {
        matches!(self, TxOrigin::Spend)
    }
}

/// A consumed UTXO
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
    pub wallet: WalletLabel,
    pub value_sats: i64,
    pub created_height: u64,
}

impl TxInput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid.clone(), self.vout)
    }
}

/// A created output; `wallet: None` means an external, untracked address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub vout: u32,
    pub wallet: Option<WalletLabel>,
    pub address: String,
    pub value_sats: i64,
}

/// Errors raised while sealing a draft
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction has no outputs")]
    NoOutputs,

    #[error("output {vout} has non-positive value {value}")]
    NonPositiveOutput { vout: u32, value: i64 },

    #[error("outputs total {outputs} sats exceeds inputs total {inputs} sats")]
    OutputsExceedInputs { inputs: i64, outputs: i64 },

    #[error("receipt transactions cannot have inputs")]
    ReceiptWithInputs,

    #[error("spending transaction has no inputs")]
    SpendWithoutInputs,

    #[error("exchange rate must be positive, got {0}")]
    InvalidRate(i64),

    #[error("value of {value_sats} sats at {rate_cents} cents/BTC overflows i64 cents")]
    UsdOverflow { value_sats: i64, rate_cents: i64 },
}

/// Mutable assembly area for a transaction
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use txgen_core_rs::core::calendar::Slot;
/// use txgen_core_rs::models::transaction::{TransactionDraft, TxCategory, TxOrigin};
/// use txgen_core_rs::models::wallet::WalletLabel;
///
/// let timestamp = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
/// let slot = Slot { timestamp, date: timestamp.date(), block_height: 8_740 };
///
/// let tx = TransactionDraft::new(TxCategory::Invoice, slot, 6_000_000)
///     .with_origin(TxOrigin::Invoice { payer: "bcrt1qpayer".to_string() })
///     .pay_to(Some(WalletLabel::Invoicing), "bcrt1qinvoice".to_string(), 2_000_000)
///     .flow(None, Some(WalletLabel::Invoicing))
///     .quoted_usd(120_000)
///     .seal(0)
///     .unwrap();
///
/// assert_eq!(tx.value_usd_cents(), 120_000); // 0.02 BTC at $60,000
/// assert_eq!(tx.txid().len(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    category: TxCategory,
    slot: Slot,
    rate_cents: i64,
    origin: TxOrigin,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    wallet_from: Option<WalletLabel>,
    wallet_to: Option<WalletLabel>,
    principal_vout: u32,
    quoted_usd_cents: Option<i64>,
}

impl TransactionDraft {
    pub fn new(category: TxCategory, slot: Slot, rate_cents: i64) -> Self {
        Self {
            category,
            slot,
            rate_cents,
            origin: TxOrigin::Spend,
            inputs: Vec::new(),
            outputs: Vec::new(),
            wallet_from: None,
            wallet_to: None,
            principal_vout: 0,
            quoted_usd_cents: None,
        }
    }

    pub fn with_origin(mut self, origin: TxOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<TxInput>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Append an output; vouts are assigned in call order
    pub fn pay_to(mut self, wallet: Option<WalletLabel>, address: String, value_sats: i64) -> Self {
        let vout = self.outputs.len() as u32;
        self.outputs.push(TxOutput {
            vout,
            wallet,
            address,
            value_sats,
        });
        self
    }

    pub fn flow(mut self, from: Option<WalletLabel>, to: Option<WalletLabel>) -> Self {
        self.wallet_from = from;
        self.wallet_to = to;
        self
    }

    /// Output carrying the economically meaningful amount (default vout 0)
    pub fn principal_vout(mut self, vout: u32) -> Self {
        self.principal_vout = vout;
        self
    }

    pub fn quoted_usd(mut self, usd_cents: i64) -> Self {
        self.quoted_usd_cents = Some(usd_cents);
        self
    }

    /// Validate and freeze; `sequence` makes otherwise identical drafts distinct
    pub fn seal(self, sequence: u64) -> Result<Transaction, TransactionError> {
        if self.rate_cents <= 0 {
            return Err(TransactionError::InvalidRate(self.rate_cents));
        }
        if self.outputs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }
        if let Some(bad) = self.outputs.iter().find(|o| o.value_sats <= 0) {
            return Err(TransactionError::NonPositiveOutput {
                vout: bad.vout,
                value: bad.value_sats,
            });
        }

        let outputs_total: i64 = self.outputs.iter().map(|o| o.value_sats).sum();
        let fee_sats = if self.origin.is_spend() {
            if self.inputs.is_empty() {
                return Err(TransactionError::SpendWithoutInputs);
            }
            let inputs_total: i64 = self.inputs.iter().map(|i| i.value_sats).sum();
            if outputs_total > inputs_total {
                return Err(TransactionError::OutputsExceedInputs {
                    inputs: inputs_total,
                    outputs: outputs_total,
                });
            }
            inputs_total - outputs_total
        } else {
            if !self.inputs.is_empty() {
                return Err(TransactionError::ReceiptWithInputs);
            }
            0
        };

        let value_sats = self
            .outputs
            .get(self.principal_vout as usize)
            .map(|o| o.value_sats)
            .ok_or(TransactionError::NoOutputs)?;

        let value_usd_cents = sats_to_usd_cents(value_sats, self.rate_cents).map_err(|_| {
            TransactionError::UsdOverflow {
                value_sats,
                rate_cents: self.rate_cents,
            }
        })?;

        let txid = compute_txid(&self, sequence);

        Ok(Transaction {
            txid,
            category: self.category,
            timestamp: self.slot.timestamp,
            date: self.slot.date,
            block_height: self.slot.block_height,
            origin: self.origin,
            inputs: self.inputs,
            outputs: self.outputs,
            wallet_from: self.wallet_from,
            wallet_to: self.wallet_to,
            value_sats,
            fee_sats,
            rate_cents: self.rate_cents,
            value_usd_cents,
            quoted_usd_cents: self.quoted_usd_cents,
        })
    }
}

/// SHA-256 over the canonical content of the draft
fn compute_txid(draft: &TransactionDraft, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(draft.category.as_str().as_bytes());
    hasher.update(draft.slot.block_height.to_le_bytes());
    hasher.update(draft.slot.timestamp.and_utc().timestamp().to_le_bytes());
    match &draft.origin {
        TxOrigin::Spend => hasher.update(b"spend"),
        TxOrigin::Invoice { payer } => hasher.update(payer.as_bytes()),
        TxOrigin::ExternalDeposit { source } => hasher.update(source.as_bytes()),
    }
    for input in &draft.inputs {
        hasher.update(input.txid.as_bytes());
        hasher.update(input.vout.to_le_bytes());
    }
    for output in &draft.outputs {
        hasher.update(output.address.as_bytes());
        hasher.update(output.value_sats.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// A sealed, immutable synthesized transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    txid: String,
    category: TxCategory,
    timestamp: NaiveDateTime,
    date: NaiveDate,
    block_height: u64,
    origin: TxOrigin,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    wallet_from: Option<WalletLabel>,
    wallet_to: Option<WalletLabel>,

    /// Principal moved (receipt credit or destination output)
    value_sats: i64,

    /// inputs − outputs; zero for receipts
    fee_sats: i64,

    /// BTC/USD on `date`, cents per BTC
    rate_cents: i64,

    /// `value_sats` valued at `rate_cents`
    value_usd_cents: i64,

    /// USD amount the scenario drew, when the transaction is fiat-denominated
    quoted_usd_cents: Option<i64>,
}

impl Transaction {
    pub fn txid(&self) -> &str {
        &self.txid
    }

    pub fn category(&self) -> TxCategory {
        self.category
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    pub fn origin(&self) -> &TxOrigin {
        &self.origin
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn wallet_from(&self) -> Option<WalletLabel> {
        self.wallet_from
    }

    pub fn wallet_to(&self) -> Option<WalletLabel> {
        self.wallet_to
    }

    pub fn value_sats(&self) -> i64 {
        self.value_sats
    }

    pub fn fee_sats(&self) -> i64 {
        self.fee_sats
    }

    pub fn rate_cents(&self) -> i64 {
        self.rate_cents
    }

    pub fn value_usd_cents(&self) -> i64 {
        self.value_usd_cents
    }

    pub fn quoted_usd_cents(&self) -> Option<i64> {
        self.quoted_usd_cents
    }

    /// No inputs: invoice or external deposit
    pub fn is_receipt(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn input_total(&self) -> i64 {
        self.inputs.iter().map(|i| i.value_sats).sum()
    }

    pub fn output_total(&self) -> i64 {
        self.outputs.iter().map(|o| o.value_sats).sum()
    }

    /// Sum of outputs landing in `wallet`
    pub fn value_to(&self, wallet: WalletLabel) -> i64 {
        self.outputs
            .iter()
            .filter(|o| o.wallet == Some(wallet))
            .map(|o| o.value_sats)
            .sum()
    }

    /// Sort key of the canonical chronological order
    pub fn chrono_key(&self) -> (NaiveDate, u64) {
        (self.date, self.block_height)
    }
}
