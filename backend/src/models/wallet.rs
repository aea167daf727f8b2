//! Wallet identities
//!
//! Key derivation is not modelled. A wallet only needs a stable, opaque
//! derivation root and a way to turn an index into an address string; the
//! `AddressSource` trait is that seam. The default `HashedIdentity` hashes
//! the root with SHA-256 so addresses are deterministic per seed and look
//! like regtest bech32 strings.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// Prefix shared by every synthetic address (regtest P2WPKH look-alike)
pub const ADDRESS_PREFIX: &str = "bcrt1q";

const ADDRESS_BODY_LEN: usize = 38;

/// The three wallets of the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletLabel {
    /// Receives customer invoice payments (wallet A)
    Invoicing,
    /// Holds consolidated funds (wallet B)
    Treasury,
    /// Pays vendors from a float drawn from treasury (wallet C)
    Checking,
}

impl WalletLabel {
    pub const ALL: [WalletLabel; 3] = [
        WalletLabel::Invoicing,
        WalletLabel::Treasury,
        WalletLabel::Checking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletLabel::Invoicing => "invoicing",
            WalletLabel::Treasury => "treasury",
            WalletLabel::Checking => "checking",
        }
    }

    /// Short code used by downstream reconciliation fixtures
    pub fn code(&self) -> char {
        match self {
            WalletLabel::Invoicing => 'A',
            WalletLabel::Treasury => 'B',
            WalletLabel::Checking => 'C',
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            WalletLabel::Invoicing => 0,
            WalletLabel::Treasury => 1,
            WalletLabel::Checking => 2,
        }
    }
}

impl fmt::Display for WalletLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque wallet identity producing address strings
pub trait AddressSource: fmt::Debug + Send {
    /// Reference to the key material the addresses derive from
    fn derivation_root(&self) -> &str;

    /// Address at a derivation index
    fn address(&self, index: u32) -> String;
}

/// SHA-256 based identity; no real key cryptography
///
/// # Example
/// ```
/// use txgen_core_rs::models::wallet::{AddressSource, HashedIdentity, WalletLabel};
///
/// let a = HashedIdentity::derive(42, WalletLabel::Invoicing);
/// let b = HashedIdentity::derive(42, WalletLabel::Invoicing);
/// assert_eq!(a.address(7), b.address(7));
/// assert_ne!(a.address(7), a.address(8));
/// assert!(a.address(0).starts_with("bcrt1q"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedIdentity {
    root: String,
}

impl HashedIdentity {
    /// Derive a root from the run seed and the wallet label
    pub fn derive(seed: u64, label: WalletLabel) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"txgen/wallet-root");
        hasher.update(seed.to_le_bytes());
        hasher.update(label.as_str().as_bytes());
        Self {
            root: format!("{:x}", hasher.finalize()),
        }
    }

    pub fn from_root(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl AddressSource for HashedIdentity {
    fn derivation_root(&self) -> &str {
        &self.root
    }

    fn address(&self, index: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.root.as_bytes());
        hasher.update(index.to_be_bytes());
        encode_address(&format!("{:x}", hasher.finalize()))
    }
}

/// Address of a party outside the three wallets (payer, vendor, counterparty)
///
/// Deterministic in `(namespace, index)` so exports are stable across runs.
pub fn external_address(namespace: &str, index: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"txgen/external");
    hasher.update(namespace.as_bytes());
    hasher.update(index.to_be_bytes());
    encode_address(&format!("{:x}", hasher.finalize()))
}

fn encode_address(hex_digest: &str) -> String {
    format!("{}{}", ADDRESS_PREFIX, &hex_digest[..ADDRESS_BODY_LEN])
}

/// A wallet: label, identity and receive-address bookkeeping
///
/// Its UTXO pool lives in the ledger (see `ledger::UtxoLedger`); the wallet
/// only decides which addresses receive funds.
#[derive(Debug)]
pub struct Wallet {
    label: WalletLabel,
    identity: Box<dyn AddressSource>,

    /// Size of the rotating address pool used by `pooled_address`
    address_pool: u32,

    /// Next never-used derivation index for `fresh_address`
    next_index: u32,

    /// Every index handed out so far
    used: BTreeSet<u32>,
}

impl Wallet {
    /// Create a wallet
    ///
    /// # Panics
    /// Panics if `address_pool` is zero
    pub fn new(label: WalletLabel, identity: Box<dyn AddressSource>, address_pool: u32) -> Self {
        assert!(address_pool > 0, "address_pool must be positive");
        Self {
            label,
            identity,
            address_pool,
            next_index: 0,
            used: BTreeSet::new(),
        }
    }

    pub fn label(&self) -> WalletLabel {
        self.label
    }

    pub fn derivation_root(&self) -> &str {
        self.identity.derivation_root()
    }

    /// First receive address (index 0), used as the wallet's public handle
    pub fn receive_address(&self) -> String {
        self.identity.address(0)
    }

    /// Address at a never-used index (one per invoice)
    pub fn fresh_address(&mut self) -> String {
        while self.used.contains(&self.next_index) {
            self.next_index += 1;
        }
        let index = self.next_index;
        self.next_index += 1;
        self.used.insert(index);
        self.identity.address(index)
    }

    /// Address drawn from the rotating pool `[0, address_pool)`
    pub fn pooled_address(&mut self, index: u32) -> String {
        let index = index % self.address_pool;
        self.used.insert(index);
        self.identity.address(index)
    }

    pub fn address_pool(&self) -> u32 {
        self.address_pool
    }

    /// Number of distinct addresses handed out
    pub fn addresses_used(&self) -> usize {
        self.used.len()
    }

    /// Every address the wallet can receive at: the pool plus any index
    /// handed out beyond it, in derivation order
    pub fn known_addresses(&self) -> Vec<String> {
        let beyond_pool = self.used.range(self.address_pool..).copied();
        (0..self.address_pool)
            .chain(beyond_pool)
            .map(|index| self.identity.address(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_differ_per_label_and_seed() {
        let a = HashedIdentity::derive(1, WalletLabel::Treasury);
        let b = HashedIdentity::derive(1, WalletLabel::Checking);
        let c = HashedIdentity::derive(2, WalletLabel::Treasury);
        assert_ne!(a.derivation_root(), b.derivation_root());
        assert_ne!(a.derivation_root(), c.derivation_root());
    }

    #[test]
    fn test_fresh_addresses_never_repeat() {
        let mut wallet = Wallet::new(
            WalletLabel::Invoicing,
            Box::new(HashedIdentity::derive(9, WalletLabel::Invoicing)),
            10,
        );
        let pooled = wallet.pooled_address(0);
        let first = wallet.fresh_address();
        let second = wallet.fresh_address();
        assert_ne!(pooled, first);
        assert_ne!(first, second);
        assert_eq!(wallet.addresses_used(), 3);
    }

    #[test]
    fn test_pooled_address_wraps() {
        let mut wallet = Wallet::new(
            WalletLabel::Treasury,
            Box::new(HashedIdentity::derive(9, WalletLabel::Treasury)),
            4,
        );
        assert_eq!(wallet.pooled_address(1), wallet.pooled_address(5));
        assert_eq!(wallet.addresses_used(), 1);
    }

    #[test]
    fn test_known_addresses_cover_pool_and_fresh_indices() {
        let mut wallet = Wallet::new(
            WalletLabel::Invoicing,
            Box::new(HashedIdentity::derive(9, WalletLabel::Invoicing)),
            3,
        );
        assert_eq!(wallet.known_addresses().len(), 3);

        let handed_out: Vec<String> = (0..5).map(|_| wallet.fresh_address()).collect();
        let known = wallet.known_addresses();
        assert_eq!(known.len(), 5);
        assert_eq!(known, handed_out);
    }

    #[test]
    fn test_external_addresses_are_namespaced() {
        assert_ne!(external_address("vendor", 0), external_address("payer", 0));
        assert_eq!(external_address("vendor", 3).len(), ADDRESS_PREFIX.len() + 38);
    }
}
