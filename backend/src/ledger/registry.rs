//! Wallet registry
//!
//! Holds the three wallets and the shared ledger of their UTXO pools.
//! Created once at startup; wallets are never added or removed during a run.

use crate::ledger::UtxoLedger;
use crate::models::wallet::{AddressSource, HashedIdentity, Wallet, WalletLabel};

#[derive(Debug)]
pub struct WalletRegistry {
    /// Indexed by `WalletLabel::index`
    wallets: [Wallet; 3],
    ledger: UtxoLedger,
}

impl WalletRegistry {
    /// Registry with seed-derived hashed identities
    pub fn from_seed(seed: u64, address_pool: u32) -> Self {
        Self::from_identities(
            [
                Box::new(HashedIdentity::derive(seed, WalletLabel::Invoicing)),
                Box::new(HashedIdentity::derive(seed, WalletLabel::Treasury)),
                Box::new(HashedIdentity::derive(seed, WalletLabel::Checking)),
            ],
            address_pool,
        )
    }

    /// Registry with caller-supplied identities, in `WalletLabel::ALL` order
    pub fn from_identities(identities: [Box<dyn AddressSource>; 3], address_pool: u32) -> Self {
        let [invoicing, treasury, checking] = identities;
        Self {
            wallets: [
                Wallet::new(WalletLabel::Invoicing, invoicing, address_pool),
                Wallet::new(WalletLabel::Treasury, treasury, address_pool),
                Wallet::new(WalletLabel::Checking, checking, address_pool),
            ],
            ledger: UtxoLedger::new(),
        }
    }

    pub fn wallet(&self, label: WalletLabel) -> &Wallet {
        &self.wallets[label.index()]
    }

    pub fn wallet_mut(&mut self, label: WalletLabel) -> &mut Wallet {
        &mut self.wallets[label.index()]
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.iter()
    }

    pub fn ledger(&self) -> &UtxoLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut UtxoLedger {
        &mut self.ledger
    }

    pub fn balance(&self, label: WalletLabel) -> i64 {
        self.ledger.balance(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallets_are_in_label_order() {
        let registry = WalletRegistry::from_seed(42, 100);
        let labels: Vec<_> = registry.wallets().map(|w| w.label()).collect();
        assert_eq!(labels, WalletLabel::ALL.to_vec());
    }

    #[test]
    fn test_same_seed_same_roots() {
        let a = WalletRegistry::from_seed(42, 100);
        let b = WalletRegistry::from_seed(42, 100);
        for label in WalletLabel::ALL {
            assert_eq!(
                a.wallet(label).derivation_root(),
                b.wallet(label).derivation_root()
            );
        }
    }
}
