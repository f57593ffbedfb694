//! Provisioned accounts.

use std::fmt;
use std::sync::Arc;

use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};

use crate::config::Operator;
use crate::ledger::{AccountId, EvmAddress};

/// A ledger account whose key the client holds.
#[derive(Clone)]
pub struct Account {
    pub id: AccountId,
    pub key: Arc<Keypair>,
    /// Long-zero form of `id`.
    pub address: EvmAddress,
    /// Address derived from the public key.
    pub alias: EvmAddress,
}

impl Account {
    pub fn new(id: AccountId, key: Arc<Keypair>) -> Self {
        let alias = EvmAddress::alias_for(&key.pubkey());
        Self {
            id,
            address: id.to_evm_address(),
            alias,
            key,
        }
    }

    pub fn public_key(&self) -> Pubkey {
        self.key.pubkey()
    }
}

impl From<&Operator> for Account {
    fn from(operator: &Operator) -> Self {
        Account::new(operator.account_id, Arc::clone(&operator.key))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &format_args!("{}", self.id))
            .field("address", &self.address)
            .field("alias", &self.alias)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_derived_from_id_and_key() {
        let key = Arc::new(Keypair::new());
        let account = Account::new(AccountId::new(0, 0, 1001), key.clone());

        assert_eq!(account.address, AccountId::new(0, 0, 1001).to_evm_address());
        assert_eq!(account.alias, EvmAddress::alias_for(&key.pubkey()));
        assert_ne!(account.address, account.alias);
    }

    #[test]
    fn test_debug_hides_key_material() {
        let account = Account::new(AccountId::new(0, 0, 5), Arc::new(Keypair::new()));
        let rendered = format!("{:?}", account);
        assert!(rendered.contains("0.0.5"));
        assert!(!rendered.contains("key"));
    }
}
