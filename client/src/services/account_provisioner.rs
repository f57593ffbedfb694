//! # Account Provisioner Service
//!
//! Creates funded accounts and associates them with assets.
//!
//! ## Provisioning
//!
//! ```text
//! 1. Generate keypair
//!        ↓
//! 2. CreateAccount funded by the operator   (receipt confirmed)
//!        ↓
//! 3. Operator → alias transfer              (receipt confirmed)
//!        ↓
//! 4. Account usable by later steps
//! ```
//!
//! The alias transfer makes the key-derived address known to contract
//! calls, which address accounts by alias rather than by id.

use std::sync::Arc;

use futures::future::try_join_all;
use solana_sdk::{signature::Keypair, signer::Signer};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::ledger::{AccountRef, CompositeTransfer, CurrencyLeg, Operation, TransactionReceipt};
use crate::models::{Account, Asset};
use crate::services::TransactionLifecycleManager;

#[derive(Clone)]
pub struct AccountProvisioner {
    lifecycle: TransactionLifecycleManager,
    alias_funding: u64,
}

impl AccountProvisioner {
    pub fn new(lifecycle: TransactionLifecycleManager, config: &AppConfig) -> Self {
        Self {
            lifecycle,
            alias_funding: config.alias_funding,
        }
    }

    /// The configured operator as an account value.
    pub fn operator_account(&self) -> Account {
        Account::from(self.lifecycle.operator())
    }

    /// Create an account holding `initial_balance` minor units, then fund its alias.
    pub async fn create_account(&self, initial_balance: u64) -> Result<Account> {
        let key = Keypair::new();
        let receipt = self
            .lifecycle
            .execute(
                Operation::CreateAccount {
                    public_key: key.pubkey(),
                    initial_balance,
                },
                &[],
            )
            .await?;

        let id = receipt.account_id.ok_or(Error::MissingReceiptField {
            transaction_id: receipt.transaction_id,
            field: "account_id",
        })?;
        let account = Account::new(id, Arc::new(key));
        debug!("Created account {} ({})", account.id, account.address);

        self.fund_alias(&account).await?;

        info!("Provisioned account {} with balance {}", account.id, initial_balance);
        Ok(account)
    }

    /// Provision unrelated accounts concurrently.
    pub async fn create_accounts(&self, balances: &[u64]) -> Result<Vec<Account>> {
        try_join_all(balances.iter().map(|balance| self.create_account(*balance))).await
    }

    async fn fund_alias(&self, account: &Account) -> Result<()> {
        if self.alias_funding == 0 {
            return Ok(());
        }
        let amount = i64::try_from(self.alias_funding)
            .map_err(|_| Error::InvalidOperation("alias funding too large".to_string()))?;

        let transfer = CompositeTransfer {
            spender: None,
            currency: vec![
                CurrencyLeg {
                    account: self.lifecycle.operator().account_id.into(),
                    amount: -amount,
                    approved: false,
                },
                CurrencyLeg {
                    account: AccountRef::Alias(account.alias),
                    amount,
                    approved: false,
                },
            ],
            assets: Vec::new(),
        };
        self.lifecycle
            .execute(Operation::TransferComposite(transfer), &[])
            .await?;

        debug!("Funded alias {} of {}", account.alias, account.id);
        Ok(())
    }

    /// Let `account` hold `asset`. Signed by the account.
    pub async fn associate_asset(&self, account: &Account, asset: &Asset) -> Result<TransactionReceipt> {
        let receipt = self
            .lifecycle
            .execute(
                Operation::AssociateAsset {
                    account: account.id,
                    assets: vec![asset.id],
                },
                &[account.key.as_ref()],
            )
            .await?;

        info!("Associated {} with {}", account.id, asset.id);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkMode;
    use crate::ledger::{AccountId, LedgerQuery, QueryResponse, ReceiptStatus, SimulatedLedger};
    use crate::services::AssetFactory;
    use crate::utils::MINOR_UNITS_PER_MAJOR as MAJOR;

    fn setup() -> (AccountProvisioner, AssetFactory, TransactionLifecycleManager) {
        let (ledger, operator) = SimulatedLedger::genesis(1_000 * MAJOR);
        let config = AppConfig::for_operator(NetworkMode::Testnet, operator);
        let lifecycle = TransactionLifecycleManager::new(&config, Arc::new(ledger));
        (
            AccountProvisioner::new(lifecycle.clone(), &config),
            AssetFactory::new(lifecycle.clone(), &config),
            lifecycle,
        )
    }

    async fn native(lifecycle: &TransactionLifecycleManager, account: AccountId) -> u64 {
        match lifecycle
            .query(&LedgerQuery::AccountBalance { account })
            .await
            .unwrap()
        {
            QueryResponse::AccountBalance(balance) => balance.native,
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_created_account_includes_alias_funding() {
        let (provisioner, _, lifecycle) = setup();
        let account = provisioner.create_account(10 * MAJOR).await.unwrap();

        assert_eq!(native(&lifecycle, account.id).await, 11 * MAJOR);
        assert_eq!(account.address, account.id.to_evm_address());
    }

    #[tokio::test]
    async fn test_concurrent_accounts_are_distinct() {
        let (provisioner, _, _) = setup();
        let accounts = provisioner.create_accounts(&[0, MAJOR, 2 * MAJOR]).await.unwrap();

        assert_eq!(accounts.len(), 3);
        assert_ne!(accounts[0].id, accounts[1].id);
        assert_ne!(accounts[1].id, accounts[2].id);
    }

    #[tokio::test]
    async fn test_associate_twice_rejected() {
        let (provisioner, factory, _) = setup();
        let operator = provisioner.operator_account();
        let nft = factory
            .create_non_fungible(&operator, &operator.key, "Art", "ART", None)
            .await
            .unwrap();
        let account = provisioner.create_account(0).await.unwrap();

        provisioner.associate_asset(&account, &nft).await.unwrap();
        let err = provisioner.associate_asset(&account, &nft).await.unwrap_err();
        assert_eq!(err.status(), Some(ReceiptStatus::TokenAlreadyAssociatedToAccount));
    }

    #[tokio::test]
    async fn test_overdrawn_operator_fails_creation() {
        let (provisioner, _, _) = setup();
        let err = provisioner.create_account(5_000 * MAJOR).await.unwrap_err();
        assert_eq!(err.status(), Some(ReceiptStatus::InsufficientPayerBalance));
    }
}
