//! # Allowance Grantor Service
//!
//! Grants a spender delegated rights over an owner's currency or assets.
//! Every grant is signed by the owner; the operator only pays.
//!
//! Re-approving overwrites the previous grant, it never adds to it.
//! Approving a currency amount of zero removes the grant.

use std::sync::Arc;

use solana_sdk::signature::Keypair;
use tracing::info;

use crate::directory::DirectoryResolver;
use crate::error::{Error, Result};
use crate::ledger::{AccountId, AllowanceGrant, AssetKind, EvmAddress, Operation};
use crate::models::{Account, Allowance, AllowanceResource, Asset};
use crate::services::TransactionLifecycleManager;

#[derive(Clone)]
pub struct AllowanceGrantor {
    lifecycle: TransactionLifecycleManager,
    directory: Arc<dyn DirectoryResolver>,
}

impl AllowanceGrantor {
    pub fn new(lifecycle: TransactionLifecycleManager, directory: Arc<dyn DirectoryResolver>) -> Self {
        Self { lifecycle, directory }
    }

    /// Ledger id behind a contract-facing spender address.
    pub async fn resolve_spender(&self, address: &EvmAddress) -> Result<AccountId> {
        let spender = self.directory.resolve(address).await?;
        info!("Spender {} resolved to {}", address, spender);
        Ok(spender)
    }

    /// Let `spender` debit up to `amount` minor units from `owner`.
    pub async fn approve_currency_allowance(
        &self,
        owner: &Account,
        spender: AccountId,
        amount: u64,
        owner_key: &Keypair,
    ) -> Result<Allowance> {
        let allowance = Allowance {
            owner: owner.id,
            spender,
            resource: AllowanceResource::Currency { amount },
        };
        self.approve(allowance, owner_key).await
    }

    /// Let `spender` move every serial of `asset` that `owner` holds, now or later.
    pub async fn approve_asset_allowance_all_serials(
        &self,
        asset: &Asset,
        owner: &Account,
        spender: AccountId,
        owner_key: &Keypair,
    ) -> Result<Allowance> {
        if asset.kind != AssetKind::NonFungible {
            return Err(Error::InvalidOperation(format!(
                "{} has no serials to approve",
                asset.id
            )));
        }
        let allowance = Allowance {
            owner: owner.id,
            spender,
            resource: AllowanceResource::AllSerials { asset: asset.id },
        };
        self.approve(allowance, owner_key).await
    }

    /// Let `spender` debit up to `amount` units of a fungible asset.
    pub async fn approve_asset_allowance(
        &self,
        asset: &Asset,
        owner: &Account,
        spender: AccountId,
        amount: u64,
        owner_key: &Keypair,
    ) -> Result<Allowance> {
        if asset.kind != AssetKind::Fungible {
            return Err(Error::InvalidOperation(format!(
                "{} is not fungible; approve all serials instead",
                asset.id
            )));
        }
        let allowance = Allowance {
            owner: owner.id,
            spender,
            resource: AllowanceResource::Units {
                asset: asset.id,
                amount,
            },
        };
        self.approve(allowance, owner_key).await
    }

    async fn approve(&self, allowance: Allowance, owner_key: &Keypair) -> Result<Allowance> {
        let grant: AllowanceGrant = allowance.to_grant();
        self.lifecycle
            .execute(Operation::ApproveAllowance { grants: vec![grant] }, &[owner_key])
            .await?;

        info!(
            "Approved {:?} from {} to spender {}",
            allowance.resource, allowance.owner, allowance.spender
        );
        Ok(allowance)
    }
}
