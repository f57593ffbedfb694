//! # Transfer Orchestrator Service
//!
//! Executes the delegated currency-for-asset exchange as one atomic
//! transaction, and plain currency transfers.
//!
//! ## Delegated Transfer
//!
//! ```text
//!            native_amount (approved, spender allowance)
//!   sender ───────────────────────────────────────────▶ receiver
//!          ◀───────────────────────────────────────────
//!            asset_amount / serial (approved, spender allowance)
//! ```
//!
//! Royalties are the ledger's business: the orchestrator supplies amounts
//! and the spender, never fee legs.

use std::sync::Arc;

use tracing::{debug, info};

use crate::directory::DirectoryResolver;
use crate::error::{Error, Result};
use crate::ledger::{
    AccountId, AssetId, CompositeTransfer, CurrencyLeg, EvmAddress, LedgerQuery, Operation,
    QueryResponse, TransactionReceipt, TransportError,
};
use crate::models::{Account, TransferInstruction};
use crate::services::TransactionLifecycleManager;

#[derive(Clone)]
pub struct TransferOrchestrator {
    lifecycle: TransactionLifecycleManager,
    directory: Arc<dyn DirectoryResolver>,
}

impl TransferOrchestrator {
    pub fn new(lifecycle: TransactionLifecycleManager, directory: Arc<dyn DirectoryResolver>) -> Self {
        Self { lifecycle, directory }
    }

    /// Long-zero addresses decode locally; anything else asks the directory.
    async fn resolve_party(&self, address: &EvmAddress) -> Result<AccountId> {
        if address.is_long_zero() {
            return Ok(AccountId::from_evm_address(address));
        }
        Ok(self.directory.resolve(address).await?)
    }

    /// Turn contract-facing addresses into a resolved instruction.
    pub async fn prepare_delegated_transfer(
        &self,
        spender_context: &EvmAddress,
        sender: &EvmAddress,
        receiver: &EvmAddress,
        asset: &EvmAddress,
        asset_amount: u64,
        native_amount: u64,
    ) -> Result<TransferInstruction> {
        if !asset.is_long_zero() {
            return Err(Error::InvalidOperation(format!(
                "{} is not an asset address",
                asset
            )));
        }
        let asset_id = AssetId::from_evm_address(asset);

        let spender = self.directory.resolve(spender_context).await?;
        let sender = self.resolve_party(sender).await?;
        let receiver = self.resolve_party(receiver).await?;

        let asset_kind = match self.lifecycle.query(&LedgerQuery::AssetInfo { asset: asset_id }).await? {
            QueryResponse::AssetInfo(info) => info.kind,
            other => {
                return Err(TransportError::Protocol(format!(
                    "Expected asset info for {}, got {:?}",
                    asset_id, other
                ))
                .into())
            }
        };

        Ok(TransferInstruction {
            spender,
            sender,
            receiver,
            asset: asset_id,
            asset_kind,
            asset_amount,
            native_amount,
        })
    }

    /// Execute a resolved instruction as one transaction.
    pub async fn execute_instruction(&self, instruction: &TransferInstruction) -> Result<TransactionReceipt> {
        let composite = instruction.to_composite().map_err(Error::InvalidOperation)?;
        debug!(
            "Delegated transfer via {}: {} currency legs, {} asset legs",
            instruction.spender,
            composite.currency.len(),
            composite.assets.len()
        );

        let receipt = self
            .lifecycle
            .execute(Operation::TransferComposite(composite), &[])
            .await?;

        info!(
            "Exchanged {} of {} for {} minor units between {} and {} ({})",
            instruction.asset_amount,
            instruction.asset,
            instruction.native_amount,
            instruction.sender,
            instruction.receiver,
            receipt.transaction_id
        );
        Ok(receipt)
    }

    /// Resolve every party and run the exchange atomically.
    pub async fn execute_delegated_transfer(
        &self,
        spender_context: &EvmAddress,
        sender: &EvmAddress,
        receiver: &EvmAddress,
        asset: &EvmAddress,
        asset_amount: u64,
        native_amount: u64,
    ) -> Result<TransactionReceipt> {
        let instruction = self
            .prepare_delegated_transfer(
                spender_context,
                sender,
                receiver,
                asset,
                asset_amount,
                native_amount,
            )
            .await?;
        self.execute_instruction(&instruction).await
    }

    /// Move `amount` minor units from `from` to `to`, signed by `from`.
    pub async fn transfer_native(&self, from: &Account, to: AccountId, amount: u64) -> Result<TransactionReceipt> {
        let signed_amount = i64::try_from(amount)
            .map_err(|_| Error::InvalidOperation(format!("amount {} too large", amount)))?;

        let transfer = CompositeTransfer {
            spender: None,
            currency: vec![
                CurrencyLeg {
                    account: from.id.into(),
                    amount: -signed_amount,
                    approved: false,
                },
                CurrencyLeg {
                    account: to.into(),
                    amount: signed_amount,
                    approved: false,
                },
            ],
            assets: Vec::new(),
        };

        let receipt = self
            .lifecycle
            .execute(Operation::TransferComposite(transfer), &[from.key.as_ref()])
            .await?;
        info!("Transferred {} minor units from {} to {}", amount, from.id, to);
        Ok(receipt)
    }
}
