//! # Services Module
//!
//! The orchestration components. Each one owns a single concern and every
//! ledger write goes through [`TransactionLifecycleManager`].
//!
//! ## Services Overview
//!
//! | Service | Responsibility |
//! |---------|---------------|
//! | `TransactionLifecycleManager` | build, freeze, sign, submit, await receipt |
//! | `AssetFactory` | asset creation and minting |
//! | `AccountProvisioner` | funded accounts, alias funding, association |
//! | `AllowanceGrantor` | currency and asset allowances, spender lookup |
//! | `TransferOrchestrator` | delegated exchange, plain transfers |
//! | `BalanceVerifier` | queries and settlement checks |
//!
//! ## Service Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         SERVICES LAYER                           │
//! │                                                                  │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌────────────┐  │
//! │  │  Account   │  │   Asset    │  │ Allowance  │  │  Transfer  │  │
//! │  │Provisioner │  │  Factory   │  │  Grantor   │  │Orchestrator│  │
//! │  └─────┬──────┘  └─────┬──────┘  └─────┬──────┘  └─────┬──────┘  │
//! │        └───────────────┴───────┬───────┴───────────────┘         │
//! │                                ▼                                 │
//! │                 ┌──────────────────────────────┐                 │
//! │                 │ TransactionLifecycleManager  │◀── Balance      │
//! │                 └──────────────┬───────────────┘    Verifier     │
//! └────────────────────────────────┼─────────────────────────────────┘
//!                                  ▼
//!                          dyn LedgerNetwork
//! ```

pub mod account_provisioner;
pub mod allowance_grantor;
pub mod asset_factory;
pub mod balance_verifier;
pub mod transaction_lifecycle;
pub mod transfer_orchestrator;

use std::sync::Arc;

pub use account_provisioner::AccountProvisioner;
pub use allowance_grantor::AllowanceGrantor;
pub use asset_factory::AssetFactory;
pub use balance_verifier::{BalanceSnapshot, BalanceVerifier, RoyaltySettlement};
pub use transaction_lifecycle::{
    FrozenTransaction, NetworkContext, PendingTransaction, TransactionLifecycleManager,
    TransactionState, UnsignedTransaction, ValidStartClock,
};
pub use transfer_orchestrator::TransferOrchestrator;

use crate::config::AppConfig;
use crate::directory::DirectoryResolver;
use crate::ledger::LedgerNetwork;

/// All services wired to one ledger and one directory.
#[derive(Clone)]
pub struct Services {
    pub lifecycle: TransactionLifecycleManager,
    pub assets: AssetFactory,
    pub accounts: AccountProvisioner,
    pub allowances: AllowanceGrantor,
    pub transfers: TransferOrchestrator,
    pub balances: BalanceVerifier,
}

impl Services {
    pub fn new(
        config: &AppConfig,
        ledger: Arc<dyn LedgerNetwork>,
        directory: Arc<dyn DirectoryResolver>,
    ) -> Self {
        let lifecycle = TransactionLifecycleManager::new(config, ledger);
        Self {
            assets: AssetFactory::new(lifecycle.clone(), config),
            accounts: AccountProvisioner::new(lifecycle.clone(), config),
            allowances: AllowanceGrantor::new(lifecycle.clone(), directory.clone()),
            transfers: TransferOrchestrator::new(lifecycle.clone(), directory.clone()),
            balances: BalanceVerifier::new(lifecycle.clone(), directory),
            lifecycle,
        }
    }
}
