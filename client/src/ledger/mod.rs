//! # Ledger Module
//!
//! Everything the client knows about the ledger it drives: identifiers,
//! operation descriptions, receipts, queries, and the [`LedgerNetwork`]
//! trait that every backend implements.
//!
//! ## Backends
//!
//! | Backend | Use Case |
//! |---------|----------|
//! | [`GatewayLedger`] | HTTP gateway in front of a real network |
//! | [`SimulatedLedger`] | In-process ledger for tests and dry runs |
//!
//! ## Submission Flow
//!
//! ```text
//! 1. Client submits SignedTransaction
//!              ↓
//! 2. Ledger returns the TransactionId immediately
//!              ↓
//! 3. Client awaits receipt(TransactionId)
//!              ↓
//! 4. Receipt resolves to SUCCESS or a failure status
//! ```

pub mod gateway;
pub mod operations;
pub mod simulated;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

pub use gateway::GatewayLedger;
pub use operations::{
    AccountBalance, AllowanceGrant, AssetDefinition, AssetInfo, AssetLeg, CompositeTransfer,
    ContractInfo, CurrencyLeg, LedgerQuery, NftInfo, Operation, QueryResponse, SignaturePair,
    SignedTransaction, TransactionBody,
};
pub use simulated::SimulatedLedger;
pub use types::{
    AccountId, AccountRef, AssetId, AssetKind, EvmAddress, FeeSchedule, ParseIdError,
    ReceiptStatus, TransactionId, TransactionReceipt,
};

/// Failures talking to the ledger, as opposed to the ledger saying no.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The call did not complete within its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The HTTP exchange failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The peer answered with something we could not understand.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// A ledger the client can submit transactions to and query.
///
/// `submit` returns as soon as the ledger has accepted the transaction for
/// processing. `receipt` resolves once the ledger has decided it; a backend
/// that has to poll does so internally, callers only await.
#[async_trait]
pub trait LedgerNetwork: Send + Sync {
    /// Hand a signed transaction to the ledger.
    async fn submit(&self, transaction: &SignedTransaction) -> Result<TransactionId, TransportError>;

    /// Wait for the final receipt of a submitted transaction.
    async fn receipt(&self, transaction_id: &TransactionId) -> Result<TransactionReceipt, TransportError>;

    /// Run a read-only query.
    async fn query(&self, query: &LedgerQuery) -> Result<QueryResponse, TransportError>;
}
