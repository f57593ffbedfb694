//! # Transaction Lifecycle Service
//!
//! Every ledger write passes through here. The lifecycle is encoded in the
//! types, so a transaction cannot be signed before it is frozen or awaited
//! before it is submitted.
//!
//! ## States
//!
//! ```text
//! UnsignedTransaction ──freeze──▶ FrozenTransaction ──sign──▶ FrozenTransaction
//!      (Built)                       (Frozen)                    (Signed)
//!                                                                   │
//!                                                                submit
//!                                                                   ▼
//!            TransactionReceipt ◀──await_receipt── PendingTransaction
//!              (Confirmed)         or LedgerRejected   (Submitted/Pending)
//!                                    (Failed)
//! ```
//!
//! ## Policy
//!
//! - The operator pays and its signature is added at submit time.
//! - Submissions are never retried: a timed-out submission may still land.
//! - Read-only queries are retried with exponential backoff.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, NetworkMode, Operator};
use crate::error::{Error, Result};
use crate::ledger::{
    AccountId, LedgerNetwork, LedgerQuery, Operation, QueryResponse, SignaturePair, SignedTransaction,
    TransactionBody, TransactionId, TransactionReceipt, TransportError,
};

/// Query attempts after the first one.
const QUERY_MAX_RETRIES: u32 = 3;

/// First backoff delay; doubles on every retry.
const QUERY_INITIAL_DELAY_MS: u64 = 200;

/// Where a transaction is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Built,
    Frozen,
    Signed,
    Submitted,
    Pending,
    Confirmed,
    Failed,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Built => "built",
            TransactionState::Frozen => "frozen",
            TransactionState::Signed => "signed",
            TransactionState::Submitted => "submitted",
            TransactionState::Pending => "pending",
            TransactionState::Confirmed => "confirmed",
            TransactionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Issues strictly increasing valid-start timestamps.
#[derive(Debug, Default)]
pub struct ValidStartClock {
    last_nanos: AtomicI64,
}

impl ValidStartClock {
    /// Wall-clock time, bumped past the previous value when needed.
    pub fn next(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let previous = self
            .last_nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        Utc.timestamp_nanos(now.max(previous.saturating_add(1)))
    }
}

/// Everything a transaction is bound to when it is frozen.
#[derive(Debug, Clone)]
pub struct NetworkContext {
    pub network: NetworkMode,
    pub payer: AccountId,
    pub max_transaction_fee: u64,
    pub valid_duration_secs: u64,
    clock: Arc<ValidStartClock>,
}

impl NetworkContext {
    pub fn new(
        network: NetworkMode,
        payer: AccountId,
        max_transaction_fee: u64,
        valid_duration_secs: u64,
    ) -> Self {
        Self {
            network,
            payer,
            max_transaction_fee,
            valid_duration_secs,
            clock: Arc::new(ValidStartClock::default()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.network,
            config.operator.account_id,
            config.max_transaction_fee,
            config.transaction_valid_duration,
        )
    }

    /// A fresh transaction id paid by this context's payer.
    pub fn next_transaction_id(&self) -> TransactionId {
        TransactionId::new(self.payer, self.clock.next())
    }
}

/// A described operation not yet bound to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    operation: Operation,
    memo: String,
    max_fee: Option<u64>,
}

impl UnsignedTransaction {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            memo: String::new(),
            max_fee: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// Override the context's max transaction fee.
    pub fn with_max_fee(mut self, max_fee: u64) -> Self {
        self.max_fee = Some(max_fee);
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::Built
    }

    /// Assign id, network and fee, and serialize the body.
    pub fn freeze_with(self, context: &NetworkContext) -> Result<FrozenTransaction> {
        let body = TransactionBody {
            transaction_id: context.next_transaction_id(),
            network: context.network.as_str().to_string(),
            max_transaction_fee: self.max_fee.unwrap_or(context.max_transaction_fee),
            valid_duration_secs: context.valid_duration_secs,
            memo: self.memo,
            operation: self.operation,
        };
        let body_bytes = body.to_bytes()?;
        debug!("Froze {} as {}", body.operation, body.transaction_id);

        Ok(FrozenTransaction {
            body,
            body_bytes,
            signatures: Vec::new(),
        })
    }
}

/// A transaction whose parameters can no longer change.
#[derive(Debug, Clone)]
pub struct FrozenTransaction {
    body: TransactionBody,
    body_bytes: Vec<u8>,
    signatures: Vec<SignaturePair>,
}

impl FrozenTransaction {
    pub fn transaction_id(&self) -> TransactionId {
        self.body.transaction_id
    }

    pub fn body(&self) -> &TransactionBody {
        &self.body
    }

    /// Add a signature over the body bytes. Signing twice with one key is a no-op.
    pub fn sign(mut self, key: &Keypair) -> Self {
        let public_key = key.pubkey();
        if !self.is_signed_by(&public_key) {
            self.signatures.push(SignaturePair {
                public_key,
                signature: key.sign_message(&self.body_bytes),
            });
        }
        self
    }

    pub fn is_signed_by(&self, public_key: &Pubkey) -> bool {
        self.signatures.iter().any(|pair| pair.public_key == *public_key)
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn state(&self) -> TransactionState {
        if self.signatures.is_empty() {
            TransactionState::Frozen
        } else {
            TransactionState::Signed
        }
    }

    pub fn into_signed(self) -> SignedTransaction {
        SignedTransaction {
            body_bytes: self.body_bytes,
            signatures: self.signatures,
        }
    }
}

/// A submitted transaction awaiting its receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub transaction_id: TransactionId,
    pub operation: &'static str,
}

impl PendingTransaction {
    pub fn state(&self) -> TransactionState {
        TransactionState::Pending
    }
}

/// Drives transactions from description to receipt.
///
/// ## Usage
///
/// ```rust,ignore
/// let lifecycle = TransactionLifecycleManager::new(&config, ledger);
/// let receipt = lifecycle
///     .execute(Operation::AssociateAsset { account, assets }, &[&account_key])
///     .await?;
/// ```
#[derive(Clone)]
pub struct TransactionLifecycleManager {
    ledger: Arc<dyn LedgerNetwork>,
    context: NetworkContext,
    operator: Operator,
    request_timeout: Duration,
    receipt_timeout: Duration,
}

impl TransactionLifecycleManager {
    pub fn new(config: &AppConfig, ledger: Arc<dyn LedgerNetwork>) -> Self {
        info!(
            "Transaction lifecycle ready on {} (payer {})",
            config.network, config.operator.account_id
        );
        Self {
            ledger,
            context: NetworkContext::from_config(config),
            operator: config.operator.clone(),
            request_timeout: config.request_timeout,
            receipt_timeout: config.receipt_timeout,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn context(&self) -> &NetworkContext {
        &self.context
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerNetwork> {
        &self.ledger
    }

    /// Describe an operation. No network contact.
    pub fn build(&self, operation: Operation) -> UnsignedTransaction {
        UnsignedTransaction::new(operation)
    }

    pub fn freeze(&self, unsigned: UnsignedTransaction) -> Result<FrozenTransaction> {
        unsigned.freeze_with(&self.context)
    }

    /// Add the payer signature if missing and hand the transaction to the ledger.
    pub async fn submit(&self, frozen: FrozenTransaction) -> Result<PendingTransaction> {
        let operation = frozen.body().operation.kind();
        let frozen = frozen.sign(&self.operator.key);
        let transaction_id = frozen.transaction_id();
        let signed = frozen.into_signed();

        let accepted = timeout(self.request_timeout, self.ledger.submit(&signed))
            .await
            .map_err(|_| TransportError::Timeout(self.request_timeout))??;

        if accepted != transaction_id {
            return Err(TransportError::Protocol(format!(
                "Submitted {} but ledger acknowledged {}",
                transaction_id, accepted
            ))
            .into());
        }

        info!("Submitted {} {}", operation, transaction_id);
        Ok(PendingTransaction {
            transaction_id,
            operation,
        })
    }

    /// Wait for the ledger's decision.
    ///
    /// Any status other than SUCCESS becomes `Error::LedgerRejected`.
    pub async fn await_receipt(&self, pending: PendingTransaction) -> Result<TransactionReceipt> {
        let receipt = timeout(self.receipt_timeout, self.ledger.receipt(&pending.transaction_id))
            .await
            .map_err(|_| TransportError::Timeout(self.receipt_timeout))??;

        if !receipt.status.is_success() {
            warn!(
                "{} {} {}: {}",
                pending.operation,
                pending.transaction_id,
                TransactionState::Failed,
                receipt.status
            );
            return Err(Error::LedgerRejected {
                transaction_id: pending.transaction_id,
                status: receipt.status,
            });
        }

        debug!(
            "{} {} {}",
            pending.operation,
            pending.transaction_id,
            TransactionState::Confirmed
        );
        Ok(receipt)
    }

    /// Freeze, sign with every key in `signers`, submit and await.
    pub async fn execute_with(
        &self,
        unsigned: UnsignedTransaction,
        signers: &[&Keypair],
    ) -> Result<TransactionReceipt> {
        let frozen = signers
            .iter()
            .fold(self.freeze(unsigned)?, |frozen, key| frozen.sign(key));
        let pending = self.submit(frozen).await?;
        self.await_receipt(pending).await
    }

    pub async fn execute(&self, operation: Operation, signers: &[&Keypair]) -> Result<TransactionReceipt> {
        self.execute_with(self.build(operation), signers).await
    }

    /// Run a read-only query, retrying transport failures with backoff.
    pub async fn query(&self, query: &LedgerQuery) -> Result<QueryResponse> {
        let mut attempt = 0;
        loop {
            let error = match timeout(self.request_timeout, self.ledger.query(query)).await {
                Ok(Ok(response)) => {
                    if attempt > 0 {
                        info!("Query succeeded after {} retries", attempt);
                    }
                    return Ok(response);
                }
                // The ledger answered; asking again will not change that.
                Ok(Err(TransportError::Protocol(message))) => {
                    return Err(TransportError::Protocol(message).into())
                }
                Ok(Err(e)) => e,
                Err(_) => TransportError::Timeout(self.request_timeout),
            };

            if attempt == QUERY_MAX_RETRIES {
                warn!("Query failed after {} attempts: {}", QUERY_MAX_RETRIES + 1, error);
                return Err(error.into());
            }
            let delay_ms = QUERY_INITIAL_DELAY_MS * (1 << attempt);
            debug!(
                "Query failed (attempt {}): {}. Retrying in {}ms...",
                attempt + 1,
                error,
                delay_ms
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ReceiptStatus, SimulatedLedger};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    const MAJOR: u64 = 100_000_000;

    fn manager() -> (TransactionLifecycleManager, Arc<SimulatedLedger>) {
        let (ledger, operator) = SimulatedLedger::genesis(1_000 * MAJOR);
        let ledger = Arc::new(ledger);
        let config = AppConfig::for_operator(NetworkMode::Testnet, operator);
        (TransactionLifecycleManager::new(&config, ledger.clone()), ledger)
    }

    fn create_account_op() -> Operation {
        Operation::CreateAccount {
            public_key: Keypair::new().pubkey(),
            initial_balance: MAJOR,
        }
    }

    /// Never answers.
    struct StalledLedger;

    #[async_trait]
    impl LedgerNetwork for StalledLedger {
        async fn submit(&self, _: &SignedTransaction) -> std::result::Result<TransactionId, TransportError> {
            futures::future::pending().await
        }

        async fn receipt(&self, _: &TransactionId) -> std::result::Result<TransactionReceipt, TransportError> {
            futures::future::pending().await
        }

        async fn query(&self, _: &LedgerQuery) -> std::result::Result<QueryResponse, TransportError> {
            futures::future::pending().await
        }
    }

    /// Fails queries with an HTTP error a fixed number of times.
    struct FlakyLedger {
        inner: SimulatedLedger,
        failures_left: AtomicU32,
    }

    #[async_trait]
    impl LedgerNetwork for FlakyLedger {
        async fn submit(&self, tx: &SignedTransaction) -> std::result::Result<TransactionId, TransportError> {
            self.inner.submit(tx).await
        }

        async fn receipt(&self, id: &TransactionId) -> std::result::Result<TransactionReceipt, TransportError> {
            self.inner.receipt(id).await
        }

        async fn query(&self, query: &LedgerQuery) -> std::result::Result<QueryResponse, TransportError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(TransportError::Http("503 Service Unavailable".into()));
            }
            self.inner.query(query).await
        }
    }

    #[test]
    fn test_valid_starts_strictly_increase() {
        let clock = ValidStartClock::default();
        let mut previous = clock.next();
        for _ in 0..1_000 {
            let next = clock.next();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_freeze_binds_context() {
        let (manager, _) = manager();
        let unsigned = manager.build(create_account_op()).with_memo("provision").with_max_fee(7);
        assert_eq!(unsigned.state(), TransactionState::Built);

        let frozen = manager.freeze(unsigned).unwrap();
        assert_eq!(frozen.state(), TransactionState::Frozen);
        assert_eq!(frozen.body().network, "testnet");
        assert_eq!(frozen.body().max_transaction_fee, 7);
        assert_eq!(frozen.body().memo, "provision");
        assert_eq!(frozen.transaction_id().payer, manager.operator().account_id);
    }

    #[test]
    fn test_signing_twice_with_same_key_is_noop() {
        let (manager, _) = manager();
        let key = Keypair::new();
        let other = Keypair::new();
        let frozen = manager
            .freeze(manager.build(create_account_op()))
            .unwrap()
            .sign(&key)
            .sign(&key)
            .sign(&other);

        assert_eq!(frozen.state(), TransactionState::Signed);
        assert_eq!(frozen.signature_count(), 2);
        assert_eq!(frozen.into_signed().verified_signers().len(), 2);
    }

    #[tokio::test]
    async fn test_submit_adds_operator_signature() {
        let (manager, _) = manager();
        let frozen = manager.freeze(manager.build(create_account_op())).unwrap();
        assert!(!frozen.is_signed_by(&manager.operator().key.pubkey()));

        let pending = manager.submit(frozen).await.unwrap();
        assert_eq!(pending.state(), TransactionState::Pending);
        let receipt = manager.await_receipt(pending).await.unwrap();
        assert!(receipt.account_id.is_some());
    }

    #[tokio::test]
    async fn test_failed_status_is_ledger_rejected() {
        let (manager, _) = manager();
        let err = manager
            .execute(
                Operation::AssociateAsset {
                    account: manager.operator().account_id,
                    assets: vec![crate::ledger::AssetId::new(0, 0, 424_242)],
                },
                &[],
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(ReceiptStatus::InvalidTokenId));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_stalled_submission_times_out_as_transport() {
        let (_, operator) = SimulatedLedger::genesis(0);
        let mut config = AppConfig::for_operator(NetworkMode::Testnet, operator);
        config.request_timeout = Duration::from_millis(50);
        let manager = TransactionLifecycleManager::new(&config, Arc::new(StalledLedger));

        let err = manager.execute(create_account_op(), &[]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Timeout(d)) if d == Duration::from_millis(50)
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_query_retries_transient_failures() {
        let (inner, operator) = SimulatedLedger::genesis(1_000 * MAJOR);
        let account = operator.account_id;
        let config = AppConfig::for_operator(NetworkMode::Testnet, operator);
        let ledger = Arc::new(FlakyLedger {
            inner,
            failures_left: AtomicU32::new(2),
        });
        let manager = TransactionLifecycleManager::new(&config, ledger);

        let response = manager
            .query(&LedgerQuery::AccountBalance { account })
            .await
            .unwrap();
        assert!(matches!(response, QueryResponse::AccountBalance(_)));
    }

    #[tokio::test]
    async fn test_query_rejection_is_not_retried() {
        let (manager, _) = manager();
        let err = manager
            .query(&LedgerQuery::AccountBalance {
                account: AccountId::new(0, 0, 999_999),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Protocol(_))));
    }
}
