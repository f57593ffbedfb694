//! Error types for the transfer client.
//!
//! | Variant | Meaning | Retry |
//! |---------|---------|-------|
//! | `Transport` | network failure or timeout | caller, with a fresh operation |
//! | `LedgerRejected` | receipt status other than SUCCESS | never automatic |
//! | `Configuration` | missing or invalid settings | no, fix the environment |
//! | `DirectoryResolution` | address has no owning ledger id | no |

use crate::config::ConfigError;
use crate::directory::DirectoryError;
use crate::ledger::{AccountId, AssetId, ReceiptStatus, TransactionId, TransportError};

/// Client error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or timeout failure; the outcome of a submission is unknown.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The ledger decided the transaction and refused it.
    #[error("Ledger rejected transaction {transaction_id}: {status}")]
    LedgerRejected {
        transaction_id: TransactionId,
        status: ReceiptStatus,
    },

    /// Missing operator credentials, unset network mode, bad values.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A contract-facing address could not be mapped to a ledger id.
    #[error("Directory resolution failed: {0}")]
    DirectoryResolution(DirectoryError),

    /// A successful receipt lacked an identifier the caller depends on.
    #[error("Receipt for {transaction_id} is missing {field}")]
    MissingReceiptField {
        transaction_id: TransactionId,
        field: &'static str,
    },

    /// Rejected locally before any network call.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Locally tracked supply disagrees with the ledger.
    #[error("Supply mismatch for {asset}: tracked {tracked}, ledger reports {reported}")]
    SupplyMismatch {
        asset: AssetId,
        tracked: u64,
        reported: u64,
    },

    /// A post-transfer balance check failed.
    #[error("Balance mismatch for {account}: expected change {expected}, observed {observed}")]
    BalanceMismatch {
        account: AccountId,
        expected: i128,
        observed: i128,
    },
}

impl Error {
    /// Only transport failures may be retried, and only with a new transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Ledger status carried by a rejection.
    pub fn status(&self) -> Option<ReceiptStatus> {
        match self {
            Error::LedgerRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<DirectoryError> for Error {
    fn from(error: DirectoryError) -> Self {
        match error {
            DirectoryError::Transport(transport) => Error::Transport(transport),
            other => Error::DirectoryResolution(other),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(error: bincode::Error) -> Self {
        Error::Encoding(error.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
