//! # Directory Module
//!
//! Maps contract-facing addresses to the ledger identifiers that own them.
//! The spender of a delegated transfer is usually known only by its
//! contract address, so its ledger id has to be discovered before any
//! allowance can name it.
//!
//! ## Lookup
//!
//! ```text
//! GET {mirror_url}{address}
//!        ↓
//! { "account": "0.0.5005", ... }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ledger::{AccountId, EvmAddress, TransportError};

/// Errors that can occur when resolving an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// No ledger entity owns the address.
    #[error("No ledger id owns address {0}")]
    NotFound(EvmAddress),

    /// The directory answered with an unusable body.
    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),

    /// The directory could not be reached.
    #[error("Directory unreachable: {0}")]
    Transport(TransportError),
}

/// Resolves contract-facing addresses to ledger ids.
#[async_trait]
pub trait DirectoryResolver: Send + Sync {
    async fn resolve(&self, address: &EvmAddress) -> Result<AccountId, DirectoryError>;
}

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    #[serde(default)]
    account: Option<String>,
    #[serde(default)]
    contract_id: Option<String>,
}

/// HTTP directory backed by a mirror node's contract endpoint.
#[derive(Clone)]
pub struct MirrorDirectory {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl MirrorDirectory {
    /// Create a directory client.
    ///
    /// ## Arguments
    ///
    /// * `base_url` - Lookup prefix; the address is appended verbatim
    /// * `timeout` - Bound on each lookup
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Transport(TransportError::Http(e.to_string())))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl DirectoryResolver for MirrorDirectory {
    async fn resolve(&self, address: &EvmAddress) -> Result<AccountId, DirectoryError> {
        let url = format!("{}{}", self.base_url, address);
        debug!("Resolving {} via {}", address, url);

        let request = self.http.get(&url).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| DirectoryError::Transport(TransportError::Timeout(self.timeout)))?
            .map_err(|e| DirectoryError::Transport(TransportError::Http(e.to_string())))?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!("Directory has no entry for {}", address);
            return Err(DirectoryError::NotFound(*address));
        }
        if !response.status().is_success() {
            return Err(DirectoryError::Transport(TransportError::Http(format!(
                "{} returned {}",
                url,
                response.status()
            ))));
        }

        let entry: DirectoryEntry = response
            .json()
            .await
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;

        let raw = entry
            .account
            .or(entry.contract_id)
            .ok_or(DirectoryError::NotFound(*address))?;

        let id = raw
            .parse::<AccountId>()
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;

        debug!("Resolved {} to {}", address, id);
        Ok(id)
    }
}
