//! # Configuration Module
//!
//! This module handles loading and validating configuration from
//! environment variables. The resulting [`AppConfig`] is built once and
//! handed to every service; nothing reads process-wide state afterwards.
//!
//! ## Usage
//!
//! ```rust,ignore
//! dotenvy::dotenv().ok();
//! let config = AppConfig::from_env()?;
//! println!("Operator: {}", config.operator.account_id);
//! ```
//!
//! ## Environment Variables
//!
//! `{MODE}` is `TESTNET`, `MAINNET` or `PREVIEWNET`, selected by `NETWORK`.
//!
//! | Variable | Description | Example |
//! |----------|-------------|---------|
//! | `NETWORK` | Network mode | `testnet` |
//! | `{MODE}_OPERATOR_ACCOUNT_ID` | Fee payer account | `0.0.1234` |
//! | `{MODE}_OPERATOR_KEYPAIR` | Keypair file path or inline JSON bytes | `~/.config/ledger/testnet.json` |
//! | `{MODE}_GATEWAY_URL` | Ledger gateway base URL (default `http://127.0.0.1:5600/{mode}`) | `http://127.0.0.1:5600/testnet` |
//! | `{MODE}_MIRROR_NODE_ENDPOINT` | Directory lookup prefix (default: the mode's public mirror) | `https://testnet.mirrornode.hedera.com/api/v1/contracts/` |
//! | `REQUEST_TIMEOUT_MS` | Per-call timeout | `20000` |
//! | `RECEIPT_TIMEOUT_MS` | Receipt wait bound | `60000` |
//! | `RECEIPT_POLL_INTERVAL_MS` | Gateway receipt poll interval | `500` |
//! | `ALIAS_FUNDING` | Major units sent to a new account's alias | `1` |

use std::env;
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use solana_sdk::signature::{Keypair, Signer};
use thiserror::Error;

use crate::ledger::AccountId;
use crate::utils::{parse_major, MINOR_UNITS_PER_MAJOR};

/// Errors that can occur when loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is missing
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    /// Failed to parse a value
    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),

    /// Keypair could not be loaded
    #[error("Failed to load keypair from {0}: {1}")]
    KeypairError(String, String),
}

/// The named network a client talks to.
///
/// Every mode needs its own operator identity and endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkMode {
    Testnet,
    Mainnet,
    Previewnet,
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkMode::Testnet => "testnet",
            NetworkMode::Mainnet => "mainnet",
            NetworkMode::Previewnet => "previewnet",
        }
    }

    /// Prefix of the per-mode environment variables.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            NetworkMode::Testnet => "TESTNET",
            NetworkMode::Mainnet => "MAINNET",
            NetworkMode::Previewnet => "PREVIEWNET",
        }
    }

    /// Gateway used when `{MODE}_GATEWAY_URL` is unset: a relay on the local host.
    pub fn default_gateway_url(&self) -> String {
        format!("http://127.0.0.1:5600/{}", self.as_str())
    }

    /// Public mirror contract lookup used when `{MODE}_MIRROR_NODE_ENDPOINT` is unset.
    pub fn default_mirror_url(&self) -> &'static str {
        match self {
            NetworkMode::Testnet => "https://testnet.mirrornode.hedera.com/api/v1/contracts/",
            NetworkMode::Mainnet => "https://mainnet-public.mirrornode.hedera.com/api/v1/contracts/",
            NetworkMode::Previewnet => "https://previewnet.mirrornode.hedera.com/api/v1/contracts/",
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TESTNET" => Ok(NetworkMode::Testnet),
            "MAINNET" => Ok(NetworkMode::Mainnet),
            "PREVIEWNET" => Ok(NetworkMode::Previewnet),
            other => Err(ConfigError::InvalidValue("NETWORK".to_string(), other.to_string())),
        }
    }
}

/// An account identity the client can sign for.
///
/// The operator is the fee payer of every transaction the client builds.
#[derive(Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub key: Arc<Keypair>,
}

impl Operator {
    pub fn new(account_id: AccountId, key: Keypair) -> Self {
        Self {
            account_id,
            key: Arc::new(key),
        }
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("account_id", &self.account_id)
            .field("public_key", &self.key.pubkey())
            .finish()
    }
}

/// Application configuration.
///
/// ## Example
///
/// ```rust,ignore
/// let config = AppConfig::from_env()?;
/// println!("Network: {}", config.network);
/// println!("Gateway: {}", config.gateway_url);
/// ```
#[derive(Debug, Clone)]
pub struct AppConfig {
    // ==========================================
    // NETWORK SETTINGS
    // ==========================================

    /// Selected network mode.
    pub network: NetworkMode,

    /// Base URL of the ledger gateway.
    pub gateway_url: String,

    /// Directory lookup prefix; the contract address is appended.
    pub mirror_url: String,

    /// Fee payer identity.
    pub operator: Operator,

    // ==========================================
    // TIMING
    // ==========================================

    /// Bound on a single network call (submission, query).
    pub request_timeout: Duration,

    /// Bound on waiting for one receipt.
    pub receipt_timeout: Duration,

    /// How often the gateway backend re-asks for a pending receipt.
    pub receipt_poll_interval: Duration,

    /// Seconds a frozen transaction stays valid.
    pub transaction_valid_duration: u64,

    // ==========================================
    // FEES AND FUNDING (minor units)
    // ==========================================

    /// Default max fee the payer accepts for one transaction.
    pub max_transaction_fee: u64,

    /// Max fee for asset creation.
    pub asset_creation_fee: u64,

    /// Amount sent to a new account's alias during provisioning.
    pub alias_funding: u64,
}

impl AppConfig {
    /// Defaults for everything except the network identity.
    ///
    /// Used by the simulated ledger and tests, where no environment exists.
    pub fn for_operator(network: NetworkMode, operator: Operator) -> Self {
        Self {
            network,
            gateway_url: String::new(),
            mirror_url: String::new(),
            operator,
            request_timeout: Duration::from_millis(20_000),
            receipt_timeout: Duration::from_millis(60_000),
            receipt_poll_interval: Duration::from_millis(500),
            transaction_valid_duration: 120,
            max_transaction_fee: 2 * MINOR_UNITS_PER_MAJOR,
            asset_creation_fee: 30 * MINOR_UNITS_PER_MAJOR,
            alias_funding: MINOR_UNITS_PER_MAJOR,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Use `dotenvy::dotenv()` before calling this to load from `.env` file.
    ///
    /// ## Returns
    ///
    /// - `Ok(AppConfig)` - Configuration loaded successfully
    /// - `Err(ConfigError)` - A required variable is missing or invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network: NetworkMode = get_env(&lookup, "NETWORK")?.parse()?;
        let prefix = network.env_prefix();

        let operator = load_account(&lookup, &format!("{}_OPERATOR", prefix))?;

        let mut config = Self::for_operator(network, operator);
        config.gateway_url = get_env_or_default(
            &lookup,
            &format!("{}_GATEWAY_URL", prefix),
            &network.default_gateway_url(),
        );
        config.mirror_url = get_env_or_default(
            &lookup,
            &format!("{}_MIRROR_NODE_ENDPOINT", prefix),
            network.default_mirror_url(),
        );

        config.request_timeout = Duration::from_millis(parse_env_or_default(
            &lookup,
            "REQUEST_TIMEOUT_MS",
            20_000,
        )?);
        config.receipt_timeout = Duration::from_millis(parse_env_or_default(
            &lookup,
            "RECEIPT_TIMEOUT_MS",
            60_000,
        )?);
        config.receipt_poll_interval = Duration::from_millis(parse_env_or_default(
            &lookup,
            "RECEIPT_POLL_INTERVAL_MS",
            500,
        )?);
        config.transaction_valid_duration =
            parse_env_or_default(&lookup, "TRANSACTION_VALID_DURATION_SECS", 120)?;

        config.max_transaction_fee = parse_major_env_or_default(&lookup, "MAX_TRANSACTION_FEE", "2")?;
        config.asset_creation_fee = parse_major_env_or_default(&lookup, "ASSET_CREATION_FEE", "30")?;
        config.alias_funding = parse_major_env_or_default(&lookup, "ALIAS_FUNDING", "1")?;

        Ok(config)
    }

    /// Load a named test account for the current network mode from the
    /// environment: `{MODE}_ACCOUNT_{name}_ACCOUNT_ID` and
    /// `{MODE}_ACCOUNT_{name}_KEYPAIR`.
    pub fn named_account(&self, name: &str) -> Result<Operator, ConfigError> {
        self.named_account_from(name, |key| env::var(key).ok())
    }

    pub fn named_account_from<F>(&self, name: &str, lookup: F) -> Result<Operator, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        load_account(
            &lookup,
            &format!("{}_ACCOUNT_{}", self.network.env_prefix(), name.to_ascii_uppercase()),
        )
    }
}

/// Read `{prefix}_ACCOUNT_ID` and `{prefix}_KEYPAIR`.
fn load_account<F>(lookup: &F, prefix: &str) -> Result<Operator, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let id_var = format!("{}_ACCOUNT_ID", prefix);
    let key_var = format!("{}_KEYPAIR", prefix);

    let account_id: AccountId = get_env(lookup, &id_var)?
        .parse()
        .map_err(|e: crate::ledger::ParseIdError| ConfigError::ParseError(id_var.clone(), e.to_string()))?;
    let key = load_keypair(&key_var, &get_env(lookup, &key_var)?)?;

    Ok(Operator::new(account_id, key))
}

/// Load a keypair from a file path or an inline JSON byte array.
///
/// The file format is a JSON array of the 64 secret+public key bytes.
pub fn load_keypair(var: &str, value: &str) -> Result<Keypair, ConfigError> {
    let trimmed = value.trim();

    let json = if trimmed.starts_with('[') {
        trimmed.to_string()
    } else {
        let path = shellexpand::full(trimmed)
            .map_err(|e| ConfigError::KeypairError(var.to_string(), format!("Invalid path: {}", e)))?;
        fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::KeypairError(var.to_string(), format!("Failed to read keypair: {}", e))
        })?
    };

    let bytes: Vec<u8> = serde_json::from_str(&json).map_err(|e| {
        ConfigError::KeypairError(var.to_string(), format!("Failed to parse keypair: {}", e))
    })?;

    Keypair::from_bytes(&bytes).map_err(|e| {
        ConfigError::KeypairError(var.to_string(), format!("Invalid keypair format: {}", e))
    })
}

/// Get a required environment variable.
///
/// Returns an error if the variable is not set or empty.
fn get_env<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_or_default<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    get_env_or_default(lookup, key, &default.to_string())
        .trim()
        .parse()
        .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}", e)))
}

fn parse_major_env_or_default<F>(lookup: &F, key: &str, default: &str) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_major(&get_env_or_default(lookup, key, default))
        .map_err(|e| ConfigError::ParseError(key.to_string(), e.to_string()))
}
