//! Declarative operation descriptions, transaction bodies, and queries.
//!
//! An [`Operation`] says *what* should happen. It becomes a
//! [`TransactionBody`] once frozen against a network context, and a
//! [`SignedTransaction`] once signatures over the serialized body are
//! attached.
//!
//! ## Wire encoding
//!
//! ```text
//! TransactionBody ──bincode──▶ body_bytes ──sign──▶ SignedTransaction
//!                                                        │
//!                                               bincode + base64
//!                                                        ▼
//!                                                 gateway request
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

use super::types::{AccountId, AccountRef, AssetId, AssetKind, FeeSchedule, TransactionId};

/// Parameters of a new asset definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDefinition {
    pub name: String,
    pub symbol: String,
    pub kind: AssetKind,
    pub treasury: AccountId,
    pub admin_key: Pubkey,
    pub supply_key: Pubkey,
    pub fee_schedule: Option<FeeSchedule>,
}

/// One allowance in an approval transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllowanceGrant {
    /// Spender may debit up to `amount` minor units of the owner's currency.
    Currency {
        owner: AccountId,
        spender: AccountId,
        amount: u64,
    },
    /// Spender may move every serial of `asset` the owner holds, now or later.
    AllSerials {
        asset: AssetId,
        owner: AccountId,
        spender: AccountId,
    },
    /// Spender may debit up to `amount` units of a fungible asset.
    Units {
        asset: AssetId,
        owner: AccountId,
        spender: AccountId,
        amount: u64,
    },
}

impl AllowanceGrant {
    pub fn owner(&self) -> AccountId {
        match self {
            AllowanceGrant::Currency { owner, .. }
            | AllowanceGrant::AllSerials { owner, .. }
            | AllowanceGrant::Units { owner, .. } => *owner,
        }
    }

    pub fn spender(&self) -> AccountId {
        match self {
            AllowanceGrant::Currency { spender, .. }
            | AllowanceGrant::AllSerials { spender, .. }
            | AllowanceGrant::Units { spender, .. } => *spender,
        }
    }
}

/// A signed native-currency adjustment; legs of one transfer sum to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyLeg {
    pub account: AccountRef,
    pub amount: i64,
    /// Debit authorized by the spender's allowance instead of the owner's key.
    pub approved: bool,
}

/// An asset movement inside a composite transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetLeg {
    Fungible {
        asset: AssetId,
        account: AccountId,
        amount: i64,
        approved: bool,
    },
    Serial {
        asset: AssetId,
        serial: u64,
        from: AccountId,
        to: AccountId,
        approved: bool,
    },
}

impl AssetLeg {
    pub fn asset(&self) -> AssetId {
        match self {
            AssetLeg::Fungible { asset, .. } | AssetLeg::Serial { asset, .. } => *asset,
        }
    }
}

/// Multi-leg transfer executed atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeTransfer {
    /// Account whose allowances authorize the `approved` legs.
    pub spender: Option<AccountId>,
    pub currency: Vec<CurrencyLeg>,
    pub assets: Vec<AssetLeg>,
}

/// Declarative description of a ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    CreateAccount {
        public_key: Pubkey,
        initial_balance: u64,
    },
    CreateAsset(AssetDefinition),
    MintAsset {
        asset: AssetId,
        /// Units to mint; fungible assets only.
        amount: u64,
        /// One entry per serial; non-fungible assets only.
        metadata: Vec<Vec<u8>>,
    },
    AssociateAsset {
        account: AccountId,
        assets: Vec<AssetId>,
    },
    ApproveAllowance {
        grants: Vec<AllowanceGrant>,
    },
    TransferComposite(CompositeTransfer),
}

impl Operation {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::CreateAccount { .. } => "CreateAccount",
            Operation::CreateAsset(_) => "CreateAsset",
            Operation::MintAsset { .. } => "MintAsset",
            Operation::AssociateAsset { .. } => "AssociateAsset",
            Operation::ApproveAllowance { .. } => "ApproveAllowance",
            Operation::TransferComposite(_) => "TransferComposite",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// A frozen transaction: the operation bound to a payer and network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub transaction_id: TransactionId,
    pub network: String,
    pub max_transaction_fee: u64,
    pub valid_duration_secs: u64,
    pub memo: String,
    pub operation: Operation,
}

impl TransactionBody {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Signature from one key over the body bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub public_key: Pubkey,
    pub signature: Signature,
}

/// Body bytes plus the accumulated signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub body_bytes: Vec<u8>,
    pub signatures: Vec<SignaturePair>,
}

impl SignedTransaction {
    pub fn body(&self) -> Result<TransactionBody, bincode::Error> {
        TransactionBody::from_bytes(&self.body_bytes)
    }

    /// Public keys whose signatures verify against the body bytes.
    pub fn verified_signers(&self) -> HashSet<Pubkey> {
        self.signatures
            .iter()
            .filter(|pair| pair.signature.verify(pair.public_key.as_ref(), &self.body_bytes))
            .map(|pair| pair.public_key)
            .collect()
    }

    /// bincode, then base64.
    pub fn to_base64(&self) -> Result<String, bincode::Error> {
        Ok(BASE64.encode(bincode::serialize(self)?))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, String> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| format!("Failed to decode transaction: {}", e))?;
        bincode::deserialize(&bytes).map_err(|e| format!("Failed to deserialize: {}", e))
    }
}

/// Read-only ledger queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "camelCase")]
pub enum LedgerQuery {
    AccountBalance { account: AccountId },
    AssetInfo { asset: AssetId },
    NftInfo { asset: AssetId, serial: u64 },
    ContractInfo { contract: AccountId },
}

/// Native and asset balances of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub account: AccountId,
    pub native: u64,
    /// Fungible units, or number of serials held, per associated asset.
    pub assets: BTreeMap<AssetId, u64>,
}

/// Current state of an asset definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub asset: AssetId,
    pub name: String,
    pub symbol: String,
    pub kind: AssetKind,
    pub treasury: AccountId,
    pub total_supply: u64,
    pub fee_schedule: Option<FeeSchedule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftInfo {
    pub asset: AssetId,
    pub serial: u64,
    pub owner: AccountId,
    pub metadata: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub contract: AccountId,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "camelCase")]
pub enum QueryResponse {
    AccountBalance(AccountBalance),
    AssetInfo(AssetInfo),
    NftInfo(NftInfo),
    ContractInfo(ContractInfo),
}
