//! Ledger identifiers, addresses, statuses and receipts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::{hash::hashv, pubkey::Pubkey};

/// Error returned when an identifier or address string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind}: {value}")]
pub struct ParseIdError {
    kind: &'static str,
    value: String,
}

impl ParseIdError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Shards are 32 bits wide, the width the long-zero address layout holds.
fn parse_entity_parts(kind: &'static str, s: &str) -> Result<(u32, u64, u64), ParseIdError> {
    let invalid = || ParseIdError::new(kind, s);
    let mut parts = s.trim().split('.');
    let mut next = || parts.next().ok_or_else(invalid);

    let shard = next()?.parse::<u32>().map_err(|_| invalid())?;
    let realm = next()?.parse::<u64>().map_err(|_| invalid())?;
    let num = next()?.parse::<u64>().map_err(|_| invalid())?;
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok((shard, realm, num))
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name {
            pub shard: u32,
            pub realm: u64,
            pub num: u64,
        }

        impl $name {
            pub const fn new(shard: u32, realm: u64, num: u64) -> Self {
                Self { shard, realm, num }
            }

            /// The contract-facing "long-zero" address of this entity.
            pub fn to_evm_address(&self) -> EvmAddress {
                EvmAddress::long_zero(self.shard, self.realm, self.num)
            }

            /// Decode an entity id from its long-zero address.
            pub fn from_evm_address(address: &EvmAddress) -> Self {
                let (shard, realm, num) = address.entity_parts();
                Self::new(shard, realm, num)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (shard, realm, num) = parse_entity_parts($kind, s)?;
                Ok(Self::new(shard, realm, num))
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_string()
            }
        }
    };
}

entity_id!(
    /// Ledger identifier of an account (or contract account), `shard.realm.num`.
    AccountId,
    "account id"
);

entity_id!(
    /// Ledger identifier of an asset definition, `shard.realm.num`.
    AssetId,
    "asset id"
);

/// A 20-byte contract-facing address.
///
/// Two forms exist on the ledger:
///
/// | Form | Layout |
/// |------|--------|
/// | long-zero | 4 bytes shard, 8 bytes realm, 8 bytes num (big endian) |
/// | alias | last 20 bytes of a hash of the account's public key |
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EvmAddress([u8; 20]);

impl EvmAddress {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Build the long-zero address for an entity.
    pub fn long_zero(shard: u32, realm: u64, num: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[0..4].copy_from_slice(&shard.to_be_bytes());
        bytes[4..12].copy_from_slice(&realm.to_be_bytes());
        bytes[12..20].copy_from_slice(&num.to_be_bytes());
        Self(bytes)
    }

    /// Derive the alias address of a public key.
    pub fn alias_for(public_key: &Pubkey) -> Self {
        let digest = hashv(&[b"account-alias", public_key.as_ref()]).to_bytes();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..32]);
        Self(bytes)
    }

    /// Whether the shard and realm bytes are zero, i.e. this is the long-zero
    /// form of an entity in shard 0, realm 0.
    pub fn is_long_zero(&self) -> bool {
        self.0[..12].iter().all(|b| *b == 0)
    }

    /// Split the address into `(shard, realm, num)`, assuming long-zero layout.
    pub fn entity_parts(&self) -> (u32, u64, u64) {
        let mut shard = [0u8; 4];
        let mut realm = [0u8; 8];
        let mut num = [0u8; 8];
        shard.copy_from_slice(&self.0[0..4]);
        realm.copy_from_slice(&self.0[4..12]);
        num.copy_from_slice(&self.0[12..20]);
        (
            u32::from_be_bytes(shard),
            u64::from_be_bytes(realm),
            u64::from_be_bytes(num),
        )
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({})", self)
    }
}

impl FromStr for EvmAddress {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let decoded = hex::decode(digits).map_err(|_| ParseIdError::new("address", s))?;
        let bytes: [u8; 20] = decoded
            .try_into()
            .map_err(|_| ParseIdError::new("address", s))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for EvmAddress {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EvmAddress> for String {
    fn from(address: EvmAddress) -> String {
        address.to_string()
    }
}

/// An account reference inside a transfer leg.
///
/// Alias references let a transfer credit an account through the address
/// derived from its key rather than its numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountRef {
    Id(AccountId),
    Alias(EvmAddress),
}

impl From<AccountId> for AccountRef {
    fn from(id: AccountId) -> Self {
        AccountRef::Id(id)
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Id(id) => write!(f, "{}", id),
            AccountRef::Alias(alias) => write!(f, "alias:{}", alias),
        }
    }
}

/// Whether an asset is a fungible token or a collection of unique serials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    Fungible,
    NonFungible,
}

/// Fractional royalty charged on every secondary transfer of a serial.
///
/// The fee is taken out of the currency the asset's seller receives in the
/// same transaction and redirected to `collector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSchedule {
    pub numerator: u64,
    pub denominator: u64,
    pub collector: AccountId,
}

impl FeeSchedule {
    pub fn new(numerator: u64, denominator: u64, collector: AccountId) -> Self {
        Self {
            numerator,
            denominator,
            collector,
        }
    }

    /// Both terms positive and the fraction at most one.
    pub fn is_valid(&self) -> bool {
        self.numerator > 0 && self.denominator > 0 && self.numerator <= self.denominator
    }

    /// `floor(amount × numerator / denominator)`.
    ///
    /// Returns 0 for a zero denominator; the ledger rejects such schedules
    /// at creation so it never applies one.
    pub fn royalty_on(&self, amount: u64) -> u64 {
        if self.denominator == 0 {
            return 0;
        }
        let fee = amount as u128 * self.numerator as u128 / self.denominator as u128;
        // numerator <= denominator keeps fee <= amount; clamp for invalid schedules
        fee.min(amount as u128) as u64
    }
}

/// Outcome status carried by a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    Success,
    /// Not yet reached consensus.
    Unknown,
    InvalidSignature,
    InsufficientPayerBalance,
    InsufficientAccountBalance,
    InsufficientTokenBalance,
    InvalidAccountId,
    InvalidTokenId,
    InvalidNftId,
    InvalidTreasuryAccountForToken,
    InvalidCustomFeeCollector,
    InvalidTokenMintAmount,
    InvalidTokenMintMetadata,
    InvalidAccountAmounts,
    TransfersNotZeroSumForToken,
    TokenNotAssociatedToAccount,
    TokenAlreadyAssociatedToAccount,
    SpenderDoesNotHaveAllowance,
    AmountExceedsAllowance,
    SpenderAccountSameAsOwner,
    SenderDoesNotOwnNftSerialNo,
    FractionDividesByZero,
    RoyaltyFractionCannotExceedOne,
    CustomRoyaltyFeeOnlyAllowedForNonFungibleUnique,
    TransactionExpired,
    InvalidTransactionBody,
}

impl ReceiptStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ReceiptStatus::Success)
    }

    /// Whether the ledger has not decided yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, ReceiptStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Success => "SUCCESS",
            ReceiptStatus::Unknown => "UNKNOWN",
            ReceiptStatus::InvalidSignature => "INVALID_SIGNATURE",
            ReceiptStatus::InsufficientPayerBalance => "INSUFFICIENT_PAYER_BALANCE",
            ReceiptStatus::InsufficientAccountBalance => "INSUFFICIENT_ACCOUNT_BALANCE",
            ReceiptStatus::InsufficientTokenBalance => "INSUFFICIENT_TOKEN_BALANCE",
            ReceiptStatus::InvalidAccountId => "INVALID_ACCOUNT_ID",
            ReceiptStatus::InvalidTokenId => "INVALID_TOKEN_ID",
            ReceiptStatus::InvalidNftId => "INVALID_NFT_ID",
            ReceiptStatus::InvalidTreasuryAccountForToken => "INVALID_TREASURY_ACCOUNT_FOR_TOKEN",
            ReceiptStatus::InvalidCustomFeeCollector => "INVALID_CUSTOM_FEE_COLLECTOR",
            ReceiptStatus::InvalidTokenMintAmount => "INVALID_TOKEN_MINT_AMOUNT",
            ReceiptStatus::InvalidTokenMintMetadata => "INVALID_TOKEN_MINT_METADATA",
            ReceiptStatus::InvalidAccountAmounts => "INVALID_ACCOUNT_AMOUNTS",
            ReceiptStatus::TransfersNotZeroSumForToken => "TRANSFERS_NOT_ZERO_SUM_FOR_TOKEN",
            ReceiptStatus::TokenNotAssociatedToAccount => "TOKEN_NOT_ASSOCIATED_TO_ACCOUNT",
            ReceiptStatus::TokenAlreadyAssociatedToAccount => "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT",
            ReceiptStatus::SpenderDoesNotHaveAllowance => "SPENDER_DOES_NOT_HAVE_ALLOWANCE",
            ReceiptStatus::AmountExceedsAllowance => "AMOUNT_EXCEEDS_ALLOWANCE",
            ReceiptStatus::SpenderAccountSameAsOwner => "SPENDER_ACCOUNT_SAME_AS_OWNER",
            ReceiptStatus::SenderDoesNotOwnNftSerialNo => "SENDER_DOES_NOT_OWN_NFT_SERIAL_NO",
            ReceiptStatus::FractionDividesByZero => "FRACTION_DIVIDES_BY_ZERO",
            ReceiptStatus::RoyaltyFractionCannotExceedOne => "ROYALTY_FRACTION_CANNOT_EXCEED_ONE",
            ReceiptStatus::CustomRoyaltyFeeOnlyAllowedForNonFungibleUnique => {
                "CUSTOM_ROYALTY_FEE_ONLY_ALLOWED_FOR_NON_FUNGIBLE_UNIQUE"
            }
            ReceiptStatus::TransactionExpired => "TRANSACTION_EXPIRED",
            ReceiptStatus::InvalidTransactionBody => "INVALID_TRANSACTION_BODY",
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique id of a transaction: fee payer plus valid-start timestamp.
///
/// Rendered as `0.0.2@1700000000.000000001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId {
    pub payer: AccountId,
    pub valid_start_seconds: i64,
    pub valid_start_nanos: u32,
}

impl TransactionId {
    pub fn new(payer: AccountId, valid_start: DateTime<Utc>) -> Self {
        Self {
            payer,
            valid_start_seconds: valid_start.timestamp(),
            valid_start_nanos: valid_start.timestamp_subsec_nanos(),
        }
    }

    /// Valid start as nanoseconds since the Unix epoch.
    pub fn valid_start_nanos_total(&self) -> i128 {
        self.valid_start_seconds as i128 * 1_000_000_000 + self.valid_start_nanos as i128
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.payer, self.valid_start_seconds, self.valid_start_nanos
        )
    }
}

impl FromStr for TransactionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseIdError::new("transaction id", s);
        let (payer, start) = s.split_once('@').ok_or_else(invalid)?;
        let (seconds, nanos) = start.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            payer: payer.parse().map_err(|_| invalid())?,
            valid_start_seconds: seconds.parse().map_err(|_| invalid())?,
            valid_start_nanos: nanos.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for TransactionId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> String {
        id.to_string()
    }
}

/// Outcome of a transaction once the ledger has decided it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub status: ReceiptStatus,
    /// Account created by a CreateAccount transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    /// Asset created by a CreateAsset transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    /// Total supply after a MintAsset transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<u64>,
    /// Serials minted by a MintAsset transaction on a non-fungible asset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serial_numbers: Vec<u64>,
    /// Network fee charged to the payer, when the ledger reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_fee: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_timestamp: Option<DateTime<Utc>>,
}

impl TransactionReceipt {
    /// A receipt carrying only a status.
    pub fn with_status(transaction_id: TransactionId, status: ReceiptStatus) -> Self {
        Self {
            transaction_id,
            status,
            account_id: None,
            asset_id: None,
            total_supply: None,
            serial_numbers: Vec::new(),
            transaction_fee: None,
            consensus_timestamp: None,
        }
    }
}
