//! Asset values.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::ledger::{AccountId, AssetDefinition, AssetId, AssetKind, EvmAddress, FeeSchedule};

/// A created asset as known to the client.
///
/// Immutable: minting produces a new value with the updated supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub kind: AssetKind,
    pub name: String,
    pub symbol: String,
    pub treasury: AccountId,
    pub admin_key: Pubkey,
    pub supply_key: Pubkey,
    pub fee_schedule: Option<FeeSchedule>,
    /// Supply tracked locally from confirmed mints.
    pub total_supply: u64,
}

impl Asset {
    /// Value for a freshly created asset, before any mint.
    pub fn from_definition(id: AssetId, definition: AssetDefinition) -> Self {
        Self {
            id,
            kind: definition.kind,
            name: definition.name,
            symbol: definition.symbol,
            treasury: definition.treasury,
            admin_key: definition.admin_key,
            supply_key: definition.supply_key,
            fee_schedule: definition.fee_schedule,
            total_supply: 0,
        }
    }

    /// Contract-facing address.
    pub fn address(&self) -> EvmAddress {
        self.id.to_evm_address()
    }

    pub fn is_fungible(&self) -> bool {
        self.kind == AssetKind::Fungible
    }

    /// Same asset with a different tracked supply.
    pub fn with_supply(&self, total_supply: u64) -> Self {
        Self {
            total_supply,
            ..self.clone()
        }
    }
}

/// What a mint call creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mint {
    /// Fungible units added to the treasury.
    Units(u64),
    /// One new serial carrying opaque metadata.
    Serial(Vec<u8>),
}

impl Mint {
    pub fn kind(&self) -> AssetKind {
        match self {
            Mint::Units(_) => AssetKind::Fungible,
            Mint::Serial(_) => AssetKind::NonFungible,
        }
    }

    /// Increase of total supply once confirmed.
    pub fn supply_increase(&self) -> u64 {
        match self {
            Mint::Units(amount) => *amount,
            Mint::Serial(_) => 1,
        }
    }
}

/// Result of a confirmed mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minted {
    /// Asset value with the updated local supply.
    pub asset: Asset,
    /// Serials assigned by the ledger; empty for fungible mints.
    pub serials: Vec<u64>,
    /// Total supply reported in the receipt.
    pub ledger_total_supply: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> Asset {
        Asset::from_definition(
            AssetId::new(0, 0, 1002),
            AssetDefinition {
                name: "Royalty NFT".into(),
                symbol: "RNFT".into(),
                kind: AssetKind::NonFungible,
                treasury: AccountId::new(0, 0, 2),
                admin_key: Pubkey::new_unique(),
                supply_key: Pubkey::new_unique(),
                fee_schedule: Some(FeeSchedule::new(1, 10, AccountId::new(0, 0, 1001))),
            },
        )
    }

    #[test]
    fn test_with_supply_leaves_original_untouched() {
        let original = asset();
        let updated = original.with_supply(3);
        assert_eq!(original.total_supply, 0);
        assert_eq!(updated.total_supply, 3);
        assert_eq!(updated.id, original.id);
    }

    #[test]
    fn test_address_is_long_zero() {
        let address = asset().address();
        assert!(address.is_long_zero());
        assert_eq!(AssetId::from_evm_address(&address), AssetId::new(0, 0, 1002));
    }

    #[test]
    fn test_mint_kind_and_supply_increase() {
        assert_eq!(Mint::Units(50).kind(), AssetKind::Fungible);
        assert_eq!(Mint::Units(50).supply_increase(), 50);
        assert_eq!(Mint::Serial(vec![1]).kind(), AssetKind::NonFungible);
        assert_eq!(Mint::Serial(vec![1]).supply_increase(), 1);
    }
}
