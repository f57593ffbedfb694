//! # Asset Factory Service
//!
//! Creates fungible and non-fungible assets and mints supply.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let factory = AssetFactory::new(lifecycle, &config);
//! let nft = factory
//!     .create_non_fungible(&treasury, &treasury.key, "Royalty NFT", "RNFT", Some(schedule))
//!     .await?;
//! let minted = factory.mint(&nft, &treasury.key, Mint::Serial(vec![1])).await?;
//! ```
//!
//! The admin key doubles as the supply key.

use solana_sdk::{signature::Keypair, signer::Signer};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::ledger::{AssetDefinition, AssetKind, FeeSchedule, Operation};
use crate::models::{Account, Asset, Mint, Minted};
use crate::services::TransactionLifecycleManager;

#[derive(Clone)]
pub struct AssetFactory {
    lifecycle: TransactionLifecycleManager,
    /// Max fee accepted for a creation transaction.
    creation_fee: u64,
}

impl AssetFactory {
    pub fn new(lifecycle: TransactionLifecycleManager, config: &AppConfig) -> Self {
        Self {
            lifecycle,
            creation_fee: config.asset_creation_fee,
        }
    }

    /// Create a fungible asset whose supply starts at zero in `treasury`.
    pub async fn create_fungible(
        &self,
        treasury: &Account,
        admin_key: &Keypair,
        name: &str,
        symbol: &str,
    ) -> Result<Asset> {
        self.create(treasury, admin_key, name, symbol, AssetKind::Fungible, None)
            .await
    }

    /// Create a non-fungible asset, optionally charging a royalty on transfers.
    pub async fn create_non_fungible(
        &self,
        treasury: &Account,
        admin_key: &Keypair,
        name: &str,
        symbol: &str,
        fee_schedule: Option<FeeSchedule>,
    ) -> Result<Asset> {
        self.create(
            treasury,
            admin_key,
            name,
            symbol,
            AssetKind::NonFungible,
            fee_schedule,
        )
        .await
    }

    async fn create(
        &self,
        treasury: &Account,
        admin_key: &Keypair,
        name: &str,
        symbol: &str,
        kind: AssetKind,
        fee_schedule: Option<FeeSchedule>,
    ) -> Result<Asset> {
        if name.trim().is_empty() {
            return Err(Error::InvalidOperation("asset name is empty".to_string()));
        }
        if symbol.trim().is_empty() {
            return Err(Error::InvalidOperation("asset symbol is empty".to_string()));
        }
        if let Some(schedule) = &fee_schedule {
            if !schedule.is_valid() {
                return Err(Error::InvalidOperation(format!(
                    "royalty {}/{} must be a positive fraction of at most one",
                    schedule.numerator, schedule.denominator
                )));
            }
        }

        let definition = AssetDefinition {
            name: name.to_string(),
            symbol: symbol.to_string(),
            kind,
            treasury: treasury.id,
            admin_key: admin_key.pubkey(),
            supply_key: admin_key.pubkey(),
            fee_schedule,
        };

        let unsigned = self
            .lifecycle
            .build(Operation::CreateAsset(definition.clone()))
            .with_max_fee(self.creation_fee);
        let receipt = self
            .lifecycle
            .execute_with(unsigned, &[admin_key, treasury.key.as_ref()])
            .await?;

        let id = receipt.asset_id.ok_or(Error::MissingReceiptField {
            transaction_id: receipt.transaction_id,
            field: "asset_id",
        })?;

        match &fee_schedule {
            Some(schedule) => info!(
                "Created {:?} asset {} ({}) with royalty {}/{} to {}",
                kind, id, symbol, schedule.numerator, schedule.denominator, schedule.collector
            ),
            None => info!("Created {:?} asset {} ({})", kind, id, symbol),
        }

        Ok(Asset::from_definition(id, definition))
    }

    /// Mint units or one serial.
    ///
    /// Returns the asset with its supply advanced. The locally tracked total
    /// must agree with the receipt; a disagreement is an error.
    pub async fn mint(&self, asset: &Asset, supply_key: &Keypair, mint: Mint) -> Result<Minted> {
        if mint.kind() != asset.kind {
            return Err(Error::InvalidOperation(format!(
                "cannot mint {:?} into {:?} asset {}",
                mint.kind(),
                asset.kind,
                asset.id
            )));
        }

        let tracked = asset
            .total_supply
            .checked_add(mint.supply_increase())
            .ok_or_else(|| Error::InvalidOperation(format!("supply of {} would overflow", asset.id)))?;

        let operation = match mint {
            Mint::Units(0) => {
                return Err(Error::InvalidOperation("mint amount is zero".to_string()));
            }
            Mint::Units(amount) => Operation::MintAsset {
                asset: asset.id,
                amount,
                metadata: Vec::new(),
            },
            Mint::Serial(metadata) if metadata.is_empty() => {
                return Err(Error::InvalidOperation("serial metadata is empty".to_string()));
            }
            Mint::Serial(metadata) => Operation::MintAsset {
                asset: asset.id,
                amount: 0,
                metadata: vec![metadata],
            },
        };

        let receipt = self.lifecycle.execute(operation, &[supply_key]).await?;
        let reported = receipt.total_supply.ok_or(Error::MissingReceiptField {
            transaction_id: receipt.transaction_id,
            field: "total_supply",
        })?;

        if reported != tracked {
            warn!(
                "Supply of {} diverged: tracked {}, ledger {}",
                asset.id, tracked, reported
            );
            return Err(Error::SupplyMismatch {
                asset: asset.id,
                tracked,
                reported,
            });
        }

        info!("Minted {} (total supply {})", asset.id, reported);

        Ok(Minted {
            asset: asset.with_supply(tracked),
            serials: receipt.serial_numbers,
            ledger_total_supply: reported,
        })
    }
}
