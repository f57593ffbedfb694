//! # Exchange Workflows
//!
//! The two end-to-end currency-for-serial exchanges, composed from the
//! services in dependency order.
//!
//! ## Plain exchange
//!
//! ```text
//! create NFT ─▶ mint serial ─▶ create buyer ─▶ associate buyer
//!      ─▶ resolve spender ─▶ seller approves all serials
//!      ─▶ buyer approves currency ─▶ delegated transfer
//! ```
//!
//! ## Royalty exchange
//!
//! Same steps, with a collector account provisioned first and a 1/10
//! royalty on the NFT.
//!
//! Both exchanges snapshot the seller (and the collector) immediately around
//! the transfer and check what each was actually credited.

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::ledger::{AccountId, EvmAddress, FeeSchedule, TransactionReceipt};
use crate::models::{Account, Asset, Mint};
use crate::services::{BalanceSnapshot, RoyaltySettlement, Services};
use crate::utils::MINOR_UNITS_PER_MAJOR;

pub const NFT_NAME: &str = "Test";
pub const NFT_SYMBOL: &str = "T";
pub const SERIAL_METADATA: &[u8] = &[1];

/// Balance a plain-exchange buyer starts with.
pub const PLAIN_BUYER_BALANCE: u64 = 10 * MINOR_UNITS_PER_MAJOR;
/// Price of the plain exchange.
pub const PLAIN_PRICE: u64 = MINOR_UNITS_PER_MAJOR;
/// Price of the royalty exchange.
pub const ROYALTY_PRICE: u64 = 33 * MINOR_UNITS_PER_MAJOR;
pub const ROYALTY_NUMERATOR: u64 = 1;
pub const ROYALTY_DENOMINATOR: u64 = 10;

/// What an exchange produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeOutcome {
    pub asset: Asset,
    pub serial: u64,
    pub buyer: AccountId,
    pub seller: AccountId,
    pub spender: AccountId,
    pub price: u64,
    /// Currency the seller was observed to receive, net of any royalty.
    pub seller_credit: u64,
    pub receipt: TransactionReceipt,
    pub settlement: Option<RoyaltySettlement>,
}

/// A completed delegated transfer with balances observed around it.
struct Sale {
    asset: Asset,
    serial: u64,
    buyer: Account,
    spender: AccountId,
    receipt: TransactionReceipt,
    before: BalanceSnapshot,
    after: BalanceSnapshot,
}

/// Shared steps up to and including the delegated transfer.
struct Exchange<'a> {
    services: &'a Services,
    contract: &'a EvmAddress,
    seller: Account,
}

impl<'a> Exchange<'a> {
    fn new(services: &'a Services, contract: &'a EvmAddress) -> Self {
        Self {
            services,
            contract,
            seller: services.accounts.operator_account(),
        }
    }

    /// Mint one serial of `nft` to the seller and sell it to a fresh buyer.
    ///
    /// The seller and every account in `observe` are snapshotted immediately
    /// before and after the transfer.
    async fn run(
        &self,
        nft: Asset,
        buyer_balance: u64,
        price: u64,
        currency_allowance: u64,
        observe: &[AccountId],
    ) -> Result<Sale> {
        let services = self.services;
        let minted = services
            .assets
            .mint(&nft, &self.seller.key, Mint::Serial(SERIAL_METADATA.to_vec()))
            .await?;
        let serial = *minted.serials.first().ok_or_else(|| {
            Error::InvalidOperation(format!("mint of {} returned no serial", nft.id))
        })?;

        let buyer = services.accounts.create_account(buyer_balance).await?;
        services.accounts.associate_asset(&buyer, &minted.asset).await?;

        let spender = services.allowances.resolve_spender(self.contract).await?;
        services
            .allowances
            .approve_asset_allowance_all_serials(&minted.asset, &self.seller, spender, &self.seller.key)
            .await?;
        services
            .allowances
            .approve_currency_allowance(&buyer, spender, currency_allowance, &buyer.key)
            .await?;

        let mut watched = vec![self.seller.id];
        watched.extend(observe.iter().copied().filter(|id| *id != self.seller.id));

        let before = services.balances.snapshot(&watched).await?;
        let receipt = services
            .transfers
            .execute_delegated_transfer(
                self.contract,
                &buyer.alias,
                &self.seller.alias,
                &minted.asset.address(),
                serial,
                price,
            )
            .await?;
        let after = services.balances.snapshot(&watched).await?;

        Ok(Sale {
            asset: minted.asset,
            serial,
            buyer,
            spender,
            receipt,
            before,
            after,
        })
    }
}

/// Sell one serial of a royalty-free NFT for [`PLAIN_PRICE`].
pub async fn run_plain_exchange(services: &Services, contract: &EvmAddress) -> Result<ExchangeOutcome> {
    let exchange = Exchange::new(services, contract);
    let nft = services
        .assets
        .create_non_fungible(&exchange.seller, &exchange.seller.key, NFT_NAME, NFT_SYMBOL, None)
        .await?;

    let sale = exchange
        .run(nft, PLAIN_BUYER_BALANCE, PLAIN_PRICE, PLAIN_PRICE, &[])
        .await?;

    let owner = services.balances.query_nft_owner(sale.asset.id, sale.serial).await?;
    if owner != sale.buyer.id {
        return Err(Error::InvalidOperation(format!(
            "serial {} of {} is held by {}, expected {}",
            sale.serial, sale.asset.id, owner, sale.buyer.id
        )));
    }
    let seller_credit = services.balances.verify_sale_credit(
        &sale.before,
        &sale.after,
        exchange.seller.id,
        PLAIN_PRICE,
        &sale.receipt,
    )?;

    info!(
        "Plain exchange complete: {} serial {} now held by {}",
        sale.asset.id, sale.serial, sale.buyer.id
    );
    Ok(ExchangeOutcome {
        asset: sale.asset,
        serial: sale.serial,
        buyer: sale.buyer.id,
        seller: exchange.seller.id,
        spender: sale.spender,
        price: PLAIN_PRICE,
        seller_credit,
        receipt: sale.receipt,
        settlement: None,
    })
}

/// Sell one serial of an NFT carrying a 1/10 royalty for `price`.
///
/// The buyer starts with exactly `price` and approves twice that.
pub async fn run_royalty_exchange(
    services: &Services,
    contract: &EvmAddress,
    price: u64,
) -> Result<ExchangeOutcome> {
    let exchange = Exchange::new(services, contract);
    let collector = services.accounts.create_account(0).await?;

    let schedule = FeeSchedule::new(ROYALTY_NUMERATOR, ROYALTY_DENOMINATOR, collector.id);
    let nft = services
        .assets
        .create_non_fungible(
            &exchange.seller,
            &exchange.seller.key,
            NFT_NAME,
            NFT_SYMBOL,
            Some(schedule),
        )
        .await?;

    let allowance = price
        .checked_mul(2)
        .ok_or_else(|| Error::InvalidOperation(format!("price {} too large", price)))?;
    let sale = exchange
        .run(nft, price, price, allowance, &[collector.id])
        .await?;

    let settlement = services.balances.verify_royalty_split(
        &sale.before,
        &sale.after,
        exchange.seller.id,
        &schedule,
        price,
        &sale.receipt,
    )?;

    Ok(ExchangeOutcome {
        asset: sale.asset,
        serial: sale.serial,
        buyer: sale.buyer.id,
        seller: exchange.seller.id,
        spender: sale.spender,
        price,
        seller_credit: settlement.seller_net,
        receipt: sale.receipt,
        settlement: Some(settlement),
    })
}
