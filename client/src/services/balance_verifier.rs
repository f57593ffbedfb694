//! # Balance Verifier Service
//!
//! Read-only view of the ledger: balances, asset state, serial ownership,
//! and checks that a completed transfer settled as expected.
//!
//! Nothing here writes. Every call is a query and may be repeated freely.
//!
//! ## Royalty Check
//!
//! ```text
//! before = snapshot([collector, ...])
//!          ... delegated transfer ...
//! after  = snapshot([collector, ...])
//!
//! after[collector] - before[collector] == floor(price × n / d)
//! after[seller] - before[seller] + fee  == price - floor(price × n / d)
//! ```
//!
//! `fee` is the network fee from the transfer receipt, counted only when the
//! seller paid for the transfer.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::directory::DirectoryResolver;
use crate::error::{Error, Result};
use crate::ledger::{
    AccountBalance, AccountId, AssetId, AssetInfo, EvmAddress, FeeSchedule, LedgerQuery,
    QueryResponse, TransactionReceipt, TransportError,
};
use crate::models::Asset;
use crate::services::TransactionLifecycleManager;

/// Native balances of a set of accounts at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub balances: BTreeMap<AccountId, u64>,
}

impl BalanceSnapshot {
    pub fn get(&self, account: &AccountId) -> Option<u64> {
        self.balances.get(account).copied()
    }

    /// Signed change of `account` from `self` to `later`.
    pub fn delta(&self, later: &BalanceSnapshot, account: &AccountId) -> Option<i128> {
        Some(later.get(account)? as i128 - self.get(account)? as i128)
    }
}

/// How a sale price was split between the seller and the royalty collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoyaltySettlement {
    pub collector: AccountId,
    pub price: u64,
    pub royalty: u64,
    pub seller_net: u64,
}

#[derive(Clone)]
pub struct BalanceVerifier {
    lifecycle: TransactionLifecycleManager,
    directory: Arc<dyn DirectoryResolver>,
}

fn unexpected(what: &str, response: QueryResponse) -> Error {
    TransportError::Protocol(format!("Expected {}, got {:?}", what, response)).into()
}

impl BalanceVerifier {
    pub fn new(lifecycle: TransactionLifecycleManager, directory: Arc<dyn DirectoryResolver>) -> Self {
        Self { lifecycle, directory }
    }

    async fn account_balance(&self, account: AccountId) -> Result<AccountBalance> {
        match self.lifecycle.query(&LedgerQuery::AccountBalance { account }).await? {
            QueryResponse::AccountBalance(balance) => Ok(balance),
            other => Err(unexpected("account balance", other)),
        }
    }

    /// Native balance in minor units.
    pub async fn query_native_balance(&self, account: AccountId) -> Result<u64> {
        let balance = self.account_balance(account).await?.native;
        debug!("{} holds {} minor units", account, balance);
        Ok(balance)
    }

    /// Native balance of the contract behind a contract-facing address.
    pub async fn query_contract_native_balance(&self, address: &EvmAddress) -> Result<u64> {
        let contract = self.directory.resolve(address).await?;
        match self.lifecycle.query(&LedgerQuery::ContractInfo { contract }).await? {
            QueryResponse::ContractInfo(info) => {
                debug!("Contract {} ({}) holds {}", contract, address, info.balance);
                Ok(info.balance)
            }
            other => Err(unexpected("contract info", other)),
        }
    }

    /// Units (or serial count) of `asset` held by `account`; zero if not associated.
    pub async fn query_asset_balance(&self, account: AccountId, asset: AssetId) -> Result<u64> {
        let balance = self.account_balance(account).await?;
        Ok(balance.assets.get(&asset).copied().unwrap_or(0))
    }

    pub async fn query_asset_info(&self, asset: AssetId) -> Result<AssetInfo> {
        match self.lifecycle.query(&LedgerQuery::AssetInfo { asset }).await? {
            QueryResponse::AssetInfo(info) => Ok(info),
            other => Err(unexpected("asset info", other)),
        }
    }

    pub async fn query_nft_owner(&self, asset: AssetId, serial: u64) -> Result<AccountId> {
        match self.lifecycle.query(&LedgerQuery::NftInfo { asset, serial }).await? {
            QueryResponse::NftInfo(info) => Ok(info.owner),
            other => Err(unexpected("nft info", other)),
        }
    }

    /// Check a locally tracked supply against the ledger.
    pub async fn verify_supply(&self, asset: &Asset) -> Result<u64> {
        let reported = self.query_asset_info(asset.id).await?.total_supply;
        if reported != asset.total_supply {
            warn!(
                "Supply of {} diverged: tracked {}, ledger {}",
                asset.id, asset.total_supply, reported
            );
            return Err(Error::SupplyMismatch {
                asset: asset.id,
                tracked: asset.total_supply,
                reported,
            });
        }
        Ok(reported)
    }

    /// Native balances of `accounts`, queried concurrently.
    pub async fn snapshot(&self, accounts: &[AccountId]) -> Result<BalanceSnapshot> {
        let balances = try_join_all(accounts.iter().map(|account| async move {
            self.query_native_balance(*account)
                .await
                .map(|balance| (*account, balance))
        }))
        .await?;

        Ok(BalanceSnapshot {
            balances: balances.into_iter().collect(),
        })
    }

    /// Change of `account` across the snapshots, excluding the network fee
    /// it paid if it was the payer of `receipt`.
    fn transfer_change(
        before: &BalanceSnapshot,
        after: &BalanceSnapshot,
        account: AccountId,
        receipt: &TransactionReceipt,
    ) -> Result<i128> {
        let delta = before.delta(after, &account).ok_or_else(|| {
            Error::InvalidOperation(format!("{} missing from snapshots", account))
        })?;
        if receipt.transaction_id.payer != account {
            return Ok(delta);
        }
        let fee = receipt.transaction_fee.ok_or(Error::MissingReceiptField {
            transaction_id: receipt.transaction_id,
            field: "transaction_fee",
        })?;
        Ok(delta + fee as i128)
    }

    fn expect_change(
        before: &BalanceSnapshot,
        after: &BalanceSnapshot,
        account: AccountId,
        expected: i128,
        receipt: &TransactionReceipt,
    ) -> Result<()> {
        let observed = Self::transfer_change(before, after, account, receipt)?;
        if observed != expected {
            warn!("{} changed by {} instead of {}", account, observed, expected);
            return Err(Error::BalanceMismatch {
                account,
                expected,
                observed,
            });
        }
        Ok(())
    }

    /// Confirm `seller` was credited exactly `expected` by the transfer in
    /// `receipt`. The snapshots must bracket that transfer alone.
    pub fn verify_sale_credit(
        &self,
        before: &BalanceSnapshot,
        after: &BalanceSnapshot,
        seller: AccountId,
        expected: u64,
        receipt: &TransactionReceipt,
    ) -> Result<u64> {
        Self::expect_change(before, after, seller, expected as i128, receipt)?;
        debug!("{} credited {} by {}", seller, expected, receipt.transaction_id);
        Ok(expected)
    }

    /// Confirm the sale in `receipt` split `price` between the collector and
    /// the seller: the collector gains `floor(price × n / d)` and the seller
    /// keeps the rest. The snapshots must bracket that transfer alone.
    pub fn verify_royalty_split(
        &self,
        before: &BalanceSnapshot,
        after: &BalanceSnapshot,
        seller: AccountId,
        schedule: &FeeSchedule,
        price: u64,
        receipt: &TransactionReceipt,
    ) -> Result<RoyaltySettlement> {
        let collector = schedule.collector;
        // A collector selling its own serial pays itself nothing.
        let royalty = if collector == seller {
            0
        } else {
            schedule.royalty_on(price)
        };

        if collector != seller {
            Self::expect_change(before, after, collector, royalty as i128, receipt)?;
        }
        let seller_net = self.verify_sale_credit(before, after, seller, price - royalty, receipt)?;

        let settlement = RoyaltySettlement {
            collector,
            price,
            royalty,
            seller_net,
        };
        info!(
            "Royalty settled: {} of {} to {}, seller {} keeps {}",
            settlement.royalty, settlement.price, settlement.collector, seller, settlement.seller_net
        );
        Ok(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, NetworkMode};
    use crate::ledger::SimulatedLedger;

    const MAJOR: u64 = 100_000_000;

    fn verifier() -> (BalanceVerifier, Arc<SimulatedLedger>, AccountId) {
        let (ledger, operator) = SimulatedLedger::genesis(1_000 * MAJOR);
        let operator_id = operator.account_id;
        let ledger = Arc::new(ledger);
        let config = AppConfig::for_operator(NetworkMode::Testnet, operator);
        let lifecycle = TransactionLifecycleManager::new(&config, ledger.clone());
        (BalanceVerifier::new(lifecycle, ledger.clone()), ledger, operator_id)
    }

    fn snapshot(entries: &[(AccountId, u64)]) -> BalanceSnapshot {
        BalanceSnapshot {
            balances: entries.iter().copied().collect(),
        }
    }

    #[tokio::test]
    async fn test_contract_balance_via_directory() {
        let (verifier, ledger, _) = verifier();
        let contract = ledger.register_contract(42);
        let balance = verifier
            .query_contract_native_balance(&contract.to_evm_address())
            .await
            .unwrap();
        assert_eq!(balance, 42);
    }

    #[tokio::test]
    async fn test_snapshot_is_repeatable() {
        let (verifier, _, operator) = verifier();
        let first = verifier.snapshot(&[operator]).await.unwrap();
        let second = verifier.snapshot(&[operator]).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.get(&operator), Some(1_000 * MAJOR));
    }

    const SELLER: AccountId = AccountId::new(0, 0, 2);
    const COLLECTOR: AccountId = AccountId::new(0, 0, 1001);
    const FEE: u64 = 100_000;
    const PRICE: u64 = 3_300_000_000;

    fn sale_receipt(payer: AccountId, fee: Option<u64>) -> TransactionReceipt {
        let id = format!("{}@1700000000.000000001", payer).parse().unwrap();
        let mut receipt = TransactionReceipt::with_status(id, crate::ledger::ReceiptStatus::Success);
        receipt.transaction_fee = fee;
        receipt
    }

    fn before() -> BalanceSnapshot {
        snapshot(&[(COLLECTOR, 0), (SELLER, 1_000 * MAJOR)])
    }

    #[test]
    fn test_royalty_split_exact() {
        let (verifier, _, _) = verifier();
        let schedule = FeeSchedule::new(1, 10, COLLECTOR);
        let after = snapshot(&[(COLLECTOR, 330_000_000), (SELLER, 1_000 * MAJOR + 2_970_000_000 - FEE)]);

        let settlement = verifier
            .verify_royalty_split(&before(), &after, SELLER, &schedule, PRICE, &sale_receipt(SELLER, Some(FEE)))
            .unwrap();
        assert_eq!(settlement.royalty, 330_000_000);
        assert_eq!(settlement.seller_net, 2_970_000_000);
    }

    #[test]
    fn test_royalty_split_collector_mismatch() {
        let (verifier, _, _) = verifier();
        let schedule = FeeSchedule::new(1, 10, COLLECTOR);
        let after = snapshot(&[(COLLECTOR, 0), (SELLER, 1_000 * MAJOR + PRICE - FEE)]);

        let err = verifier
            .verify_royalty_split(&before(), &after, SELLER, &schedule, PRICE, &sale_receipt(SELLER, Some(FEE)))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::BalanceMismatch {
                account: COLLECTOR,
                expected: 330_000_000,
                observed: 0,
            }
        ));
    }

    #[test]
    fn test_royalty_split_seller_shortchanged() {
        let (verifier, _, _) = verifier();
        let schedule = FeeSchedule::new(1, 10, COLLECTOR);
        // collector paid correctly, but the seller lost an extra 5 units
        let after = snapshot(&[(COLLECTOR, 330_000_000), (SELLER, 1_000 * MAJOR + 2_970_000_000 - FEE - 5)]);

        let err = verifier
            .verify_royalty_split(&before(), &after, SELLER, &schedule, PRICE, &sale_receipt(SELLER, Some(FEE)))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::BalanceMismatch {
                account: SELLER,
                expected: 2_970_000_000,
                observed: 2_969_999_995,
            }
        ));
    }

    #[test]
    fn test_seller_not_paying_needs_no_fee() {
        let (verifier, _, _) = verifier();
        let schedule = FeeSchedule::new(1, 10, COLLECTOR);
        let after = snapshot(&[(COLLECTOR, 330_000_000), (SELLER, 1_000 * MAJOR + 2_970_000_000)]);
        let payer = AccountId::new(0, 0, 3);

        let settlement = verifier
            .verify_royalty_split(&before(), &after, SELLER, &schedule, PRICE, &sale_receipt(payer, None))
            .unwrap();
        assert_eq!(settlement.seller_net, 2_970_000_000);
    }

    #[test]
    fn test_paying_seller_needs_reported_fee() {
        let (verifier, _, _) = verifier();
        let after = snapshot(&[(COLLECTOR, 0), (SELLER, 1_000 * MAJOR + PRICE - FEE)]);

        let err = verifier
            .verify_sale_credit(&before(), &after, SELLER, PRICE, &sale_receipt(SELLER, None))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingReceiptField {
                field: "transaction_fee",
                ..
            }
        ));
    }

    #[test]
    fn test_collector_selling_keeps_full_price() {
        let (verifier, _, _) = verifier();
        let schedule = FeeSchedule::new(1, 10, SELLER);
        let after = snapshot(&[(SELLER, 1_000 * MAJOR + PRICE - FEE)]);

        let settlement = verifier
            .verify_royalty_split(
                &snapshot(&[(SELLER, 1_000 * MAJOR)]),
                &after,
                SELLER,
                &schedule,
                PRICE,
                &sale_receipt(SELLER, Some(FEE)),
            )
            .unwrap();
        assert_eq!(settlement.royalty, 0);
        assert_eq!(settlement.seller_net, PRICE);
    }
}
