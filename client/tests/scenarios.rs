//! End-to-end exchanges against the in-process ledger.

use std::sync::Arc;

use proptest::prelude::*;

use royalty_transfer::config::{AppConfig, NetworkMode};
use royalty_transfer::ledger::{AccountId, FeeSchedule, ReceiptStatus, SimulatedLedger};
use royalty_transfer::models::{Account, Asset, Mint};
use royalty_transfer::utils::MINOR_UNITS_PER_MAJOR as MAJOR;
use royalty_transfer::workflows;
use royalty_transfer::{Error, Services};

struct Harness {
    ledger: Arc<SimulatedLedger>,
    services: Services,
}

fn harness_with(ledger: SimulatedLedger, operator: royalty_transfer::Operator) -> Harness {
    let ledger = Arc::new(ledger);
    let config = AppConfig::for_operator(NetworkMode::Testnet, operator);
    Harness {
        services: Services::new(&config, ledger.clone(), ledger.clone()),
        ledger,
    }
}

fn harness() -> Harness {
    let (ledger, operator) = SimulatedLedger::genesis(50_000 * MAJOR);
    harness_with(ledger, operator)
}

/// An NFT with one serial minted to the operator, plus a buyer.
async fn listed_serial(h: &Harness, schedule: Option<FeeSchedule>, buyer_balance: u64) -> (Asset, u64, Account) {
    let seller = h.services.accounts.operator_account();
    let nft = h
        .services
        .assets
        .create_non_fungible(&seller, &seller.key, "Test", "T", schedule)
        .await
        .unwrap();
    let minted = h
        .services
        .assets
        .mint(&nft, &seller.key, Mint::Serial(vec![1]))
        .await
        .unwrap();
    let buyer = h.services.accounts.create_account(buyer_balance).await.unwrap();
    (minted.asset, minted.serials[0], buyer)
}

#[tokio::test]
async fn plain_exchange_moves_serial_to_buyer() {
    let h = harness();
    let contract = h.ledger.register_contract(0).to_evm_address();

    let outcome = workflows::run_plain_exchange(&h.services, &contract).await.unwrap();

    let owner = h
        .services
        .balances
        .query_nft_owner(outcome.asset.id, outcome.serial)
        .await
        .unwrap();
    assert_eq!(owner, outcome.buyer);
    assert_eq!(outcome.price, MAJOR);
    assert_eq!(outcome.seller_credit, MAJOR);
    assert!(outcome.settlement.is_none());
    assert!(outcome.receipt.status.is_success());

    // buyer: 10 initial + 1 alias funding - 1 price
    let buyer_balance = h.services.balances.query_native_balance(outcome.buyer).await.unwrap();
    assert_eq!(buyer_balance, 10 * MAJOR);
}

#[tokio::test]
async fn royalty_exchange_pays_collector_a_tenth() {
    let h = harness();
    let contract = h.ledger.register_contract(0).to_evm_address();

    let outcome = workflows::run_royalty_exchange(&h.services, &contract, 33 * MAJOR)
        .await
        .unwrap();

    let settlement = outcome.settlement.unwrap();
    assert_eq!(settlement.royalty, 330_000_000);
    assert_eq!(settlement.seller_net, 2_970_000_000);
    assert_eq!(outcome.seller_credit, 2_970_000_000);

    // collector started at 0 and received 1 major of alias funding
    let collector = h
        .services
        .balances
        .query_native_balance(settlement.collector)
        .await
        .unwrap();
    assert_eq!(collector, MAJOR + 330_000_000);

    let owner = h
        .services
        .balances
        .query_nft_owner(outcome.asset.id, outcome.serial)
        .await
        .unwrap();
    assert_eq!(owner, outcome.buyer);
}

#[tokio::test]
async fn royalty_exchange_fails_without_spender_contract() {
    let h = harness();
    let missing = AccountId::new(0, 0, 999_999).to_evm_address();

    let err = workflows::run_royalty_exchange(&h.services, &missing, 33 * MAJOR)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DirectoryResolution(_)));
}

#[tokio::test]
async fn exchange_above_allowance_is_rejected() {
    let h = harness();
    let seller = h.services.accounts.operator_account();
    let contract = h.ledger.register_contract(0);
    let (nft, serial, buyer) = listed_serial(&h, None, 10 * MAJOR).await;
    h.services.accounts.associate_asset(&buyer, &nft).await.unwrap();

    h.services
        .allowances
        .approve_asset_allowance_all_serials(&nft, &seller, contract, &seller.key)
        .await
        .unwrap();
    h.services
        .allowances
        .approve_currency_allowance(&buyer, contract, MAJOR / 2, &buyer.key)
        .await
        .unwrap();

    let err = h
        .services
        .transfers
        .execute_delegated_transfer(
            &contract.to_evm_address(),
            &buyer.alias,
            &seller.alias,
            &nft.address(),
            serial,
            MAJOR,
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(ReceiptStatus::AmountExceedsAllowance));

    let owner = h.services.balances.query_nft_owner(nft.id, serial).await.unwrap();
    assert_eq!(owner, seller.id);
}

#[tokio::test]
async fn exchange_to_unassociated_buyer_is_rejected() {
    let h = harness();
    let seller = h.services.accounts.operator_account();
    let contract = h.ledger.register_contract(0);
    let (nft, serial, buyer) = listed_serial(&h, None, 10 * MAJOR).await;

    h.services
        .allowances
        .approve_asset_allowance_all_serials(&nft, &seller, contract, &seller.key)
        .await
        .unwrap();
    h.services
        .allowances
        .approve_currency_allowance(&buyer, contract, 2 * MAJOR, &buyer.key)
        .await
        .unwrap();

    let err = h
        .services
        .transfers
        .execute_delegated_transfer(
            &contract.to_evm_address(),
            &buyer.alias,
            &seller.alias,
            &nft.address(),
            serial,
            MAJOR,
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(ReceiptStatus::TokenNotAssociatedToAccount));
}

#[tokio::test]
async fn failed_exchange_only_charges_the_payer_fee() {
    let h = harness();
    let seller = h.services.accounts.operator_account();
    let contract = h.ledger.register_contract(0);
    let (nft, serial, buyer) = listed_serial(&h, None, 10 * MAJOR).await;
    h.services.accounts.associate_asset(&buyer, &nft).await.unwrap();
    h.services
        .allowances
        .approve_currency_allowance(&buyer, contract, 2 * MAJOR, &buyer.key)
        .await
        .unwrap();
    // no serial allowance: the asset leg fails after the currency legs were checked

    let parties = [seller.id, buyer.id];
    let before = h.services.balances.snapshot(&parties).await.unwrap();

    let err = h
        .services
        .transfers
        .execute_delegated_transfer(
            &contract.to_evm_address(),
            &buyer.alias,
            &seller.alias,
            &nft.address(),
            serial,
            MAJOR,
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(ReceiptStatus::SpenderDoesNotHaveAllowance));

    let after = h.services.balances.snapshot(&parties).await.unwrap();
    let fee = h.ledger.network_fee() as i128;
    assert_eq!(before.delta(&after, &seller.id), Some(-fee));
    assert_eq!(before.delta(&after, &buyer.id), Some(0));
    assert_eq!(h.services.balances.query_nft_owner(nft.id, serial).await.unwrap(), seller.id);

    // the currency allowance was not consumed either
    h.services
        .allowances
        .approve_asset_allowance_all_serials(&nft, &seller, contract, &seller.key)
        .await
        .unwrap();
    h.services
        .transfers
        .execute_delegated_transfer(
            &contract.to_evm_address(),
            &buyer.alias,
            &seller.alias,
            &nft.address(),
            serial,
            2 * MAJOR,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn minted_supply_tracks_the_ledger() {
    let h = harness();
    let operator = h.services.accounts.operator_account();
    let coin = h
        .services
        .assets
        .create_fungible(&operator, &operator.key, "Coin", "CN")
        .await
        .unwrap();

    let mut coin = coin;
    for amount in [5, 10, 85] {
        coin = h.services.assets.mint(&coin, &operator.key, Mint::Units(amount)).await.unwrap().asset;
    }
    assert_eq!(h.services.balances.verify_supply(&coin).await.unwrap(), 100);
    assert_eq!(
        h.services.balances.query_asset_balance(operator.id, coin.id).await.unwrap(),
        100
    );

    let stale = coin.with_supply(5);
    assert!(matches!(
        h.services.balances.verify_supply(&stale).await,
        Err(Error::SupplyMismatch {
            tracked: 5,
            reported: 100,
            ..
        })
    ));
}

#[tokio::test]
async fn mint_with_wrong_supply_key_is_rejected() {
    let h = harness();
    let operator = h.services.accounts.operator_account();
    let nft = h
        .services
        .assets
        .create_non_fungible(&operator, &operator.key, "Test", "T", None)
        .await
        .unwrap();
    let impostor = h.services.accounts.create_account(0).await.unwrap();

    let err = h
        .services
        .assets
        .mint(&nft, &impostor.key, Mint::Serial(vec![1]))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(ReceiptStatus::InvalidSignature));
    assert_eq!(h.services.balances.verify_supply(&nft).await.unwrap(), 0);
}

#[tokio::test]
async fn contract_balance_is_reported_by_address() {
    let h = harness();
    let contract = h.ledger.register_contract(7 * MAJOR);
    let balance = h
        .services
        .balances
        .query_contract_native_balance(&contract.to_evm_address())
        .await
        .unwrap();
    assert_eq!(balance, 7 * MAJOR);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn royalty_never_exceeds_amount(amount in 0u64..=u64::MAX / 2, numerator in 0u64..=100, extra in 0u64..=100) {
        let schedule = FeeSchedule::new(numerator, numerator + extra + 1, AccountId::new(0, 0, 1001));
        let royalty = schedule.royalty_on(amount);
        prop_assert!(royalty <= amount);
        prop_assert_eq!(
            royalty as u128,
            amount as u128 * numerator as u128 / (numerator + extra + 1) as u128
        );
    }

    #[test]
    fn sale_price_splits_between_collector_and_seller(price in 1u64..=1_000 * MAJOR, numerator in 1u64..=9) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let observed = runtime.block_on(async {
            let (ledger, operator) = SimulatedLedger::genesis(50_000 * MAJOR);
            let h = harness_with(ledger.with_network_fee(0), operator);
            let seller = h.services.accounts.operator_account();
            let contract = h.ledger.register_contract(0);
            let collector = h.services.accounts.create_account(0).await.unwrap();
            let schedule = FeeSchedule::new(numerator, 10, collector.id);

            let (nft, serial, buyer) = listed_serial(&h, Some(schedule), price).await;
            h.services.accounts.associate_asset(&buyer, &nft).await.unwrap();
            h.services
                .allowances
                .approve_asset_allowance_all_serials(&nft, &seller, contract, &seller.key)
                .await
                .unwrap();
            h.services
                .allowances
                .approve_currency_allowance(&buyer, contract, price, &buyer.key)
                .await
                .unwrap();

            let watched = [collector.id, seller.id];
            let before = h.services.balances.snapshot(&watched).await.unwrap();
            let receipt = h
                .services
                .transfers
                .execute_delegated_transfer(
                    &contract.to_evm_address(),
                    &buyer.alias,
                    &seller.alias,
                    &nft.address(),
                    serial,
                    price,
                )
                .await
                .unwrap();
            let after = h.services.balances.snapshot(&watched).await.unwrap();

            let settlement = h
                .services
                .balances
                .verify_royalty_split(&before, &after, seller.id, &schedule, price, &receipt)
                .unwrap();
            (
                before.delta(&after, &collector.id).unwrap(),
                before.delta(&after, &seller.id).unwrap(),
                settlement,
                schedule,
            )
        });
        let (collector_delta, seller_delta, settlement, schedule) = observed;

        let royalty = (price as u128 * numerator as u128 / 10) as i128;
        prop_assert_eq!(collector_delta, royalty);
        // no network fee, so the seller's whole change is its net credit
        prop_assert_eq!(seller_delta, price as i128 - schedule.royalty_on(price) as i128);
        prop_assert_eq!(seller_delta, price as i128 - royalty);
        prop_assert_eq!(settlement.seller_net as i128, seller_delta);
    }
}
