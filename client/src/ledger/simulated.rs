//! # Simulated Ledger
//!
//! An in-process ledger that enforces the protocol rules the client relies
//! on: signatures, associations, allowances, zero-sum transfers, royalty
//! fees and atomic execution. Used by the integration tests and by
//! `transfer-runner --simulate`.
//!
//! ## Execution
//!
//! ```text
//! submit(tx)
//!    ├── decode body, verify signatures
//!    ├── duplicate id?     → keep the first receipt
//!    ├── expired?          → TRANSACTION_EXPIRED
//!    ├── payer signed?     → INVALID_SIGNATURE (no fee)
//!    ├── charge network fee to the payer
//!    └── apply operation to a draft of the state
//!            ├── Ok  → commit draft, SUCCESS
//!            └── Err → drop draft, failure status
//! ```
//!
//! Receipts are decided during `submit`, so `receipt` never waits.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use tracing::{debug, info, warn};

use super::{
    AccountBalance, AccountId, AccountRef, AllowanceGrant, AssetDefinition, AssetId, AssetInfo,
    AssetKind, AssetLeg, CompositeTransfer, ContractInfo, EvmAddress, LedgerNetwork, LedgerQuery,
    NftInfo, Operation, QueryResponse, ReceiptStatus, SignedTransaction, TransactionBody,
    TransactionId, TransactionReceipt, TransportError,
};
use crate::config::Operator;
use crate::directory::{DirectoryError, DirectoryResolver};

/// Account that pays for everything at genesis.
pub const GENESIS_OPERATOR: AccountId = AccountId::new(0, 0, 2);

/// Account credited with network fees.
pub const FEE_ACCOUNT: AccountId = AccountId::new(0, 0, 98);

/// First number handed out to user-created entities.
const FIRST_ENTITY_NUM: u64 = 1001;

/// Default network fee per transaction, in minor units.
pub const DEFAULT_NETWORK_FEE: u64 = 100_000;

type Outcome<T> = Result<T, ReceiptStatus>;

#[derive(Debug, Clone)]
struct AccountState {
    /// `None` for contract accounts, which act only through calls.
    key: Option<Pubkey>,
    balance: u64,
    associations: BTreeSet<AssetId>,
    units: BTreeMap<AssetId, u64>,
}

impl AccountState {
    fn new(key: Option<Pubkey>, balance: u64) -> Self {
        Self {
            key,
            balance,
            associations: BTreeSet::new(),
            units: BTreeMap::new(),
        }
    }

    fn is_contract(&self) -> bool {
        self.key.is_none()
    }
}

#[derive(Debug, Clone)]
struct AssetState {
    definition: AssetDefinition,
    total_supply: u64,
    next_serial: u64,
}

#[derive(Debug, Clone)]
struct SerialState {
    owner: AccountId,
    metadata: Vec<u8>,
}

#[derive(Debug, Clone)]
struct LedgerState {
    next_num: u64,
    accounts: BTreeMap<AccountId, AccountState>,
    aliases: HashMap<EvmAddress, AccountId>,
    assets: BTreeMap<AssetId, AssetState>,
    serials: BTreeMap<(AssetId, u64), SerialState>,
    /// (owner, spender) → remaining minor units.
    currency_allowances: HashMap<(AccountId, AccountId), u64>,
    /// (asset, owner, spender)
    serial_allowances: HashSet<(AssetId, AccountId, AccountId)>,
    /// (asset, owner, spender) → remaining units.
    unit_allowances: HashMap<(AssetId, AccountId, AccountId), u64>,
}

impl LedgerState {
    fn next_entity(&mut self) -> u64 {
        let num = self.next_num;
        self.next_num += 1;
        num
    }

    fn account(&self, id: AccountId) -> Outcome<&AccountState> {
        self.accounts.get(&id).ok_or(ReceiptStatus::InvalidAccountId)
    }

    fn account_mut(&mut self, id: AccountId) -> Outcome<&mut AccountState> {
        self.accounts.get_mut(&id).ok_or(ReceiptStatus::InvalidAccountId)
    }

    fn asset(&self, id: AssetId) -> Outcome<&AssetState> {
        self.assets.get(&id).ok_or(ReceiptStatus::InvalidTokenId)
    }

    fn resolve(&self, reference: &AccountRef) -> Outcome<AccountId> {
        match reference {
            AccountRef::Id(id) => self.account(*id).map(|_| *id),
            AccountRef::Alias(address) => self
                .aliases
                .get(address)
                .copied()
                .ok_or(ReceiptStatus::InvalidAccountId),
        }
    }

    fn adjust_native(&mut self, id: AccountId, delta: i128) -> Outcome<()> {
        let account = self.account_mut(id)?;
        let updated = account.balance as i128 + delta;
        if updated < 0 {
            return Err(ReceiptStatus::InsufficientAccountBalance);
        }
        account.balance = u64::try_from(updated).map_err(|_| ReceiptStatus::InvalidAccountAmounts)?;
        Ok(())
    }

    fn held_units(&self, account: AccountId, asset: AssetId, kind: AssetKind) -> u64 {
        match kind {
            AssetKind::Fungible => self
                .accounts
                .get(&account)
                .and_then(|a| a.units.get(&asset))
                .copied()
                .unwrap_or(0),
            AssetKind::NonFungible => self
                .serials
                .range((asset, 0)..=(asset, u64::MAX))
                .filter(|(_, serial)| serial.owner == account)
                .count() as u64,
        }
    }
}

/// One transaction being applied to a draft state.
struct Execution<'a> {
    state: &'a mut LedgerState,
    signers: &'a HashSet<Pubkey>,
    receipt: TransactionReceipt,
}

impl Execution<'_> {
    fn require_key(&self, key: &Pubkey) -> Outcome<()> {
        if self.signers.contains(key) {
            Ok(())
        } else {
            Err(ReceiptStatus::InvalidSignature)
        }
    }

    fn require_signature(&self, account: AccountId) -> Outcome<()> {
        match self.state.account(account)?.key {
            Some(key) => self.require_key(&key),
            None => Err(ReceiptStatus::InvalidSignature),
        }
    }

    fn require_association(&self, account: AccountId, asset: AssetId) -> Outcome<()> {
        if self.state.account(account)?.associations.contains(&asset) {
            Ok(())
        } else {
            Err(ReceiptStatus::TokenNotAssociatedToAccount)
        }
    }

    fn apply(&mut self, payer: AccountId, operation: &Operation) -> Outcome<()> {
        match operation {
            Operation::CreateAccount {
                public_key,
                initial_balance,
            } => self.create_account(payer, *public_key, *initial_balance),
            Operation::CreateAsset(definition) => self.create_asset(definition),
            Operation::MintAsset {
                asset,
                amount,
                metadata,
            } => self.mint(*asset, *amount, metadata),
            Operation::AssociateAsset { account, assets } => self.associate(*account, assets),
            Operation::ApproveAllowance { grants } => self.approve(grants),
            Operation::TransferComposite(transfer) => self.transfer(transfer),
        }
    }

    fn create_account(&mut self, payer: AccountId, key: Pubkey, initial_balance: u64) -> Outcome<()> {
        let payer_state = self.state.account_mut(payer)?;
        payer_state.balance = payer_state
            .balance
            .checked_sub(initial_balance)
            .ok_or(ReceiptStatus::InsufficientPayerBalance)?;

        let id = AccountId::new(0, 0, self.state.next_entity());
        self.state
            .accounts
            .insert(id, AccountState::new(Some(key), initial_balance));
        self.state.aliases.insert(EvmAddress::alias_for(&key), id);
        self.receipt.account_id = Some(id);
        Ok(())
    }

    fn create_asset(&mut self, definition: &AssetDefinition) -> Outcome<()> {
        if definition.name.trim().is_empty() || definition.symbol.trim().is_empty() {
            return Err(ReceiptStatus::InvalidTransactionBody);
        }
        let treasury_key = self
            .state
            .account(definition.treasury)
            .map_err(|_| ReceiptStatus::InvalidTreasuryAccountForToken)?
            .key
            .ok_or(ReceiptStatus::InvalidTreasuryAccountForToken)?;
        self.require_key(&treasury_key)?;
        self.require_key(&definition.admin_key)?;

        if let Some(schedule) = &definition.fee_schedule {
            if definition.kind != AssetKind::NonFungible {
                return Err(ReceiptStatus::CustomRoyaltyFeeOnlyAllowedForNonFungibleUnique);
            }
            if schedule.denominator == 0 {
                return Err(ReceiptStatus::FractionDividesByZero);
            }
            if schedule.numerator > schedule.denominator {
                return Err(ReceiptStatus::RoyaltyFractionCannotExceedOne);
            }
            if schedule.numerator == 0 {
                return Err(ReceiptStatus::InvalidTransactionBody);
            }
            if self.state.account(schedule.collector).is_err() {
                return Err(ReceiptStatus::InvalidCustomFeeCollector);
            }
        }

        let id = AssetId::new(0, 0, self.state.next_entity());
        self.state.assets.insert(
            id,
            AssetState {
                definition: definition.clone(),
                total_supply: 0,
                next_serial: 1,
            },
        );
        self.state
            .account_mut(definition.treasury)?
            .associations
            .insert(id);
        self.receipt.asset_id = Some(id);
        Ok(())
    }

    fn mint(&mut self, asset: AssetId, amount: u64, metadata: &[Vec<u8>]) -> Outcome<()> {
        let (kind, supply_key, treasury) = {
            let state = self.state.asset(asset)?;
            (
                state.definition.kind,
                state.definition.supply_key,
                state.definition.treasury,
            )
        };
        self.require_key(&supply_key)?;

        let mut minted_serials = Vec::new();
        match kind {
            AssetKind::Fungible => {
                if amount == 0 || !metadata.is_empty() {
                    return Err(ReceiptStatus::InvalidTokenMintAmount);
                }
                let held = self.state.account_mut(treasury)?.units.entry(asset).or_insert(0);
                *held = held.checked_add(amount).ok_or(ReceiptStatus::InvalidTokenMintAmount)?;
            }
            AssetKind::NonFungible => {
                if amount != 0 {
                    return Err(ReceiptStatus::InvalidTokenMintAmount);
                }
                if metadata.is_empty() || metadata.iter().any(|m| m.is_empty()) {
                    return Err(ReceiptStatus::InvalidTokenMintMetadata);
                }
                for entry in metadata {
                    let asset_state = self
                        .state
                        .assets
                        .get_mut(&asset)
                        .ok_or(ReceiptStatus::InvalidTokenId)?;
                    let serial = asset_state.next_serial;
                    asset_state.next_serial += 1;
                    self.state.serials.insert(
                        (asset, serial),
                        SerialState {
                            owner: treasury,
                            metadata: entry.clone(),
                        },
                    );
                    minted_serials.push(serial);
                }
            }
        }

        let minted = match kind {
            AssetKind::Fungible => amount,
            AssetKind::NonFungible => minted_serials.len() as u64,
        };
        let asset_state = self
            .state
            .assets
            .get_mut(&asset)
            .ok_or(ReceiptStatus::InvalidTokenId)?;
        asset_state.total_supply = asset_state
            .total_supply
            .checked_add(minted)
            .ok_or(ReceiptStatus::InvalidTokenMintAmount)?;

        self.receipt.total_supply = Some(asset_state.total_supply);
        self.receipt.serial_numbers = minted_serials;
        Ok(())
    }

    fn associate(&mut self, account: AccountId, assets: &[AssetId]) -> Outcome<()> {
        self.require_signature(account)?;
        for asset in assets {
            self.state.asset(*asset)?;
            if !self.state.account_mut(account)?.associations.insert(*asset) {
                return Err(ReceiptStatus::TokenAlreadyAssociatedToAccount);
            }
        }
        Ok(())
    }

    fn approve(&mut self, grants: &[AllowanceGrant]) -> Outcome<()> {
        for grant in grants {
            let owner = grant.owner();
            let spender = grant.spender();
            self.state.account(owner)?;
            self.state.account(spender)?;
            self.require_signature(owner)?;
            if owner == spender {
                return Err(ReceiptStatus::SpenderAccountSameAsOwner);
            }

            match grant {
                AllowanceGrant::Currency { amount, .. } => {
                    if *amount == 0 {
                        self.state.currency_allowances.remove(&(owner, spender));
                    } else {
                        self.state
                            .currency_allowances
                            .insert((owner, spender), *amount);
                    }
                }
                AllowanceGrant::AllSerials { asset, .. } => {
                    if self.state.asset(*asset)?.definition.kind != AssetKind::NonFungible {
                        return Err(ReceiptStatus::InvalidTokenId);
                    }
                    self.require_association(owner, *asset)?;
                    self.state.serial_allowances.insert((*asset, owner, spender));
                }
                AllowanceGrant::Units { asset, amount, .. } => {
                    if self.state.asset(*asset)?.definition.kind != AssetKind::Fungible {
                        return Err(ReceiptStatus::InvalidTokenId);
                    }
                    self.require_association(owner, *asset)?;
                    let key = (*asset, owner, spender);
                    if *amount == 0 {
                        self.state.unit_allowances.remove(&key);
                    } else {
                        self.state.unit_allowances.insert(key, *amount);
                    }
                }
            }
        }
        Ok(())
    }

    fn spend_currency_allowance(
        &mut self,
        owner: AccountId,
        spender: Option<AccountId>,
        amount: u64,
    ) -> Outcome<()> {
        let spender = spender.ok_or(ReceiptStatus::SpenderDoesNotHaveAllowance)?;
        let remaining = self
            .state
            .currency_allowances
            .get_mut(&(owner, spender))
            .ok_or(ReceiptStatus::SpenderDoesNotHaveAllowance)?;
        if amount > *remaining {
            return Err(ReceiptStatus::AmountExceedsAllowance);
        }
        *remaining -= amount;
        Ok(())
    }

    fn spend_unit_allowance(
        &mut self,
        asset: AssetId,
        owner: AccountId,
        spender: Option<AccountId>,
        amount: u64,
    ) -> Outcome<()> {
        let spender = spender.ok_or(ReceiptStatus::SpenderDoesNotHaveAllowance)?;
        let remaining = self
            .state
            .unit_allowances
            .get_mut(&(asset, owner, spender))
            .ok_or(ReceiptStatus::SpenderDoesNotHaveAllowance)?;
        if amount > *remaining {
            return Err(ReceiptStatus::AmountExceedsAllowance);
        }
        *remaining -= amount;
        Ok(())
    }

    fn transfer(&mut self, transfer: &CompositeTransfer) -> Outcome<()> {
        // A contract spender acts through the call itself; any other spender signs.
        if let Some(spender) = transfer.spender {
            if !self.state.account(spender)?.is_contract() {
                self.require_signature(spender)?;
            }
        }

        let mut currency_net: BTreeMap<AccountId, i128> = BTreeMap::new();
        let mut currency_sum: i128 = 0;
        for leg in &transfer.currency {
            let account = self.state.resolve(&leg.account)?;
            if leg.amount < 0 {
                if leg.approved {
                    self.spend_currency_allowance(account, transfer.spender, leg.amount.unsigned_abs())?;
                } else {
                    self.require_signature(account)?;
                }
            }
            currency_sum += leg.amount as i128;
            *currency_net.entry(account).or_insert(0) += leg.amount as i128;
        }
        if currency_sum != 0 {
            return Err(ReceiptStatus::InvalidAccountAmounts);
        }

        let mut unit_net: BTreeMap<(AssetId, AccountId), i128> = BTreeMap::new();
        let mut unit_sums: BTreeMap<AssetId, i128> = BTreeMap::new();
        let mut sellers: Vec<(AssetId, AccountId)> = Vec::new();

        for leg in &transfer.assets {
            match leg {
                AssetLeg::Fungible {
                    asset,
                    account,
                    amount,
                    approved,
                } => {
                    if self.state.asset(*asset)?.definition.kind != AssetKind::Fungible {
                        return Err(ReceiptStatus::InvalidTokenId);
                    }
                    self.require_association(*account, *asset)?;
                    if *amount < 0 {
                        if *approved {
                            self.spend_unit_allowance(*asset, *account, transfer.spender, amount.unsigned_abs())?;
                        } else {
                            self.require_signature(*account)?;
                        }
                    }
                    *unit_sums.entry(*asset).or_insert(0) += *amount as i128;
                    *unit_net.entry((*asset, *account)).or_insert(0) += *amount as i128;
                }
                AssetLeg::Serial {
                    asset,
                    serial,
                    from,
                    to,
                    approved,
                } => {
                    let has_royalty = {
                        let state = self.state.asset(*asset)?;
                        if state.definition.kind != AssetKind::NonFungible {
                            return Err(ReceiptStatus::InvalidTokenId);
                        }
                        state.definition.fee_schedule.is_some()
                    };
                    self.state.account(*from)?;
                    self.state.account(*to)?;

                    let owner = self
                        .state
                        .serials
                        .get(&(*asset, *serial))
                        .ok_or(ReceiptStatus::InvalidNftId)?
                        .owner;
                    if owner != *from {
                        return Err(ReceiptStatus::SenderDoesNotOwnNftSerialNo);
                    }
                    self.require_association(*to, *asset)?;

                    if *approved {
                        let spender = transfer
                            .spender
                            .ok_or(ReceiptStatus::SpenderDoesNotHaveAllowance)?;
                        if !self
                            .state
                            .serial_allowances
                            .contains(&(*asset, *from, spender))
                        {
                            return Err(ReceiptStatus::SpenderDoesNotHaveAllowance);
                        }
                    } else {
                        self.require_signature(*from)?;
                    }

                    if let Some(entry) = self.state.serials.get_mut(&(*asset, *serial)) {
                        entry.owner = *to;
                    }
                    if has_royalty && !sellers.contains(&(*asset, *from)) {
                        sellers.push((*asset, *from));
                    }
                }
            }
        }
        if unit_sums.values().any(|sum| *sum != 0) {
            return Err(ReceiptStatus::TransfersNotZeroSumForToken);
        }

        for ((asset, account), delta) in unit_net {
            let held = self.state.account_mut(account)?.units.entry(asset).or_insert(0);
            let updated = *held as i128 + delta;
            if updated < 0 {
                return Err(ReceiptStatus::InsufficientTokenBalance);
            }
            *held = u64::try_from(updated).map_err(|_| ReceiptStatus::InvalidAccountAmounts)?;
        }

        for (account, delta) in &currency_net {
            self.state.adjust_native(*account, *delta)?;
        }

        // Royalty comes out of the currency the seller received in this
        // transaction, once per asset and seller.
        for (asset, seller) in sellers {
            let Some(schedule) = self.state.asset(asset)?.definition.fee_schedule else {
                continue;
            };
            if schedule.collector == seller {
                continue;
            }
            let received = currency_net.get(&seller).copied().unwrap_or(0);
            if received <= 0 {
                continue;
            }
            let fee = schedule.royalty_on(received as u64);
            if fee == 0 {
                continue;
            }
            self.state.adjust_native(seller, -(fee as i128))?;
            self.state.adjust_native(schedule.collector, fee as i128)?;
            debug!("Royalty of {} on {} paid by {} to {}", fee, asset, seller, schedule.collector);
        }

        Ok(())
    }
}

struct Inner {
    state: LedgerState,
    receipts: HashMap<TransactionId, TransactionReceipt>,
}

/// In-process ledger.
///
/// ## Usage
///
/// ```rust,ignore
/// let (ledger, operator) = SimulatedLedger::genesis(50_000 * MINOR_UNITS_PER_MAJOR);
/// let ledger = Arc::new(ledger);
/// let contract = ledger.register_contract(0);
/// ```
pub struct SimulatedLedger {
    inner: Mutex<Inner>,
    network_fee: u64,
}

impl SimulatedLedger {
    /// Create a ledger holding only the genesis operator and the fee account.
    ///
    /// Returns the operator identity that can pay for transactions.
    pub fn genesis(operator_balance: u64) -> (Self, Operator) {
        let operator_key = Keypair::new();
        let mut accounts = BTreeMap::new();
        accounts.insert(
            GENESIS_OPERATOR,
            AccountState::new(Some(operator_key.pubkey()), operator_balance),
        );
        accounts.insert(FEE_ACCOUNT, AccountState::new(None, 0));

        let mut aliases = HashMap::new();
        aliases.insert(EvmAddress::alias_for(&operator_key.pubkey()), GENESIS_OPERATOR);

        let state = LedgerState {
            next_num: FIRST_ENTITY_NUM,
            accounts,
            aliases,
            assets: BTreeMap::new(),
            serials: BTreeMap::new(),
            currency_allowances: HashMap::new(),
            serial_allowances: HashSet::new(),
            unit_allowances: HashMap::new(),
        };

        info!("Simulated ledger initialized, operator {}", GENESIS_OPERATOR);

        let ledger = Self {
            inner: Mutex::new(Inner {
                state,
                receipts: HashMap::new(),
            }),
            network_fee: DEFAULT_NETWORK_FEE,
        };
        (ledger, Operator::new(GENESIS_OPERATOR, operator_key))
    }

    /// Override the per-transaction network fee.
    pub fn with_network_fee(mut self, fee: u64) -> Self {
        self.network_fee = fee;
        self
    }

    pub fn network_fee(&self) -> u64 {
        self.network_fee
    }

    /// Register a keyless contract account holding `initial_balance`.
    ///
    /// Stands in for contract deployment; the returned id is what a mirror
    /// directory would report for the contract's address.
    pub fn register_contract(&self, initial_balance: u64) -> AccountId {
        let mut inner = self.lock();
        let id = AccountId::new(0, 0, inner.state.next_entity());
        inner
            .state
            .accounts
            .insert(id, AccountState::new(None, initial_balance));
        info!("Registered contract {} ({})", id, id.to_evm_address());
        id
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn execute(&self, inner: &mut Inner, body: &TransactionBody, signers: &HashSet<Pubkey>) -> TransactionReceipt {
        let id = body.transaction_id;
        let mut receipt = TransactionReceipt::with_status(id, ReceiptStatus::Success);
        receipt.consensus_timestamp = Some(Utc::now());

        let now = Utc::now();
        let now_nanos = now.timestamp() as i128 * 1_000_000_000 + now.timestamp_subsec_nanos() as i128;
        let expires = id.valid_start_nanos_total() + body.valid_duration_secs as i128 * 1_000_000_000;
        if now_nanos > expires {
            receipt.status = ReceiptStatus::TransactionExpired;
            return receipt;
        }

        let payer_key = match inner.state.accounts.get(&id.payer) {
            Some(account) => account.key,
            None => {
                receipt.status = ReceiptStatus::InvalidAccountId;
                return receipt;
            }
        };
        if !payer_key.map(|key| signers.contains(&key)).unwrap_or(false) {
            receipt.status = ReceiptStatus::InvalidSignature;
            return receipt;
        }

        let fee = self.network_fee.min(body.max_transaction_fee) as i128;
        if inner.state.adjust_native(id.payer, -fee).is_err() {
            receipt.status = ReceiptStatus::InsufficientPayerBalance;
            return receipt;
        }
        // Fee account always exists; the fee is kept even if the operation fails.
        let _ = inner.state.adjust_native(FEE_ACCOUNT, fee);
        receipt.transaction_fee = Some(fee as u64);

        let mut draft = inner.state.clone();
        let mut execution = Execution {
            state: &mut draft,
            signers,
            receipt,
        };
        match execution.apply(id.payer, &body.operation) {
            Ok(()) => {
                let receipt = execution.receipt;
                inner.state = draft;
                receipt
            }
            Err(status) => {
                let mut receipt = execution.receipt;
                receipt.status = status;
                receipt.account_id = None;
                receipt.asset_id = None;
                receipt.total_supply = None;
                receipt.serial_numbers.clear();
                receipt
            }
        }
    }

    fn answer(state: &LedgerState, query: &LedgerQuery) -> Result<QueryResponse, ReceiptStatus> {
        match query {
            LedgerQuery::AccountBalance { account } => {
                let account_state = state.account(*account)?;
                let assets = account_state
                    .associations
                    .iter()
                    .filter_map(|asset| {
                        let kind = state.assets.get(asset)?.definition.kind;
                        Some((*asset, state.held_units(*account, *asset, kind)))
                    })
                    .collect();
                Ok(QueryResponse::AccountBalance(AccountBalance {
                    account: *account,
                    native: account_state.balance,
                    assets,
                }))
            }
            LedgerQuery::AssetInfo { asset } => {
                let asset_state = state.asset(*asset)?;
                let definition = &asset_state.definition;
                Ok(QueryResponse::AssetInfo(AssetInfo {
                    asset: *asset,
                    name: definition.name.clone(),
                    symbol: definition.symbol.clone(),
                    kind: definition.kind,
                    treasury: definition.treasury,
                    total_supply: asset_state.total_supply,
                    fee_schedule: definition.fee_schedule,
                }))
            }
            LedgerQuery::NftInfo { asset, serial } => {
                state.asset(*asset)?;
                let entry = state
                    .serials
                    .get(&(*asset, *serial))
                    .ok_or(ReceiptStatus::InvalidNftId)?;
                Ok(QueryResponse::NftInfo(NftInfo {
                    asset: *asset,
                    serial: *serial,
                    owner: entry.owner,
                    metadata: entry.metadata.clone(),
                }))
            }
            LedgerQuery::ContractInfo { contract } => {
                let account = state.account(*contract)?;
                if !account.is_contract() {
                    return Err(ReceiptStatus::InvalidAccountId);
                }
                Ok(QueryResponse::ContractInfo(ContractInfo {
                    contract: *contract,
                    balance: account.balance,
                }))
            }
        }
    }
}

#[async_trait]
impl LedgerNetwork for SimulatedLedger {
    async fn submit(&self, transaction: &SignedTransaction) -> Result<TransactionId, TransportError> {
        let body = transaction
            .body()
            .map_err(|e| TransportError::Protocol(format!("Undecodable transaction body: {}", e)))?;
        let id = body.transaction_id;
        let signers = transaction.verified_signers();

        let mut inner = self.lock();
        if inner.receipts.contains_key(&id) {
            warn!("Duplicate transaction {} ignored", id);
            return Ok(id);
        }

        let receipt = self.execute(&mut inner, &body, &signers);
        if receipt.status.is_success() {
            debug!("{} {} succeeded", body.operation, id);
        } else {
            debug!("{} {} failed: {}", body.operation, id, receipt.status);
        }
        inner.receipts.insert(id, receipt);
        Ok(id)
    }

    async fn receipt(&self, transaction_id: &TransactionId) -> Result<TransactionReceipt, TransportError> {
        self.lock()
            .receipts
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| TransportError::Protocol(format!("Unknown transaction {}", transaction_id)))
    }

    async fn query(&self, query: &LedgerQuery) -> Result<QueryResponse, TransportError> {
        let inner = self.lock();
        Self::answer(&inner.state, query)
            .map_err(|status| TransportError::Protocol(format!("Query failed: {}", status)))
    }
}

#[async_trait]
impl DirectoryResolver for SimulatedLedger {
    async fn resolve(&self, address: &EvmAddress) -> Result<AccountId, DirectoryError> {
        let inner = self.lock();
        if address.is_long_zero() {
            let id = AccountId::from_evm_address(address);
            if inner.state.accounts.contains_key(&id) {
                return Ok(id);
            }
        }
        inner
            .state
            .aliases
            .get(address)
            .copied()
            .ok_or(DirectoryError::NotFound(*address))
    }
}
