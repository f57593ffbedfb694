//! Allowances and delegated transfer instructions.

use serde::{Deserialize, Serialize};

use crate::ledger::{
    AccountId, AllowanceGrant, AssetId, AssetKind, AssetLeg, CompositeTransfer, CurrencyLeg,
};

/// What an allowance lets the spender move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resource", rename_all = "camelCase")]
pub enum AllowanceResource {
    /// Native currency, in minor units.
    Currency { amount: u64 },
    /// Every serial of a non-fungible asset the owner holds.
    AllSerials { asset: AssetId },
    /// Units of a fungible asset.
    Units { asset: AssetId, amount: u64 },
}

/// A confirmed (owner, spender, resource) grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allowance {
    pub owner: AccountId,
    pub spender: AccountId,
    pub resource: AllowanceResource,
}

impl Allowance {
    pub fn to_grant(&self) -> AllowanceGrant {
        match self.resource {
            AllowanceResource::Currency { amount } => AllowanceGrant::Currency {
                owner: self.owner,
                spender: self.spender,
                amount,
            },
            AllowanceResource::AllSerials { asset } => AllowanceGrant::AllSerials {
                asset,
                owner: self.owner,
                spender: self.spender,
            },
            AllowanceResource::Units { asset, amount } => AllowanceGrant::Units {
                asset,
                owner: self.owner,
                spender: self.spender,
                amount,
            },
        }
    }
}

/// A resolved currency-for-asset exchange executed by a spender.
///
/// `sender` pays `native_amount` to `receiver`; `receiver` hands over the
/// asset (`asset_amount` units, or serial number `asset_amount`) to
/// `sender`. Both debits draw on allowances held by `spender`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInstruction {
    pub spender: AccountId,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub asset: AssetId,
    pub asset_kind: AssetKind,
    pub asset_amount: u64,
    pub native_amount: u64,
}

impl TransferInstruction {
    /// Legs of the single atomic transfer.
    ///
    /// Fails when an amount does not fit a signed leg.
    pub fn to_composite(&self) -> Result<CompositeTransfer, String> {
        let native = i64::try_from(self.native_amount)
            .map_err(|_| format!("native amount {} too large", self.native_amount))?;

        let mut currency = Vec::new();
        if native > 0 {
            currency.push(CurrencyLeg {
                account: self.sender.into(),
                amount: -native,
                approved: true,
            });
            currency.push(CurrencyLeg {
                account: self.receiver.into(),
                amount: native,
                approved: false,
            });
        }

        let assets = match self.asset_kind {
            AssetKind::NonFungible => vec![AssetLeg::Serial {
                asset: self.asset,
                serial: self.asset_amount,
                from: self.receiver,
                to: self.sender,
                approved: true,
            }],
            AssetKind::Fungible => {
                let units = i64::try_from(self.asset_amount)
                    .map_err(|_| format!("asset amount {} too large", self.asset_amount))?;
                vec![
                    AssetLeg::Fungible {
                        asset: self.asset,
                        account: self.receiver,
                        amount: -units,
                        approved: true,
                    },
                    AssetLeg::Fungible {
                        asset: self.asset,
                        account: self.sender,
                        amount: units,
                        approved: false,
                    },
                ]
            }
        };

        Ok(CompositeTransfer {
            spender: Some(self.spender),
            currency,
            assets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AccountRef;

    fn instruction(kind: AssetKind) -> TransferInstruction {
        TransferInstruction {
            spender: AccountId::new(0, 0, 5005),
            sender: AccountId::new(0, 0, 1001),
            receiver: AccountId::new(0, 0, 2),
            asset: AssetId::new(0, 0, 1002),
            asset_kind: kind,
            asset_amount: 1,
            native_amount: 3_300_000_000,
        }
    }

    #[test]
    fn test_serial_moves_against_currency() {
        let composite = instruction(AssetKind::NonFungible).to_composite().unwrap();

        assert_eq!(composite.spender, Some(AccountId::new(0, 0, 5005)));
        assert_eq!(composite.currency.len(), 2);
        assert_eq!(composite.currency[0].account, AccountRef::Id(AccountId::new(0, 0, 1001)));
        assert_eq!(composite.currency[0].amount, -3_300_000_000);
        assert!(composite.currency[0].approved);
        assert_eq!(composite.currency[1].amount, 3_300_000_000);

        assert_eq!(
            composite.assets,
            vec![AssetLeg::Serial {
                asset: AssetId::new(0, 0, 1002),
                serial: 1,
                from: AccountId::new(0, 0, 2),
                to: AccountId::new(0, 0, 1001),
                approved: true,
            }]
        );
    }

    #[test]
    fn test_fungible_legs_sum_to_zero() {
        let composite = instruction(AssetKind::Fungible).to_composite().unwrap();
        let total: i64 = composite
            .assets
            .iter()
            .map(|leg| match leg {
                AssetLeg::Fungible { amount, .. } => *amount,
                AssetLeg::Serial { .. } => panic!("unexpected serial leg"),
            })
            .sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_zero_price_has_no_currency_legs() {
        let mut free = instruction(AssetKind::NonFungible);
        free.native_amount = 0;
        assert!(free.to_composite().unwrap().currency.is_empty());
    }

    #[test]
    fn test_oversized_amount_rejected() {
        let mut huge = instruction(AssetKind::NonFungible);
        huge.native_amount = u64::MAX;
        assert!(huge.to_composite().is_err());
    }

    #[test]
    fn test_allowance_to_grant() {
        let allowance = Allowance {
            owner: AccountId::new(0, 0, 1001),
            spender: AccountId::new(0, 0, 5005),
            resource: AllowanceResource::Currency { amount: 66 },
        };
        assert_eq!(
            allowance.to_grant(),
            AllowanceGrant::Currency {
                owner: AccountId::new(0, 0, 1001),
                spender: AccountId::new(0, 0, 5005),
                amount: 66,
            }
        );
    }
}
