//! # Domain Models
//!
//! Values produced by one component and read by the ones after it. None of
//! them caches ledger balances; balances are always read through a query.
//!
//! ## Organization
//!
//! - `asset.rs` - `Asset`, `Mint`, `Minted`
//! - `account.rs` - `Account`
//! - `transfer.rs` - `Allowance`, `TransferInstruction`

pub mod account;
pub mod asset;
pub mod transfer;

pub use account::Account;
pub use asset::{Asset, Mint, Minted};
pub use transfer::{Allowance, AllowanceResource, TransferInstruction};

pub use crate::ledger::{AssetKind, FeeSchedule};
