//! # Royalty Transfer Client
//!
//! Drives a ledger through a delegated currency-for-asset exchange:
//! provisions accounts, creates and mints assets (optionally carrying a
//! royalty schedule), grants a contract spender its allowances, executes
//! the exchange atomically and verifies how the price was split.
//!
//! ## Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | `config` | environment-driven `AppConfig` |
//! | `error` | crate `Error` and `Result` |
//! | `ledger` | identifiers, operations, receipts, `LedgerNetwork` backends |
//! | `directory` | contract-address lookup |
//! | `models` | `Asset`, `Account`, `Allowance`, `TransferInstruction` |
//! | `services` | the orchestration components |
//! | `workflows` | the plain and royalty exchanges end to end |
//! | `utils` | unit conversion and formatting |

pub mod config;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflows;

pub use config::{AppConfig, NetworkMode, Operator};
pub use error::{Error, Result};
pub use services::Services;
