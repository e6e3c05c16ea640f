//! Ledger Saga - money movement between ledgered accounts
//!
//! Two cooperating services:
//! - the account service owns balances and the append-only ledger
//! - the transaction service owns the saga log and drives transfers as
//!   debit, credit, and on credit failure a compensating refund
//!
//! # Modules
//!
//! - [`core_types`] - Identifier newtypes and currency codes
//! - [`clock`] - Injected time, id and account-number providers
//! - [`account`] - Balance Keeper and Ledger Store
//! - [`transaction`] - Transaction Record Store
//! - [`transfer`] - Transfer Orchestrator and Reconciler
//! - [`rpc`] - JSON-over-HTTP surface and the remote Balance Keeper client
//! - [`config`] / [`logging`] / [`db`] - Process plumbing

// Core types - must be first!
pub mod core_types;

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;

pub mod account;
pub mod rpc;
pub mod transaction;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{BalanceError, BalanceKeeper, LedgerBalanceKeeper};
pub use core_types::{AccountId, Currency, CustomerId, TransactionId};
pub use transaction::{Transaction, TransactionStatus, TransactionStore};
pub use transfer::{TransferError, TransferOrchestrator, TransferRequest};
