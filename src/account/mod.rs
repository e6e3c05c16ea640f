//! Account service: Balance Keeper and Ledger Store
//!
//! The keeper is the only writer of balances. Stores persist an account
//! update and its ledger entry as one unit of work.

pub mod error;
pub mod keeper;
pub mod ledger;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::BalanceError;
pub use keeper::{
    BalanceKeeper, LedgerBalanceKeeper, MAX_ACCOUNT_NAME_LEN, MAX_REFERENCE_LEN, OPENING_REFERENCE,
};
pub use ledger::{LedgerViolation, verify_ledger_chain};
pub use memory::InMemoryAccountStore;
pub use models::{
    Account, AccountStatus, AdjustBalanceRequest, AdjustBalanceResponse, EntryType, LedgerEntry,
    OpenAccountRequest,
};
pub use postgres::PgAccountStore;
pub use store::AccountStore;
