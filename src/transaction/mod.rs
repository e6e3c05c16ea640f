//! Transaction Record Store
//!
//! Durable record of each requested transfer, keyed by a unique idempotency
//! token. Independent of the ledger: nothing here touches balances.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use memory::InMemoryTransactionStore;
pub use models::{CompensationState, Transaction, TransactionStatus, TransactionType};
pub use postgres::PgTransactionStore;
pub use store::TransactionStore;
