//! Transfer Orchestrator
//!
//! Saga coordinator for money movement between two accounts owned by the
//! Balance Keeper. The transaction record is the durable saga log.

pub mod error;
pub mod orchestrator;
pub mod reconciler;
pub mod request;

#[cfg(test)]
pub mod mock;

pub use error::TransferError;
pub use orchestrator::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, TransactionPage, TransferOrchestrator, TransferOutcome,
    compensation_reference, credit_reference, debit_reference, normalize_page,
};
pub use reconciler::{ReconcileReport, Reconciler, ReconcilerConfig};
pub use request::{MAX_IDEMPOTENCY_KEY_LEN, TransferRequest};
