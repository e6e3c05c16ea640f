//! Transfer Orchestrator errors
//!
//! Failures after the pending record exists carry the record itself, so a
//! caller always gets the audit trail together with the cause.

use thiserror::Error;

use crate::account::BalanceError;
use crate::core_types::{AccountId, Currency, TransactionId};
use crate::transaction::{StoreError, Transaction};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Malformed request; rejected before any state was created
    #[error("Invalid transfer request: {0}")]
    Validation(String),

    #[error("Currency mismatch: transfer in {requested}, source holds {source_currency}, destination holds {destination_currency}")]
    CurrencyMismatch {
        requested: Currency,
        source_currency: Currency,
        destination_currency: Currency,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Transaction not found: {0}")]
    NotFound(TransactionId),

    /// Key collided on create but the winning record could not be read back
    #[error("Duplicate idempotency key: {0}")]
    DuplicateIdempotencyKey(String),

    /// Source debit rejected; nothing moved
    #[error("Debit failed: {cause}")]
    DebitFailed {
        transaction: Box<Transaction>,
        cause: BalanceError,
    },

    /// Destination credit failed after the source debit landed
    #[error("Credit failed after debit: {cause} (compensated: {compensated})")]
    PartialFailure {
        transaction: Box<Transaction>,
        cause: BalanceError,
        compensated: bool,
    },

    /// Balance Keeper unreachable or outcome unknown. When a record exists it
    /// stays pending and the reconciler re-drives it.
    #[error("Balance keeper unavailable: {cause}")]
    DownstreamUnavailable {
        transaction: Option<Box<Transaction>>,
        cause: String,
    },

    /// Another driver holds the pending record; it will resolve it
    #[error("Transfer {} is being driven by another worker", .0.id)]
    InProgress(Box<Transaction>),

    /// Another driver resolved the record with a different outcome
    #[error("Transfer {} was resolved elsewhere as {}", .0.id, .0.status)]
    Superseded(Box<Transaction>),

    #[error("Transaction store error: {0}")]
    Store(#[from] StoreError),
}

impl TransferError {
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation(_) => "VALIDATION_ERROR",
            TransferError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            TransferError::AccountNotFound(_) | TransferError::NotFound(_) => "NOT_FOUND",
            TransferError::DuplicateIdempotencyKey(_) => "DUPLICATE_IDEMPOTENCY_KEY",
            TransferError::DebitFailed { cause, .. } => cause.code(),
            TransferError::PartialFailure { .. } => "PARTIAL_FAILURE",
            TransferError::DownstreamUnavailable { .. } => "DOWNSTREAM_UNAVAILABLE",
            TransferError::InProgress(_) => "TRANSFER_IN_PROGRESS",
            TransferError::Superseded(_) => "TRANSFER_SUPERSEDED",
            TransferError::Store(e) => e.code(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Validation(_) => 400,
            TransferError::AccountNotFound(_) | TransferError::NotFound(_) => 404,
            TransferError::DuplicateIdempotencyKey(_)
            | TransferError::InProgress(_)
            | TransferError::Superseded(_) => 409,
            TransferError::CurrencyMismatch { .. }
            | TransferError::DebitFailed { .. }
            | TransferError::PartialFailure { .. } => 422,
            TransferError::DownstreamUnavailable { .. } => 503,
            TransferError::Store(e) => e.http_status(),
        }
    }

    /// The transaction record this failure left behind, if any
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            TransferError::DebitFailed { transaction, .. }
            | TransferError::PartialFailure { transaction, .. } => Some(transaction.as_ref()),
            TransferError::DownstreamUnavailable { transaction, .. } => transaction.as_deref(),
            TransferError::InProgress(transaction) | TransferError::Superseded(transaction) => {
                Some(transaction.as_ref())
            }
            _ => None,
        }
    }
}
