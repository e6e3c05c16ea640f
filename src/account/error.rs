//! Balance Keeper error taxonomy

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::AccountStatus;
use crate::core_types::{AccountId, Currency};

/// Errors returned by the Balance Keeper and the account store.
///
/// Serializable so the RPC layer can ship the exact variant across the
/// service boundary and the client can rebuild it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BalanceError {
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    #[error("Account {account_id} is not active: {status}")]
    AccountNotActive {
        account_id: AccountId,
        status: AccountStatus,
    },

    #[error("Insufficient funds on {account_id}: available {available}, adjustment {adjustment}")]
    InsufficientFunds {
        account_id: AccountId,
        available: i64,
        adjustment: i64,
    },

    #[error("Currency mismatch: account holds {account}, request uses {requested}")]
    CurrencyMismatch {
        account: Currency,
        requested: Currency,
    },

    #[error("Adjustment amount must be non-zero")]
    InvalidAmount,

    #[error("Adjustment reference must be non-empty and at most 100 characters")]
    InvalidReference,

    #[error("Account name must be non-empty and at most 255 characters")]
    InvalidAccountName,

    #[error("Balance arithmetic overflow")]
    Overflow,

    #[error("Reference '{reference}' already applied with adjustment {recorded}")]
    ReferenceConflict { reference: String, recorded: i64 },

    #[error("Concurrent modification on account {0}")]
    ConcurrentModification(AccountId),

    #[error("Account number already exists: {0}")]
    DuplicateAccountNumber(String),

    #[error("Balance keeper unavailable: {0}")]
    DownstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl BalanceError {
    /// Stable error code for RPC responses
    pub fn code(&self) -> &'static str {
        match self {
            BalanceError::NotFound(_) => "NOT_FOUND",
            BalanceError::AccountNotActive { .. } => "ACCOUNT_NOT_ACTIVE",
            BalanceError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            BalanceError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            BalanceError::InvalidAmount => "INVALID_AMOUNT",
            BalanceError::InvalidReference => "INVALID_REFERENCE",
            BalanceError::InvalidAccountName => "INVALID_ACCOUNT_NAME",
            BalanceError::Overflow => "OVERFLOW",
            BalanceError::ReferenceConflict { .. } => "REFERENCE_CONFLICT",
            BalanceError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            BalanceError::DuplicateAccountNumber(_) => "DUPLICATE_ACCOUNT_NUMBER",
            BalanceError::DownstreamUnavailable(_) => "DOWNSTREAM_UNAVAILABLE",
            BalanceError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// HTTP status suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            BalanceError::InvalidAmount
            | BalanceError::InvalidReference
            | BalanceError::InvalidAccountName => 400,
            BalanceError::NotFound(_) => 404,
            BalanceError::ReferenceConflict { .. }
            | BalanceError::ConcurrentModification(_)
            | BalanceError::DuplicateAccountNumber(_) => 409,
            BalanceError::AccountNotActive { .. }
            | BalanceError::InsufficientFunds { .. }
            | BalanceError::CurrencyMismatch { .. }
            | BalanceError::Overflow => 422,
            BalanceError::Database(_) => 500,
            BalanceError::DownstreamUnavailable(_) => 503,
        }
    }

    /// True when the adjustment was definitely not applied by a business rule
    /// (as opposed to a transport or storage failure with unknown outcome).
    pub fn is_business_rejection(&self) -> bool {
        !matches!(
            self,
            BalanceError::DownstreamUnavailable(_)
                | BalanceError::Database(_)
                | BalanceError::ConcurrentModification(_)
        )
    }
}

impl From<sqlx::Error> for BalanceError {
    fn from(e: sqlx::Error) -> Self {
        BalanceError::Database(e.to_string())
    }
}
