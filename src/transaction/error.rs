//! Transaction Record Store errors

use thiserror::Error;

use super::models::TransactionStatus;
use crate::core_types::TransactionId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transaction not found: {0}")]
    NotFound(TransactionId),

    /// Idempotency key already taken; distinct from a generic write failure
    #[error("Duplicate idempotency key: {0}")]
    DuplicateKey(String),

    #[error("Transaction {id} already resolved as {status}")]
    AlreadyTerminal {
        id: TransactionId,
        status: TransactionStatus,
    },

    /// Still pending, but claimed by another driver since `seen_version`
    #[error("Transaction {id} is held by another driver (version {version})")]
    VersionConflict { id: TransactionId, version: i64 },

    #[error("Cannot resolve a transaction to non-terminal status {0}")]
    InvalidTransition(TransactionStatus),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::DuplicateKey(_) => "DUPLICATE_IDEMPOTENCY_KEY",
            StoreError::AlreadyTerminal { .. } => "ALREADY_TERMINAL",
            StoreError::VersionConflict { .. } => "VERSION_CONFLICT",
            StoreError::InvalidTransition(_) => "INVALID_TRANSITION",
            StoreError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            StoreError::NotFound(_) => 404,
            StoreError::DuplicateKey(_)
            | StoreError::AlreadyTerminal { .. }
            | StoreError::VersionConflict { .. } => 409,
            StoreError::InvalidTransition(_) | StoreError::Database(_) => 500,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
