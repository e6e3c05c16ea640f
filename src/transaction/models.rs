//! Transaction record data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::{AccountId, Currency, ParseError, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "transfer",
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Payment => "payment",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(TransactionType::Transfer),
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "payment" => Ok(TransactionType::Payment),
            other => Err(ParseError::Identifier(format!("transaction type '{}'", other))),
        }
    }
}

/// Transaction lifecycle.
///
/// ```text
/// Pending ──► Completed
///    │
///    └──────► Failed
/// ```
/// `Cancelled` is terminal and reserved; no flow produces it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            other => Err(ParseError::Identifier(format!("transaction status '{}'", other))),
        }
    }
}

/// Outcome of the compensating credit for a failed transfer.
///
/// `Unresolved` means money left the source and was neither credited to the
/// destination nor returned. The reconciler retries these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompensationState {
    #[default]
    NotRequired,
    Applied,
    Unresolved,
}

impl CompensationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompensationState::NotRequired => "not_required",
            CompensationState::Applied => "applied",
            CompensationState::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for CompensationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompensationState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_required" => Ok(CompensationState::NotRequired),
            "applied" => Ok(CompensationState::Applied),
            "unresolved" => Ok(CompensationState::Unresolved),
            other => Err(ParseError::Identifier(format!("compensation state '{}'", other))),
        }
    }
}

/// Durable record of a requested money movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub source_account_id: Option<AccountId>,
    pub destination_account_id: Option<AccountId>,
    /// Positive magnitude, minor units
    pub amount: i64,
    pub currency: Currency,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub reference: String,
    pub description: String,
    pub idempotency_key: String,
    #[serde(default)]
    pub compensation: CompensationState,
    /// Driver lease counter, bumped by every claim and by resolution
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// New pending transfer record
    #[allow(clippy::too_many_arguments)]
    pub fn pending_transfer(
        id: TransactionId,
        source: AccountId,
        destination: AccountId,
        amount: i64,
        currency: Currency,
        reference: impl Into<String>,
        description: impl Into<String>,
        idempotency_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            source_account_id: Some(source),
            destination_account_id: Some(destination),
            amount,
            currency,
            transaction_type: TransactionType::Transfer,
            status: TransactionStatus::Pending,
            reference: reference.into(),
            description: description.into(),
            idempotency_key: idempotency_key.into(),
            compensation: CompensationState::NotRequired,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `account` is the source or the destination
    pub fn involves(&self, account: AccountId) -> bool {
        self.source_account_id == Some(account) || self.destination_account_id == Some(account)
    }
}
