//! Account and ledger data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core_types::{
    AccountId, Currency, CustomerId, LedgerEntryId, Money, ParseError, TransactionId,
};

/// Account lifecycle status. Only `Active` accounts accept adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
    Dormant,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Frozen => "frozen",
            AccountStatus::Closed => "closed",
            AccountStatus::Dormant => "dormant",
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "frozen" => Ok(AccountStatus::Frozen),
            "closed" => Ok(AccountStatus::Closed),
            "dormant" => Ok(AccountStatus::Dormant),
            other => Err(ParseError::Identifier(format!("account status '{}'", other))),
        }
    }
}

/// Account snapshot as owned by the account service.
///
/// # Invariants
/// - `available_balance >= 0`
/// - `balance == available_balance + reserved_amount`
/// - only [`super::LedgerBalanceKeeper`] mutates the balance fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub customer_id: CustomerId,
    pub account_number: String,
    pub name: String,
    pub currency: Currency,
    pub balance: i64,
    pub available_balance: i64,
    pub reserved_amount: i64,
    pub status: AccountStatus,
    /// Optimistic concurrency token, bumped on every balance write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn balance_money(&self) -> Money {
        Money::new(self.balance, self.currency.clone())
    }
}

/// Ledger entry direction. The sign of an entry is implied by its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    /// `credit` for `adjustment >= 0`, `debit` otherwise
    pub fn for_adjustment(adjustment: i64) -> Self {
        if adjustment >= 0 {
            EntryType::Credit
        } else {
            EntryType::Debit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "debit",
            EntryType::Credit => "credit",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(EntryType::Debit),
            "credit" => Ok(EntryType::Credit),
            other => Err(ParseError::Identifier(format!("entry type '{}'", other))),
        }
    }
}

/// Immutable record of one balance-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub account_id: AccountId,
    pub transaction_id: Option<TransactionId>,
    pub entry_type: EntryType,
    /// Positive magnitude
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: String,
    pub reference: String,
    pub entry_date: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed effect of this entry on the balance
    pub fn signed_amount(&self) -> i64 {
        match self.entry_type {
            EntryType::Credit => self.amount,
            EntryType::Debit => -self.amount,
        }
    }
}

/// `AdjustBalance` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustBalanceRequest {
    pub account_id: AccountId,
    /// Signed minor units: negative debits, positive credits
    pub amount_adjustment: i64,
    /// Idempotency scope together with `account_id`
    pub reference: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    /// When present the account currency must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

impl AdjustBalanceRequest {
    pub fn new(
        account_id: AccountId,
        amount_adjustment: i64,
        reference: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            amount_adjustment,
            reference: reference.into(),
            description: description.into(),
            transaction_id: None,
            currency: None,
        }
    }

    pub fn for_transaction(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    pub fn expecting_currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }
}

/// `AdjustBalance` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustBalanceResponse {
    pub new_balance: Money,
    pub available_balance: i64,
    pub entry_id: LedgerEntryId,
    /// True when the `(account, reference)` pair had already been applied
    #[serde(default)]
    pub replayed: bool,
}

/// One unit of work handed to the store: the new account snapshot and the
/// ledger row that explains it. Stores apply both or neither.
#[derive(Debug, Clone)]
pub struct BalanceAdjustment {
    pub account_id: AccountId,
    pub expected_version: i64,
    pub new_balance: i64,
    pub new_available_balance: i64,
    pub updated_at: DateTime<Utc>,
    pub entry: LedgerEntry,
}

/// Account opening input (account administration, not part of the saga).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccountRequest {
    pub customer_id: CustomerId,
    pub name: String,
    pub currency: Currency,
    #[serde(default)]
    pub opening_balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_for_adjustment() {
        assert_eq!(EntryType::for_adjustment(10), EntryType::Credit);
        assert_eq!(EntryType::for_adjustment(0), EntryType::Credit);
        assert_eq!(EntryType::for_adjustment(-1), EntryType::Debit);
    }

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            AccountStatus::Active,
            AccountStatus::Frozen,
            AccountStatus::Closed,
            AccountStatus::Dormant,
        ] {
            assert_eq!(status.as_str().parse::<AccountStatus>().unwrap(), status);
        }
        assert!("suspended".parse::<AccountStatus>().is_err());
    }

    #[test]
    fn test_adjust_request_json_defaults() {
        let id = AccountId::from_uuid(uuid::Uuid::from_u128(9));
        let json = format!(
            r#"{{"account_id":"{}","amount_adjustment":-300,"reference":"r1"}}"#,
            id
        );
        let req: AdjustBalanceRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.amount_adjustment, -300);
        assert!(req.description.is_empty());
        assert!(req.transaction_id.is_none());
        assert!(req.currency.is_none());
    }
}
