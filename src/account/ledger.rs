//! Ledger chain verification
//!
//! For a given account, entries in creation order must reconstruct the
//! balance by running sum. This is the check any repair job runs after a
//! crash between the account update and the ledger append.

use serde::{Deserialize, Serialize};

use super::models::{Account, LedgerEntry};
use crate::core_types::LedgerEntryId;

/// One broken link in an account's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerViolation {
    /// Entry belongs to another account
    ForeignEntry { entry_id: LedgerEntryId },
    /// `amount` must be a positive magnitude
    NonPositiveAmount { entry_id: LedgerEntryId, amount: i64 },
    /// `balance_after - balance_before` disagrees with the signed amount
    AmountMismatch {
        entry_id: LedgerEntryId,
        expected_delta: i64,
        recorded_delta: i64,
    },
    /// `balance_before` of this entry is not the previous `balance_after`
    BrokenChain {
        entry_id: LedgerEntryId,
        previous_after: i64,
        balance_before: i64,
    },
    /// Running sum does not land on the account balance
    BalanceMismatch { ledger_balance: i64, account_balance: i64 },
}

/// Check `entries` (creation order) against `account`.
///
/// An empty ledger is consistent only with a zero balance. The first entry
/// must start from zero.
pub fn verify_ledger_chain(account: &Account, entries: &[LedgerEntry]) -> Vec<LedgerViolation> {
    let mut violations = Vec::new();
    let mut running = 0i64;

    for entry in entries {
        if entry.account_id != account.id {
            violations.push(LedgerViolation::ForeignEntry { entry_id: entry.id });
            continue;
        }

        if entry.amount <= 0 {
            violations.push(LedgerViolation::NonPositiveAmount {
                entry_id: entry.id,
                amount: entry.amount,
            });
        }

        let recorded_delta = entry.balance_after.wrapping_sub(entry.balance_before);
        if recorded_delta != entry.signed_amount() {
            violations.push(LedgerViolation::AmountMismatch {
                entry_id: entry.id,
                expected_delta: entry.signed_amount(),
                recorded_delta,
            });
        }

        if entry.balance_before != running {
            violations.push(LedgerViolation::BrokenChain {
                entry_id: entry.id,
                previous_after: running,
                balance_before: entry.balance_before,
            });
        }

        running = entry.balance_after;
    }

    if running != account.balance {
        violations.push(LedgerViolation::BalanceMismatch {
            ledger_balance: running,
            account_balance: account.balance,
        });
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::models::{AccountStatus, EntryType};
    use crate::core_types::{AccountId, Currency, CustomerId};
    use chrono::Utc;
    use uuid::Uuid;

    fn account(balance: i64) -> Account {
        let now = Utc::now();
        Account {
            id: AccountId::from_uuid(Uuid::from_u128(1)),
            customer_id: CustomerId::from_uuid(Uuid::from_u128(2)),
            account_number: "DK9900000000000001".into(),
            name: "Checking".into(),
            currency: Currency::new("DKK").unwrap(),
            balance,
            available_balance: balance,
            reserved_amount: 0,
            status: AccountStatus::Active,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn entry(n: u128, entry_type: EntryType, amount: i64, before: i64, after: i64) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::from_uuid(Uuid::from_u128(n)),
            account_id: AccountId::from_uuid(Uuid::from_u128(1)),
            transaction_id: None,
            entry_type,
            amount,
            balance_before: before,
            balance_after: after,
            description: String::new(),
            reference: format!("ref-{}", n),
            entry_date: Utc::now(),
        }
    }

    #[test]
    fn test_consistent_chain() {
        let entries = vec![
            entry(10, EntryType::Credit, 1000, 0, 1000),
            entry(11, EntryType::Debit, 300, 1000, 700),
        ];
        assert!(verify_ledger_chain(&account(700), &entries).is_empty());
    }

    #[test]
    fn test_empty_ledger() {
        assert!(verify_ledger_chain(&account(0), &[]).is_empty());
        assert_eq!(
            verify_ledger_chain(&account(50), &[]),
            vec![LedgerViolation::BalanceMismatch {
                ledger_balance: 0,
                account_balance: 50
            }]
        );
    }

    #[test]
    fn test_missing_entry_detected() {
        // Second entry lost: 1000 -> (debit 300 missing) -> credit 100 from 700
        let entries = vec![
            entry(10, EntryType::Credit, 1000, 0, 1000),
            entry(12, EntryType::Credit, 100, 700, 800),
        ];
        let violations = verify_ledger_chain(&account(800), &entries);
        assert_eq!(
            violations,
            vec![LedgerViolation::BrokenChain {
                entry_id: LedgerEntryId::from_uuid(Uuid::from_u128(12)),
                previous_after: 1000,
                balance_before: 700,
            }]
        );
    }

    #[test]
    fn test_wrong_direction_detected() {
        let entries = vec![entry(10, EntryType::Debit, 1000, 0, 1000)];
        let violations = verify_ledger_chain(&account(1000), &entries);
        assert!(matches!(
            violations.as_slice(),
            [LedgerViolation::AmountMismatch {
                expected_delta: -1000,
                recorded_delta: 1000,
                ..
            }]
        ));
    }
}
