//! In-memory account store
//!
//! Used for tests and for single-process deployments without PostgreSQL.
//! Every unit of work runs under one mutex, so the account update and the
//! ledger append are observed together or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::error::BalanceError;
use super::models::{Account, AccountStatus, BalanceAdjustment, LedgerEntry};
use super::store::AccountStore;
use crate::core_types::AccountId;

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    numbers: HashSet<String>,
    ledger: HashMap<AccountId, Vec<LedgerEntry>>,
}

#[derive(Default)]
pub struct InMemoryAccountStore {
    inner: Mutex<Inner>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Total number of ledger rows across all accounts
    pub fn entry_count(&self) -> usize {
        self.lock().ledger.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(
        &self,
        account: &Account,
        opening_entry: Option<&LedgerEntry>,
    ) -> Result<(), BalanceError> {
        let mut inner = self.lock();
        if inner.numbers.contains(&account.account_number) {
            return Err(BalanceError::DuplicateAccountNumber(
                account.account_number.clone(),
            ));
        }
        inner.numbers.insert(account.account_number.clone());
        inner.accounts.insert(account.id, account.clone());
        let entries = inner.ledger.entry(account.id).or_default();
        if let Some(entry) = opening_entry {
            entries.push(entry.clone());
        }
        Ok(())
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>, BalanceError> {
        Ok(self.lock().accounts.get(&id).cloned())
    }

    async fn set_status(
        &self,
        id: AccountId,
        status: AccountStatus,
        at: DateTime<Utc>,
    ) -> Result<Account, BalanceError> {
        let mut inner = self.lock();
        let account = inner
            .accounts
            .get_mut(&id)
            .ok_or(BalanceError::NotFound(id))?;
        account.status = status;
        account.version += 1;
        account.updated_at = at;
        Ok(account.clone())
    }

    async fn apply_adjustment(
        &self,
        adjustment: &BalanceAdjustment,
    ) -> Result<Account, BalanceError> {
        let mut inner = self.lock();
        let Inner {
            accounts, ledger, ..
        } = &mut *inner;

        let account = accounts
            .get_mut(&adjustment.account_id)
            .ok_or(BalanceError::NotFound(adjustment.account_id))?;
        if account.version != adjustment.expected_version {
            return Err(BalanceError::ConcurrentModification(adjustment.account_id));
        }

        let entries = ledger.entry(adjustment.account_id).or_default();
        if entries
            .iter()
            .any(|e| e.reference == adjustment.entry.reference)
        {
            return Err(BalanceError::ConcurrentModification(adjustment.account_id));
        }

        account.balance = adjustment.new_balance;
        account.available_balance = adjustment.new_available_balance;
        account.version += 1;
        account.updated_at = adjustment.updated_at;
        entries.push(adjustment.entry.clone());

        Ok(account.clone())
    }

    async fn find_entry_by_reference(
        &self,
        id: AccountId,
        reference: &str,
    ) -> Result<Option<LedgerEntry>, BalanceError> {
        Ok(self
            .lock()
            .ledger
            .get(&id)
            .and_then(|entries| entries.iter().find(|e| e.reference == reference))
            .cloned())
    }

    async fn list_entries(&self, id: AccountId) -> Result<Vec<LedgerEntry>, BalanceError> {
        Ok(self.lock().ledger.get(&id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::models::EntryType;
    use crate::core_types::{Currency, CustomerId, LedgerEntryId};
    use uuid::Uuid;

    fn account(n: u128, number: &str) -> Account {
        let now = Utc::now();
        Account {
            id: AccountId::from_uuid(Uuid::from_u128(n)),
            customer_id: CustomerId::from_uuid(Uuid::from_u128(100)),
            account_number: number.to_string(),
            name: "Checking".to_string(),
            currency: Currency::new("DKK").unwrap(),
            balance: 0,
            available_balance: 0,
            reserved_amount: 0,
            status: AccountStatus::Active,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn adjustment(acc: &Account, amount: i64, reference: &str) -> BalanceAdjustment {
        BalanceAdjustment {
            account_id: acc.id,
            expected_version: acc.version,
            new_balance: acc.balance + amount,
            new_available_balance: acc.available_balance + amount,
            updated_at: Utc::now(),
            entry: LedgerEntry {
                id: LedgerEntryId::from_uuid(Uuid::new_v4()),
                account_id: acc.id,
                transaction_id: None,
                entry_type: EntryType::for_adjustment(amount),
                amount: amount.abs(),
                balance_before: acc.balance,
                balance_after: acc.balance + amount,
                description: String::new(),
                reference: reference.to_string(),
                entry_date: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_duplicate_account_number_rejected() {
        let store = InMemoryAccountStore::new();
        store.insert(&account(1, "DK9900"), None).await.unwrap();
        let err = store.insert(&account(2, "DK9900"), None).await.unwrap_err();
        assert_eq!(err, BalanceError::DuplicateAccountNumber("DK9900".into()));
    }

    #[tokio::test]
    async fn test_stale_version_rejected_without_side_effects() {
        let store = InMemoryAccountStore::new();
        let acc = account(1, "DK9901");
        store.insert(&acc, None).await.unwrap();

        store
            .apply_adjustment(&adjustment(&acc, 500, "a"))
            .await
            .unwrap();

        // Same expected version again: another writer got there first
        let err = store
            .apply_adjustment(&adjustment(&acc, 100, "b"))
            .await
            .unwrap_err();
        assert_eq!(err, BalanceError::ConcurrentModification(acc.id));

        let stored = store.get(acc.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 500);
        assert_eq!(stored.version, 1);
        assert_eq!(store.list_entries(acc.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let store = InMemoryAccountStore::new();
        let acc = account(1, "DK9902");
        store.insert(&acc, None).await.unwrap();
        let updated = store
            .apply_adjustment(&adjustment(&acc, 500, "same"))
            .await
            .unwrap();

        let err = store
            .apply_adjustment(&adjustment(&updated, 500, "same"))
            .await
            .unwrap_err();
        assert_eq!(err, BalanceError::ConcurrentModification(acc.id));
        assert!(
            store
                .find_entry_by_reference(acc.id, "same")
                .await
                .unwrap()
                .is_some()
        );
    }
}
