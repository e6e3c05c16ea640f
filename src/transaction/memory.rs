//! In-memory transaction record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::error::StoreError;
use super::models::{CompensationState, Transaction, TransactionStatus};
use super::store::TransactionStore;
use crate::core_types::{AccountId, TransactionId};

#[derive(Default)]
struct Inner {
    by_id: HashMap<TransactionId, Transaction>,
    by_key: HashMap<String, TransactionId>,
}

#[derive(Default)]
pub struct InMemoryTransactionStore {
    inner: Mutex<Inner>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.by_key.contains_key(&tx.idempotency_key) {
            return Err(StoreError::DuplicateKey(tx.idempotency_key.clone()));
        }
        inner.by_key.insert(tx.idempotency_key.clone(), tx.id);
        inner.by_id.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        Ok(self.lock().by_id.get(&id).cloned())
    }

    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .by_key
            .get(key)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn resolve(
        &self,
        id: TransactionId,
        seen_version: i64,
        status: TransactionStatus,
        description: &str,
        compensation: CompensationState,
        at: DateTime<Utc>,
    ) -> Result<Transaction, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::InvalidTransition(status));
        }
        let mut inner = self.lock();
        let tx = inner.by_id.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if tx.status.is_terminal() {
            return Err(StoreError::AlreadyTerminal {
                id,
                status: tx.status,
            });
        }
        if tx.version != seen_version {
            return Err(StoreError::VersionConflict {
                id,
                version: tx.version,
            });
        }
        tx.status = status;
        tx.description = description.to_string();
        tx.compensation = compensation;
        tx.version += 1;
        tx.updated_at = at;
        Ok(tx.clone())
    }

    async fn claim(
        &self,
        id: TransactionId,
        seen_version: i64,
        stale_before: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut inner = self.lock();
        let tx = inner.by_id.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let stale = stale_before.is_none_or(|cutoff| tx.updated_at < cutoff);
        if tx.status != TransactionStatus::Pending || tx.version != seen_version || !stale {
            return Ok(None);
        }
        tx.version += 1;
        tx.updated_at = at;
        Ok(Some(tx.clone()))
    }

    async fn list_by_account(
        &self,
        account: AccountId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Transaction>, u64), StoreError> {
        let inner = self.lock();
        let mut matching: Vec<&Transaction> =
            inner.by_id.values().filter(|t| t.involves(account)).collect();
        matching.sort_by_key(|t| Reverse((t.created_at, t.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Transaction>, StoreError> {
        let inner = self.lock();
        let mut stale: Vec<&Transaction> = inner
            .by_id
            .values()
            .filter(|t| t.status == TransactionStatus::Pending && t.updated_at < older_than)
            .collect();
        stale.sort_by_key(|t| (t.created_at, t.id));
        Ok(stale.into_iter().take(limit as usize).cloned().collect())
    }

    async fn find_unresolved_compensations(
        &self,
        limit: u32,
    ) -> Result<Vec<Transaction>, StoreError> {
        let inner = self.lock();
        let mut unresolved: Vec<&Transaction> = inner
            .by_id
            .values()
            .filter(|t| {
                t.status == TransactionStatus::Failed
                    && t.compensation == CompensationState::Unresolved
            })
            .collect();
        unresolved.sort_by_key(|t| (t.created_at, t.id));
        Ok(unresolved.into_iter().take(limit as usize).cloned().collect())
    }

    async fn mark_compensation_applied(
        &self,
        id: TransactionId,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let tx = inner.by_id.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if tx.compensation != CompensationState::Unresolved {
            return Ok(false);
        }
        tx.compensation = CompensationState::Applied;
        tx.description = description.to_string();
        tx.updated_at = at;
        Ok(true)
    }
}
