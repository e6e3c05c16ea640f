//! Transaction Record Store seam

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StoreError;
use super::models::{CompensationState, Transaction, TransactionStatus};
use crate::core_types::{AccountId, TransactionId};

/// Durable saga log, independent of the ledger.
///
/// The idempotency key is unique. Status moves out of `Pending` exactly once.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist a new record. Fails with [`StoreError::DuplicateKey`] when the
    /// idempotency key is taken.
    async fn create(&self, tx: &Transaction) -> Result<(), StoreError>;

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, StoreError>;

    /// Compare-and-set from `Pending` at `seen_version` to a terminal `status`.
    ///
    /// A second resolution fails with [`StoreError::AlreadyTerminal`]; a
    /// driver whose claim was taken over fails with
    /// [`StoreError::VersionConflict`].
    async fn resolve(
        &self,
        id: TransactionId,
        seen_version: i64,
        status: TransactionStatus,
        description: &str,
        compensation: CompensationState,
        at: DateTime<Utc>,
    ) -> Result<Transaction, StoreError>;

    /// Take or renew the right to drive a `Pending` record.
    ///
    /// Compare-and-set on `version`: succeeds only while the record is still
    /// `Pending` at `seen_version` and, when `stale_before` is given, was last
    /// touched before it. A successful claim bumps `version` and sets
    /// `updated_at = at`; `None` means another driver holds the record or it
    /// is already terminal.
    async fn claim(
        &self,
        id: TransactionId,
        seen_version: i64,
        stale_before: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Records where `account` is source or destination, newest first
    /// (ties broken by id), plus the total count.
    async fn list_by_account(
        &self,
        account: AccountId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Transaction>, u64), StoreError>;

    /// `Pending` records last touched before `older_than`, oldest first
    async fn find_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// `Failed` records whose compensating credit never landed, oldest first
    async fn find_unresolved_compensations(
        &self,
        limit: u32,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// CAS `Unresolved -> Applied`. Returns false when the record was not
    /// unresolved (someone else already settled it).
    async fn mark_compensation_applied(
        &self,
        id: TransactionId,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
