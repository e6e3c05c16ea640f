//! Account + ledger persistence seam

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::BalanceError;
use super::models::{Account, AccountStatus, BalanceAdjustment, LedgerEntry};
use crate::core_types::AccountId;

/// Durable home of account snapshots and their ledger.
///
/// `apply_adjustment` is the only balance write. Implementations MUST apply
/// the account update and the ledger append as one unit of work, and MUST
/// reject it with [`BalanceError::ConcurrentModification`] when the stored
/// version no longer equals `expected_version` or the `(account, reference)`
/// pair already has an entry.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account, optionally with its opening ledger entry.
    ///
    /// Fails with [`BalanceError::DuplicateAccountNumber`] on number collision.
    async fn insert(
        &self,
        account: &Account,
        opening_entry: Option<&LedgerEntry>,
    ) -> Result<(), BalanceError>;

    async fn get(&self, id: AccountId) -> Result<Option<Account>, BalanceError>;

    async fn set_status(
        &self,
        id: AccountId,
        status: AccountStatus,
        at: DateTime<Utc>,
    ) -> Result<Account, BalanceError>;

    /// Apply one balance adjustment; returns the updated account.
    async fn apply_adjustment(&self, adjustment: &BalanceAdjustment)
    -> Result<Account, BalanceError>;

    async fn find_entry_by_reference(
        &self,
        id: AccountId,
        reference: &str,
    ) -> Result<Option<LedgerEntry>, BalanceError>;

    /// Ledger of one account in creation order
    async fn list_entries(&self, id: AccountId) -> Result<Vec<LedgerEntry>, BalanceError>;
}
