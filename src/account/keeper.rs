//! Balance Keeper
//!
//! The only writer of account balances. Every successful adjustment appends
//! exactly one ledger entry in the same unit of work.
//!
//! # Serialization
//! Adjustments on one account are serialized in-process by a per-account
//! async mutex. Stores shared between processes additionally reject stale
//! writes through the `version` column; the keeper re-reads and retries a
//! bounded number of times before giving up with `ConcurrentModification`.
//!
//! # Idempotency
//! `(account_id, reference)` identifies an adjustment. A repeated call with the
//! same pair returns the recorded outcome and mutates nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::BalanceError;
use super::ledger::{LedgerViolation, verify_ledger_chain};
use super::models::{
    Account, AccountStatus, AdjustBalanceRequest, AdjustBalanceResponse, BalanceAdjustment,
    EntryType, LedgerEntry, OpenAccountRequest,
};
use super::store::AccountStore;
use crate::clock::{AccountNumberGenerator, Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::core_types::{AccountId, LedgerEntryId, Money};

/// Longest accepted adjustment reference
pub const MAX_REFERENCE_LEN: usize = 100;

/// Column width of `accounts.account_name`
pub const MAX_ACCOUNT_NAME_LEN: usize = 255;

/// Reference of the ledger entry written when an account opens with funds
pub const OPENING_REFERENCE: &str = "OPEN";

const DEFAULT_MAX_RETRIES: u32 = 3;
const ACCOUNT_NUMBER_ATTEMPTS: u32 = 5;

/// The Balance Keeper contract as seen by the transfer orchestrator.
///
/// Implemented in-process by [`LedgerBalanceKeeper`] and over the network by
/// `rpc::RpcBalanceKeeper`.
#[async_trait]
pub trait BalanceKeeper: Send + Sync {
    /// Human-readable keeper name for logs
    fn name(&self) -> &str;

    /// Atomically apply a signed adjustment and append one ledger entry.
    async fn adjust_balance(
        &self,
        req: AdjustBalanceRequest,
    ) -> Result<AdjustBalanceResponse, BalanceError>;

    async fn get_account(&self, id: AccountId) -> Result<Account, BalanceError>;
}

/// Validate the request shape. Runs before any lookup.
pub fn validate_adjustment(req: &AdjustBalanceRequest) -> Result<(), BalanceError> {
    if req.amount_adjustment == 0 {
        return Err(BalanceError::InvalidAmount);
    }
    let reference = req.reference.trim();
    if reference.is_empty() || reference.chars().count() > MAX_REFERENCE_LEN {
        return Err(BalanceError::InvalidReference);
    }
    Ok(())
}

/// Compute the unit of work for `req` against the current `account` snapshot.
///
/// Pure: no I/O, no clock. A rejection here guarantees nothing was written.
pub fn plan_adjustment(
    account: &Account,
    req: &AdjustBalanceRequest,
    entry_id: LedgerEntryId,
    now: DateTime<Utc>,
) -> Result<BalanceAdjustment, BalanceError> {
    if !account.status.is_active() {
        return Err(BalanceError::AccountNotActive {
            account_id: account.id,
            status: account.status,
        });
    }

    if let Some(requested) = &req.currency
        && *requested != account.currency
    {
        return Err(BalanceError::CurrencyMismatch {
            account: account.currency.clone(),
            requested: requested.clone(),
        });
    }

    let adjustment = req.amount_adjustment;
    let new_available = account
        .available_balance
        .checked_add(adjustment)
        .ok_or(BalanceError::Overflow)?;
    if new_available < 0 {
        return Err(BalanceError::InsufficientFunds {
            account_id: account.id,
            available: account.available_balance,
            adjustment,
        });
    }
    let new_balance = account
        .balance
        .checked_add(adjustment)
        .ok_or(BalanceError::Overflow)?;
    let magnitude = adjustment.checked_abs().ok_or(BalanceError::Overflow)?;

    Ok(BalanceAdjustment {
        account_id: account.id,
        expected_version: account.version,
        new_balance,
        new_available_balance: new_available,
        updated_at: now,
        entry: LedgerEntry {
            id: entry_id,
            account_id: account.id,
            transaction_id: req.transaction_id,
            entry_type: EntryType::for_adjustment(adjustment),
            amount: magnitude,
            balance_before: account.balance,
            balance_after: new_balance,
            description: req.description.clone(),
            reference: req.reference.trim().to_string(),
            entry_date: now,
        },
    })
}

/// [`BalanceKeeper`] over an [`AccountStore`].
pub struct LedgerBalanceKeeper {
    store: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    numbers: AccountNumberGenerator,
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
    max_retries: u32,
}

impl LedgerBalanceKeeper {
    pub fn new(
        store: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        numbers: AccountNumberGenerator,
    ) -> Self {
        Self {
            store,
            clock,
            ids,
            numbers,
            locks: DashMap::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Wall clock, ULID ids, entropy-seeded account numbers
    pub fn with_system_providers(store: Arc<dyn AccountStore>) -> Self {
        Self::new(
            store,
            Arc::new(SystemClock),
            Arc::new(UlidGenerator),
            AccountNumberGenerator::from_entropy(),
        )
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn account_lock(&self, id: AccountId) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().value().clone()
    }

    async fn load(&self, id: AccountId) -> Result<Account, BalanceError> {
        self.store.get(id).await?.ok_or(BalanceError::NotFound(id))
    }

    /// Recorded outcome for an already-applied `(account, reference)` pair
    fn replay(
        account: &Account,
        req: &AdjustBalanceRequest,
        entry: LedgerEntry,
    ) -> Result<AdjustBalanceResponse, BalanceError> {
        let recorded = entry.signed_amount();
        if recorded != req.amount_adjustment {
            return Err(BalanceError::ReferenceConflict {
                reference: entry.reference,
                recorded,
            });
        }
        debug!(
            account_id = %account.id,
            reference = %entry.reference,
            "Adjustment replayed"
        );
        Ok(AdjustBalanceResponse {
            new_balance: Money::new(entry.balance_after, account.currency.clone()),
            available_balance: entry.balance_after - account.reserved_amount,
            entry_id: entry.id,
            replayed: true,
        })
    }

    /// Open a new account, retrying on account-number collision.
    pub async fn open_account(&self, req: OpenAccountRequest) -> Result<Account, BalanceError> {
        if req.opening_balance < 0 {
            return Err(BalanceError::InvalidAmount);
        }
        let name = req.name.trim();
        if name.is_empty() || name.chars().count() > MAX_ACCOUNT_NAME_LEN {
            return Err(BalanceError::InvalidAccountName);
        }

        let mut last_err = None;
        for attempt in 1..=ACCOUNT_NUMBER_ATTEMPTS {
            let now = self.clock.now();
            let account = Account {
                id: AccountId::from_uuid(self.ids.next_uuid()),
                customer_id: req.customer_id,
                account_number: self.numbers.generate(),
                name: name.to_string(),
                currency: req.currency.clone(),
                balance: req.opening_balance,
                available_balance: req.opening_balance,
                reserved_amount: 0,
                status: AccountStatus::Active,
                version: 0,
                created_at: now,
                updated_at: now,
            };
            let opening_entry = (req.opening_balance > 0).then(|| LedgerEntry {
                id: LedgerEntryId::from_uuid(self.ids.next_uuid()),
                account_id: account.id,
                transaction_id: None,
                entry_type: EntryType::Credit,
                amount: req.opening_balance,
                balance_before: 0,
                balance_after: req.opening_balance,
                description: "Account opened".to_string(),
                reference: OPENING_REFERENCE.to_string(),
                entry_date: now,
            });

            match self.store.insert(&account, opening_entry.as_ref()).await {
                Ok(()) => {
                    info!(
                        account_id = %account.id,
                        account_number = %account.account_number,
                        currency = %account.currency,
                        opening_balance = account.balance,
                        "Account opened"
                    );
                    return Ok(account);
                }
                Err(BalanceError::DuplicateAccountNumber(number)) => {
                    warn!(attempt, account_number = %number, "Account number collision, retrying");
                    last_err = Some(BalanceError::DuplicateAccountNumber(number));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(BalanceError::DuplicateAccountNumber(String::new())))
    }

    /// Change lifecycle status. Serialized with adjustments on the same account.
    pub async fn update_status(
        &self,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<Account, BalanceError> {
        let lock = self.account_lock(id);
        let _guard = lock.lock().await;

        let account = self.store.set_status(id, status, self.clock.now()).await?;
        info!(account_id = %id, status = %status, "Account status updated");
        Ok(account)
    }

    /// Ledger of one account in creation order
    pub async fn ledger(&self, id: AccountId) -> Result<Vec<LedgerEntry>, BalanceError> {
        self.load(id).await?;
        self.store.list_entries(id).await
    }

    /// Run the ledger chain check for one account
    pub async fn audit(&self, id: AccountId) -> Result<Vec<LedgerViolation>, BalanceError> {
        let lock = self.account_lock(id);
        let _guard = lock.lock().await;

        let account = self.load(id).await?;
        let entries = self.store.list_entries(id).await?;
        let violations = verify_ledger_chain(&account, &entries);
        if !violations.is_empty() {
            warn!(
                account_id = %id,
                violations = violations.len(),
                "Ledger chain inconsistent"
            );
        }
        Ok(violations)
    }
}

#[async_trait]
impl BalanceKeeper for LedgerBalanceKeeper {
    fn name(&self) -> &str {
        "ledger"
    }

    async fn adjust_balance(
        &self,
        req: AdjustBalanceRequest,
    ) -> Result<AdjustBalanceResponse, BalanceError> {
        validate_adjustment(&req)?;

        let lock = self.account_lock(req.account_id);
        let _guard = lock.lock().await;

        for attempt in 0..=self.max_retries {
            let account = self.load(req.account_id).await?;

            if let Some(entry) = self
                .store
                .find_entry_by_reference(req.account_id, req.reference.trim())
                .await?
            {
                return Self::replay(&account, &req, entry);
            }

            let entry_id = LedgerEntryId::from_uuid(self.ids.next_uuid());
            let plan = plan_adjustment(&account, &req, entry_id, self.clock.now())?;

            match self.store.apply_adjustment(&plan).await {
                Ok(updated) => {
                    info!(
                        account_id = %updated.id,
                        adjustment = req.amount_adjustment,
                        balance_before = plan.entry.balance_before,
                        balance_after = updated.balance,
                        reference = %plan.entry.reference,
                        "Balance adjusted"
                    );
                    return Ok(AdjustBalanceResponse {
                        new_balance: updated.balance_money(),
                        available_balance: updated.available_balance,
                        entry_id,
                        replayed: false,
                    });
                }
                Err(BalanceError::ConcurrentModification(_)) => {
                    debug!(
                        account_id = %req.account_id,
                        attempt,
                        "Version conflict, re-reading account"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            account_id = %req.account_id,
            retries = self.max_retries,
            "Adjustment gave up after repeated version conflicts"
        );
        Err(BalanceError::ConcurrentModification(req.account_id))
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, BalanceError> {
        self.load(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::memory::InMemoryAccountStore;
    use crate::clock::{ManualClock, SequentialIds};
    use crate::core_types::{Currency, CustomerId};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use uuid::Uuid;

    fn dkk() -> Currency {
        Currency::new("DKK").unwrap()
    }

    fn keeper_with(store: Arc<dyn AccountStore>) -> LedgerBalanceKeeper {
        LedgerBalanceKeeper::new(
            store,
            Arc::new(ManualClock::new(Utc::now())),
            Arc::new(SequentialIds::new()),
            AccountNumberGenerator::from_seed(7),
        )
    }

    fn keeper() -> (Arc<InMemoryAccountStore>, LedgerBalanceKeeper) {
        let store = Arc::new(InMemoryAccountStore::new());
        let keeper = keeper_with(store.clone());
        (store, keeper)
    }

    async fn open(keeper: &LedgerBalanceKeeper, opening_balance: i64) -> Account {
        keeper
            .open_account(OpenAccountRequest {
                customer_id: CustomerId::from_uuid(Uuid::from_u128(42)),
                name: "Checking".into(),
                currency: dkk(),
                opening_balance,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_account_writes_opening_entry() {
        let (_, keeper) = keeper();
        let account = open(&keeper, 1000).await;
        assert!(account.account_number.starts_with("DK99"));
        assert_eq!(account.account_number.len(), 18);

        let entries = keeper.ledger(account.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reference, OPENING_REFERENCE);
        assert_eq!(entries[0].balance_after, 1000);

        let empty = open(&keeper, 0).await;
        assert!(keeper.ledger(empty.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_account_rejects_bad_names() {
        let (_, keeper) = keeper();
        let request = |name: String| OpenAccountRequest {
            customer_id: CustomerId::from_uuid(Uuid::from_u128(42)),
            name,
            currency: dkk(),
            opening_balance: 100,
        };

        for name in [String::new(), "   ".to_string(), "x".repeat(MAX_ACCOUNT_NAME_LEN + 1)] {
            let err = keeper.open_account(request(name)).await.unwrap_err();
            assert_eq!(err, BalanceError::InvalidAccountName);
            assert_eq!(err.http_status(), 400);
        }

        let longest = keeper
            .open_account(request("é".repeat(MAX_ACCOUNT_NAME_LEN)))
            .await
            .unwrap();
        assert_eq!(longest.name.chars().count(), MAX_ACCOUNT_NAME_LEN);
        let trimmed = keeper
            .open_account(request("  Savings ".to_string()))
            .await
            .unwrap();
        assert_eq!(trimmed.name, "Savings");
    }

    #[tokio::test]
    async fn test_debit_and_credit() {
        let (store, keeper) = keeper();
        let account = open(&keeper, 1000).await;

        let resp = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, -300, "r1", "rent"))
            .await
            .unwrap();
        assert_eq!(resp.new_balance, Money::new(700, dkk()));
        assert_eq!(resp.available_balance, 700);
        assert!(!resp.replayed);

        let entries = store.list_entries(account.id).await.unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last.entry_type, EntryType::Debit);
        assert_eq!(last.amount, 300);
        assert_eq!((last.balance_before, last.balance_after), (1000, 700));
        assert_eq!(last.description, "rent");
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_account_untouched() {
        let (store, keeper) = keeper();
        let account = open(&keeper, 100).await;
        let before = store.get(account.id).await.unwrap().unwrap();

        let err = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, -101, "r1", ""))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BalanceError::InsufficientFunds {
                account_id: account.id,
                available: 100,
                adjustment: -101
            }
        );
        assert_eq!(store.get(account.id).await.unwrap().unwrap(), before);
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_inactive_account_rejected() {
        let (_, keeper) = keeper();
        let account = open(&keeper, 100).await;
        keeper
            .update_status(account.id, AccountStatus::Frozen)
            .await
            .unwrap();

        let err = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, 10, "r1", ""))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ACCOUNT_NOT_ACTIVE");
    }

    #[tokio::test]
    async fn test_request_validation() {
        let (_, keeper) = keeper();
        let account = open(&keeper, 100).await;

        let zero = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, 0, "r1", ""))
            .await;
        assert_eq!(zero.unwrap_err(), BalanceError::InvalidAmount);

        let blank = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, 5, "  ", ""))
            .await;
        assert_eq!(blank.unwrap_err(), BalanceError::InvalidReference);

        let long = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, 5, "x".repeat(101), ""))
            .await;
        assert_eq!(long.unwrap_err(), BalanceError::InvalidReference);

        let missing = AccountId::from_uuid(Uuid::from_u128(999));
        let not_found = keeper
            .adjust_balance(AdjustBalanceRequest::new(missing, 5, "r1", ""))
            .await;
        assert_eq!(not_found.unwrap_err(), BalanceError::NotFound(missing));
    }

    #[tokio::test]
    async fn test_currency_mismatch() {
        let (_, keeper) = keeper();
        let account = open(&keeper, 100).await;
        let err = keeper
            .adjust_balance(
                AdjustBalanceRequest::new(account.id, 10, "r1", "")
                    .expecting_currency(Currency::new("EUR").unwrap()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CURRENCY_MISMATCH");
    }

    #[tokio::test]
    async fn test_overflow_guarded() {
        let (_, keeper) = keeper();
        let account = open(&keeper, i64::MAX - 5).await;
        let err = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, 10, "r1", ""))
            .await
            .unwrap_err();
        assert_eq!(err, BalanceError::Overflow);
    }

    #[tokio::test]
    async fn test_reference_replay_is_idempotent() {
        let (store, keeper) = keeper();
        let account = open(&keeper, 1000).await;
        let req = AdjustBalanceRequest::new(account.id, -300, "tx-1:debit", "");

        let first = keeper.adjust_balance(req.clone()).await.unwrap();
        let second = keeper.adjust_balance(req).await.unwrap();
        assert!(second.replayed);
        assert_eq!(second.entry_id, first.entry_id);
        assert_eq!(second.new_balance, first.new_balance);
        assert_eq!(store.get(account.id).await.unwrap().unwrap().balance, 700);
        assert_eq!(store.entry_count(), 2);

        let conflict = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, -200, "tx-1:debit", ""))
            .await
            .unwrap_err();
        assert_eq!(
            conflict,
            BalanceError::ReferenceConflict {
                reference: "tx-1:debit".into(),
                recorded: -300
            }
        );
    }

    #[tokio::test]
    async fn test_concurrent_adjustments_serialize() {
        let (store, keeper) = keeper();
        let id = open(&keeper, 0).await.id;
        let keeper = Arc::new(keeper);

        let mut handles = Vec::new();
        for i in 0..50 {
            let keeper = keeper.clone();
            handles.push(tokio::spawn(async move {
                keeper
                    .adjust_balance(AdjustBalanceRequest::new(id, 10, format!("c{}", i), ""))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 500);
        assert!(keeper.audit(id).await.unwrap().is_empty());
    }

    /// Store that reports a version conflict on the first N writes
    struct ContendedStore {
        inner: InMemoryAccountStore,
        conflicts_left: AtomicU32,
    }

    #[async_trait]
    impl AccountStore for ContendedStore {
        async fn insert(
            &self,
            account: &Account,
            opening_entry: Option<&LedgerEntry>,
        ) -> Result<(), BalanceError> {
            self.inner.insert(account, opening_entry).await
        }

        async fn get(&self, id: AccountId) -> Result<Option<Account>, BalanceError> {
            self.inner.get(id).await
        }

        async fn set_status(
            &self,
            id: AccountId,
            status: AccountStatus,
            at: DateTime<Utc>,
        ) -> Result<Account, BalanceError> {
            self.inner.set_status(id, status, at).await
        }

        async fn apply_adjustment(
            &self,
            adjustment: &BalanceAdjustment,
        ) -> Result<Account, BalanceError> {
            let left = self.conflicts_left.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts_left.store(left - 1, Ordering::SeqCst);
                return Err(BalanceError::ConcurrentModification(adjustment.account_id));
            }
            self.inner.apply_adjustment(adjustment).await
        }

        async fn find_entry_by_reference(
            &self,
            id: AccountId,
            reference: &str,
        ) -> Result<Option<LedgerEntry>, BalanceError> {
            self.inner.find_entry_by_reference(id, reference).await
        }

        async fn list_entries(&self, id: AccountId) -> Result<Vec<LedgerEntry>, BalanceError> {
            self.inner.list_entries(id).await
        }
    }

    #[tokio::test]
    async fn test_version_conflict_retry() {
        let store = Arc::new(ContendedStore {
            inner: InMemoryAccountStore::new(),
            conflicts_left: AtomicU32::new(2),
        });
        let keeper = keeper_with(store.clone()).with_max_retries(3);
        let account = open(&keeper, 100).await;

        let resp = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, 50, "r1", ""))
            .await
            .unwrap();
        assert_eq!(resp.new_balance.amount, 150);

        store.conflicts_left.store(10, Ordering::SeqCst);
        let err = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, 50, "r2", ""))
            .await
            .unwrap_err();
        assert_eq!(err, BalanceError::ConcurrentModification(account.id));
    }

    /// Store whose account gets frozen between the keeper's read and its write
    struct FreezingStore {
        inner: InMemoryAccountStore,
        freeze_next_write: AtomicBool,
    }

    #[async_trait]
    impl AccountStore for FreezingStore {
        async fn insert(
            &self,
            account: &Account,
            opening_entry: Option<&LedgerEntry>,
        ) -> Result<(), BalanceError> {
            self.inner.insert(account, opening_entry).await
        }

        async fn get(&self, id: AccountId) -> Result<Option<Account>, BalanceError> {
            self.inner.get(id).await
        }

        async fn set_status(
            &self,
            id: AccountId,
            status: AccountStatus,
            at: DateTime<Utc>,
        ) -> Result<Account, BalanceError> {
            self.inner.set_status(id, status, at).await
        }

        async fn apply_adjustment(
            &self,
            adjustment: &BalanceAdjustment,
        ) -> Result<Account, BalanceError> {
            if self.freeze_next_write.swap(false, Ordering::SeqCst) {
                self.inner
                    .set_status(adjustment.account_id, AccountStatus::Frozen, Utc::now())
                    .await?;
            }
            self.inner.apply_adjustment(adjustment).await
        }

        async fn find_entry_by_reference(
            &self,
            id: AccountId,
            reference: &str,
        ) -> Result<Option<LedgerEntry>, BalanceError> {
            self.inner.find_entry_by_reference(id, reference).await
        }

        async fn list_entries(&self, id: AccountId) -> Result<Vec<LedgerEntry>, BalanceError> {
            self.inner.list_entries(id).await
        }
    }

    #[tokio::test]
    async fn test_status_change_between_read_and_write_rejects_adjustment() {
        let store = Arc::new(FreezingStore {
            inner: InMemoryAccountStore::new(),
            freeze_next_write: AtomicBool::new(false),
        });
        let keeper = keeper_with(store.clone());
        let account = open(&keeper, 1000).await;

        store.freeze_next_write.store(true, Ordering::SeqCst);
        let err = keeper
            .adjust_balance(AdjustBalanceRequest::new(account.id, -300, "tx-9:debit", ""))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BalanceError::AccountNotActive {
                account_id: account.id,
                status: AccountStatus::Frozen
            }
        );

        let stored = store.get(account.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AccountStatus::Frozen);
        assert_eq!(stored.balance, 1000);
        assert_eq!(store.list_entries(account.id).await.unwrap().len(), 1);
    }

    fn run<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(f)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: available balance never drops below zero, and a rejected
        /// adjustment leaves the account and ledger exactly as they were.
        #[test]
        fn available_balance_never_negative(
            opening in 0i64..10_000,
            adjustments in prop::collection::vec(-5_000i64..5_000, 1..30)
        ) {
            run(async {
                let (store, keeper) = keeper();
                let account = open(&keeper, opening).await;

                for (i, adj) in adjustments.into_iter().enumerate() {
                    let before = store.get(account.id).await.unwrap().unwrap();
                    let entries_before = store.entry_count();
                    let result = keeper
                        .adjust_balance(AdjustBalanceRequest::new(account.id, adj, format!("p{}", i), ""))
                        .await;
                    let after = store.get(account.id).await.unwrap().unwrap();

                    assert!(after.available_balance >= 0);
                    if result.is_err() {
                        assert_eq!(after, before);
                        assert_eq!(store.entry_count(), entries_before);
                    }
                }
                assert!(keeper.audit(account.id).await.unwrap().is_empty());
            });
        }

        /// Property: `a` then `-a` restores the balance and the two entries chain.
        #[test]
        fn adjustment_round_trip_restores_balance(
            opening in 0i64..1_000_000,
            a in 1i64..1_000_000
        ) {
            run(async {
                let (store, keeper) = keeper();
                let account = open(&keeper, opening).await;
                let base = store.list_entries(account.id).await.unwrap().len();

                keeper
                    .adjust_balance(AdjustBalanceRequest::new(account.id, a, "up", ""))
                    .await
                    .unwrap();
                keeper
                    .adjust_balance(AdjustBalanceRequest::new(account.id, -a, "down", ""))
                    .await
                    .unwrap();

                let stored = store.get(account.id).await.unwrap().unwrap();
                assert_eq!(stored.balance, opening);

                let entries = store.list_entries(account.id).await.unwrap();
                assert_eq!(entries.len(), base + 2);
                let (up, down) = (&entries[base], &entries[base + 1]);
                assert_eq!(up.balance_after, down.balance_before);
                assert_eq!(down.balance_after, opening);
            });
        }
    }
}
