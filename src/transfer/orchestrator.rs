//! Transfer Orchestrator
//!
//! Drives one transfer through the saga:
//!
//! ```text
//! idempotency lookup ─► create Pending ─► debit source ─► credit destination ─► Completed
//!                                              │                  │
//!                                              ▼                  ▼
//!                                            Failed       compensate source ─► Failed
//! ```
//!
//! Every Balance Keeper call carries a reference derived from the transaction
//! id, so re-driving a pending record never applies a step twice. When the
//! outcome of a call is unknown (timeout, transport error) the record stays
//! `Pending` and the reconciler re-drives it later.
//!
//! Drivers claim the pending record (a version bump) before each keeper
//! step and resolve it only at the version they hold. A rejected credit
//! marks the record failed before the refund goes out, so no driver can
//! credit the destination of a transfer that is being compensated.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::request::TransferRequest;
use crate::account::{
    Account, AdjustBalanceRequest, AdjustBalanceResponse, BalanceError, BalanceKeeper,
};
use crate::clock::{Clock, IdGenerator};
use crate::core_types::{AccountId, Currency, TransactionId};
use crate::transaction::{
    CompensationState, StoreError, Transaction, TransactionStatus, TransactionStore,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Ledger reference of the source debit
pub fn debit_reference(id: TransactionId) -> String {
    format!("{}:debit", id)
}

/// Ledger reference of the destination credit
pub fn credit_reference(id: TransactionId) -> String {
    format!("{}:credit", id)
}

/// Ledger reference of the compensating credit to the source
pub fn compensation_reference(id: TransactionId) -> String {
    format!("{}:compensation", id)
}

/// Result of `CreateTransfer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub transaction: Transaction,
    /// True when the idempotency key was already known and the existing
    /// record is returned as-is (possibly still `pending`)
    pub replayed: bool,
}

/// One page of `ListTransactions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

/// Clamp caller paging input: page < 1 → 1, size < 1 → default, size capped.
pub fn normalize_page(page: i64, page_size: i64) -> (u32, u32) {
    let page = if page < 1 {
        1
    } else {
        u32::try_from(page).unwrap_or(u32::MAX)
    };
    let page_size = if page_size < 1 {
        DEFAULT_PAGE_SIZE
    } else {
        u32::try_from(page_size)
            .unwrap_or(MAX_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    };
    (page, page_size)
}

/// How long a driver's claim on a pending record lasts before another
/// driver may take it over
pub const DEFAULT_LEASE: Duration = Duration::from_secs(60);

/// Appended to the description of a failed transfer whose refund has not
/// landed yet
const COMPENSATION_UNRESOLVED: &str = ". Compensation unresolved; manual reconciliation required";

pub struct TransferOrchestrator {
    store: Arc<dyn TransactionStore>,
    keeper: Arc<dyn BalanceKeeper>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    rpc_timeout: Duration,
    lease: Duration,
}

impl TransferOrchestrator {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        keeper: Arc<dyn BalanceKeeper>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            store,
            keeper,
            clock,
            ids,
            rpc_timeout,
            lease: DEFAULT_LEASE,
        }
    }

    /// Override the claim lease. Keep it well above `rpc_timeout` so a
    /// holder's in-flight call finishes before its claim can be taken over.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Bound one Balance Keeper call by `rpc_timeout`
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, BalanceError>>,
    ) -> Result<T, BalanceError> {
        match tokio::time::timeout(self.rpc_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BalanceError::DownstreamUnavailable(format!(
                "{} keeper did not answer within {:?}",
                self.keeper.name(),
                self.rpc_timeout
            ))),
        }
    }

    async fn adjust(&self, req: AdjustBalanceRequest) -> Result<AdjustBalanceResponse, BalanceError> {
        self.bounded(self.keeper.adjust_balance(req)).await
    }

    async fn fetch_account(&self, id: AccountId) -> Result<Account, TransferError> {
        match self.bounded(self.keeper.get_account(id)).await {
            Ok(account) => Ok(account),
            Err(BalanceError::NotFound(id)) => Err(TransferError::AccountNotFound(id)),
            Err(e) => Err(TransferError::DownstreamUnavailable {
                transaction: None,
                cause: e.to_string(),
            }),
        }
    }

    /// Same-currency rule, checked before any state is created
    async fn check_currencies(
        &self,
        req: &TransferRequest,
        currency: &Currency,
    ) -> Result<(), TransferError> {
        let source = self.fetch_account(req.source_account_id).await?;
        let destination = self.fetch_account(req.destination_account_id).await?;
        if source.currency != *currency || destination.currency != *currency {
            return Err(TransferError::CurrencyMismatch {
                requested: currency.clone(),
                source_currency: source.currency,
                destination_currency: destination.currency,
            });
        }
        Ok(())
    }

    /// `CreateTransfer`
    pub async fn create_transfer(
        &self,
        req: TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        let currency = req.validate()?;
        let key = req.idempotency_key.trim().to_string();

        if let Some(existing) = self.store.get_by_idempotency_key(&key).await? {
            info!(
                idempotency_key = %key,
                transaction_id = %existing.id,
                status = %existing.status,
                "Idempotency key already known, returning existing record"
            );
            return Ok(TransferOutcome {
                transaction: existing,
                replayed: true,
            });
        }

        self.check_currencies(&req, &currency).await?;

        let tx = Transaction::pending_transfer(
            TransactionId::from_uuid(self.ids.next_uuid()),
            req.source_account_id,
            req.destination_account_id,
            req.amount,
            currency,
            req.reference.trim(),
            req.description.as_str(),
            key.as_str(),
            self.clock.now(),
        );

        match self.store.create(&tx).await {
            Ok(()) => {}
            Err(StoreError::DuplicateKey(_)) => {
                // Lost the race to a concurrent request with the same key
                return match self.store.get_by_idempotency_key(&key).await? {
                    Some(existing) => {
                        info!(
                            idempotency_key = %key,
                            transaction_id = %existing.id,
                            "Concurrent request won the idempotency key"
                        );
                        Ok(TransferOutcome {
                            transaction: existing,
                            replayed: true,
                        })
                    }
                    None => Err(TransferError::DuplicateIdempotencyKey(key)),
                };
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            transaction_id = %tx.id,
            source = %req.source_account_id,
            destination = %req.destination_account_id,
            amount = tx.amount,
            currency = %tx.currency,
            "Transfer pending"
        );

        let transaction = self.drive(tx).await?;
        Ok(TransferOutcome {
            transaction,
            replayed: false,
        })
    }

    /// Re-drive a record. Terminal records are returned unchanged; a pending
    /// record is only driven once its holder's lease has run out.
    pub async fn resume(&self, tx: Transaction) -> Result<Transaction, TransferError> {
        if tx.status.is_terminal() {
            return Ok(tx);
        }
        let now = self.clock.now();
        let lease = TimeDelta::from_std(self.lease).unwrap_or(TimeDelta::MAX);
        let stale_before = now.checked_sub_signed(lease).unwrap_or(DateTime::<Utc>::MIN_UTC);
        match self
            .store
            .claim(tx.id, tx.version, Some(stale_before), now)
            .await?
        {
            Some(claimed) => {
                debug!(transaction_id = %claimed.id, version = claimed.version, "Resuming pending transfer");
                self.drive(claimed).await
            }
            None => self.yield_to(tx.id).await,
        }
    }

    /// Debit, credit, resolve. Every keeper step runs under a fresh claim, so
    /// a driver that lost the record stops before touching balances.
    async fn drive(&self, tx: Transaction) -> Result<Transaction, TransferError> {
        let (source, destination) = match (tx.source_account_id, tx.destination_account_id) {
            (Some(s), Some(d)) => (s, d),
            _ => {
                let Some(resolved) = self
                    .settle(
                        &tx,
                        TransactionStatus::Failed,
                        "Transfer record is missing an account".to_string(),
                        CompensationState::NotRequired,
                    )
                    .await?
                else {
                    return self.yield_to(tx.id).await;
                };
                return Err(TransferError::Validation(format!(
                    "transaction {} has no source or destination",
                    resolved.id
                )));
            }
        };

        // Step 1: debit source
        let Some(tx) = self.hold(&tx).await? else {
            return self.yield_to(tx.id).await;
        };
        let debit = AdjustBalanceRequest::new(
            source,
            -tx.amount,
            debit_reference(tx.id),
            format!("Transfer to {}: {}", destination, tx.description),
        )
        .for_transaction(tx.id)
        .expecting_currency(tx.currency.clone());

        if let Err(cause) = self.adjust(debit).await {
            if !cause.is_business_rejection() {
                warn!(
                    transaction_id = %tx.id,
                    error = %cause,
                    "Debit outcome unknown, leaving transfer pending"
                );
                return Err(TransferError::DownstreamUnavailable {
                    transaction: Some(Box::new(tx)),
                    cause: cause.to_string(),
                });
            }
            warn!(transaction_id = %tx.id, error = %cause, "Debit rejected");
            let Some(resolved) = self
                .settle(
                    &tx,
                    TransactionStatus::Failed,
                    format!("Debit failed: {}", cause),
                    CompensationState::NotRequired,
                )
                .await?
            else {
                return self.yield_to(tx.id).await;
            };
            return Err(TransferError::DebitFailed {
                transaction: Box::new(resolved),
                cause,
            });
        }

        // Step 2: credit destination
        let Some(tx) = self.hold(&tx).await? else {
            return self.yield_to(tx.id).await;
        };
        let credit = AdjustBalanceRequest::new(
            destination,
            tx.amount,
            credit_reference(tx.id),
            format!("Transfer from {}: {}", source, tx.description),
        )
        .for_transaction(tx.id)
        .expecting_currency(tx.currency.clone());

        if let Err(cause) = self.adjust(credit).await {
            if !cause.is_business_rejection() {
                warn!(
                    transaction_id = %tx.id,
                    error = %cause,
                    "Credit outcome unknown, leaving transfer pending"
                );
                return Err(TransferError::DownstreamUnavailable {
                    transaction: Some(Box::new(tx)),
                    cause: cause.to_string(),
                });
            }

            // Step 3: fail the record, then compensate source. Once failed
            // the record cannot be claimed, so no other driver can credit it.
            warn!(transaction_id = %tx.id, error = %cause, "Credit rejected, compensating source");
            let base = format!("Credit failed: {}", cause);
            let Some(failed) = self
                .settle(
                    &tx,
                    TransactionStatus::Failed,
                    format!("{}{}", base, COMPENSATION_UNRESOLVED),
                    CompensationState::Unresolved,
                )
                .await?
            else {
                return self.yield_to(tx.id).await;
            };

            let transaction = match self.compensate(&failed, source).await {
                Ok(()) => {
                    let description = format!("{}. Compensation applied: source refunded", base);
                    self.store
                        .mark_compensation_applied(failed.id, &description, self.clock.now())
                        .await?;
                    self.current(failed.id).await?
                }
                Err(comp_err) => {
                    error!(
                        transaction_id = %failed.id,
                        source = %source,
                        amount = failed.amount,
                        error = %comp_err,
                        "Compensation failed, funds held by source debit"
                    );
                    failed
                }
            };
            let compensated = transaction.compensation == CompensationState::Applied;
            return Err(TransferError::PartialFailure {
                transaction: Box::new(transaction),
                cause,
                compensated,
            });
        }

        let description = tx.description.clone();
        let Some(resolved) = self
            .settle(
                &tx,
                TransactionStatus::Completed,
                description,
                CompensationState::NotRequired,
            )
            .await?
        else {
            return self.yield_to(tx.id).await;
        };
        info!(
            transaction_id = %resolved.id,
            amount = resolved.amount,
            "Transfer completed"
        );
        Ok(resolved)
    }

    async fn compensate(&self, tx: &Transaction, source: AccountId) -> Result<(), BalanceError> {
        let refund = AdjustBalanceRequest::new(
            source,
            tx.amount,
            compensation_reference(tx.id),
            "ROLLBACK: Credit failed",
        )
        .for_transaction(tx.id)
        .expecting_currency(tx.currency.clone());
        self.adjust(refund).await.map(|_| ())
    }

    /// Renew this driver's claim before the next keeper step. `None` when
    /// another driver took the record over or resolved it.
    async fn hold(&self, tx: &Transaction) -> Result<Option<Transaction>, TransferError> {
        let held = self
            .store
            .claim(tx.id, tx.version, None, self.clock.now())
            .await?;
        if held.is_none() {
            debug!(transaction_id = %tx.id, version = tx.version, "Claim lost to another driver");
        }
        Ok(held)
    }

    /// Resolve out of `Pending` at the version this driver holds. `None` when
    /// another driver got there first or took the record over.
    async fn settle(
        &self,
        tx: &Transaction,
        status: TransactionStatus,
        description: String,
        compensation: CompensationState,
    ) -> Result<Option<Transaction>, TransferError> {
        match self
            .store
            .resolve(
                tx.id,
                tx.version,
                status,
                &description,
                compensation,
                self.clock.now(),
            )
            .await
        {
            Ok(resolved) => Ok(Some(resolved)),
            Err(StoreError::AlreadyTerminal { id, status: current }) => {
                warn!(
                    transaction_id = %id,
                    wanted = %status,
                    current = %current,
                    "Transaction already resolved by another driver"
                );
                Ok(None)
            }
            Err(StoreError::VersionConflict { id, version }) => {
                warn!(
                    transaction_id = %id,
                    wanted = %status,
                    held = tx.version,
                    current = version,
                    "Transaction taken over by another driver"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn current(&self, id: TransactionId) -> Result<Transaction, TransferError> {
        self.store.get(id).await?.ok_or(TransferError::NotFound(id))
    }

    /// Report the record as another driver left it
    async fn yield_to(&self, id: TransactionId) -> Result<Transaction, TransferError> {
        let current = self.current(id).await?;
        match current.status {
            TransactionStatus::Completed => Ok(current),
            TransactionStatus::Pending => Err(TransferError::InProgress(Box::new(current))),
            TransactionStatus::Failed | TransactionStatus::Cancelled => {
                Err(TransferError::Superseded(Box::new(current)))
            }
        }
    }

    /// Retry the compensating credit of a failed transfer whose refund never
    /// landed. Returns true when this call settled it.
    pub async fn retry_compensation(&self, tx: &Transaction) -> Result<bool, TransferError> {
        if tx.status != TransactionStatus::Failed
            || tx.compensation != CompensationState::Unresolved
        {
            return Ok(false);
        }
        let source = tx
            .source_account_id
            .ok_or_else(|| TransferError::Validation(format!("transaction {} has no source", tx.id)))?;

        self.compensate(tx, source)
            .await
            .map_err(|e| TransferError::DownstreamUnavailable {
                transaction: Some(Box::new(tx.clone())),
                cause: e.to_string(),
            })?;

        let base = tx
            .description
            .strip_suffix(COMPENSATION_UNRESOLVED)
            .unwrap_or(&tx.description);
        let description = format!("{}. Compensation applied on retry: source refunded", base);
        let settled = self
            .store
            .mark_compensation_applied(tx.id, &description, self.clock.now())
            .await?;
        if settled {
            info!(transaction_id = %tx.id, "Compensation applied on retry");
        }
        Ok(settled)
    }

    /// `GetTransaction`
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, TransferError> {
        self.current(id).await
    }

    /// `ListTransactions`: 1-based page, newest first
    pub async fn list_transactions(
        &self,
        account: AccountId,
        page: i64,
        page_size: i64,
    ) -> Result<TransactionPage, TransferError> {
        let (page, page_size) = normalize_page(page, page_size);
        let offset = u64::from(page - 1) * u64::from(page_size);
        let (items, total) = self.store.list_by_account(account, page_size, offset).await?;
        Ok(TransactionPage {
            items,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(u64::from(page_size)),
        })
    }
}
