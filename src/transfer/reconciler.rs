//! Reconciler
//!
//! Background worker that finishes what the request path could not:
//! - `pending` records older than `stale_threshold` are re-driven through
//!   [`TransferOrchestrator::resume`]
//! - `failed` records with an unresolved compensation get the refund retried
//!
//! Both are safe to repeat because every Balance Keeper call is idempotent per
//! `(account, reference)`.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::orchestrator::TransferOrchestrator;

/// Reconciler schedule and batch bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub enabled: bool,
    /// Seconds between scans
    pub scan_interval_secs: u64,
    /// Seconds a pending record must sit untouched before it is re-driven
    pub stale_threshold_secs: u64,
    pub batch_size: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_secs: 30,
            stale_threshold_secs: 60,
            batch_size: 100,
        }
    }
}

impl ReconcilerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }
}

/// Counts from one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Pending records that reached a terminal state
    pub resolved: usize,
    /// Pending records still pending after the attempt
    pub still_pending: usize,
    /// Unresolved compensations settled
    pub compensated: usize,
}

pub struct Reconciler {
    orchestrator: Arc<TransferOrchestrator>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(orchestrator: Arc<TransferOrchestrator>, config: ReconcilerConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Run forever, one scan per `scan_interval`
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval_secs,
            stale_threshold_secs = self.config.stale_threshold_secs,
            batch_size = self.config.batch_size,
            "Starting reconciler"
        );

        loop {
            match self.scan_once().await {
                Ok(report) if report != ReconcileReport::default() => {
                    info!(
                        resolved = report.resolved,
                        still_pending = report.still_pending,
                        compensated = report.compensated,
                        "Reconciler scan finished"
                    );
                }
                Ok(_) => debug!("Reconciler scan found nothing to do"),
                Err(e) => error!(error = %e, "Reconciler scan failed"),
            }

            tokio::time::sleep(self.config.scan_interval()).await;
        }
    }

    /// One pass over stale pending records and unresolved compensations
    pub async fn scan_once(&self) -> Result<ReconcileReport, TransferError> {
        let mut report = ReconcileReport::default();
        let store = self.orchestrator.store();

        let threshold = TimeDelta::from_std(self.config.stale_threshold())
            .unwrap_or_else(|_| TimeDelta::seconds(60));
        let cutoff = self.orchestrator.clock().now() - threshold;

        let stale = store
            .find_stale_pending(cutoff, self.config.batch_size)
            .await?;
        if !stale.is_empty() {
            info!(count = stale.len(), "Found stale pending transfers");
        }

        for tx in stale {
            let id = tx.id;
            match self.orchestrator.resume(tx).await {
                Ok(resolved) => {
                    info!(transaction_id = %id, status = %resolved.status, "Stale transfer resolved");
                    report.resolved += 1;
                }
                Err(e) => match e.transaction() {
                    Some(t) if t.status.is_terminal() => {
                        info!(transaction_id = %id, status = %t.status, error = %e, "Stale transfer resolved");
                        report.resolved += 1;
                    }
                    _ => {
                        warn!(transaction_id = %id, error = %e, "Stale transfer still pending");
                        report.still_pending += 1;
                    }
                },
            }
        }

        let unresolved = store
            .find_unresolved_compensations(self.config.batch_size)
            .await?;
        for tx in unresolved {
            match self.orchestrator.retry_compensation(&tx).await {
                Ok(true) => report.compensated += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(
                        transaction_id = %tx.id,
                        error = %e,
                        "CRITICAL: compensation still failing, funds held by source debit"
                    );
                }
            }
        }

        Ok(report)
    }
}
