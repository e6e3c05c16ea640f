//! Failure-injecting Balance Keeper for saga tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::account::{
    Account, AdjustBalanceRequest, AdjustBalanceResponse, BalanceError, BalanceKeeper,
    LedgerBalanceKeeper,
};
use crate::core_types::AccountId;

/// Holds one keeper call until the test lets it through.
#[derive(Default)]
pub struct StepGate {
    reached: Notify,
    release: Notify,
}

impl StepGate {
    /// Wait until the gated call has arrived
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Wraps a real keeper and fails selected calls.
pub struct FaultyKeeper {
    inner: Arc<LedgerBalanceKeeper>,
    adjust_count: AtomicUsize,
    /// Reject credits to this account with the given error
    fail_credit: Mutex<Option<(AccountId, BalanceError)>>,
    /// Reject compensating credits
    fail_compensation: AtomicBool,
    /// Apply credits, then report the response as lost
    lose_credit_response: AtomicBool,
    /// Sleep before forwarding adjustments
    delay: Mutex<Option<Duration>>,
    /// One-shot pauses keyed by reference suffix
    gates: Mutex<Vec<(&'static str, Arc<StepGate>)>>,
}

impl FaultyKeeper {
    pub fn new(inner: Arc<LedgerBalanceKeeper>) -> Self {
        Self {
            inner,
            adjust_count: AtomicUsize::new(0),
            fail_credit: Mutex::new(None),
            fail_compensation: AtomicBool::new(false),
            lose_credit_response: AtomicBool::new(false),
            delay: Mutex::new(None),
            gates: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail_credit(&self, account: AccountId, error: BalanceError) {
        *self.fail_credit.lock().unwrap() = Some((account, error));
    }

    pub fn clear_fail_credit(&self) {
        *self.fail_credit.lock().unwrap() = None;
    }

    /// Pause the next adjustment whose reference ends with `suffix`
    pub fn pause_at(&self, suffix: &'static str) -> Arc<StepGate> {
        let gate = Arc::new(StepGate::default());
        self.gates.lock().unwrap().push((suffix, gate.clone()));
        gate
    }

    pub fn set_fail_compensation(&self, fail: bool) {
        self.fail_compensation.store(fail, Ordering::SeqCst);
    }

    pub fn set_lose_credit_response(&self, lose: bool) {
        self.lose_credit_response.store(lose, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn adjust_count(&self) -> usize {
        self.adjust_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceKeeper for FaultyKeeper {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn adjust_balance(
        &self,
        req: AdjustBalanceRequest,
    ) -> Result<AdjustBalanceResponse, BalanceError> {
        self.adjust_count.fetch_add(1, Ordering::SeqCst);

        let gate = {
            let mut gates = self.gates.lock().unwrap();
            gates
                .iter()
                .position(|(suffix, _)| req.reference.ends_with(suffix))
                .map(|i| gates.remove(i).1)
        };
        if let Some(gate) = gate {
            gate.reached.notify_one();
            gate.release.notified().await;
        }

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let is_compensation = req.reference.ends_with(":compensation");
        if is_compensation && self.fail_compensation.load(Ordering::SeqCst) {
            return Err(BalanceError::DownstreamUnavailable(
                "injected compensation failure".into(),
            ));
        }

        let is_credit = req.reference.ends_with(":credit");
        if is_credit {
            let injected = self.fail_credit.lock().unwrap().clone();
            if let Some((account, error)) = injected
                && account == req.account_id
            {
                return Err(error);
            }
            if self.lose_credit_response.load(Ordering::SeqCst) {
                self.inner.adjust_balance(req).await?;
                return Err(BalanceError::DownstreamUnavailable(
                    "injected lost response".into(),
                ));
            }
        }

        self.inner.adjust_balance(req).await
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, BalanceError> {
        self.inner.get_account(id).await
    }
}
