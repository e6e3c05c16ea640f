//! Injected clock, identifier and account-number providers.
//!
//! Nothing in the money path reads global time or global randomness
//! directly; services receive these providers at construction so tests can
//! pin timestamps and ids.

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// With a non-zero `step`, every `now()` call returns the current instant and
/// then advances by `step`, so consecutive records get strictly increasing
/// timestamps.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
    step: TimeDelta,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_step(start, TimeDelta::zero())
    }

    pub fn with_step(start: DateTime<Utc>, step: TimeDelta) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        *current += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        let now = *current;
        *current += self.step;
        now
    }
}

/// Source of fresh unique identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_uuid(&self) -> Uuid;
}

/// ULID-backed ids: time sortable, no machine-id coordination.
#[derive(Debug, Default, Clone, Copy)]
pub struct UlidGenerator;

impl IdGenerator for UlidGenerator {
    fn next_uuid(&self) -> Uuid {
        Uuid::from_u128(ulid::Ulid::new().0)
    }
}

/// Deterministic ids `00000000-0000-0000-0000-000000000001`, `...002`, ...
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_uuid(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Uuid::from_u128(n as u128)
    }
}

/// Danish-style account numbers: `DK99` followed by 14 digits.
///
/// Randomness alone does not make these unique; the account store rejects
/// collisions and the caller retries with a fresh number.
pub struct AccountNumberGenerator {
    rng: Mutex<StdRng>,
}

pub const ACCOUNT_NUMBER_PREFIX: &str = "DK99";
const ACCOUNT_NUMBER_DIGITS: usize = 14;

impl AccountNumberGenerator {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn generate(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        let mut number = String::with_capacity(ACCOUNT_NUMBER_PREFIX.len() + ACCOUNT_NUMBER_DIGITS);
        number.push_str(ACCOUNT_NUMBER_PREFIX);
        for _ in 0..ACCOUNT_NUMBER_DIGITS {
            let digit: u8 = rng.gen_range(0..10);
            number.push(char::from(b'0' + digit));
        }
        number
    }
}

impl Default for AccountNumberGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_steps() {
        let start = Utc::now();
        let clock = ManualClock::with_step(start, TimeDelta::seconds(1));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + TimeDelta::seconds(1));

        clock.advance(TimeDelta::minutes(5));
        assert_eq!(clock.now(), start + TimeDelta::seconds(2) + TimeDelta::minutes(5));
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_uuid(), Uuid::from_u128(1));
        assert_eq!(ids.next_uuid(), Uuid::from_u128(2));
    }

    #[test]
    fn test_ulid_ids_unique() {
        let ids = UlidGenerator;
        assert_ne!(ids.next_uuid(), ids.next_uuid());
    }

    #[test]
    fn test_account_number_format() {
        let generator = AccountNumberGenerator::from_seed(7);
        let number = generator.generate();
        assert_eq!(number.len(), 18);
        assert!(number.starts_with("DK99"));
        assert!(number[4..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_account_number_seeded_is_deterministic() {
        let a = AccountNumberGenerator::from_seed(42);
        let b = AccountNumberGenerator::from_seed(42);
        assert_eq!(a.generate(), b.generate());
    }
}
