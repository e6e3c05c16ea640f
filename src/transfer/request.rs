//! Transfer request and validation

use serde::{Deserialize, Serialize};

use super::error::TransferError;
use crate::account::MAX_REFERENCE_LEN;
use crate::core_types::{AccountId, Currency};

/// Longest accepted idempotency key
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// `CreateTransfer` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    /// Positive minor units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub description: String,
    pub idempotency_key: String,
}

impl TransferRequest {
    /// Check the request shape and return the parsed currency.
    ///
    /// Runs before any lookup or write.
    pub fn validate(&self) -> Result<Currency, TransferError> {
        if self.source_account_id.is_nil() || self.destination_account_id.is_nil() {
            return Err(TransferError::Validation(
                "account ids must not be nil".into(),
            ));
        }
        if self.source_account_id == self.destination_account_id {
            return Err(TransferError::Validation(
                "source and destination must differ".into(),
            ));
        }
        if self.amount <= 0 {
            return Err(TransferError::Validation(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        let key = self.idempotency_key.trim();
        if key.is_empty() || key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(TransferError::Validation(format!(
                "idempotency key must be 1..={} characters",
                MAX_IDEMPOTENCY_KEY_LEN
            )));
        }
        if self.reference.chars().count() > MAX_REFERENCE_LEN {
            return Err(TransferError::Validation(format!(
                "reference longer than {} characters",
                MAX_REFERENCE_LEN
            )));
        }
        Currency::new(&self.currency).map_err(|e| TransferError::Validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request() -> TransferRequest {
        TransferRequest {
            source_account_id: AccountId::from_uuid(Uuid::from_u128(1)),
            destination_account_id: AccountId::from_uuid(Uuid::from_u128(2)),
            amount: 300,
            currency: "dkk".into(),
            reference: "INV-7".into(),
            description: "rent".into(),
            idempotency_key: "key-1".into(),
        }
    }

    #[test]
    fn test_valid_request() {
        assert_eq!(request().validate().unwrap().as_str(), "DKK");
    }

    #[test]
    fn test_rejections() {
        let cases: Vec<Box<dyn Fn(&mut TransferRequest)>> = vec![
            Box::new(|r| r.amount = 0),
            Box::new(|r| r.amount = -5),
            Box::new(|r| r.destination_account_id = r.source_account_id),
            Box::new(|r| r.source_account_id = AccountId::from_uuid(Uuid::nil())),
            Box::new(|r| r.idempotency_key = "   ".into()),
            Box::new(|r| r.idempotency_key = "k".repeat(256)),
            Box::new(|r| r.reference = "r".repeat(101)),
            Box::new(|r| r.currency = "KRONER".into()),
        ];
        for mutate in cases {
            let mut req = request();
            mutate(&mut req);
            assert!(matches!(req.validate(), Err(TransferError::Validation(_))));
        }
    }
}
