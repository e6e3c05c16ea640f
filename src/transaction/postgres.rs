//! PostgreSQL transaction record store
//!
//! Status transitions are compare-and-set on `status = 'pending'`, the same
//! way the FSM state column is guarded: the `UPDATE ... WHERE` either wins or
//! matches zero rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::error::StoreError;
use super::models::{CompensationState, Transaction, TransactionStatus};
use super::store::TransactionStore;
use crate::core_types::{AccountId, Currency, TransactionId};

const COLUMNS: &str = "id, source_account_id, destination_account_id, amount, currency, \
     transaction_type, status, reference, description, idempotency_key, compensation, \
     version, created_at, updated_at";

pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn invalid(column: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Database(format!("invalid {}: {}", column, detail))
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction, StoreError> {
    let source: Option<uuid::Uuid> = row.try_get("source_account_id")?;
    let destination: Option<uuid::Uuid> = row.try_get("destination_account_id")?;
    let currency: String = row.try_get("currency")?;
    let transaction_type: String = row.try_get("transaction_type")?;
    let status: String = row.try_get("status")?;
    let compensation: String = row.try_get("compensation")?;

    Ok(Transaction {
        id: TransactionId::from_uuid(row.try_get("id")?),
        source_account_id: source.map(AccountId::from_uuid),
        destination_account_id: destination.map(AccountId::from_uuid),
        amount: row.try_get("amount")?,
        currency: Currency::new(&currency).map_err(|e| invalid("currency", e))?,
        transaction_type: transaction_type
            .parse()
            .map_err(|e| invalid("transaction_type", e))?,
        status: status.parse().map_err(|e| invalid("status", e))?,
        reference: row.try_get("reference")?,
        description: row.try_get("description")?,
        idempotency_key: row.try_get("idempotency_key")?,
        compensation: compensation
            .parse()
            .map_err(|e| invalid("compensation", e))?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn create(&self, tx: &Transaction) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (id, source_account_id, destination_account_id, amount, currency,
                 transaction_type, status, reference, description, idempotency_key,
                 compensation, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(tx.id.as_uuid())
        .bind(tx.source_account_id.map(|a| a.as_uuid()))
        .bind(tx.destination_account_id.map(|a| a.as_uuid()))
        .bind(tx.amount)
        .bind(tx.currency.as_str())
        .bind(tx.transaction_type.as_str())
        .bind(tx.status.as_str())
        .bind(&tx.reference)
        .bind(&tx.description)
        .bind(&tx.idempotency_key)
        .bind(tx.compensation.as_str())
        .bind(tx.version)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // 23505 unique_violation on idempotency_key
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateKey(tx.idempotency_key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM transactions WHERE id = $1", COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn get_by_idempotency_key(&self, key: &str) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE idempotency_key = $1",
            COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_transaction).transpose()
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

        let row = sqlx::query(&format!(
            r#"
            UPDATE transactions
            SET status = $1, description = $2, compensation = $3,
                version = version + 1, updated_at = $4
            WHERE id = $5 AND status = 'pending' AND version = $6
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(status.as_str())
        .bind(description)
        .bind(compensation.as_str())
        .bind(at)
        .bind(id.as_uuid())
        .bind(seen_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_transaction(&row),
            None => match self.get(id).await? {
                Some(current) if current.status.is_terminal() => Err(StoreError::AlreadyTerminal {
                    id,
                    status: current.status,
                }),
                Some(current) => Err(StoreError::VersionConflict {
                    id,
                    version: current.version,
                }),
                None => Err(StoreError::NotFound(id)),
            },
        }
    }

    async fn claim(
        &self,
        id: TransactionId,
        seen_version: i64,
        stale_before: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE transactions
            SET version = version + 1, updated_at = $1
            WHERE id = $2 AND status = 'pending' AND version = $3
              AND ($4::timestamptz IS NULL OR updated_at < $4)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(at)
        .bind(id.as_uuid())
        .bind(seen_version)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn list_by_account(
        &self,
        account: AccountId,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Transaction>, u64), StoreError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions \
             WHERE source_account_id = $1 OR destination_account_id = $1",
        )
        .bind(account.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE source_account_id = $1 OR destination_account_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            COLUMNS
        ))
        .bind(account.as_uuid())
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(row_to_transaction)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total.max(0) as u64))
    }

    async fn find_stale_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE status = 'pending' AND updated_at < $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            "#,
            COLUMNS
        ))
        .bind(older_than)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn find_unresolved_compensations(
        &self,
        limit: u32,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE status = 'failed' AND compensation = 'unresolved'
            ORDER BY created_at ASC, id ASC
            LIMIT $1
            "#,
            COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn mark_compensation_applied(
        &self,
        id: TransactionId,
        description: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET compensation = 'applied', description = $1, updated_at = $2
            WHERE id = $3 AND compensation = 'unresolved'
            "#,
        )
        .bind(description)
        .bind(at)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
