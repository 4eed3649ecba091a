//! PostgreSQL transaction repository implementation

use async_trait::async_trait;
use carpark_types::{
    FailureReason, IdempotencyKey, TransactionId, TransactionStatus, VehicleId,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{StoreError, StoreResult};
use crate::models::{CreateTransaction, TransactionRow};
use crate::pg::{map_insert_err, parse_col};
use crate::repo::TransactionRepository;

const TXN_COLUMNS: &str = "transaction_id, idempotency_key, vehicle_id, amount, kind, method, \
                           status, failure_reason, description, created_at, updated_at, expires_at";

#[derive(sqlx::FromRow)]
struct RawTransactionRow {
    transaction_id: String,
    idempotency_key: String,
    vehicle_id: String,
    amount: i64,
    kind: String,
    method: String,
    status: String,
    failure_reason: Option<String>,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<RawTransactionRow> for TransactionRow {
    type Error = StoreError;

    fn try_from(raw: RawTransactionRow) -> Result<Self, Self::Error> {
        Ok(TransactionRow {
            transaction_id: TransactionId(raw.transaction_id),
            idempotency_key: IdempotencyKey(raw.idempotency_key),
            vehicle_id: VehicleId(raw.vehicle_id),
            amount: raw.amount,
            kind: parse_col("kind", &raw.kind)?,
            method: parse_col("method", &raw.method)?,
            status: parse_col("status", &raw.status)?,
            failure_reason: raw
                .failure_reason
                .as_deref()
                .map(|r| parse_col("failure_reason", r))
                .transpose()?,
            description: raw.description,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            expires_at: raw.expires_at,
        })
    }
}

/// PostgreSQL transaction repository
#[derive(Clone)]
pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    /// Create a new transaction repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn insert_if_absent(&self, txn: CreateTransaction) -> StoreResult<TransactionRow> {
        // ON CONFLICT DO NOTHING makes concurrent retries race safely; the
        // loser falls through to reading the winner's row.
        let inserted = sqlx::query_as::<_, RawTransactionRow>(&format!(
            r#"
            INSERT INTO payment_transactions (transaction_id, idempotency_key, vehicle_id,
                                              amount, kind, method, status, description,
                                              created_at, updated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING {TXN_COLUMNS}
            "#,
        ))
        .bind(txn.transaction_id.as_str())
        .bind(txn.idempotency_key.as_str())
        .bind(txn.vehicle_id.as_str())
        .bind(txn.amount)
        .bind(txn.kind.to_string())
        .bind(txn.method.to_string())
        .bind(txn.status.to_string())
        .bind(&txn.description)
        .bind(txn.created_at)
        .bind(txn.expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "transaction", txn.transaction_id.as_str()))?;

        if let Some(raw) = inserted {
            return raw.try_into();
        }

        self.find_by_idempotency_key(&txn.idempotency_key)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: &TransactionId) -> StoreResult<Option<TransactionRow>> {
        let raw = sqlx::query_as::<_, RawTransactionRow>(&format!(
            "SELECT {TXN_COLUMNS} FROM payment_transactions WHERE transaction_id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        raw.map(TransactionRow::try_from).transpose()
    }

    async fn find_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<TransactionRow>> {
        let raw = sqlx::query_as::<_, RawTransactionRow>(&format!(
            "SELECT {TXN_COLUMNS} FROM payment_transactions WHERE idempotency_key = $1"
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        raw.map(TransactionRow::try_from).transpose()
    }

    async fn transition(
        &self,
        id: &TransactionId,
        to: TransactionStatus,
        reason: Option<FailureReason>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = $2, failure_reason = $3, updated_at = $4
            WHERE transaction_id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_str())
        .bind(to.to_string())
        .bind(reason.map(|r| r.to_string()))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<TransactionRow>> {
        let rows = sqlx::query_as::<_, RawTransactionRow>(&format!(
            r#"
            SELECT {TXN_COLUMNS} FROM payment_transactions
            WHERE status = 'pending' AND expires_at <= $1
            ORDER BY expires_at
            "#,
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::try_from).collect()
    }
}
