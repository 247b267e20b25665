//! Order and order-transaction persistence
//!
//! Orders carry two status columns: `payment_status` (the reconciliation
//! state machine: pending -> completed | failed) and `status` (fulfillment,
//! advanced to `processing` when payment completes). Payment results are
//! applied as a single guarded batch over the order and every transaction
//! row referencing it.

use crate::database::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Payment state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl OrderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPaymentStatus::Pending => "pending",
            OrderPaymentStatus::Completed => "completed",
            OrderPaymentStatus::Failed => "failed",
        }
    }

    /// Parse a database value; unrecognized values are treated as pending
    /// so a stray row can still be reconciled.
    pub fn parse(value: &str) -> Self {
        match value {
            "completed" => OrderPaymentStatus::Completed,
            "failed" => OrderPaymentStatus::Failed,
            _ => OrderPaymentStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderPaymentStatus::Completed | OrderPaymentStatus::Failed
        )
    }
}

impl std::fmt::Display for OrderPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order entity
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub order_id: String,
    pub payment_status: String,
    pub status: String,
    pub mpesa_checkout_request_id: Option<String>,
    pub mpesa_receipt_number: Option<String>,
    pub mpesa_transaction_id: Option<String>,
    pub mpesa_phone_number: Option<String>,
    pub mpesa_failure_reason: Option<String>,
    pub paid_amount: Option<i64>,
    pub mpesa_transaction_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn payment_status(&self) -> OrderPaymentStatus {
        OrderPaymentStatus::parse(&self.payment_status)
    }
}

/// Transaction row referencing an order
#[derive(Debug, Clone, FromRow)]
pub struct OrderTransaction {
    pub transaction_id: Uuid,
    pub order_id: String,
    pub status: String,
    pub mpesa_receipt: Option<String>,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written when a payment completes
#[derive(Debug, Clone, Default)]
pub struct PaymentCompletion {
    pub receipt: Option<String>,
    pub transaction_id: Option<String>,
    pub phone: Option<String>,
    pub paid_amount: Option<i64>,
    pub transaction_time: Option<DateTime<Utc>>,
}

/// Fields written when a payment fails
#[derive(Debug, Clone)]
pub struct PaymentFailure {
    pub result_code: i64,
    pub reason: String,
}

/// Store abstraction for order reconciliation
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Look up the order carrying the given M-Pesa correlation id.
    async fn find_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Order>, DatabaseError>;

    /// Stamp the correlation id on a pending order at initiation time.
    /// Returns false when no matching pending order exists.
    async fn attach_checkout_request(
        &self,
        order_id: &str,
        checkout_request_id: &str,
    ) -> Result<bool, DatabaseError>;

    /// Apply a completed payment to the order and its transactions in one
    /// atomic batch. The write is guarded: it never flips a failed order to
    /// completed. Returns whether the order row was written.
    async fn apply_completion(
        &self,
        order_id: &str,
        completion: &PaymentCompletion,
    ) -> Result<bool, DatabaseError>;

    /// Apply a failed payment. Guarded against flipping a completed order
    /// to failed; the fulfillment `status` column is left untouched.
    async fn apply_failure(
        &self,
        order_id: &str,
        failure: &PaymentFailure,
    ) -> Result<bool, DatabaseError>;

    async fn transactions_for_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<OrderTransaction>, DatabaseError>;
}

/// Postgres-backed order store
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str = "order_id, payment_status, status, mpesa_checkout_request_id, \
     mpesa_receipt_number, mpesa_transaction_id, mpesa_phone_number, \
     mpesa_failure_reason, paid_amount, mpesa_transaction_date, created_at, updated_at";

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE mpesa_checkout_request_id = $1"
        ))
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn attach_checkout_request(
        &self,
        order_id: &str,
        checkout_request_id: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders
             SET mpesa_checkout_request_id = $2, updated_at = NOW()
             WHERE order_id = $1 AND payment_status = 'pending'",
        )
        .bind(order_id)
        .bind(checkout_request_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_completion(
        &self,
        order_id: &str,
        completion: &PaymentCompletion,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let result = sqlx::query(
            "UPDATE orders
             SET payment_status = 'completed',
                 status = 'processing',
                 mpesa_receipt_number = $2,
                 mpesa_transaction_id = $3,
                 mpesa_phone_number = $4,
                 paid_amount = $5,
                 mpesa_transaction_date = $6,
                 mpesa_failure_reason = NULL,
                 updated_at = NOW()
             WHERE order_id = $1 AND payment_status <> 'failed'",
        )
        .bind(order_id)
        .bind(completion.receipt.as_deref())
        .bind(completion.transaction_id.as_deref())
        .bind(completion.phone.as_deref())
        .bind(completion.paid_amount)
        .bind(completion.transaction_time)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE order_transactions
             SET status = 'completed', mpesa_receipt = $2, result_code = 0,
                 result_desc = NULL, failure_reason = NULL, updated_at = NOW()
             WHERE order_id = $1",
        )
        .bind(order_id)
        .bind(completion.receipt.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(true)
    }

    async fn apply_failure(
        &self,
        order_id: &str,
        failure: &PaymentFailure,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let result = sqlx::query(
            "UPDATE orders
             SET payment_status = 'failed',
                 mpesa_failure_reason = $2,
                 updated_at = NOW()
             WHERE order_id = $1 AND payment_status <> 'completed'",
        )
        .bind(order_id)
        .bind(&failure.reason)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(false);
        }

        sqlx::query(
            "UPDATE order_transactions
             SET status = 'failed', result_code = $2, result_desc = $3,
                 failure_reason = $3, updated_at = NOW()
             WHERE order_id = $1",
        )
        .bind(order_id)
        .bind(failure.result_code)
        .bind(&failure.reason)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(true)
    }

    async fn transactions_for_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<OrderTransaction>, DatabaseError> {
        sqlx::query_as::<_, OrderTransaction>(
            "SELECT transaction_id, order_id, status, mpesa_receipt, result_code,
                    result_desc, failure_reason, created_at, updated_at
             FROM order_transactions WHERE order_id = $1
             ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
