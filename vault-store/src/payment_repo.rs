use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vault_core::ledger::{NewPaymentRecord, PaymentRecord};
use vault_core::repository::{PaymentRepository, StoreError};

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PAYMENT_COLUMNS: &str = "id, slot_id, user_id, amount, currency, gateway_session_id, \
                               gateway_payment_intent, status, created_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    slot_id: i32,
    user_id: String,
    amount: i64,
    currency: String,
    gateway_session_id: String,
    gateway_payment_intent: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_record(self) -> PaymentRecord {
        PaymentRecord {
            id: self.id,
            slot_id: self.slot_id,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency,
            gateway_session_id: self.gateway_session_id,
            gateway_payment_intent: self.gateway_payment_intent,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn append(&self, record: NewPaymentRecord) -> Result<PaymentRecord, StoreError> {
        let row: PaymentRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO payments (slot_id, user_id, amount, currency, gateway_session_id,
                                  gateway_payment_intent, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(record.slot_id)
        .bind(&record.user_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(&record.gateway_session_id)
        .bind(&record.gateway_payment_intent)
        .bind(&record.status)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.into_record())
    }

    async fn total_spent(&self, user_id: &str) -> Result<i64, StoreError> {
        // SUM(bigint) widens to numeric, hence the cast.
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(total)
    }

    async fn payments_for_user(&self, user_id: &str) -> Result<Vec<PaymentRecord>, StoreError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(rows.into_iter().map(PaymentRow::into_record).collect())
    }
}
