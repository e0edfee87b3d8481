use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vault_core::repository::{SlotRepository, StoreError};
use vault_core::slot::{Slot, SlotCounts, SlotStatus};

pub struct StoreSlotRepository {
    pool: PgPool,
}

impl StoreSlotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SLOT_COLUMNS: &str = "id, price, status, reserved_until, updated_at";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct SlotRow {
    id: i32,
    price: i32,
    status: String,
    reserved_until: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl SlotRow {
    fn into_slot(self) -> Result<Slot, StoreError> {
        let status = SlotStatus::parse(&self.status).ok_or_else(|| {
            StoreError::message(format!(
                "unknown status `{}` on slot {}",
                self.status, self.id
            ))
        })?;
        Ok(Slot {
            id: self.id,
            price: self.price,
            status,
            reserved_until: self.reserved_until,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CountsRow {
    total: i64,
    available: i64,
    reserved: i64,
    sold: i64,
    locked: i64,
}

#[async_trait]
impl SlotRepository for StoreSlotRepository {
    async fn get_slot(&self, slot_id: i32) -> Result<Option<Slot>, StoreError> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE id = $1"
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(SlotRow::into_slot).transpose()
    }

    async fn list_slots(&self, status: Option<SlotStatus>) -> Result<Vec<Slot>, StoreError> {
        let rows: Vec<SlotRow> = match status {
            Some(status) => sqlx::query_as(&format!(
                "SELECT {SLOT_COLUMNS} FROM slots WHERE status = $1 ORDER BY id ASC"
            ))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?,
            None => sqlx::query_as(&format!(
                "SELECT {SLOT_COLUMNS} FROM slots ORDER BY id ASC"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?,
        };

        rows.into_iter().map(SlotRow::into_slot).collect()
    }

    async fn slot_counts(&self) -> Result<SlotCounts, StoreError> {
        let row: CountsRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'available') AS available,
                COUNT(*) FILTER (WHERE status = 'reserved') AS reserved,
                COUNT(*) FILTER (WHERE status = 'sold') AS sold,
                COUNT(*) FILTER (WHERE status = 'locked') AS locked
            FROM slots
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(SlotCounts {
            total: row.total,
            available: row.available,
            reserved: row.reserved,
            sold: row.sold,
            locked: row.locked,
        })
    }

    async fn reserve_slot(
        &self,
        slot_id: i32,
        reserved_until: DateTime<Utc>,
    ) -> Result<Option<Slot>, StoreError> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            r#"
            UPDATE slots
            SET status = 'reserved', reserved_until = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'available'
            RETURNING {SLOT_COLUMNS}
            "#
        ))
        .bind(slot_id)
        .bind(reserved_until)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(SlotRow::into_slot).transpose()
    }

    async fn release_slot(&self, slot_id: i32) -> Result<Option<Slot>, StoreError> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            r#"
            UPDATE slots
            SET status = 'available', reserved_until = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'reserved'
            RETURNING {SLOT_COLUMNS}
            "#
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(SlotRow::into_slot).transpose()
    }

    async fn sell_slot(&self, slot_id: i32) -> Result<Option<Slot>, StoreError> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            r#"
            UPDATE slots
            SET status = 'sold', reserved_until = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'reserved'
            RETURNING {SLOT_COLUMNS}
            "#
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(SlotRow::into_slot).transpose()
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<Vec<i32>, StoreError> {
        let mut ids: Vec<i32> = sqlx::query_scalar(
            r#"
            UPDATE slots
            SET status = 'available', reserved_until = NULL, updated_at = NOW()
            WHERE status = 'reserved' AND reserved_until < $1
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        // RETURNING carries no ordering guarantee.
        ids.sort_unstable();
        Ok(ids)
    }

    async fn unlock_lowest(&self, limit: i64) -> Result<Vec<i32>, StoreError> {
        let mut ids: Vec<i32> = sqlx::query_scalar(
            r#"
            UPDATE slots
            SET status = 'available', updated_at = NOW()
            WHERE status = 'locked' AND id IN (
                SELECT id FROM slots WHERE status = 'locked' ORDER BY id ASC LIMIT $1
            )
            RETURNING id
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        ids.sort_unstable();
        Ok(ids)
    }
}
