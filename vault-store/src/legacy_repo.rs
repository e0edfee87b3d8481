use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vault_core::legacy::{
    Legacy, LifeStatus, MediaItem, NewLegacy, NewMediaItem, NewTimelineEvent, TimelineEvent,
};
use vault_core::repository::{LegacyRepository, StoreError};

pub struct StoreLegacyRepository {
    pool: PgPool,
}

impl StoreLegacyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const LEGACY_COLUMNS: &str = "id, slot_id, user_id, full_name, biography, quote, life_status, \
                              is_public, birth_date, death_date, created_at";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct LegacyRow {
    id: i64,
    slot_id: i32,
    user_id: String,
    full_name: String,
    biography: String,
    quote: String,
    life_status: String,
    is_public: bool,
    birth_date: Option<String>,
    death_date: Option<String>,
    created_at: DateTime<Utc>,
}

impl LegacyRow {
    fn into_legacy(self) -> Result<Legacy, StoreError> {
        let life_status = LifeStatus::parse(&self.life_status).ok_or_else(|| {
            StoreError::message(format!(
                "unknown life status `{}` on legacy {}",
                self.life_status, self.id
            ))
        })?;
        Ok(Legacy {
            id: self.id,
            slot_id: self.slot_id,
            user_id: self.user_id,
            full_name: self.full_name,
            biography: self.biography,
            quote: self.quote,
            life_status,
            is_public: self.is_public,
            birth_date: self.birth_date,
            death_date: self.death_date,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MediaRow {
    id: i64,
    legacy_id: i64,
    kind: String,
    url: String,
    mime_type: String,
    title: Option<String>,
    caption: Option<String>,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl MediaRow {
    fn into_media(self) -> MediaItem {
        MediaItem {
            id: self.id,
            legacy_id: self.legacy_id,
            kind: self.kind,
            url: self.url,
            mime_type: self.mime_type,
            title: self.title,
            caption: self.caption,
            sort_order: self.sort_order,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TimelineRow {
    id: i64,
    legacy_id: i64,
    event_date: String,
    event_text: String,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl TimelineRow {
    fn into_event(self) -> TimelineEvent {
        TimelineEvent {
            id: self.id,
            legacy_id: self.legacy_id,
            event_date: self.event_date,
            event_text: self.event_text,
            sort_order: self.sort_order,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl LegacyRepository for StoreLegacyRepository {
    async fn create_legacy(&self, input: NewLegacy) -> Result<Legacy, StoreError> {
        let row: LegacyRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO legacies (slot_id, user_id, full_name, biography, quote, life_status,
                                  is_public, birth_date, death_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LEGACY_COLUMNS}
            "#
        ))
        .bind(input.slot_id)
        .bind(&input.user_id)
        .bind(&input.full_name)
        .bind(&input.biography)
        .bind(&input.quote)
        .bind(input.life_status.as_str())
        .bind(input.is_public)
        .bind(&input.birth_date)
        .bind(&input.death_date)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.into_legacy()
    }

    async fn get_by_slot(&self, slot_id: i32) -> Result<Option<Legacy>, StoreError> {
        let row: Option<LegacyRow> = sqlx::query_as(&format!(
            "SELECT {LEGACY_COLUMNS} FROM legacies WHERE slot_id = $1"
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(LegacyRow::into_legacy).transpose()
    }

    async fn get_public(&self, legacy_id: i64) -> Result<Option<Legacy>, StoreError> {
        let row: Option<LegacyRow> = sqlx::query_as(&format!(
            "SELECT {LEGACY_COLUMNS} FROM legacies WHERE id = $1 AND is_public = TRUE"
        ))
        .bind(legacy_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(LegacyRow::into_legacy).transpose()
    }

    async fn list_public(&self) -> Result<Vec<Legacy>, StoreError> {
        let rows: Vec<LegacyRow> = sqlx::query_as(&format!(
            "SELECT {LEGACY_COLUMNS} FROM legacies WHERE is_public = TRUE ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(LegacyRow::into_legacy).collect()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Legacy>, StoreError> {
        let rows: Vec<LegacyRow> = sqlx::query_as(&format!(
            "SELECT {LEGACY_COLUMNS} FROM legacies WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(LegacyRow::into_legacy).collect()
    }

    async fn add_media(&self, legacy_id: i64, items: &[NewMediaItem]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO media (legacy_id, kind, url, mime_type, title, caption, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(legacy_id)
            .bind(&item.kind)
            .bind(&item.url)
            .bind(&item.mime_type)
            .bind(&item.title)
            .bind(&item.caption)
            .bind(item.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        }

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(items.len() as u64)
    }

    async fn add_timeline(
        &self,
        legacy_id: i64,
        events: &[NewTimelineEvent],
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        for event in events {
            sqlx::query(
                r#"
                INSERT INTO timeline_events (legacy_id, event_date, event_text, sort_order)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(legacy_id)
            .bind(&event.event_date)
            .bind(&event.event_text)
            .bind(event.sort_order)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        }

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(events.len() as u64)
    }

    async fn media_for(&self, legacy_id: i64) -> Result<Vec<MediaItem>, StoreError> {
        let rows: Vec<MediaRow> = sqlx::query_as(
            "SELECT id, legacy_id, kind, url, mime_type, title, caption, sort_order, created_at \
             FROM media WHERE legacy_id = $1 ORDER BY sort_order ASC",
        )
        .bind(legacy_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(rows.into_iter().map(MediaRow::into_media).collect())
    }

    async fn timeline_for(&self, legacy_id: i64) -> Result<Vec<TimelineEvent>, StoreError> {
        let rows: Vec<TimelineRow> = sqlx::query_as(
            "SELECT id, legacy_id, event_date, event_text, sort_order, created_at \
             FROM timeline_events WHERE legacy_id = $1 ORDER BY sort_order ASC",
        )
        .bind(legacy_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(rows.into_iter().map(TimelineRow::into_event).collect())
    }
}
