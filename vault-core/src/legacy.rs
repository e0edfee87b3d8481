// ============================================
// Legacy Records
// ============================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Living/deceased marker on a legacy page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeStatus {
    #[default]
    Living,
    Deceased,
}

impl LifeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifeStatus::Living => "Living",
            LifeStatus::Deceased => "Deceased",
        }
    }

    pub fn parse(value: &str) -> Option<LifeStatus> {
        match value {
            "Living" => Some(LifeStatus::Living),
            "Deceased" => Some(LifeStatus::Deceased),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The permanent biography record bound 1:1 to a sold slot. Written exactly
/// once, at sale confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Legacy {
    pub id: i64,
    pub slot_id: i32,
    pub user_id: String,
    pub full_name: String,
    pub biography: String,
    pub quote: String,
    pub life_status: LifeStatus,
    pub is_public: bool,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for the legacy insert at confirmation time.
#[derive(Debug, Clone)]
pub struct NewLegacy {
    pub slot_id: i32,
    pub user_id: String,
    pub full_name: String,
    pub biography: String,
    pub quote: String,
    pub life_status: LifeStatus,
    pub is_public: bool,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
}

/// A photo attached to a legacy, ordered by `sort_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub legacy_id: i64,
    pub kind: String,
    pub url: String,
    pub mime_type: String,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMediaItem {
    pub kind: String,
    pub url: String,
    pub mime_type: String,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub sort_order: i32,
}

impl NewMediaItem {
    /// A photo entry at the given position in the upload order.
    pub fn photo(url: impl Into<String>, sort_order: i32) -> Self {
        NewMediaItem {
            kind: "photo".to_string(),
            url: url.into(),
            mime_type: "image/jpeg".to_string(),
            title: None,
            caption: None,
            sort_order,
        }
    }
}

/// One dated milestone on a legacy's timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: i64,
    pub legacy_id: i64,
    pub event_date: String,
    pub event_text: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTimelineEvent {
    pub event_date: String,
    pub event_text: String,
    pub sort_order: i32,
}
