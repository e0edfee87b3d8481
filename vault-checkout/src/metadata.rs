use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use vault_core::LifeStatus;

/// The biography draft a buyer submits at checkout.
///
/// The whole draft is flattened into the gateway session's metadata map and
/// comes back verbatim in the completion webhook, so a sale can be finalized
/// from the webhook alone. Every field is defaulted; required fields are
/// enforced by the orchestrator so a thin payload gets a precise error
/// instead of a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDraft {
    #[serde(default)]
    pub slot_id: i32,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub biography: String,
    #[serde(default)]
    pub quote: String,
    #[serde(rename = "status", default)]
    pub life_status: LifeStatus,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub death_date: Option<String>,
    /// Photo URLs in upload order.
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub timeline_events: Vec<TimelineEntry>,
}

/// One raw timeline entry from the draft. Blank entries are dropped at
/// finalization, not at submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub text: String,
}

impl TimelineEntry {
    pub fn is_blank(&self) -> bool {
        self.date.is_empty() && self.text.is_empty()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Metadata missing field: {0}")]
    Missing(&'static str),

    #[error("Metadata field {field} malformed: {reason}")]
    Malformed { field: &'static str, reason: String },
}

/// Flatten a draft into the gateway metadata map.
///
/// Lists ride as JSON strings; gateways only carry flat string pairs.
pub fn encode_metadata(draft: &LegacyDraft) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("slotId".to_string(), draft.slot_id.to_string());
    map.insert("userId".to_string(), draft.user_id.clone());
    map.insert("fullName".to_string(), draft.full_name.clone());
    map.insert("biography".to_string(), draft.biography.clone());
    map.insert("quote".to_string(), draft.quote.clone());
    map.insert("status".to_string(), draft.life_status.to_string());
    if let Some(birth) = &draft.birth_date {
        map.insert("birthDate".to_string(), birth.clone());
    }
    if let Some(death) = &draft.death_date {
        map.insert("deathDate".to_string(), death.clone());
    }
    map.insert(
        "photos".to_string(),
        serde_json::to_string(&draft.photos).unwrap_or_else(|_| "[]".to_string()),
    );
    map.insert(
        "timelineEvents".to_string(),
        serde_json::to_string(&draft.timeline_events).unwrap_or_else(|_| "[]".to_string()),
    );
    map
}

/// Rebuild the draft from webhook metadata.
///
/// Only `slotId` and `userId` are hard requirements; everything else falls
/// back to its default so a session created by an older client still
/// finalizes.
pub fn decode_metadata(map: &BTreeMap<String, String>) -> Result<LegacyDraft, MetadataError> {
    let slot_id = map
        .get("slotId")
        .ok_or(MetadataError::Missing("slotId"))?
        .parse::<i32>()
        .map_err(|err| MetadataError::Malformed {
            field: "slotId",
            reason: err.to_string(),
        })?;

    let user_id = map
        .get("userId")
        .filter(|value| !value.is_empty())
        .ok_or(MetadataError::Missing("userId"))?
        .clone();

    let photos: Vec<String> = match map.get("photos") {
        Some(raw) => serde_json::from_str(raw).map_err(|err| MetadataError::Malformed {
            field: "photos",
            reason: err.to_string(),
        })?,
        None => Vec::new(),
    };

    let timeline_events: Vec<TimelineEntry> = match map.get("timelineEvents") {
        Some(raw) => serde_json::from_str(raw).map_err(|err| MetadataError::Malformed {
            field: "timelineEvents",
            reason: err.to_string(),
        })?,
        None => Vec::new(),
    };

    let life_status = map
        .get("status")
        .and_then(|value| LifeStatus::parse(value))
        .unwrap_or_default();

    Ok(LegacyDraft {
        slot_id,
        user_id,
        full_name: map.get("fullName").cloned().unwrap_or_default(),
        biography: map.get("biography").cloned().unwrap_or_default(),
        quote: map.get("quote").cloned().unwrap_or_default(),
        life_status,
        birth_date: map.get("birthDate").cloned(),
        death_date: map.get("deathDate").cloned(),
        photos,
        timeline_events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> LegacyDraft {
        LegacyDraft {
            slot_id: 42,
            user_id: "user_abc".to_string(),
            full_name: "Ada Lovelace".to_string(),
            biography: "Wrote the first program.".to_string(),
            quote: "That brain of mine".to_string(),
            life_status: LifeStatus::Deceased,
            birth_date: Some("1815-12-10".to_string()),
            death_date: Some("1852-11-27".to_string()),
            photos: vec![
                "https://cdn.example/a.jpg".to_string(),
                "https://cdn.example/b.jpg".to_string(),
            ],
            timeline_events: vec![
                TimelineEntry {
                    date: "1833".to_string(),
                    text: "Met Babbage".to_string(),
                },
                TimelineEntry::default(),
            ],
        }
    }

    #[test]
    fn metadata_survives_the_gateway_round_trip() {
        let original = draft();
        let decoded = decode_metadata(&encode_metadata(&original)).unwrap();

        assert_eq!(decoded.slot_id, 42);
        assert_eq!(decoded.user_id, "user_abc");
        assert_eq!(decoded.full_name, original.full_name);
        assert_eq!(decoded.life_status, LifeStatus::Deceased);
        assert_eq!(decoded.birth_date.as_deref(), Some("1815-12-10"));
        assert_eq!(decoded.photos, original.photos);
        assert_eq!(decoded.timeline_events.len(), 2);
        assert!(decoded.timeline_events[1].is_blank());
    }

    #[test]
    fn decode_requires_slot_and_user() {
        let mut map = encode_metadata(&draft());
        map.remove("userId");
        assert_eq!(decode_metadata(&map), Err(MetadataError::Missing("userId")));

        let mut map = encode_metadata(&draft());
        map.remove("slotId");
        assert_eq!(decode_metadata(&map), Err(MetadataError::Missing("slotId")));
    }

    #[test]
    fn decode_tolerates_missing_lists_and_unknown_status() {
        let mut map = encode_metadata(&draft());
        map.remove("photos");
        map.remove("timelineEvents");
        map.insert("status".to_string(), "Immortal".to_string());

        let decoded = decode_metadata(&map).unwrap();
        assert!(decoded.photos.is_empty());
        assert!(decoded.timeline_events.is_empty());
        assert_eq!(decoded.life_status, LifeStatus::Living);
    }

    #[test]
    fn decode_rejects_malformed_lists() {
        let mut map = encode_metadata(&draft());
        map.insert("photos".to_string(), "not json".to_string());
        assert!(matches!(
            decode_metadata(&map),
            Err(MetadataError::Malformed { field: "photos", .. })
        ));
    }

    #[test]
    fn draft_accepts_camel_case_payloads() {
        let body = serde_json::json!({
            "slotId": 7,
            "userId": "user_1",
            "fullName": "Grace Hopper",
            "biography": "Compiler pioneer",
            "status": "Deceased",
            "photos": ["https://cdn.example/g.jpg"],
            "timelineEvents": [{"date": "1952", "text": "A-0 system"}]
        });
        let draft: LegacyDraft = serde_json::from_value(body).unwrap();
        assert_eq!(draft.slot_id, 7);
        assert_eq!(draft.life_status, LifeStatus::Deceased);
        assert_eq!(draft.quote, "");
        assert_eq!(draft.timeline_events[0].date, "1952");
    }
}
