//! Assessment input schema
//!
//! The diary store hands the engine loosely-typed JSON. Records are kept as
//! `serde_json::Value` until the adapter decodes them one by one, so a single
//! malformed record never rejects the whole bundle.

use crate::types::{DiaryEntry, EntryKind, Mood, TriggerTag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Largest accepted UTC offset, in minutes
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// One user's history as submitted for assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentBundle {
    pub user_id: Uuid,
    /// Evaluation instant
    pub now: DateTime<Utc>,
    pub account_created_at: DateTime<Utc>,
    /// Fixed offset used for local hours and calendar days
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub entries: Vec<serde_json::Value>,
    #[serde(default)]
    pub block_events: Vec<serde_json::Value>,
}

/// Diary record as stored upstream, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiaryRecord {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// RFC 3339 instant or a bare `YYYY-MM-DD` local date
    #[serde(default)]
    pub date: Option<String>,
    /// Defaults to an episode
    #[serde(default, alias = "type")]
    pub kind: Option<EntryKind>,
    #[serde(default)]
    pub amount_spent: Option<f64>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
    #[serde(default)]
    pub mood_before: Option<Mood>,
    #[serde(default)]
    pub mood_after: Option<Mood>,
    #[serde(default)]
    pub triggers: Vec<TriggerTag>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Block event as reported by the blocking collaborator, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlockEvent {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Why a single record was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing date")]
    MissingDate,

    #[error("unparsable date {0:?}")]
    UnparsableDate(String),

    #[error("negative amount {0}")]
    NegativeAmount(f64),

    #[error("non-finite amount")]
    NonFiniteAmount,

    #[error("negative or non-finite duration")]
    NegativeDuration,

    #[error("record belongs to user {0}")]
    ForeignUser(Uuid),

    #[error("undecodable record: {0}")]
    Undecodable(String),
}

/// Check the numeric invariants of an already-typed entry.
///
/// Shared by the record adapter and the feature extractor, which also
/// receives entries built in code rather than decoded from JSON.
pub fn check_entry(entry: &DiaryEntry, user_id: Uuid) -> Result<(), ValidationError> {
    if entry.user_id != user_id {
        return Err(ValidationError::ForeignUser(entry.user_id));
    }
    if !entry.amount_spent.is_finite() {
        return Err(ValidationError::NonFiniteAmount);
    }
    if entry.amount_spent < 0.0 {
        return Err(ValidationError::NegativeAmount(entry.amount_spent));
    }
    if !entry.duration_minutes.is_finite() || entry.duration_minutes < 0.0 {
        return Err(ValidationError::NegativeDuration);
    }
    Ok(())
}

impl RawDiaryRecord {
    pub(crate) fn into_entry(
        self,
        user_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<DiaryEntry, ValidationError> {
        let entry = DiaryEntry {
            id: self.id.unwrap_or_else(Uuid::nil),
            user_id: self.user_id.unwrap_or(user_id),
            date,
            kind: self.kind.unwrap_or(EntryKind::Episode),
            amount_spent: self.amount_spent.unwrap_or(0.0),
            duration_minutes: self.duration_minutes.unwrap_or(0.0),
            mood_before: self.mood_before,
            mood_after: self.mood_after,
            triggers: self.triggers.into_iter().collect::<BTreeSet<_>>(),
            notes: self.notes,
        };
        check_entry(&entry, user_id)?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user() -> Uuid {
        Uuid::parse_str("2b8f5b4e-1d3c-4f7a-8e9d-5c6b7a8f9e01").unwrap()
    }

    #[test]
    fn test_raw_record_defaults() {
        let raw: RawDiaryRecord =
            serde_json::from_str(r#"{ "date": "2026-03-05T14:00:00Z", "type": "positive" }"#)
                .unwrap();
        let date = Utc.with_ymd_and_hms(2026, 3, 5, 14, 0, 0).unwrap();
        let entry = raw.into_entry(user(), date).unwrap();

        assert_eq!(entry.kind, EntryKind::Positive);
        assert_eq!(entry.user_id, user());
        assert_eq!(entry.id, Uuid::nil());
        assert_eq!(entry.amount_spent, 0.0);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let raw = RawDiaryRecord {
            amount_spent: Some(-50.0),
            ..Default::default()
        };
        let date = Utc.with_ymd_and_hms(2026, 3, 5, 14, 0, 0).unwrap();
        assert_eq!(
            raw.into_entry(user(), date).unwrap_err(),
            ValidationError::NegativeAmount(-50.0)
        );
    }

    #[test]
    fn test_foreign_user_rejected() {
        let other = Uuid::parse_str("00000000-0000-0000-0000-000000000042").unwrap();
        let raw = RawDiaryRecord {
            user_id: Some(other),
            ..Default::default()
        };
        let date = Utc.with_ymd_and_hms(2026, 3, 5, 14, 0, 0).unwrap();
        assert_eq!(
            raw.into_entry(user(), date).unwrap_err(),
            ValidationError::ForeignUser(other)
        );
    }

    #[test]
    fn test_bundle_defaults() {
        let json = r#"{
            "userId": "2b8f5b4e-1d3c-4f7a-8e9d-5c6b7a8f9e01",
            "now": "2026-03-10T12:00:00Z",
            "accountCreatedAt": "2026-01-01T00:00:00Z"
        }"#;
        let bundle: AssessmentBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.utc_offset_minutes, 0);
        assert!(bundle.entries.is_empty());
        assert!(bundle.block_events.is_empty());
    }
}
