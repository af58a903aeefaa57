//! Core data types
//!
//! Diary records and block events consumed by the engine, the feature vector
//! shared by every scoring module, and the outcome wrapper modules report through.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Kind of diary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A gambling episode
    Episode,
    /// A positive/recovery note without gambling
    Positive,
}

/// Self-reported mood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Terrible,
    Bad,
    Neutral,
    Good,
    Great,
    /// Any value the diary store sends that is not in the scale
    #[serde(other)]
    Unknown,
}

impl Mood {
    /// Ordinal 1-5 value, `None` for unknown moods.
    pub fn ordinal(&self) -> Option<f64> {
        match self {
            Mood::Terrible => Some(1.0),
            Mood::Bad => Some(2.0),
            Mood::Neutral => Some(3.0),
            Mood::Good => Some(4.0),
            Mood::Great => Some(5.0),
            Mood::Unknown => None,
        }
    }
}

/// Trigger tag attached to an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerTag {
    Stress,
    Boredom,
    Loneliness,
    Sadness,
    Anger,
    Anxiety,
    Alcohol,
    Ads,
    #[serde(other)]
    Other,
}

impl TriggerTag {
    /// Triggers rooted in an emotional state rather than the environment
    pub fn is_emotional(&self) -> bool {
        matches!(
            self,
            TriggerTag::Stress
                | TriggerTag::Boredom
                | TriggerTag::Loneliness
                | TriggerTag::Sadness
                | TriggerTag::Anger
                | TriggerTag::Anxiety
        )
    }
}

/// A validated diary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: DateTime<Utc>,
    pub kind: EntryKind,
    /// Amount spent, must be finite and non-negative
    #[serde(default)]
    pub amount_spent: f64,
    /// Episode duration in minutes, must be finite and non-negative
    #[serde(default)]
    pub duration_minutes: f64,
    #[serde(default)]
    pub mood_before: Option<Mood>,
    #[serde(default)]
    pub mood_after: Option<Mood>,
    #[serde(default)]
    pub triggers: BTreeSet<TriggerTag>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DiaryEntry {
    pub fn is_episode(&self) -> bool {
        self.kind == EntryKind::Episode
    }

    /// Note text if present and not blank
    pub fn note_text(&self) -> Option<&str> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// A blocked-site access attempt reported by the blocking collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEvent {
    pub user_id: Uuid,
    pub domain: String,
    pub timestamp: DateTime<Utc>,
}

/// Identifies one of the six model inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    EpisodeFrequency,
    SpendingTrend,
    MoodScore,
    NightActivityRatio,
    TriggerDiversity,
    StreakDays,
}

impl Feature {
    /// Input order of the network
    pub const ALL: [Feature; 6] = [
        Feature::EpisodeFrequency,
        Feature::SpendingTrend,
        Feature::MoodScore,
        Feature::NightActivityRatio,
        Feature::TriggerDiversity,
        Feature::StreakDays,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Feature::EpisodeFrequency => "episodeFrequency",
            Feature::SpendingTrend => "spendingTrend",
            Feature::MoodScore => "moodScore",
            Feature::NightActivityRatio => "nightActivityRatio",
            Feature::TriggerDiversity => "triggerDiversity",
            Feature::StreakDays => "streakDays",
        }
    }

    /// Human-readable label for explanations
    pub fn label(&self) -> &'static str {
        match self {
            Feature::EpisodeFrequency => "Episode frequency",
            Feature::SpendingTrend => "Spending trend",
            Feature::MoodScore => "Mood before episodes",
            Feature::NightActivityRatio => "Night activity",
            Feature::TriggerDiversity => "Trigger diversity",
            Feature::StreakDays => "Abstinence streak",
        }
    }
}

/// Fixed-size numeric summary of recent behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    /// Episodes inside the trailing window
    pub episode_frequency: f64,
    /// Recent-half over prior-half average spend (1.0 = unchanged)
    pub spending_trend: f64,
    /// Mean mood before episodes on the 1-5 scale (3.0 when unknown)
    pub mood_score: f64,
    /// Fraction of episodes in the night window, 0-1
    pub night_activity_ratio: f64,
    /// Distinct trigger tags used
    pub trigger_diversity: f64,
    /// Whole days since the most recent episode
    pub streak_days: f64,
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::EpisodeFrequency => self.episode_frequency,
            Feature::SpendingTrend => self.spending_trend,
            Feature::MoodScore => self.mood_score,
            Feature::NightActivityRatio => self.night_activity_ratio,
            Feature::TriggerDiversity => self.trigger_diversity,
            Feature::StreakDays => self.streak_days,
        }
    }

    pub fn as_array(&self) -> [f64; 6] {
        Feature::ALL.map(|f| self.get(f))
    }

    /// First feature holding NaN or an infinity, if any
    pub fn first_non_finite(&self) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| !self.get(*f).is_finite())
    }
}

/// Result state of one scoring module
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleOutcome<T> {
    /// The module produced a result
    Ready(T),
    /// Not enough input to say anything meaningful
    InsufficientData { reason: String },
    /// The module could not run on the given input
    Failed { reason: String },
}

impl<T> ModuleOutcome<T> {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        ModuleOutcome::InsufficientData {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        ModuleOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ModuleOutcome::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModuleOutcome::Ready(_))
    }

    pub fn status(&self) -> ModuleStatus {
        match self {
            ModuleOutcome::Ready(_) => ModuleStatus::Ready,
            ModuleOutcome::InsufficientData { .. } => ModuleStatus::InsufficientData,
            ModuleOutcome::Failed { .. } => ModuleStatus::Failed,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ModuleOutcome::Ready(_) => None,
            ModuleOutcome::InsufficientData { reason } | ModuleOutcome::Failed { reason } => {
                Some(reason)
            }
        }
    }
}

/// Serialized status tag of a module outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Ready,
    InsufficientData,
    Failed,
}

/// Input list a dropped record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordSource {
    Entries,
    BlockEvents,
}

/// Why a record was left out of the computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIssue {
    pub source: RecordSource,
    /// Position of the record in its input list
    pub index: usize,
    pub reason: String,
}

/// Record-level data quality of one assessment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub total_records: usize,
    pub used_records: usize,
    pub dropped_records: usize,
    pub issues: Vec<DataIssue>,
}

impl DataQuality {
    pub(crate) fn drop_record(
        &mut self,
        source: RecordSource,
        index: usize,
        reason: impl Into<String>,
    ) {
        self.dropped_records += 1;
        self.issues.push(DataIssue {
            source,
            index,
            reason: reason.into(),
        });
    }

    /// Fold in records dropped before this stage saw the input.
    ///
    /// Upstream drops never reached this stage, so they add to the total
    /// and dropped counts but not to the used count.
    pub fn include_upstream(&mut self, upstream: DataQuality) {
        self.total_records += upstream.dropped_records;
        self.dropped_records += upstream.dropped_records;
        self.issues.extend(upstream.issues);
        self.issues.sort_by_key(|issue| (issue.source, issue.index));
    }
}

/// Everything the engine needs for one user, fetched once by the caller
#[derive(Debug, Clone)]
pub struct AssessmentRequest {
    pub user_id: Uuid,
    /// Evaluation instant; the engine never reads the wall clock
    pub now: DateTime<Utc>,
    /// Streak fallback when the user has no episodes at all
    pub account_created_at: DateTime<Utc>,
    /// Offset used for local hour and calendar-day computations
    pub utc_offset: FixedOffset,
    pub entries: Vec<DiaryEntry>,
    pub block_events: Vec<BlockEvent>,
    /// Drops that happened before the request was built (record decoding)
    pub upstream_quality: DataQuality,
}

impl AssessmentRequest {
    /// Request in UTC with no upstream drops
    pub fn new(
        user_id: Uuid,
        now: DateTime<Utc>,
        account_created_at: DateTime<Utc>,
        entries: Vec<DiaryEntry>,
        block_events: Vec<BlockEvent>,
    ) -> Self {
        Self {
            user_id,
            now,
            account_created_at,
            utc_offset: utc(),
            entries,
            block_events,
            upstream_quality: DataQuality::default(),
        }
    }
}

pub(crate) fn utc() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mood_and_trigger_decode() {
        let mood: Mood = serde_json::from_str("\"ecstatic\"").unwrap();
        assert_eq!(mood, Mood::Unknown);
        assert_eq!(mood.ordinal(), None);

        let trigger: TriggerTag = serde_json::from_str("\"payday\"").unwrap();
        assert_eq!(trigger, TriggerTag::Other);
        assert!(!trigger.is_emotional());
        assert!(TriggerTag::Loneliness.is_emotional());
    }

    #[test]
    fn test_diary_entry_deserialization() {
        let json = r#"{
            "id": "7f1c7d0e-8a53-4c0e-9b7a-0d6f0c1c2a11",
            "userId": "2b8f5b4e-1d3c-4f7a-8e9d-5c6b7a8f9e01",
            "date": "2026-03-09T02:00:00Z",
            "kind": "episode",
            "amountSpent": 15000,
            "moodBefore": "terrible",
            "triggers": ["stress", "loneliness"],
            "notes": "  "
        }"#;

        let entry: DiaryEntry = serde_json::from_str(json).unwrap();
        assert!(entry.is_episode());
        assert_eq!(entry.amount_spent, 15000.0);
        assert_eq!(entry.duration_minutes, 0.0);
        assert_eq!(entry.triggers.len(), 2);
        assert_eq!(entry.note_text(), None);
    }

    #[test]
    fn test_feature_vector_order_and_finiteness() {
        let mut features = FeatureVector {
            episode_frequency: 3.0,
            spending_trend: 1.0,
            mood_score: 2.0,
            night_activity_ratio: 0.5,
            trigger_diversity: 2.0,
            streak_days: 1.0,
        };
        assert_eq!(features.as_array(), [3.0, 1.0, 2.0, 0.5, 2.0, 1.0]);
        assert_eq!(features.first_non_finite(), None);

        features.spending_trend = f64::INFINITY;
        assert_eq!(features.first_non_finite(), Some(Feature::SpendingTrend));
    }

    #[test]
    fn test_upstream_drops_fold_into_totals() {
        let mut upstream = DataQuality {
            total_records: 6,
            used_records: 4,
            ..Default::default()
        };
        upstream.drop_record(RecordSource::BlockEvents, 0, "missing timestamp");
        upstream.drop_record(RecordSource::Entries, 4, "negative amount");

        let mut extractor = DataQuality {
            total_records: 4,
            used_records: 3,
            ..Default::default()
        };
        extractor.drop_record(RecordSource::Entries, 1, "non-finite amount");

        extractor.include_upstream(upstream);
        assert_eq!(extractor.total_records, 6);
        assert_eq!(extractor.used_records, 3);
        assert_eq!(extractor.dropped_records, 3);
        let order: Vec<_> = extractor.issues.iter().map(|i| (i.source, i.index)).collect();
        assert_eq!(
            order,
            vec![
                (RecordSource::Entries, 1),
                (RecordSource::Entries, 4),
                (RecordSource::BlockEvents, 0)
            ]
        );
    }

    #[test]
    fn test_module_outcome_accessors() {
        let ready: ModuleOutcome<u8> = ModuleOutcome::Ready(7);
        assert_eq!(ready.ready(), Some(&7));
        assert_eq!(ready.status(), ModuleStatus::Ready);
        assert_eq!(ready.reason(), None);

        let missing: ModuleOutcome<u8> = ModuleOutcome::insufficient("no text data");
        assert!(!missing.is_ready());
        assert_eq!(missing.status(), ModuleStatus::InsufficientData);
        assert_eq!(missing.reason(), Some("no text data"));
    }
}
