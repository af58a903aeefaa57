//! Feature extraction
//!
//! This module turns a user's diary history into the six-value feature vector
//! every scoring module reads:
//! - Episode frequency and spending trend over the trailing window
//! - Mood before episodes and night-time share
//! - Trigger diversity and the current abstinence streak
//!
//! The window-filtered entry lists are returned alongside the vector so the
//! downstream modules never filter the history a second time.

use crate::config::{EngineConfig, NightHours};
use crate::schema::check_entry;
use crate::types::{
    AssessmentRequest, BlockEvent, DataQuality, DiaryEntry, FeatureVector, RecordSource,
};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Neutral mood on the 1-5 scale, used when no episode reports a mood
pub const NEUTRAL_MOOD: f64 = 3.0;

/// Spending trend when either half of the window has nothing to compare
pub const NEUTRAL_SPENDING_TREND: f64 = 1.0;

/// Spending trend when the prior half spent nothing and the recent half did
pub const ESCALATED_SPENDING_TREND: f64 = 2.0;

/// The trailing window an assessment covers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionWindow {
    pub days: u32,
    /// Inclusive start instant, local midnight of `first_day`
    pub start: DateTime<Utc>,
    /// Inclusive end instant (the evaluation `now`)
    pub end: DateTime<Utc>,
    /// First local calendar day of the daily series
    pub first_day: NaiveDate,
    /// Last local calendar day of the daily series
    pub last_day: NaiveDate,
    #[serde(skip)]
    pub offset: FixedOffset,
}

impl ExtractionWindow {
    /// The last `days` local calendar days, today included, ending at `now`.
    ///
    /// `start` is local midnight of the first day, so the instant range and
    /// the daily series cover exactly the same records.
    pub fn new(now: DateTime<Utc>, days: u32, offset: FixedOffset) -> Self {
        let last_day = now.with_timezone(&offset).date_naive();
        let first_day = last_day - Duration::days(i64::from(days) - 1);
        let local_midnight = first_day.and_time(NaiveTime::MIN);
        let start = Utc.from_utc_datetime(
            &(local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()))),
        );
        Self {
            days,
            start,
            end: now,
            first_day,
            last_day,
            offset,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Local calendar day of an instant
    pub fn local_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Local hour of an instant
    pub fn local_hour(&self, instant: DateTime<Utc>) -> u32 {
        instant.with_timezone(&self.offset).hour()
    }

    /// Every local day in the daily series, oldest first
    pub fn days_iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first_day
            .iter_days()
            .take_while(move |day| *day <= self.last_day)
    }
}

/// Output of the extractor: the feature vector and the records behind it
#[derive(Debug, Clone)]
pub struct Extraction {
    pub features: FeatureVector,
    pub window: ExtractionWindow,
    /// Valid entries of any kind inside the window, oldest first
    pub entries: Vec<DiaryEntry>,
    /// Valid episodes inside the window, oldest first
    pub episodes: Vec<DiaryEntry>,
    /// Block events inside the window, oldest first
    pub block_events: Vec<BlockEvent>,
    pub night_episodes: usize,
    pub quality: DataQuality,
}

/// Feature extractor for one engine configuration
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    window_days: u32,
    night_hours: NightHours,
}

impl FeatureExtractor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window_days: config.window_days,
            night_hours: config.night_hours,
        }
    }

    pub fn night_hours(&self) -> NightHours {
        self.night_hours
    }

    /// Extract the feature vector from a request
    pub fn extract(&self, request: &AssessmentRequest) -> Extraction {
        let window = ExtractionWindow::new(request.now, self.window_days, request.utc_offset);

        // Stage 1: drop records that break the input contract
        let mut quality = DataQuality {
            total_records: request.entries.len() + request.block_events.len(),
            ..Default::default()
        };
        let mut valid: Vec<&DiaryEntry> = Vec::with_capacity(request.entries.len());
        for (index, entry) in request.entries.iter().enumerate() {
            match check_entry(entry, request.user_id) {
                Ok(()) => valid.push(entry),
                Err(e) => {
                    warn!(index, reason = %e, "excluding diary entry");
                    quality.drop_record(RecordSource::Entries, index, e.to_string());
                }
            }
        }
        let mut block_events = Vec::new();
        let mut used_blocks = 0;
        for (index, event) in request.block_events.iter().enumerate() {
            if event.user_id != request.user_id {
                warn!(index, "excluding block event of another user");
                quality.drop_record(
                    RecordSource::BlockEvents,
                    index,
                    format!("record belongs to user {}", event.user_id),
                );
                continue;
            }
            used_blocks += 1;
            if window.contains(event.timestamp) {
                block_events.push(event.clone());
            }
        }
        quality.used_records = valid.len() + used_blocks;
        block_events.sort_by_key(|e| e.timestamp);

        // Stage 2: window filtering
        let mut entries: Vec<DiaryEntry> = valid
            .iter()
            .filter(|e| window.contains(e.date))
            .map(|e| (*e).clone())
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        let episodes: Vec<DiaryEntry> = entries.iter().filter(|e| e.is_episode()).cloned().collect();

        // Stage 3: features
        let night_episodes = episodes
            .iter()
            .filter(|e| self.night_hours.contains(window.local_hour(e.date)))
            .count();

        let features = FeatureVector {
            episode_frequency: episodes.len() as f64,
            spending_trend: compute_spending_trend(&episodes, &window),
            mood_score: compute_mood_score(&episodes),
            night_activity_ratio: ratio(night_episodes, episodes.len()),
            trigger_diversity: compute_trigger_diversity(&episodes) as f64,
            streak_days: compute_streak_days(&valid, request, &window),
        };

        debug!(
            entries = entries.len(),
            episodes = episodes.len(),
            block_events = block_events.len(),
            dropped = quality.dropped_records,
            "extracted features"
        );

        Extraction {
            features,
            window,
            entries,
            episodes,
            block_events,
            night_episodes,
            quality,
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Average spend per episode in the recent half of the window over the prior half
fn compute_spending_trend(episodes: &[DiaryEntry], window: &ExtractionWindow) -> f64 {
    let midpoint = window.end - Duration::seconds(i64::from(window.days) * 86_400 / 2);

    let (recent, prior): (Vec<&DiaryEntry>, Vec<&DiaryEntry>) =
        episodes.iter().partition(|e| e.date >= midpoint);
    if recent.is_empty() || prior.is_empty() {
        return NEUTRAL_SPENDING_TREND;
    }

    let prior_avg = average_spend(&prior);
    let recent_avg = average_spend(&recent);
    if prior_avg <= 0.0 {
        return if recent_avg > 0.0 {
            ESCALATED_SPENDING_TREND
        } else {
            NEUTRAL_SPENDING_TREND
        };
    }
    recent_avg / prior_avg
}

fn average_spend(group: &[&DiaryEntry]) -> f64 {
    group.iter().map(|e| e.amount_spent).sum::<f64>() / group.len() as f64
}

fn compute_mood_score(episodes: &[DiaryEntry]) -> f64 {
    let moods: Vec<f64> = episodes
        .iter()
        .filter_map(|e| e.mood_before.and_then(|m| m.ordinal()))
        .collect();
    if moods.is_empty() {
        NEUTRAL_MOOD
    } else {
        moods.iter().sum::<f64>() / moods.len() as f64
    }
}

fn compute_trigger_diversity(episodes: &[DiaryEntry]) -> usize {
    episodes
        .iter()
        .flat_map(|e| e.triggers.iter().copied())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Local calendar days since the latest episode at or before `now`.
///
/// Looks at the whole valid history, not just the window. With no episode
/// at all the streak runs from account creation.
fn compute_streak_days(
    valid: &[&DiaryEntry],
    request: &AssessmentRequest,
    window: &ExtractionWindow,
) -> f64 {
    let today = window.last_day;
    let latest = valid
        .iter()
        .filter(|e| e.is_episode() && e.date <= request.now)
        .map(|e| e.date)
        .max();

    let days = match latest {
        Some(date) => (today - window.local_day(date)).num_days(),
        None => (request.now - request.account_created_at).num_days(),
    };
    days.max(0) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryKind, Mood, TriggerTag};
    use uuid::Uuid;

    fn user() -> Uuid {
        Uuid::parse_str("2b8f5b4e-1d3c-4f7a-8e9d-5c6b7a8f9e01").unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn episode(date: DateTime<Utc>, amount: f64, mood: Mood, triggers: &[TriggerTag]) -> DiaryEntry {
        DiaryEntry {
            id: Uuid::nil(),
            user_id: user(),
            date,
            kind: EntryKind::Episode,
            amount_spent: amount,
            duration_minutes: 30.0,
            mood_before: Some(mood),
            mood_after: None,
            triggers: triggers.iter().copied().collect(),
            notes: None,
        }
    }

    fn request(entries: Vec<DiaryEntry>) -> AssessmentRequest {
        AssessmentRequest::new(
            user(),
            now(),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            entries,
            vec![],
        )
    }

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&EngineConfig::default())
    }

    #[test]
    fn test_empty_history_uses_neutral_defaults() {
        let extraction = extractor().extract(&request(vec![]));
        let f = extraction.features;

        assert_eq!(f.episode_frequency, 0.0);
        assert_eq!(f.spending_trend, 1.0);
        assert_eq!(f.mood_score, 3.0);
        assert_eq!(f.night_activity_ratio, 0.0);
        assert_eq!(f.trigger_diversity, 0.0);
        // 2026-01-01 to 2026-03-10 12:00
        assert_eq!(f.streak_days, 68.0);
        assert!(f.first_non_finite().is_none());
    }

    #[test]
    fn test_scenario_features() {
        let entries = vec![
            episode(
                Utc.with_ymd_and_hms(2026, 3, 5, 14, 0, 0).unwrap(),
                1000.0,
                Mood::Neutral,
                &[TriggerTag::Stress],
            ),
            episode(
                Utc.with_ymd_and_hms(2026, 3, 7, 19, 0, 0).unwrap(),
                1200.0,
                Mood::Bad,
                &[TriggerTag::Stress],
            ),
            episode(
                Utc.with_ymd_and_hms(2026, 3, 9, 2, 0, 0).unwrap(),
                15000.0,
                Mood::Terrible,
                &[TriggerTag::Loneliness],
            ),
        ];
        let extraction = extractor().extract(&request(entries));
        let f = extraction.features;

        assert_eq!(f.episode_frequency, 3.0);
        assert_eq!(f.spending_trend, 1.0);
        assert!((f.mood_score - 2.0).abs() < 1e-9);
        assert!((f.night_activity_ratio - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(f.trigger_diversity, 2.0);
        assert_eq!(f.streak_days, 1.0);
        assert_eq!(extraction.night_episodes, 1);
    }

    #[test]
    fn test_spending_trend_compares_window_halves() {
        let entries = vec![
            episode(Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap(), 100.0, Mood::Bad, &[]),
            episode(Utc.with_ymd_and_hms(2026, 2, 18, 12, 0, 0).unwrap(), 300.0, Mood::Bad, &[]),
            episode(Utc.with_ymd_and_hms(2026, 3, 6, 12, 0, 0).unwrap(), 800.0, Mood::Bad, &[]),
        ];
        let f = extractor().extract(&request(entries)).features;
        // recent 800 over prior (100 + 300) / 2
        assert!((f.spending_trend - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_spending_after_free_play_is_escalation() {
        let entries = vec![
            episode(Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap(), 0.0, Mood::Bad, &[]),
            episode(Utc.with_ymd_and_hms(2026, 2, 16, 12, 0, 0).unwrap(), 0.0, Mood::Bad, &[]),
            episode(Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap(), 20_000.0, Mood::Bad, &[]),
            episode(Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap(), 20_000.0, Mood::Bad, &[]),
        ];
        let f = extractor().extract(&request(entries)).features;
        assert_eq!(f.spending_trend, ESCALATED_SPENDING_TREND);
    }

    #[test]
    fn test_spending_trend_neutral_without_spend_or_history() {
        let no_spend = vec![
            episode(Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap(), 0.0, Mood::Bad, &[]),
            episode(Utc.with_ymd_and_hms(2026, 3, 6, 12, 0, 0).unwrap(), 0.0, Mood::Bad, &[]),
        ];
        assert_eq!(extractor().extract(&request(no_spend)).features.spending_trend, 1.0);

        let recent_only = vec![
            episode(Utc.with_ymd_and_hms(2026, 3, 6, 12, 0, 0).unwrap(), 800.0, Mood::Bad, &[]),
        ];
        assert_eq!(extractor().extract(&request(recent_only)).features.spending_trend, 1.0);
    }

    #[test]
    fn test_window_excludes_old_and_future_entries() {
        let entries = vec![
            episode(Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap(), 100.0, Mood::Bad, &[]),
            episode(Utc.with_ymd_and_hms(2026, 3, 11, 12, 0, 0).unwrap(), 100.0, Mood::Bad, &[]),
        ];
        let extraction = extractor().extract(&request(entries));
        assert_eq!(extraction.features.episode_frequency, 0.0);
        // streak measured from the old episode, the future one is ignored
        assert_eq!(extraction.features.streak_days, 49.0);
    }

    #[test]
    fn test_invalid_entries_counted() {
        let mut bad = episode(now() - Duration::days(1), 100.0, Mood::Bad, &[]);
        bad.amount_spent = f64::NAN;
        let good = episode(now() - Duration::days(2), 100.0, Mood::Bad, &[]);

        let extraction = extractor().extract(&request(vec![bad, good]));
        assert_eq!(extraction.features.episode_frequency, 1.0);
        assert_eq!(extraction.quality.total_records, 2);
        assert_eq!(extraction.quality.dropped_records, 1);
        assert_eq!(extraction.quality.issues[0].index, 0);
        assert_eq!(extraction.features.streak_days, 2.0);
    }

    #[test]
    fn test_night_hours_use_local_offset() {
        // 20:00 UTC is 23:00 in UTC+3
        let entry = episode(Utc.with_ymd_and_hms(2026, 3, 8, 20, 0, 0).unwrap(), 100.0, Mood::Bad, &[]);
        let mut req = request(vec![entry]);
        assert_eq!(extractor().extract(&req).features.night_activity_ratio, 0.0);

        req.utc_offset = FixedOffset::east_opt(3 * 3600).unwrap();
        assert_eq!(extractor().extract(&req).features.night_activity_ratio, 1.0);
    }

    #[test]
    fn test_window_starts_at_local_midnight_of_first_day() {
        let window = ExtractionWindow::new(now(), 30, FixedOffset::east_opt(3 * 3600).unwrap());
        assert_eq!(window.first_day, NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
        // 00:00 on 02-09 in UTC+3
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 2, 8, 21, 0, 0).unwrap());
        assert_eq!(window.local_day(window.start), window.first_day);
    }

    #[test]
    fn test_episode_before_first_local_day_is_outside_window() {
        // after now - 30 days but before 02-09, the first day of the series
        let entries = vec![
            episode(Utc.with_ymd_and_hms(2026, 2, 8, 16, 0, 0).unwrap(), 500.0, Mood::Bad, &[]),
            episode(Utc.with_ymd_and_hms(2026, 2, 9, 0, 0, 0).unwrap(), 700.0, Mood::Bad, &[]),
        ];
        let extraction = extractor().extract(&request(entries));
        assert_eq!(extraction.features.episode_frequency, 1.0);
        assert_eq!(extraction.episodes[0].amount_spent, 700.0);
        assert_eq!(extraction.window.local_day(extraction.episodes[0].date), extraction.window.first_day);
    }

    #[test]
    fn test_window_days_cover_thirty_local_dates() {
        let window = ExtractionWindow::new(now(), 30, FixedOffset::east_opt(0).unwrap());
        let days: Vec<NaiveDate> = window.days_iter().collect();
        assert_eq!(days.len(), 30);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
        assert_eq!(days[29], NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
    }
}
