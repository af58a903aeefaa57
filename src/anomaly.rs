//! Anomaly detection
//!
//! Z-score analysis of daily metric series over the trailing window:
//! - Daily spending
//! - Daily episode count
//! - Daily block attempts
//! - Episodes per local hour of day (once there is enough history)
//!
//! Days without records are zero-filled. Each flagged point becomes one
//! alert; alerts are ordered by severity, then recency, and capped.

use crate::baseline::SeriesBaseline;
use crate::config::{AnomalySettings, NightHours};
use crate::features::{Extraction, ExtractionWindow};
use crate::thresholds::{OverallRisk, Severity};
use crate::types::{DiaryEntry, ModuleOutcome};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

/// Days compared against the rest of the window for escalation
pub const ESCALATION_DAYS: usize = 3;

/// Spending series shorter than this is never checked for escalation
pub const MIN_ESCALATION_SERIES: usize = 7;

/// Metric a series measures, in alert priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Spending,
    Episodes,
    BlockAttempts,
    TimeOfDay,
}

impl Metric {
    fn subject(&self) -> &'static str {
        match self {
            Metric::Spending => "Spending",
            Metric::Episodes => "Episode count",
            Metric::BlockAttempts => "Blocked-site attempts",
            Metric::TimeOfDay => "Episodes",
        }
    }
}

/// One flagged data point
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub metric: Metric,
    /// Local day for daily series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<NaiveDate>,
    /// Local hour for the time-of-day histogram
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    pub value: f64,
    pub z_score: f64,
    pub severity: Severity,
}

impl Anomaly {
    fn message(&self) -> String {
        let direction = if self.z_score >= 0.0 { "spike" } else { "drop" };
        let value = format_value(self.value);
        let severity = match self.severity {
            Severity::Critical => "critical",
            _ => "warning",
        };
        match (self.day, self.hour) {
            (Some(day), _) => format!(
                "{} {direction} on {day}: {value} (z = {:.2}, {severity})",
                self.metric.subject(),
                self.z_score
            ),
            (None, Some(hour)) => format!(
                "Unusual number of episodes at {hour:02}:00: {value} (z = {:.2}, {severity})",
                self.z_score
            ),
            (None, None) => format!(
                "{} {direction}: {value} (z = {:.2}, {severity})",
                self.metric.subject(),
                self.z_score
            ),
        }
    }
}

/// Human-readable alert for one anomaly
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub metric: Metric,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    pub value: f64,
    pub z_score: f64,
    pub message: String,
}

impl From<&Anomaly> for Alert {
    fn from(anomaly: &Anomaly) -> Self {
        Alert {
            metric: anomaly.metric,
            severity: anomaly.severity,
            day: anomaly.day,
            hour: anomaly.hour,
            value: anomaly.value,
            z_score: anomaly.z_score,
            message: anomaly.message(),
        }
    }
}

/// Statistics and flagged points of one daily series
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesReport {
    pub stats: SeriesBaseline,
    pub anomalies: Vec<Anomaly>,
}

/// When episodes happen
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePatterns {
    /// Hour with the most episodes, earliest on ties
    pub peak_hour: Option<u32>,
    /// Weekday with the most episodes, Monday first on ties
    pub peak_weekday: Option<String>,
    /// Same value as the `nightActivityRatio` feature
    pub night_ratio: f64,
    /// Episode count per local hour 0-23
    pub hourly: Vec<u32>,
    /// Whether the histogram had enough episodes to be scored
    pub analyzed: bool,
    pub anomalies: Vec<Anomaly>,
}

/// Counts, overall risk and ordered alerts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalySummary {
    pub total_anomalies: usize,
    pub critical_count: usize,
    pub warning_count: usize,
    pub overall_risk: OverallRisk,
    /// Most severe and most recent first
    pub alerts: Vec<Alert>,
    /// Informational observations that are not Z-score anomalies
    pub notes: Vec<String>,
}

/// Output of the anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    pub spending: SeriesReport,
    pub episodes: SeriesReport,
    pub block_attempts: SeriesReport,
    pub time_patterns: TimePatterns,
    pub summary: AnomalySummary,
}

/// Z-score anomaly detector
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    settings: AnomalySettings,
    night_hours: NightHours,
}

impl AnomalyDetector {
    pub fn new(settings: AnomalySettings, night_hours: NightHours) -> Self {
        Self {
            settings,
            night_hours,
        }
    }

    /// Analyze the window of an extraction
    pub fn analyze(&self, extraction: &Extraction) -> ModuleOutcome<AnomalyReport> {
        if extraction.entries.is_empty() && extraction.block_events.is_empty() {
            return ModuleOutcome::insufficient("no diary entries or block events in the window");
        }
        let window = &extraction.window;

        // Stage 1: zero-filled daily series
        let mut spending = daily_series(window);
        let mut episodes = daily_series(window);
        let mut blocks = daily_series(window);
        for entry in &extraction.episodes {
            let day = window.local_day(entry.date);
            if let Some(total) = spending.get_mut(&day) {
                *total += entry.amount_spent;
            }
            if let Some(count) = episodes.get_mut(&day) {
                *count += 1.0;
            }
        }
        for event in &extraction.block_events {
            if let Some(count) = blocks.get_mut(&window.local_day(event.timestamp)) {
                *count += 1.0;
            }
        }

        // Stage 2: per-series Z-scores
        let daily_spend: Vec<f64> = spending.values().copied().collect();
        let spending = score_daily(Metric::Spending, &spending);
        let episode_report = score_daily(Metric::Episodes, &episodes);
        let block_report = score_daily(Metric::BlockAttempts, &blocks);
        let time_patterns = self.time_patterns(extraction);

        // Stage 3: summary
        let all: Vec<&Anomaly> = spending
            .anomalies
            .iter()
            .chain(&episode_report.anomalies)
            .chain(&block_report.anomalies)
            .chain(&time_patterns.anomalies)
            .collect();
        let critical_count = all.iter().filter(|a| a.severity == Severity::Critical).count();
        let warning_count = all.iter().filter(|a| a.severity == Severity::Warning).count();

        let mut alerts: Vec<Alert> = all.iter().map(|a| Alert::from(*a)).collect();
        alerts.sort_by_key(|a| (Reverse(a.severity), Reverse(a.day), a.metric, a.hour));
        alerts.truncate(self.settings.max_alerts);

        let notes = self.notes(extraction, &daily_spend);

        debug!(
            critical = critical_count,
            warning = warning_count,
            notes = notes.len(),
            "detected anomalies"
        );

        ModuleOutcome::Ready(AnomalyReport {
            spending,
            episodes: episode_report,
            block_attempts: block_report,
            time_patterns,
            summary: AnomalySummary {
                total_anomalies: critical_count + warning_count,
                critical_count,
                warning_count,
                overall_risk: OverallRisk::from_counts(critical_count, warning_count),
                alerts,
                notes,
            },
        })
    }

    fn time_patterns(&self, extraction: &Extraction) -> TimePatterns {
        let window = &extraction.window;
        let mut hourly = [0u32; 24];
        let mut weekdays = [0u32; 7];
        for entry in &extraction.episodes {
            hourly[window.local_hour(entry.date) as usize] += 1;
            weekdays[local_weekday(window, entry).num_days_from_monday() as usize] += 1;
        }

        let peak_hour = argmax(&hourly).map(|h| h as u32);
        let peak_weekday = argmax(&weekdays).map(|d| weekday_name(d).to_string());

        let analyzed = extraction.episodes.len() >= self.settings.min_hourly_episodes;
        let anomalies = if analyzed {
            let values: Vec<f64> = hourly.iter().map(|c| f64::from(*c)).collect();
            let baseline = SeriesBaseline::from_values(&values);
            values
                .iter()
                .enumerate()
                .filter_map(|(hour, value)| {
                    flag(&baseline, *value).map(|(z_score, severity)| Anomaly {
                        metric: Metric::TimeOfDay,
                        day: None,
                        hour: Some(hour as u32),
                        value: *value,
                        z_score,
                        severity,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        TimePatterns {
            peak_hour,
            peak_weekday,
            night_ratio: extraction.features.night_activity_ratio,
            hourly: hourly.to_vec(),
            analyzed,
            anomalies,
        }
    }

    fn notes(&self, extraction: &Extraction, spending: &[f64]) -> Vec<String> {
        let mut notes = Vec::new();
        let night_ratio = extraction.features.night_activity_ratio;
        if night_ratio > self.settings.night_ratio_alert {
            notes.push(format!(
                "{:.0}% of episodes happen at night ({:02}:00-{:02}:00)",
                night_ratio * 100.0,
                self.night_hours.start,
                self.night_hours.end
            ));
        }

        if spending.len() >= MIN_ESCALATION_SERIES {
            let (earlier, recent) = spending.split_at(spending.len() - ESCALATION_DAYS);
            let recent_avg = mean(recent);
            let earlier_avg = mean(earlier);
            if recent_avg > 0.0 && recent_avg > earlier_avg * self.settings.escalation_factor {
                notes.push(format!(
                    "Spending over the last {ESCALATION_DAYS} days is more than {}x the earlier daily average",
                    self.settings.escalation_factor
                ));
            }
        }
        notes
    }
}

fn daily_series(window: &ExtractionWindow) -> BTreeMap<NaiveDate, f64> {
    window.days_iter().map(|day| (day, 0.0)).collect()
}

fn score_daily(metric: Metric, series: &BTreeMap<NaiveDate, f64>) -> SeriesReport {
    let values: Vec<f64> = series.values().copied().collect();
    let stats = SeriesBaseline::from_values(&values);
    let anomalies = series
        .iter()
        .filter_map(|(day, value)| {
            flag(&stats, *value).map(|(z_score, severity)| Anomaly {
                metric,
                day: Some(*day),
                hour: None,
                value: *value,
                z_score,
                severity,
            })
        })
        .collect();
    SeriesReport { stats, anomalies }
}

/// Rounded Z-score and severity when the value is anomalous
fn flag(baseline: &SeriesBaseline, value: f64) -> Option<(f64, Severity)> {
    let z = baseline.z_score(value)?;
    let severity = Severity::from_z(z);
    severity
        .is_anomaly()
        .then(|| ((z * 100.0).round() / 100.0, severity))
}

fn local_weekday(window: &ExtractionWindow, entry: &DiaryEntry) -> Weekday {
    window.local_day(entry.date).weekday()
}

fn weekday_name(index: usize) -> &'static str {
    ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"][index % 7]
}

/// Index of the largest non-zero count, earliest on ties
fn argmax(counts: &[u32]) -> Option<usize> {
    counts
        .iter()
        .enumerate()
        .filter(|(_, c)| **c > 0)
        .fold(None, |best: Option<(usize, u32)>, (i, c)| match best {
            Some((_, best_count)) if best_count >= *c => best,
            _ => Some((i, *c)),
        })
        .map(|(i, _)| i)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
