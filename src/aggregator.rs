//! Risk aggregation
//!
//! Merges the module outcomes into one combined result. Risk is never
//! averaged down: the overall level is the highest level any available
//! module reports, and disagreement between modules is surfaced as a
//! top-line warning instead of being smoothed away.

use crate::anomaly::AnomalyReport;
use crate::archetype::{Archetype, ArchetypeProfile};
use crate::neural::NeuralPrediction;
use crate::sentiment::{SentimentReport, Trend};
use crate::thresholds::{OverallRisk, RiskLevel, Severity};
use crate::types::{DataQuality, ModuleOutcome};
use serde::Serialize;
use std::collections::BTreeSet;

/// Negative streak that turns a declining trend into a top-line warning
pub const DECLINING_STREAK_MIN: usize = 2;

/// Scoring module identifiers as used in the output payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ModuleName {
    #[serde(rename = "neuralNetwork")]
    NeuralNetwork,
    #[serde(rename = "sentimentAnalysis")]
    SentimentAnalysis,
    #[serde(rename = "anomalyDetector")]
    AnomalyDetector,
    #[serde(rename = "behavioralDNA")]
    BehavioralDna,
}

/// Outcomes of the four scoring modules for one request
#[derive(Debug, Clone)]
pub struct ModuleResults {
    pub neural: ModuleOutcome<NeuralPrediction>,
    pub sentiment: ModuleOutcome<SentimentReport>,
    pub anomaly: ModuleOutcome<AnomalyReport>,
    pub archetype: ModuleOutcome<ArchetypeProfile>,
}

/// Merged view of all modules
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedRisk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neural_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neural_risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_trend: Option<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly_risk: Option<OverallRisk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archetype: Option<Archetype>,
    /// Highest level reported by any available module
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_level: Option<RiskLevel>,
    pub modules_available: Vec<ModuleName>,
    /// Most severe first, de-duplicated
    pub all_warnings: Vec<String>,
}

/// Aggregator for module outcomes
pub struct RiskAggregator;

impl RiskAggregator {
    pub fn combine(results: &ModuleResults, quality: &DataQuality) -> CombinedRisk {
        let neural = results.neural.ready();
        let sentiment = results.sentiment.ready().map(|s| &s.trend);
        let anomaly = results.anomaly.ready().map(|a| &a.summary);
        let archetype = results.archetype.ready();

        let mut modules_available = Vec::new();
        if neural.is_some() {
            modules_available.push(ModuleName::NeuralNetwork);
        }
        if sentiment.is_some() {
            modules_available.push(ModuleName::SentimentAnalysis);
        }
        if anomaly.is_some() {
            modules_available.push(ModuleName::AnomalyDetector);
        }
        if archetype.is_some() {
            modules_available.push(ModuleName::BehavioralDna);
        }

        let sentiment_level = sentiment.map(|s| match s.trend {
            Trend::Declining if s.negative_streak >= DECLINING_STREAK_MIN => RiskLevel::High,
            Trend::Declining => RiskLevel::Medium,
            _ => RiskLevel::Low,
        });
        let overall_level = [
            neural.map(|n| n.risk_level),
            anomaly.map(|a| a.overall_risk.as_risk_level()),
            sentiment_level,
        ]
        .into_iter()
        .flatten()
        .max();

        // Stage 1: critical anomaly alerts
        let mut warnings = WarningList::default();
        if let Some(summary) = anomaly {
            for alert in summary.alerts.iter().filter(|a| a.severity == Severity::Critical) {
                warnings.push(&alert.message);
            }
        }

        // Stage 2: top-line escalations
        if let Some(prediction) = neural {
            if prediction.risk_level == RiskLevel::High {
                warnings.push(&format!(
                    "Risk score is HIGH ({}/100)",
                    prediction.risk_score
                ));
            }
        }
        if let Some(summary) = anomaly {
            if summary.overall_risk == OverallRisk::High {
                match neural.map(|n| n.risk_level) {
                    Some(RiskLevel::High) => {}
                    Some(level) => warnings.push(&format!(
                        "Critical anomalies detected while the risk score is only {}",
                        level.as_str()
                    )),
                    None => warnings.push(
                        "Critical anomalies detected while the risk score is unavailable",
                    ),
                }
            }
        }
        if let Some(trend) = sentiment {
            if trend.trend == Trend::Declining && trend.negative_streak >= DECLINING_STREAK_MIN {
                warnings.push(&format!(
                    "Diary sentiment is declining with {} negative entries in a row",
                    trend.negative_streak
                ));
            }
        }

        // Stage 3: sentiment warnings
        if let Some(trend) = sentiment {
            for signal in &trend.warning_signals {
                warnings.push(signal);
            }
        }

        // Stage 4: warning-level anomaly alerts
        if let Some(summary) = anomaly {
            for alert in summary.alerts.iter().filter(|a| a.severity == Severity::Warning) {
                warnings.push(&alert.message);
            }
        }

        // Stage 5: informational notes
        if let Some(summary) = anomaly {
            for note in &summary.notes {
                warnings.push(note);
            }
        }
        if quality.dropped_records > 0 {
            warnings.push(&format!(
                "{} of {} records were excluded as malformed",
                quality.dropped_records, quality.total_records
            ));
        }

        CombinedRisk {
            neural_score: neural.map(|n| n.risk_score),
            neural_risk_level: neural.map(|n| n.risk_level),
            sentiment_trend: sentiment.map(|s| s.trend),
            anomaly_risk: anomaly.map(|a| a.overall_risk),
            archetype: archetype.map(|a| a.archetype),
            overall_level,
            modules_available,
            all_warnings: warnings.into_vec(),
        }
    }
}

/// Ordered warning list that drops repeats by normalized text
#[derive(Default)]
struct WarningList {
    seen: BTreeSet<String>,
    items: Vec<String>,
}

impl WarningList {
    fn push(&mut self, warning: &str) {
        let key = normalize_warning(warning);
        if key.is_empty() || !self.seen.insert(key) {
            return;
        }
        self.items.push(warning.trim().to_string());
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}

/// Lowercase, collapse whitespace and drop trailing punctuation
fn normalize_warning(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
        .to_string()
}
