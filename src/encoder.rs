//! Assessment encoding
//!
//! This module encodes an assessment into the JSON payload consumed by
//! dashboards, the trusted-person portal and notification delivery.
//! Every module is always present with an explicit status, so a consumer can
//! render "not enough data" without special-casing missing keys.
//!
//! The payload carries no generated identifiers and no wall-clock time:
//! the same assessment always encodes to the same bytes.

use crate::aggregator::CombinedRisk;
use crate::anomaly::{AnomalyReport, AnomalySummary, SeriesReport, TimePatterns};
use crate::archetype::ArchetypeProfile;
use crate::error::EngineError;
use crate::features::ExtractionWindow;
use crate::neural::{ModelMeta, NeuralPrediction};
use crate::pipeline::Assessment;
use crate::sentiment::{ScoredEntry, SentimentTrend};
use crate::thresholds::PublishedThresholds;
use crate::types::{DataQuality, ModuleOutcome, ModuleStatus};
use crate::{ENGINE_NAME, ENGINE_VERSION};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::borrow::Cow;
use uuid::Uuid;

/// Producer metadata
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Window description in the payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowView {
    pub days: u32,
    pub start: String,
    pub end: String,
    pub utc_offset_minutes: i32,
}

impl WindowView {
    fn from_window(window: &ExtractionWindow) -> Self {
        Self {
            days: window.days,
            start: rfc3339(window.start),
            end: rfc3339(window.end),
            utc_offset_minutes: window.offset.local_minus_utc() / 60,
        }
    }
}

/// Module status envelope; the body is flattened next to the status
#[derive(Debug, Clone, Serialize)]
pub struct ModuleView<B: Serialize> {
    pub status: ModuleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub body: B,
}

impl<B: Serialize> ModuleView<B> {
    fn new<T>(outcome: &ModuleOutcome<T>, body: B) -> Self {
        Self {
            status: outcome.status(),
            reason: outcome.reason().map(str::to_string),
            body,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeuralBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<&'a NeuralPrediction>,
    pub model: ModelMeta,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentBody<'a> {
    pub entries: &'a [ScoredEntry],
    pub trend: Cow<'a, SentimentTrend>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spending: Option<&'a SeriesReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes: Option<&'a SeriesReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_attempts: Option<&'a SeriesReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_patterns: Option<&'a TimePatterns>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a AnomalySummary>,
}

impl<'a> AnomalyBody<'a> {
    fn from_report(report: Option<&'a AnomalyReport>) -> Self {
        Self {
            spending: report.map(|r| &r.spending),
            episodes: report.map(|r| &r.episodes),
            block_attempts: report.map(|r| &r.block_attempts),
            time_patterns: report.map(|r| &r.time_patterns),
            summary: report.map(|r| &r.summary),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchetypeBody<'a> {
    #[serde(flatten)]
    pub profile: Option<&'a ArchetypeProfile>,
}

/// Complete assessment payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentPayload<'a> {
    pub engine: EngineInfo,
    pub user_id: Uuid,
    /// The evaluation instant supplied by the caller
    pub timestamp: String,
    pub window: WindowView,
    pub thresholds: PublishedThresholds,
    pub data_quality: &'a DataQuality,
    pub neural_network: ModuleView<NeuralBody<'a>>,
    pub sentiment_analysis: ModuleView<SentimentBody<'a>>,
    pub anomaly_detector: ModuleView<AnomalyBody<'a>>,
    #[serde(rename = "behavioralDNA")]
    pub behavioral_dna: ModuleView<ArchetypeBody<'a>>,
    pub combined_risk: &'a CombinedRisk,
}

/// Encoder for assessment payloads
pub struct AssessmentEncoder;

impl AssessmentEncoder {
    /// Build the payload view of an assessment
    pub fn encode(assessment: &Assessment) -> AssessmentPayload<'_> {
        let modules = &assessment.modules;

        let neural_network = ModuleView::new(
            &modules.neural,
            NeuralBody {
                prediction: modules.neural.ready(),
                model: assessment.model.clone(),
            },
        );

        let sentiment = modules.sentiment.ready();
        let sentiment_analysis = ModuleView::new(
            &modules.sentiment,
            SentimentBody {
                entries: sentiment.map(|s| s.entries.as_slice()).unwrap_or(&[]),
                trend: match sentiment {
                    Some(report) => Cow::Borrowed(&report.trend),
                    None => Cow::Owned(SentimentTrend::empty()),
                },
            },
        );

        let anomaly_detector = ModuleView::new(
            &modules.anomaly,
            AnomalyBody::from_report(modules.anomaly.ready()),
        );

        let behavioral_dna = ModuleView::new(
            &modules.archetype,
            ArchetypeBody {
                profile: modules.archetype.ready(),
            },
        );

        AssessmentPayload {
            engine: EngineInfo {
                name: ENGINE_NAME,
                version: ENGINE_VERSION,
            },
            user_id: assessment.user_id,
            timestamp: rfc3339(assessment.now),
            window: WindowView::from_window(&assessment.window),
            thresholds: PublishedThresholds::default(),
            data_quality: &assessment.quality,
            neural_network,
            sentiment_analysis,
            anomaly_detector,
            behavioral_dna,
            combined_risk: &assessment.combined,
        }
    }

    /// Encode to a compact JSON string
    pub fn encode_to_json(assessment: &Assessment) -> Result<String, EngineError> {
        serde_json::to_string(&Self::encode(assessment))
            .map_err(|e| EngineError::EncodingError(e.to_string()))
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json_pretty(assessment: &Assessment) -> Result<String, EngineError> {
        serde_json::to_string_pretty(&Self::encode(assessment))
            .map_err(|e| EngineError::EncodingError(e.to_string()))
    }
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RiskEngine;
    use crate::schema::AssessmentBundle;
    use serde_json::{json, Value};

    fn payload(bundle: Value) -> Value {
        let engine = RiskEngine::with_defaults().unwrap();
        let bundle: AssessmentBundle = serde_json::from_value(bundle).unwrap();
        let assessment = engine.assess_bundle(bundle).unwrap();
        serde_json::from_str(&AssessmentEncoder::encode_to_json(&assessment).unwrap()).unwrap()
    }

    fn silent_episodes() -> Value {
        json!({
            "userId": "6f1c2d3e-4b5a-4c6d-8e9f-0a1b2c3d4e5f",
            "now": "2026-03-10T12:00:00Z",
            "accountCreatedAt": "2026-01-01T00:00:00Z",
            "utcOffsetMinutes": 180,
            "entries": [
                { "date": "2026-03-02T10:00:00Z", "amountSpent": 500, "moodBefore": "neutral" },
                { "date": "2026-03-04T10:00:00Z", "amountSpent": 500, "moodBefore": "neutral" }
            ]
        })
    }

    #[test]
    fn test_every_module_key_is_present() {
        let payload = payload(silent_episodes());
        for key in [
            "neuralNetwork",
            "sentimentAnalysis",
            "anomalyDetector",
            "behavioralDNA",
            "combinedRisk",
            "dataQuality",
            "thresholds",
        ] {
            assert!(payload.get(key).is_some(), "missing {key}");
        }
        assert_eq!(payload["window"]["utcOffsetMinutes"], 180);
    }

    #[test]
    fn test_insufficient_sentiment_renders_empty_trend() {
        let payload = payload(silent_episodes());
        let sentiment = &payload["sentimentAnalysis"];
        assert_eq!(sentiment["status"], "insufficient_data");
        assert_eq!(sentiment["reason"], "no diary entries with note text");
        assert_eq!(sentiment["entries"], json!([]));
        assert_eq!(sentiment["trend"]["trend"], "stable");
        assert_eq!(sentiment["trend"]["entryCount"], 0);
        assert_eq!(sentiment["trend"]["noTextData"], true);
    }

    #[test]
    fn test_insufficient_archetype_has_status_only() {
        let payload = payload(silent_episodes());
        let dna = payload["behavioralDNA"].as_object().unwrap();
        assert_eq!(dna["status"], "insufficient_data");
        assert!(dna.get("archetype").is_none());
        assert!(dna.contains_key("reason"));
    }

    #[test]
    fn test_ready_module_has_no_reason() {
        let payload = payload(silent_episodes());
        let neural = payload["neuralNetwork"].as_object().unwrap();
        assert_eq!(neural["status"], "ready");
        assert!(!neural.contains_key("reason"));
        assert_eq!(neural["model"]["architecture"], "6-8-4-1");
    }
}
