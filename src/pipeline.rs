//! Pipeline orchestration
//!
//! This module provides the public API of the insight engine. It runs one
//! user's history through feature extraction, the four scoring modules and
//! the aggregator, and hands the result to the encoder.
//!
//! The engine holds no per-user state: everything an assessment needs is in
//! the request, so the same request always produces the same assessment.

use crate::aggregator::{CombinedRisk, ModuleResults, RiskAggregator};
use crate::anomaly::AnomalyDetector;
use crate::archetype::{ArchetypeClassifier, ArchetypeInputs};
use crate::config::EngineConfig;
use crate::encoder::AssessmentEncoder;
use crate::error::EngineError;
use crate::features::{ExtractionWindow, FeatureExtractor};
use crate::neural::{ModelMeta, NeuralRiskPredictor};
use crate::schema::{AssessmentBundle, RecordAdapter};
use crate::sentiment::SentimentAnalyzer;
use crate::types::{AssessmentRequest, DataQuality, FeatureVector, ModuleOutcome};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Assess a JSON bundle with the default configuration.
///
/// # Arguments
/// * `bundle_json` - One user's history: `userId`, `now`, `accountCreatedAt`,
///   optional `utcOffsetMinutes`, `entries` and `blockEvents`
///
/// # Returns
/// The assessment payload as compact JSON
///
/// # Example
/// ```ignore
/// let payload = assess_risk_json(&bundle_json)?;
/// ```
pub fn assess_risk_json(bundle_json: &str) -> Result<String, EngineError> {
    RiskEngine::with_defaults()?.assess_json(bundle_json)
}

/// Everything the engine concluded about one user
#[derive(Debug, Clone)]
pub struct Assessment {
    pub user_id: Uuid,
    pub now: DateTime<Utc>,
    pub window: ExtractionWindow,
    pub features: FeatureVector,
    pub quality: DataQuality,
    pub modules: ModuleResults,
    pub combined: CombinedRisk,
    pub model: ModelMeta,
}

/// Configured risk engine.
///
/// Build once per configuration and reuse it for every user.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    predictor: NeuralRiskPredictor,
    sentiment: SentimentAnalyzer,
    anomaly: AnomalyDetector,
    archetype: ArchetypeClassifier,
}

impl RiskEngine {
    /// Create an engine, rejecting invalid configurations
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(&config);
        let predictor = NeuralRiskPredictor::new(&config.network, config.importance_epsilon)?;
        let sentiment = SentimentAnalyzer::new(&config.lexicon, config.sentiment.clone());
        let anomaly = AnomalyDetector::new(config.anomaly.clone(), config.night_hours);
        let archetype = ArchetypeClassifier::new(config.archetype.clone());
        Ok(Self {
            config,
            extractor,
            predictor,
            sentiment,
            anomaly,
            archetype,
        })
    }

    /// Create an engine with the calibrated default configuration
    pub fn with_defaults() -> Result<Self, EngineError> {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every module over one request.
    ///
    /// Pipeline stages:
    /// 1. FeatureExtractor - validate records and compute the six features
    /// 2. NeuralRiskPredictor - risk score and feature importance
    /// 3. SentimentAnalyzer - per-entry scores and trend
    /// 4. AnomalyDetector - per-day series and time-of-day patterns
    /// 5. ArchetypeClassifier - behavioral pattern
    /// 6. RiskAggregator - combined level and warnings
    pub fn assess(&self, request: &AssessmentRequest) -> Assessment {
        // Stage 1: Extract features
        let extraction = self.extractor.extract(request);
        let mut quality = extraction.quality.clone();
        quality.include_upstream(request.upstream_quality.clone());
        debug!(
            user_id = %request.user_id,
            total = quality.total_records,
            dropped = quality.dropped_records,
            "assessing user"
        );

        // Stage 2: Neural risk score
        let neural = self.predictor.predict(&extraction.features);
        log_outcome("neuralNetwork", &neural);

        // Stage 3: Diary sentiment
        let sentiment = self.sentiment.analyze(&extraction.entries);
        log_outcome("sentimentAnalysis", &sentiment);

        // Stage 4: Anomalies
        let anomaly = self.anomaly.analyze(&extraction);
        log_outcome("anomalyDetector", &anomaly);

        // Stage 5: Archetype, with the sentiment trend shaping the insight
        let inputs = ArchetypeInputs::from_extraction(&extraction);
        let archetype = self
            .archetype
            .classify(&inputs, sentiment.ready().map(|report| &report.trend));
        log_outcome("behavioralDNA", &archetype);

        // Stage 6: Combine
        let modules = ModuleResults {
            neural,
            sentiment,
            anomaly,
            archetype,
        };
        let combined = RiskAggregator::combine(&modules, &quality);

        Assessment {
            user_id: request.user_id,
            now: request.now,
            window: extraction.window,
            features: extraction.features,
            quality,
            modules,
            combined,
            model: self.predictor.meta(),
        }
    }

    /// Decode a bundle and assess it
    pub fn assess_bundle(&self, bundle: AssessmentBundle) -> Result<Assessment, EngineError> {
        let request = RecordAdapter::to_request(bundle)?;
        Ok(self.assess(&request))
    }

    /// Assess a JSON bundle and encode the payload as compact JSON
    pub fn assess_json(&self, bundle_json: &str) -> Result<String, EngineError> {
        let bundle = RecordAdapter::parse_bundle(bundle_json)?;
        let assessment = self.assess_bundle(bundle)?;
        AssessmentEncoder::encode_to_json(&assessment)
    }
}

fn log_outcome<T>(module: &str, outcome: &ModuleOutcome<T>) {
    match outcome {
        ModuleOutcome::Ready(_) => debug!(module, "module ready"),
        ModuleOutcome::InsufficientData { reason } => {
            debug!(module, reason = %reason, "module has insufficient data")
        }
        ModuleOutcome::Failed { reason } => warn!(module, reason = %reason, "module failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::ModuleName;
    use crate::archetype::Archetype;
    use crate::sentiment::Trend;
    use crate::thresholds::{OverallRisk, RiskLevel};
    use crate::types::ModuleStatus;
    use serde_json::{json, Value};

    const USER: &str = "6f1c2d3e-4b5a-4c6d-8e9f-0a1b2c3d4e5f";

    fn scenario_bundle() -> Value {
        json!({
            "userId": USER,
            "now": "2026-03-10T12:00:00Z",
            "accountCreatedAt": "2025-12-01T00:00:00Z",
            "entries": [
                {
                    "id": "00000000-0000-4000-8000-000000000001",
                    "date": "2026-03-05T14:00:00Z",
                    "kind": "episode",
                    "amountSpent": 1000,
                    "moodBefore": "neutral",
                    "triggers": ["stress"],
                    "notes": "я в порядке"
                },
                {
                    "id": "00000000-0000-4000-8000-000000000002",
                    "date": "2026-03-07T19:00:00Z",
                    "kind": "episode",
                    "amountSpent": 1200,
                    "moodBefore": "bad",
                    "triggers": ["stress"],
                    "notes": "тяжело"
                },
                {
                    "id": "00000000-0000-4000-8000-000000000003",
                    "date": "2026-03-09T02:00:00Z",
                    "kind": "episode",
                    "amountSpent": 15000,
                    "moodBefore": "terrible",
                    "triggers": ["loneliness"],
                    "notes": "ужасный день, хочу всё бросить"
                }
            ],
            "blockEvents": []
        })
    }

    fn assess(bundle: Value) -> Assessment {
        let engine = RiskEngine::with_defaults().unwrap();
        let bundle: AssessmentBundle = serde_json::from_value(bundle).unwrap();
        engine.assess_bundle(bundle).unwrap()
    }

    #[test]
    fn test_escalating_user_is_high_risk() {
        let assessment = assess(scenario_bundle());
        let combined = &assessment.combined;

        let prediction = assessment.modules.neural.ready().unwrap();
        assert_eq!(prediction.risk_level, RiskLevel::High);
        assert!(prediction.risk_score >= 60);
        assert_eq!(combined.overall_level, Some(RiskLevel::High));

        let sentiment = assessment.modules.sentiment.ready().unwrap();
        let scores: Vec<i32> = sentiment.entries.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![2, -2, -6]);
        assert_eq!(sentiment.trend.trend, Trend::Declining);

        let anomaly = assessment.modules.anomaly.ready().unwrap();
        assert_eq!(anomaly.summary.overall_risk, OverallRisk::High);
        assert_eq!(combined.anomaly_risk, Some(OverallRisk::High));

        assert_eq!(combined.archetype, Some(Archetype::NightEscapist));
        assert_eq!(combined.modules_available.len(), 4);

        assert!(
            combined.all_warnings[0].starts_with("Spending spike on 2026-03-09"),
            "{:?}",
            combined.all_warnings
        );
        assert!(combined
            .all_warnings
            .iter()
            .any(|w| w.starts_with("Risk score is HIGH")));
        assert!(combined
            .all_warnings
            .iter()
            .any(|w| w.starts_with("Diary sentiment is declining with 2 negative entries")));
    }

    #[test]
    fn test_same_request_encodes_identically() {
        let json = scenario_bundle().to_string();
        let engine = RiskEngine::with_defaults().unwrap();
        let first = engine.assess_json(&json).unwrap();
        let second = engine.assess_json(&json).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, assess_risk_json(&json).unwrap());
    }

    #[test]
    fn test_missing_notes_degrade_only_sentiment() {
        let mut bundle = scenario_bundle();
        for entry in bundle["entries"].as_array_mut().unwrap() {
            entry.as_object_mut().unwrap().remove("notes");
        }
        let assessment = assess(bundle);

        assert_eq!(
            assessment.modules.sentiment.status(),
            ModuleStatus::InsufficientData
        );
        assert!(assessment.modules.neural.is_ready());
        assert!(assessment.modules.anomaly.is_ready());
        assert!(assessment.modules.archetype.is_ready());

        let combined = &assessment.combined;
        assert_eq!(combined.sentiment_trend, None);
        assert!(!combined
            .modules_available
            .contains(&ModuleName::SentimentAnalysis));
        assert_eq!(combined.overall_level, Some(RiskLevel::High));
    }

    #[test]
    fn test_empty_history_is_low_risk() {
        let assessment = assess(json!({
            "userId": USER,
            "now": "2026-03-10T12:00:00Z",
            "accountCreatedAt": "2026-03-01T00:00:00Z"
        }));

        let prediction = assessment.modules.neural.ready().unwrap();
        assert_eq!(prediction.risk_level, RiskLevel::Low);
        assert_eq!(
            assessment.modules.sentiment.status(),
            ModuleStatus::InsufficientData
        );
        assert_eq!(
            assessment.modules.anomaly.status(),
            ModuleStatus::InsufficientData
        );
        assert_eq!(
            assessment.modules.archetype.status(),
            ModuleStatus::InsufficientData
        );
        assert_eq!(assessment.quality.total_records, 0);
        assert_eq!(assessment.combined.overall_level, Some(RiskLevel::Low));
    }

    #[test]
    fn test_malformed_records_are_counted_not_fatal() {
        let mut bundle = scenario_bundle();
        let entries = bundle["entries"].as_array_mut().unwrap();
        entries.push(json!({ "kind": "episode", "amountSpent": 100 }));
        entries.push(json!({ "date": "2026-03-08T10:00:00Z", "amountSpent": -5 }));
        let assessment = assess(bundle);

        assert_eq!(assessment.quality.total_records, 5);
        assert_eq!(assessment.quality.dropped_records, 2);
        assert_eq!(assessment.quality.issues.len(), 2);
        assert!(assessment
            .combined
            .all_warnings
            .contains(&"2 of 5 records were excluded as malformed".to_string()));
        assert_eq!(assessment.features.episode_frequency, 3.0);
    }

    #[test]
    fn test_payload_shape() {
        let json = assess_risk_json(&scenario_bundle().to_string()).unwrap();
        let payload: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(payload["engine"]["name"], crate::ENGINE_NAME);
        assert_eq!(payload["userId"], USER);
        assert_eq!(payload["timestamp"], "2026-03-10T12:00:00Z");
        assert_eq!(payload["window"]["days"], 30);
        assert_eq!(payload["neuralNetwork"]["status"], "ready");
        assert_eq!(payload["neuralNetwork"]["prediction"]["riskLevel"], "HIGH");
        assert_eq!(payload["sentimentAnalysis"]["trend"]["trend"], "declining");
        assert_eq!(payload["anomalyDetector"]["summary"]["overallRisk"], "high");
        assert_eq!(payload["behavioralDNA"]["archetype"], "night_escapist");
        assert_eq!(payload["combinedRisk"]["overallLevel"], "HIGH");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            window_days: 0,
            ..Default::default()
        };
        assert!(matches!(
            RiskEngine::new(config),
            Err(EngineError::InvalidConfig(_))
        ));

        // rejected up front instead of overflowing date arithmetic while scoring
        let config = EngineConfig {
            window_days: 200_000_000,
            ..Default::default()
        };
        assert!(matches!(
            RiskEngine::new(config),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
