//! Engine configuration
//!
//! The network weights and the sentiment lexicon are static, versioned data
//! loaded once at startup. Everything here is validated before the engine is
//! built so that a bad deployment fails at construction instead of at scoring.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default trailing window in days
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Longest trailing window, one year of daily series
pub const MAX_WINDOW_DAYS: u32 = 366;

/// Lexicon scores must stay within this magnitude
pub const MAX_LEXICON_SCORE: i32 = 5;

/// Local hours counted as "night" (wraps past midnight when `start > end`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightHours {
    pub start: u32,
    pub end: u32,
}

impl Default for NightHours {
    fn default() -> Self {
        Self { start: 22, end: 6 }
    }
}

impl NightHours {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start > self.end {
            hour >= self.start || hour < self.end
        } else {
            hour >= self.start && hour < self.end
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.start > 23 || self.end > 23 {
            return Err(EngineError::config(format!(
                "night hours must be within 0-23, got {}-{}",
                self.start, self.end
            )));
        }
        if self.start == self.end {
            return Err(EngineError::config("night window is empty (start == end)"));
        }
        Ok(())
    }
}

/// Activation used by the two hidden layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenActivation {
    Relu,
    Sigmoid,
}

/// Weights of the 6 → 8 → 4 → 1 risk network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkWeights {
    /// Version tag reported in the model metadata
    pub version: String,
    pub hidden_activation: HiddenActivation,
    /// 8 rows of 6 weights
    pub layer1: Vec<Vec<f64>>,
    pub bias1: Vec<f64>,
    /// 4 rows of 8 weights
    pub layer2: Vec<Vec<f64>>,
    pub bias2: Vec<f64>,
    /// 4 weights feeding the sigmoid output
    pub output: Vec<f64>,
    pub output_bias: f64,
}

impl Default for NetworkWeights {
    fn default() -> Self {
        Self {
            version: "1.1.0".to_string(),
            hidden_activation: HiddenActivation::Relu,
            layer1: vec![
                vec![0.92, 0.10, 0.18, 0.12, 0.08, 0.35],
                vec![0.15, 0.88, 0.10, 0.05, 0.12, 0.20],
                vec![0.10, 0.12, 0.95, 0.22, 0.18, 0.10],
                vec![0.20, 0.08, 0.25, 0.90, 0.10, 0.15],
                vec![0.12, 0.15, 0.20, 0.10, 0.85, 0.12],
                vec![0.30, 0.10, 0.12, 0.08, 0.10, 0.94],
                vec![0.55, 0.45, -0.20, 0.30, 0.25, 0.40],
                vec![0.40, 0.35, 0.45, 0.40, 0.30, -0.15],
            ],
            bias1: vec![-0.05, -0.10, -0.08, 0.02, -0.04, -0.06, 0.10, 0.12],
            layer2: vec![
                vec![0.85, 0.40, 0.30, 0.25, 0.20, 0.70, 0.45, 0.15],
                vec![0.30, 0.75, 0.55, 0.35, 0.25, 0.20, 0.30, 0.50],
                vec![0.25, 0.20, 0.45, 0.80, 0.60, 0.30, 0.20, 0.40],
                vec![0.45, 0.30, 0.20, 0.30, 0.35, 0.55, 0.50, 0.25],
            ],
            bias2: vec![-0.10, -0.05, -0.08, 0.04],
            output: vec![0.52, 0.40, 0.38, 0.34],
            output_bias: -3.45,
        }
    }
}

impl NetworkWeights {
    /// Check the 6-8-4-1 shape and that every weight is finite.
    pub fn validate(&self) -> Result<(), EngineError> {
        check_matrix("layer1", &self.layer1, 8, 6)?;
        check_vector("bias1", &self.bias1, 8)?;
        check_matrix("layer2", &self.layer2, 4, 8)?;
        check_vector("bias2", &self.bias2, 4)?;
        check_vector("output", &self.output, 4)?;
        if !self.output_bias.is_finite() {
            return Err(EngineError::config("outputBias must be finite"));
        }
        Ok(())
    }
}

fn check_matrix(
    name: &str,
    matrix: &[Vec<f64>],
    rows: usize,
    cols: usize,
) -> Result<(), EngineError> {
    if matrix.len() != rows {
        return Err(EngineError::config(format!(
            "{name} must have {rows} rows, got {}",
            matrix.len()
        )));
    }
    for (i, row) in matrix.iter().enumerate() {
        check_vector(&format!("{name}[{i}]"), row, cols)?;
    }
    Ok(())
}

fn check_vector(name: &str, values: &[f64], len: usize) -> Result<(), EngineError> {
    if values.len() != len {
        return Err(EngineError::config(format!(
            "{name} must have {len} values, got {}",
            values.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(EngineError::config(format!("{name} contains a non-finite weight")));
    }
    Ok(())
}

/// Polarity lexicon: single tokens or two-word phrases mapped to -5..=5
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexiconConfig {
    pub terms: BTreeMap<String, i32>,
    /// Tokens that flip the polarity of the following scored token
    #[serde(default)]
    pub negators: Vec<String>,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            terms: DEFAULT_LEXICON
                .iter()
                .map(|(term, score)| (term.to_string(), *score))
                .collect(),
            negators: DEFAULT_NEGATORS.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl LexiconConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if self.terms.is_empty() {
            return Err(EngineError::config("lexicon has no terms"));
        }
        for (term, score) in &self.terms {
            let words = term.split_whitespace().count();
            if words == 0 || words > 2 {
                return Err(EngineError::config(format!(
                    "lexicon term {term:?} must be one or two words"
                )));
            }
            if score.abs() > MAX_LEXICON_SCORE {
                return Err(EngineError::config(format!(
                    "lexicon score for {term:?} is {score}, outside -5..=5"
                )));
            }
        }
        Ok(())
    }
}

/// Trend and warning thresholds for the sentiment analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentSettings {
    /// Recent-third minus earliest-third mean score needed to call a trend
    pub trend_delta: f64,
    /// Consecutive negative entries that raise a warning
    pub negative_streak_warning: usize,
    /// Entries needed before declining/dominant-mood warnings are raised
    pub min_entries_for_trend_warning: usize,
    /// Recent-third mean below this raises a strong-negativity warning
    pub strong_negative_mean: f64,
}

impl Default for SentimentSettings {
    fn default() -> Self {
        Self {
            trend_delta: 1.0,
            negative_streak_warning: 3,
            min_entries_for_trend_warning: 5,
            strong_negative_mean: -3.0,
        }
    }
}

/// Output bounds and auxiliary alert rules of the anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalySettings {
    /// Upper bound on alerts emitted in one summary
    pub max_alerts: usize,
    /// Episodes needed before the time-of-day histogram is scored
    pub min_hourly_episodes: usize,
    /// Night ratio above which an informational note is emitted
    pub night_ratio_alert: f64,
    /// Recent 3-day spend over earlier mean that counts as escalation
    pub escalation_factor: f64,
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            max_alerts: 10,
            min_hourly_episodes: 8,
            night_ratio_alert: 0.4,
            escalation_factor: 2.0,
        }
    }
}

/// Archetype classifier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchetypeSettings {
    /// Episodes in the window required before any archetype is assigned
    pub min_episodes: usize,
}

impl Default for ArchetypeSettings {
    fn default() -> Self {
        Self { min_episodes: 3 }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub window_days: u32,
    pub night_hours: NightHours,
    pub network: NetworkWeights,
    pub lexicon: LexiconConfig,
    pub sentiment: SentimentSettings,
    pub anomaly: AnomalySettings,
    pub archetype: ArchetypeSettings,
    /// Perturbation applied to one normalized input when measuring importance
    pub importance_epsilon: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            night_hours: NightHours::default(),
            network: NetworkWeights::default(),
            lexicon: LexiconConfig::default(),
            sentiment: SentimentSettings::default(),
            anomaly: AnomalySettings::default(),
            archetype: ArchetypeSettings::default(),
            importance_epsilon: 0.01,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration document
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations that indicate a deployment error
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.window_days == 0 || self.window_days > MAX_WINDOW_DAYS {
            return Err(EngineError::config(format!(
                "windowDays must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        self.night_hours.validate()?;
        self.network.validate()?;
        self.lexicon.validate()?;

        let s = &self.sentiment;
        if !s.trend_delta.is_finite() || s.trend_delta <= 0.0 {
            return Err(EngineError::config("sentiment.trendDelta must be positive"));
        }
        if !s.strong_negative_mean.is_finite() {
            return Err(EngineError::config("sentiment.strongNegativeMean must be finite"));
        }

        let a = &self.anomaly;
        if a.max_alerts == 0 {
            return Err(EngineError::config("anomaly.maxAlerts must be at least 1"));
        }
        if !(0.0..=1.0).contains(&a.night_ratio_alert) {
            return Err(EngineError::config("anomaly.nightRatioAlert must be within 0-1"));
        }
        if !a.escalation_factor.is_finite() || a.escalation_factor <= 1.0 {
            return Err(EngineError::config("anomaly.escalationFactor must be above 1"));
        }

        if !self.importance_epsilon.is_finite()
            || self.importance_epsilon <= 0.0
            || self.importance_epsilon > 0.25
        {
            return Err(EngineError::config("importanceEpsilon must be within (0, 0.25]"));
        }
        Ok(())
    }
}

const DEFAULT_NEGATORS: &[&str] = &["не", "нет", "ни", "not", "no", "never"];

const DEFAULT_LEXICON: &[(&str, i32)] = &[
    // losses, debt and craving
    ("проиграл", -4),
    ("проиграла", -4),
    ("проигрыш", -4),
    ("проигрыши", -4),
    ("слив", -3),
    ("слил", -3),
    ("слила", -3),
    ("долг", -4),
    ("долги", -4),
    ("задолженность", -4),
    ("ставка", -2),
    ("ставки", -2),
    ("поставил", -2),
    ("казино", -3),
    ("слоты", -3),
    ("рулетка", -3),
    ("букмекер", -2),
    ("зависимость", -3),
    ("соблазн", -2),
    ("желание", -1),
    ("тяга", -3),
    ("сорвался", -4),
    ("сорвалась", -4),
    ("срыв", -4),
    ("кредит", -3),
    ("займ", -3),
    ("занял", -3),
    ("потерял", -3),
    ("потеряла", -3),
    ("потеря", -3),
    ("скрываю", -3),
    ("соврал", -3),
    ("обман", -3),
    // emotional state
    ("стыд", -3),
    ("стыдно", -3),
    ("вина", -3),
    ("виноват", -3),
    ("отчаяние", -4),
    ("безнадежно", -4),
    ("депрессия", -4),
    ("тревога", -3),
    ("паника", -4),
    ("бессонница", -2),
    ("не спал", -2),
    ("не спала", -2),
    ("злость", -3),
    ("злюсь", -3),
    ("раздражение", -2),
    ("одиночество", -3),
    ("одинок", -3),
    ("одинока", -3),
    ("алкоголь", -2),
    ("выпил", -2),
    ("пьяный", -3),
    ("ужасно", -4),
    ("ужасный", -4),
    ("ужасная", -4),
    ("плохо", -3),
    ("тяжело", -2),
    ("больно", -3),
    ("все бросить", -3),
    ("сдаюсь", -3),
    ("реклама", -1),
    // recovery
    ("устоял", 4),
    ("устояла", 4),
    ("удержался", 4),
    ("удержалась", 4),
    ("выдержал", 4),
    ("выдержала", 4),
    ("справился", 4),
    ("справилась", 4),
    ("свобода", 3),
    ("свободен", 3),
    ("свободна", 3),
    ("прогресс", 3),
    ("победа", 4),
    ("контроль", 2),
    ("самоконтроль", 3),
    ("поддержка", 3),
    ("помощь", 2),
    ("терапия", 2),
    ("психолог", 2),
    ("спорт", 2),
    ("тренировка", 2),
    ("прогулка", 2),
    ("медитация", 3),
    ("семья", 2),
    ("друзья", 2),
    ("спокойствие", 3),
    ("радость", 4),
    ("счастье", 4),
    ("гордость", 4),
    ("надежда", 3),
    ("мотивация", 3),
    ("хорошо", 3),
    ("отлично", 4),
    ("прекрасно", 4),
    ("в порядке", 2),
    ("день", 1),
    ("сэкономил", 3),
    ("сэкономила", 3),
    ("благодарен", 3),
    ("благодарна", 3),
    ("спасибо", 2),
    // english
    ("lost", -3),
    ("loss", -3),
    ("debt", -3),
    ("relapse", -4),
    ("relapsed", -4),
    ("ashamed", -3),
    ("guilty", -3),
    ("hopeless", -4),
    ("anxious", -2),
    ("stressed", -2),
    ("lonely", -2),
    ("angry", -3),
    ("sad", -2),
    ("bad", -3),
    ("terrible", -3),
    ("awful", -3),
    ("craving", -2),
    ("urge", -2),
    ("good", 3),
    ("great", 3),
    ("fine", 2),
    ("better", 2),
    ("calm", 2),
    ("proud", 2),
    ("hope", 2),
    ("happy", 3),
    ("grateful", 3),
    ("resisted", 4),
    ("progress", 3),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_days, 30);
        assert_eq!(config.night_hours, NightHours { start: 22, end: 6 });
    }

    #[test]
    fn test_window_days_bounded() {
        let err = EngineConfig::from_json(r#"{"windowDays": 200000000}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
        assert!(err.to_string().contains("windowDays"));

        assert!(EngineConfig::from_json(r#"{"windowDays": 0}"#).is_err());
        let year = EngineConfig::from_json(r#"{"windowDays": 366}"#).unwrap();
        assert_eq!(year.window_days, MAX_WINDOW_DAYS);
        assert!(EngineConfig::from_json(r#"{"windowDays": 367}"#).is_err());
    }

    #[test]
    fn test_night_hours_wrap_midnight() {
        let night = NightHours::default();
        assert!(night.contains(22));
        assert!(night.contains(23));
        assert!(night.contains(0));
        assert!(night.contains(5));
        assert!(!night.contains(6));
        assert!(!night.contains(14));

        let evening = NightHours { start: 18, end: 21 };
        assert!(evening.contains(18));
        assert!(!evening.contains(21));
    }

    #[test]
    fn test_wrong_layer_shape_rejected() {
        let mut config = EngineConfig::default();
        config.network.layer1.pop();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("layer1 must have 8 rows"));
    }

    #[test]
    fn test_non_finite_weight_rejected() {
        let mut config = EngineConfig::default();
        config.network.layer2[1][3] = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_lexicon_rejected() {
        let mut config = EngineConfig::default();
        config.lexicon.terms.insert("катастрофа".to_string(), -9);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "windowDays": 14 }"#).unwrap();
        assert_eq!(config.window_days, 14);
        assert_eq!(config.network, NetworkWeights::default());
        assert_eq!(config.anomaly.max_alerts, 10);
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = EngineConfig::from_json(r#"{ "windowDays": 0 }"#);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_roundtrip_through_json() {
        let config = EngineConfig::default();
        let json = config.to_json_pretty().unwrap();
        let loaded = EngineConfig::from_json(&json).unwrap();
        assert_eq!(config, loaded);
    }
}
