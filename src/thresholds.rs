//! Shared risk cut points
//!
//! Every module, the aggregator and the encoder read their tiers from here.
//! Consumers re-deriving a tier from a raw score must use [`RiskLevel::from_score`].

use serde::{Deserialize, Serialize};

/// Scores at or above this value are `MEDIUM`.
pub const RISK_MEDIUM_MIN: u8 = 30;

/// Scores at or above this value are `HIGH`.
pub const RISK_HIGH_MIN: u8 = 60;

/// `|z|` at or above this value is a warning anomaly.
pub const Z_WARNING: f64 = 1.5;

/// `|z|` at or above this value is a critical anomaly.
pub const Z_CRITICAL: f64 = 2.5;

/// Discrete risk tier derived from a 0-100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Map a 0-100 score to its tier (29 → LOW, 30 → MEDIUM, 59 → MEDIUM, 60 → HIGH).
    pub fn from_score(score: u8) -> Self {
        if score >= RISK_HIGH_MIN {
            RiskLevel::High
        } else if score >= RISK_MEDIUM_MIN {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// Severity of a single Z-score observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    /// Classify a Z-score. Non-finite values are treated as normal.
    pub fn from_z(z: f64) -> Self {
        if !z.is_finite() {
            return Severity::Normal;
        }
        let abs = z.abs();
        if abs >= Z_CRITICAL {
            Severity::Critical
        } else if abs >= Z_WARNING {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }

    pub fn is_anomaly(&self) -> bool {
        !matches!(self, Severity::Normal)
    }
}

/// Overall anomaly risk reported by the anomaly detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallRisk {
    Low,
    Moderate,
    High,
}

impl OverallRisk {
    /// Escalates to `High` on any critical anomaly, `Moderate` on warnings only.
    pub fn from_counts(critical: usize, warning: usize) -> Self {
        if critical > 0 {
            OverallRisk::High
        } else if warning > 0 {
            OverallRisk::Moderate
        } else {
            OverallRisk::Low
        }
    }

    /// Tier on the shared LOW/MEDIUM/HIGH scale.
    pub fn as_risk_level(&self) -> RiskLevel {
        match self {
            OverallRisk::Low => RiskLevel::Low,
            OverallRisk::Moderate => RiskLevel::Medium,
            OverallRisk::High => RiskLevel::High,
        }
    }
}

/// Cut points as published in every assessment payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedThresholds {
    pub risk_medium: u8,
    pub risk_high: u8,
    pub z_warning: f64,
    pub z_critical: f64,
}

impl Default for PublishedThresholds {
    fn default() -> Self {
        Self {
            risk_medium: RISK_MEDIUM_MIN,
            risk_high: RISK_HIGH_MIN,
            z_warning: Z_WARNING,
            z_critical: Z_CRITICAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(59), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(60), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::High);
    }

    #[test]
    fn test_risk_level_is_monotonic() {
        let mut previous = RiskLevel::from_score(0);
        for score in 1..=100u8 {
            let level = RiskLevel::from_score(score);
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Severity::from_z(0.0), Severity::Normal);
        assert_eq!(Severity::from_z(1.49), Severity::Normal);
        assert_eq!(Severity::from_z(1.5), Severity::Warning);
        assert_eq!(Severity::from_z(-2.0), Severity::Warning);
        assert_eq!(Severity::from_z(2.5), Severity::Critical);
        assert_eq!(Severity::from_z(-3.1), Severity::Critical);
        assert_eq!(Severity::from_z(f64::NAN), Severity::Normal);
    }

    #[test]
    fn test_overall_risk_escalation() {
        assert_eq!(OverallRisk::from_counts(0, 0), OverallRisk::Low);
        assert_eq!(OverallRisk::from_counts(0, 3), OverallRisk::Moderate);
        assert_eq!(OverallRisk::from_counts(1, 0), OverallRisk::High);
    }

    #[test]
    fn test_level_serialization() {
        assert_eq!(serde_json::to_string(&RiskLevel::Medium).unwrap(), "\"MEDIUM\"");
        assert_eq!(serde_json::to_string(&OverallRisk::Moderate).unwrap(), "\"moderate\"");
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    }
}
