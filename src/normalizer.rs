//! Feature normalization
//!
//! Min-max scaling of the raw feature vector into the network's 0-1 input
//! space. Out-of-range values are clipped to the bounds; how much clipping
//! was needed is kept so the predictor can report input reliability.

use crate::types::{Feature, FeatureVector};
use serde::Serialize;

/// Fixed scaling bounds for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureBounds {
    pub feature: Feature,
    pub min: f64,
    pub max: f64,
    /// Higher raw values mean lower risk
    pub inverted: bool,
}

impl FeatureBounds {
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Scale a raw value into 0-1, clipping to the bounds
    pub fn scale(&self, raw: f64) -> f64 {
        let unit = (raw.clamp(self.min, self.max) - self.min) / self.width();
        if self.inverted {
            1.0 - unit
        } else {
            unit
        }
    }

    /// Distance outside the bounds as a fraction of the width, capped at 1
    pub fn clip_fraction(&self, raw: f64) -> f64 {
        let excess = if raw < self.min {
            self.min - raw
        } else if raw > self.max {
            raw - self.max
        } else {
            0.0
        };
        (excess / self.width()).min(1.0)
    }
}

/// Scaling bounds in network input order.
///
/// Mood and streak are inverted: a low mood or a short streak is the risky end.
pub const FEATURE_BOUNDS: [FeatureBounds; 6] = [
    FeatureBounds {
        feature: Feature::EpisodeFrequency,
        min: 0.0,
        max: 14.0,
        inverted: false,
    },
    FeatureBounds {
        feature: Feature::SpendingTrend,
        min: 0.0,
        max: 3.0,
        inverted: false,
    },
    FeatureBounds {
        feature: Feature::MoodScore,
        min: 1.0,
        max: 5.0,
        inverted: true,
    },
    FeatureBounds {
        feature: Feature::NightActivityRatio,
        min: 0.0,
        max: 1.0,
        inverted: false,
    },
    FeatureBounds {
        feature: Feature::TriggerDiversity,
        min: 0.0,
        max: 6.0,
        inverted: false,
    },
    FeatureBounds {
        feature: Feature::StreakDays,
        min: 0.0,
        max: 30.0,
        inverted: true,
    },
];

/// Network-ready input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedInput {
    /// Scaled values in network input order, each in 0-1
    pub values: [f64; 6],
    /// Per-feature clipping, each in 0-1
    pub clipping: [f64; 6],
}

impl NormalizedInput {
    /// Input reliability: 1 minus the mean clipping fraction
    pub fn confidence(&self) -> f64 {
        let mean = self.clipping.iter().sum::<f64>() / self.clipping.len() as f64;
        (1.0 - mean).clamp(0.0, 1.0)
    }
}

/// Normalizer for the network input
pub struct FeatureNormalizer;

impl FeatureNormalizer {
    /// Normalize a finite feature vector
    pub fn normalize(features: &FeatureVector) -> NormalizedInput {
        let raw = features.as_array();
        let mut values = [0.0; 6];
        let mut clipping = [0.0; 6];
        for (i, bounds) in FEATURE_BOUNDS.iter().enumerate() {
            values[i] = bounds.scale(raw[i]);
            clipping[i] = bounds.clip_fraction(raw[i]);
        }
        NormalizedInput { values, clipping }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(
        episode_frequency: f64,
        spending_trend: f64,
        mood_score: f64,
        night_activity_ratio: f64,
        trigger_diversity: f64,
        streak_days: f64,
    ) -> FeatureVector {
        FeatureVector {
            episode_frequency,
            spending_trend,
            mood_score,
            night_activity_ratio,
            trigger_diversity,
            streak_days,
        }
    }

    #[test]
    fn test_bounds_follow_input_order() {
        for (bounds, feature) in FEATURE_BOUNDS.iter().zip(Feature::ALL) {
            assert_eq!(bounds.feature, feature);
            assert!(bounds.width() > 0.0);
        }
    }

    #[test]
    fn test_in_range_values_scale_without_clipping() {
        let input = FeatureNormalizer::normalize(&features(3.0, 1.0, 2.0, 1.0 / 3.0, 2.0, 1.0));

        assert!((input.values[0] - 3.0 / 14.0).abs() < 1e-9);
        assert!((input.values[1] - 1.0 / 3.0).abs() < 1e-9);
        assert!((input.values[2] - 0.75).abs() < 1e-9);
        assert!((input.values[5] - 29.0 / 30.0).abs() < 1e-9);
        assert_eq!(input.clipping, [0.0; 6]);
        assert_eq!(input.confidence(), 1.0);
    }

    #[test]
    fn test_out_of_range_values_are_clipped() {
        let input = FeatureNormalizer::normalize(&features(28.0, 0.5, 3.0, 0.0, 0.0, 45.0));

        assert_eq!(input.values[0], 1.0);
        assert_eq!(input.values[5], 0.0);
        // 14 over a width of 14, 15 over a width of 30
        assert_eq!(input.clipping[0], 1.0);
        assert!((input.clipping[5] - 0.5).abs() < 1e-9);
        assert!((input.confidence() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_values_stay_in_unit_interval() {
        let extremes = [-100.0, -1.0, 0.0, 0.5, 1.0, 7.0, 1e9];
        for raw in extremes {
            let input = FeatureNormalizer::normalize(&features(raw, raw, raw, raw, raw, raw));
            for v in input.values.iter().chain(input.clipping.iter()) {
                assert!((0.0..=1.0).contains(v));
            }
        }
    }
}
