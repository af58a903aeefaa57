//! Series baselines
//!
//! Mean and sample standard deviation of one metric series. Anomaly scoring
//! is relative to these baselines, so degenerate series are handled here:
//! fewer than two points has no baseline at all, and a constant series scores
//! every point at zero.

use serde::Serialize;

/// Minimum points for a sample standard deviation
pub const MIN_BASELINE_POINTS: usize = 2;

/// Summary statistics of a metric series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesBaseline {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1)
    pub std_dev: f64,
}

impl SeriesBaseline {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        let total: f64 = values.iter().sum();
        let mean = if count == 0 { 0.0 } else { total / count as f64 };
        let std_dev = if count < MIN_BASELINE_POINTS {
            0.0
        } else {
            let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (sum_sq / (count - 1) as f64).sqrt()
        };
        Self {
            count,
            total,
            mean,
            std_dev,
        }
    }

    /// Whether the series is long enough to flag anomalies against
    pub fn is_established(&self) -> bool {
        self.count >= MIN_BASELINE_POINTS
    }

    /// Z-score of a value against this baseline.
    ///
    /// `None` when the series is too short; `0.0` when it has no variance.
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if !self.is_established() {
            return None;
        }
        if self.std_dev <= f64::EPSILON * self.mean.abs().max(1.0) {
            return Some(0.0);
        }
        let z = (value - self.mean) / self.std_dev;
        z.is_finite().then_some(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_std_dev() {
        let baseline = SeriesBaseline::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(baseline.count, 8);
        assert!((baseline.mean - 5.0).abs() < 1e-9);
        // population std is 2.0, sample std is sqrt(32 / 7)
        assert!((baseline.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-9);
        assert_eq!(baseline.total, 40.0);
    }

    #[test]
    fn test_constant_series_scores_zero() {
        let baseline = SeriesBaseline::from_values(&[500.0; 10]);
        assert_eq!(baseline.std_dev, 0.0);
        assert_eq!(baseline.z_score(500.0), Some(0.0));
        assert_eq!(baseline.z_score(5000.0), Some(0.0));
    }

    #[test]
    fn test_short_series_has_no_z() {
        assert_eq!(SeriesBaseline::from_values(&[]).z_score(1.0), None);
        assert_eq!(SeriesBaseline::from_values(&[3.0]).z_score(10.0), None);
        assert!(SeriesBaseline::from_values(&[3.0, 4.0]).z_score(10.0).is_some());
    }

    #[test]
    fn test_spike_against_noisy_baseline_is_critical() {
        let mut values = vec![900.0, 1100.0, 1000.0, 950.0, 1050.0, 980.0, 1020.0, 1000.0, 1000.0];
        values.push(10_000.0);
        let baseline = SeriesBaseline::from_values(&values);
        let z = baseline.z_score(10_000.0).unwrap();
        assert!(z >= crate::thresholds::Z_CRITICAL, "z = {z}");
    }
}
