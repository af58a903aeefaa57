//! Neural risk predictor
//!
//! A static 6 → 8 → 4 → 1 feedforward network. Weights come from the engine
//! configuration and are checked and copied into fixed-size arrays when the
//! predictor is built, so inference itself cannot hit a shape error.
//!
//! Explanations use finite differences: each normalized input is nudged by a
//! small epsilon in both directions and the output slope is measured. The
//! slopes are normalized to sum to one and bucketed by rank.

use crate::config::{HiddenActivation, NetworkWeights};
use crate::error::EngineError;
use crate::normalizer::{FeatureNormalizer, NormalizedInput};
use crate::thresholds::RiskLevel;
use crate::types::{Feature, FeatureVector, ModuleOutcome};
use serde::Serialize;
use tracing::warn;

const INPUTS: usize = 6;
const HIDDEN1: usize = 8;
const HIDDEN2: usize = 4;

pub const MODEL_NAME: &str = "nobet-risk-ffn";
pub const ARCHITECTURE: &str = "6-8-4-1";

/// Impact tier of one feature, assigned by importance rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    /// Top third high, middle third medium, bottom third low
    fn from_rank(rank: usize) -> Self {
        match rank * 3 / INPUTS {
            0 => Impact::High,
            1 => Impact::Medium,
            _ => Impact::Low,
        }
    }
}

/// Contribution of one feature to the current prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureImportance {
    pub feature: Feature,
    pub label: &'static str,
    pub raw_value: f64,
    /// Network input after min-max scaling, 0-1
    pub normalized_value: f64,
    /// Share of total sensitivity, all six sum to 1
    pub importance: f64,
    pub impact: Impact,
}

/// Description of the model that produced a prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMeta {
    pub name: &'static str,
    pub version: String,
    pub architecture: &'static str,
    pub hidden_activation: HiddenActivation,
    pub output_activation: &'static str,
    pub parameters: usize,
}

/// Output of the neural risk predictor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeuralPrediction {
    /// 0-100
    pub risk_score: u8,
    /// Network output, 0-1
    pub risk_probability: f64,
    pub risk_level: RiskLevel,
    /// Input reliability derived from clipping, 0-1
    pub confidence: f64,
    /// Most important feature first
    pub feature_importance: Vec<FeatureImportance>,
    pub input_features: FeatureVector,
    pub meta: ModelMeta,
}

/// Feedforward risk network with validated weights
#[derive(Debug, Clone)]
pub struct NeuralRiskPredictor {
    layer1: [[f64; INPUTS]; HIDDEN1],
    bias1: [f64; HIDDEN1],
    layer2: [[f64; HIDDEN1]; HIDDEN2],
    bias2: [f64; HIDDEN2],
    output: [f64; HIDDEN2],
    output_bias: f64,
    activation: HiddenActivation,
    epsilon: f64,
    version: String,
}

impl NeuralRiskPredictor {
    /// Build a predictor, rejecting weights of the wrong shape
    pub fn new(weights: &NetworkWeights, epsilon: f64) -> Result<Self, EngineError> {
        weights.validate()?;
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(EngineError::config("importance epsilon must be positive"));
        }

        Ok(Self {
            layer1: to_matrix(&weights.layer1)?,
            bias1: to_array(&weights.bias1)?,
            layer2: to_matrix(&weights.layer2)?,
            bias2: to_array(&weights.bias2)?,
            output: to_array(&weights.output)?,
            output_bias: weights.output_bias,
            activation: weights.hidden_activation,
            epsilon,
            version: weights.version.clone(),
        })
    }

    pub fn meta(&self) -> ModelMeta {
        ModelMeta {
            name: MODEL_NAME,
            version: self.version.clone(),
            architecture: ARCHITECTURE,
            hidden_activation: self.activation,
            output_activation: "sigmoid",
            parameters: HIDDEN1 * (INPUTS + 1) + HIDDEN2 * (HIDDEN1 + 1) + HIDDEN2 + 1,
        }
    }

    /// Score a feature vector
    pub fn predict(&self, features: &FeatureVector) -> ModuleOutcome<NeuralPrediction> {
        if let Some(feature) = features.first_non_finite() {
            warn!(feature = feature.key(), "neural predictor skipped on non-finite input");
            return ModuleOutcome::failed(format!(
                "insufficient data: {} is not a finite number",
                feature.key()
            ));
        }

        let input = FeatureNormalizer::normalize(features);
        let probability = self.forward(&input.values);
        let risk_score = (probability * 100.0).round().clamp(0.0, 100.0) as u8;

        ModuleOutcome::Ready(NeuralPrediction {
            risk_score,
            risk_probability: round_to(probability, 3),
            risk_level: RiskLevel::from_score(risk_score),
            confidence: round_to(input.confidence(), 2),
            feature_importance: self.feature_importance(features, &input),
            input_features: *features,
            meta: self.meta(),
        })
    }

    /// Raw network output for normalized inputs
    pub fn forward(&self, x: &[f64; INPUTS]) -> f64 {
        let mut h1 = [0.0; HIDDEN1];
        for (j, row) in self.layer1.iter().enumerate() {
            h1[j] = self.activate(dot(row, x) + self.bias1[j]);
        }
        let mut h2 = [0.0; HIDDEN2];
        for (k, row) in self.layer2.iter().enumerate() {
            h2[k] = self.activate(dot(row, &h1) + self.bias2[k]);
        }
        sigmoid(dot(&self.output, &h2) + self.output_bias)
    }

    fn activate(&self, z: f64) -> f64 {
        match self.activation {
            HiddenActivation::Relu => z.max(0.0),
            HiddenActivation::Sigmoid => sigmoid(z),
        }
    }

    fn feature_importance(
        &self,
        features: &FeatureVector,
        input: &NormalizedInput,
    ) -> Vec<FeatureImportance> {
        let mut sensitivity = [0.0; INPUTS];
        for (i, slot) in sensitivity.iter_mut().enumerate() {
            let mut up = input.values;
            let mut down = input.values;
            up[i] = (up[i] + self.epsilon).min(1.0);
            down[i] = (down[i] - self.epsilon).max(0.0);
            let step = up[i] - down[i];
            if step > 0.0 {
                *slot = (self.forward(&up) - self.forward(&down)).abs() / step;
            }
        }

        let total: f64 = sensitivity.iter().sum();
        let shares: [f64; INPUTS] = if total > 0.0 && total.is_finite() {
            sensitivity.map(|s| s / total)
        } else {
            [1.0 / INPUTS as f64; INPUTS]
        };

        let mut order: Vec<usize> = (0..INPUTS).collect();
        order.sort_by(|&a, &b| shares[b].total_cmp(&shares[a]).then(a.cmp(&b)));

        order
            .into_iter()
            .enumerate()
            .map(|(rank, i)| {
                let feature = Feature::ALL[i];
                FeatureImportance {
                    feature,
                    label: feature.label(),
                    raw_value: features.get(feature),
                    normalized_value: round_to(input.values[i], 3),
                    importance: round_to(shares[i], 4),
                    impact: Impact::from_rank(rank),
                }
            })
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot<const N: usize>(weights: &[f64; N], values: &[f64; N]) -> f64 {
    weights.iter().zip(values).map(|(w, v)| w * v).sum()
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn to_array<const N: usize>(values: &[f64]) -> Result<[f64; N], EngineError> {
    values
        .try_into()
        .map_err(|_| EngineError::config(format!("expected {N} weights, got {}", values.len())))
}

fn to_matrix<const R: usize, const C: usize>(
    rows: &[Vec<f64>],
) -> Result<[[f64; C]; R], EngineError> {
    if rows.len() != R {
        return Err(EngineError::config(format!(
            "expected {R} weight rows, got {}",
            rows.len()
        )));
    }
    let mut matrix = [[0.0; C]; R];
    for (target, row) in matrix.iter_mut().zip(rows) {
        *target = to_array(row)?;
    }
    Ok(matrix)
}
