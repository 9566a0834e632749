//! Suspicion scoring: a trained model applied to a feature vector, plus the
//! alert threshold.
//!
//! The model artifact is a JSON dense network:
//!
//! ```json
//! { "input_dim": 1,
//!   "layers": [ { "weights": [[0.5], [1.0]], "biases": [0.0, 0.1], "activation": "relu" },
//!               { "weights": [[1.0, -1.0]], "biases": [0.0], "activation": "sigmoid" } ] }
//! ```
//!
//! `weights` has one row per output unit. The last layer must have exactly
//! one unit.

use std::path::Path;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::PipelineError;

/// A pure function from a feature vector to a raw score.
pub trait SuspicionModel: Send + Sync {
    fn input_dim(&self) -> usize;

    /// Called only with vectors of length `input_dim()`.
    fn predict(&self, features: &[f64]) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Linear => x,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LayerSpec {
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct ModelSpec {
    input_dim: usize,
    layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone)]
struct DenseLayer {
    weights: DMatrix<f64>,
    biases: DVector<f64>,
    activation: Activation,
}

/// Feed-forward network loaded from a JSON artifact.
#[derive(Debug, Clone)]
pub struct DenseModel {
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

impl DenseModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::ModelLoad(format!("{}: {e}", path.display())))?;
        let model = Self::from_json(&text)
            .map_err(|e| PipelineError::ModelLoad(format!("{}: {e}", path.display())))?;
        info!(
            path = %path.display(),
            input_dim = model.input_dim,
            layers = model.layers.len(),
            "Scoring model loaded"
        );
        Ok(model)
    }

    /// Parse and shape-check a model. Errors are plain messages; `load` adds the path.
    pub fn from_json(text: &str) -> Result<Self, String> {
        let spec: ModelSpec = serde_json::from_str(text).map_err(|e| e.to_string())?;
        if spec.input_dim == 0 {
            return Err("input_dim must be positive".into());
        }
        if spec.layers.is_empty() {
            return Err("model has no layers".into());
        }

        let mut layers = Vec::with_capacity(spec.layers.len());
        let mut fan_in = spec.input_dim;
        for (idx, layer) in spec.layers.into_iter().enumerate() {
            let units = layer.weights.len();
            if units == 0 {
                return Err(format!("layer {idx} has no units"));
            }
            if layer.biases.len() != units {
                return Err(format!(
                    "layer {idx}: {} biases for {units} units",
                    layer.biases.len()
                ));
            }
            if let Some(row) = layer.weights.iter().find(|row| row.len() != fan_in) {
                return Err(format!(
                    "layer {idx}: weight row of length {} where {fan_in} inputs arrive",
                    row.len()
                ));
            }
            let flat: Vec<f64> = layer.weights.into_iter().flatten().collect();
            if flat.iter().chain(&layer.biases).any(|v| !v.is_finite()) {
                return Err(format!("layer {idx} has non-finite parameters"));
            }
            layers.push(DenseLayer {
                weights: DMatrix::from_row_slice(units, fan_in, &flat),
                biases: DVector::from_vec(layer.biases),
                activation: layer.activation,
            });
            fan_in = units;
        }
        if fan_in != 1 {
            return Err(format!("output layer has {fan_in} units, expected 1"));
        }

        Ok(Self {
            input_dim: spec.input_dim,
            layers,
        })
    }
}

impl SuspicionModel for DenseModel {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn predict(&self, features: &[f64]) -> f64 {
        let mut x = DVector::from_column_slice(features);
        for layer in &self.layers {
            let activation = layer.activation;
            x = (&layer.weights * &x + &layer.biases).map(|v| activation.apply(v));
        }
        x[0]
    }
}

/// Score plus threshold decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    /// In [0, 1].
    pub score: f64,
    /// `score > threshold`; a score equal to the threshold is not flagged.
    pub verdict: bool,
}

/// Immutable after startup; shared read-only.
#[derive(Clone)]
pub struct SuspicionScorer {
    model: Arc<dyn SuspicionModel>,
    threshold: f64,
}

impl SuspicionScorer {
    pub fn new(model: Arc<dyn SuspicionModel>, threshold: f64) -> Result<Self, PipelineError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::Config(format!(
                "suspicion threshold {threshold} outside [0, 1]"
            )));
        }
        Ok(Self { model, threshold })
    }

    /// Load a dense model artifact from disk.
    pub fn load(path: impl AsRef<Path>, threshold: f64) -> Result<Self, PipelineError> {
        let model = DenseModel::load(path)?;
        Self::new(Arc::new(model), threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn input_dim(&self) -> usize {
        self.model.input_dim()
    }

    pub fn assess(&self, features: &[f64]) -> Result<Assessment, PipelineError> {
        let expected = self.model.input_dim();
        if features.len() != expected {
            return Err(PipelineError::DimensionMismatch {
                expected,
                got: features.len(),
            });
        }

        let raw = self.model.predict(features);
        let score = if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            warn!(raw, "Model produced a non-finite score, treating as 0");
            0.0
        };
        Ok(Assessment {
            score,
            verdict: verdict(score, self.threshold),
        })
    }
}

pub fn verdict(score: f64, threshold: f64) -> bool {
    score > threshold
}
