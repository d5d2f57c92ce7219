pub mod linear;
pub mod mlp;

pub use linear::LinearPredictor;
pub use mlp::MlpPredictor;

use crate::config::{PredictorKind, PredictorSettings};
use crate::types::Direction;

/// Directional probability prediction. `probability` is the raw
/// probability-of-UP in [0, 1]; `confidence` is the mass assigned to the
/// predicted direction and is therefore always >= 0.5.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub direction: Direction,
    pub probability: f64,
    pub confidence: f64,
}

impl Prediction {
    pub fn from_raw(probability: f64) -> Self {
        let direction = if probability >= 0.5 {
            Direction::Up
        } else {
            Direction::Down
        };
        let confidence = if probability >= 0.5 {
            probability
        } else {
            1.0 - probability
        };
        Self {
            direction,
            probability,
            confidence,
        }
    }
}

/// Summary of one successful training pass.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub samples: usize,
    pub loss: f64,
}

/// Trainable directional model. Implementations must advance their version
/// string after every successful training pass; `train_batch` returns `None`
/// when the batch is below the configured minimum and no training happened.
pub trait Predictor: Send + Sync {
    fn predict(&self, input: &[f64]) -> Prediction;
    fn train_online(&mut self, input: &[f64], label: f64);
    fn train_batch(&mut self, inputs: &[Vec<f64>], labels: &[f64]) -> Option<TrainingReport>;
    fn version(&self) -> String;
}

pub fn build_predictor(settings: &PredictorSettings, input_size: usize) -> Box<dyn Predictor> {
    match settings.kind {
        PredictorKind::Baseline => Box::new(LinearPredictor::new(
            input_size,
            settings.learning_rate,
            settings.min_batch_size,
        )),
        PredictorKind::Mlp => Box::new(MlpPredictor::new(
            input_size,
            settings.learning_rate,
            settings.min_batch_size,
        )),
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

pub(crate) fn binary_cross_entropy(p: f64, label: f64) -> f64 {
    let p = p.clamp(1e-12, 1.0 - 1e-12);
    -(label * p.ln() + (1.0 - label) * (1.0 - p).ln())
}
