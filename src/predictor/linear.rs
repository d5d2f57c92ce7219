use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::{binary_cross_entropy, sigmoid, Prediction, Predictor, TrainingReport};

const BATCH_EPOCHS: usize = 10;

/// Logistic-regression baseline trained by per-example gradient descent.
pub struct LinearPredictor {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
    min_batch_size: usize,
    training_passes: u64,
}

impl LinearPredictor {
    pub fn new(input_size: usize, learning_rate: f64, min_batch_size: usize) -> Self {
        let mut rng = rand::thread_rng();
        let weights = (0..input_size)
            .map(|_| (rng.gen::<f64>() - 0.5) * 0.1)
            .collect();

        info!("Initialized baseline predictor with {} weights", input_size);
        Self {
            weights,
            bias: 0.0,
            learning_rate,
            min_batch_size,
            training_passes: 0,
        }
    }

    fn raw_probability(&self, input: &[f64]) -> f64 {
        let mut z = self.bias;
        for (weight, value) in self.weights.iter().zip(input) {
            z += weight * value;
        }
        sigmoid(z)
    }

    fn sgd_step(&mut self, input: &[f64], label: f64) -> f64 {
        let p = self.raw_probability(input);
        let gradient = (p - label) * p * (1.0 - p);

        for (weight, value) in self.weights.iter_mut().zip(input) {
            *weight -= self.learning_rate * gradient * value;
        }
        self.bias -= self.learning_rate * gradient;

        binary_cross_entropy(p, label)
    }
}

impl Predictor for LinearPredictor {
    fn predict(&self, input: &[f64]) -> Prediction {
        Prediction::from_raw(self.raw_probability(input))
    }

    fn train_online(&mut self, input: &[f64], label: f64) {
        self.sgd_step(input, label);
        self.training_passes += 1;
    }

    fn train_batch(&mut self, inputs: &[Vec<f64>], labels: &[f64]) -> Option<TrainingReport> {
        let n = inputs.len().min(labels.len());
        if n < self.min_batch_size {
            debug!(
                "Skipping training: batch of {} below minimum {}",
                n, self.min_batch_size
            );
            return None;
        }

        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = rand::thread_rng();
        let mut loss = 0.0;

        for _ in 0..BATCH_EPOCHS {
            order.shuffle(&mut rng);
            loss = 0.0;
            for &i in &order {
                loss += self.sgd_step(&inputs[i], labels[i]);
            }
            loss /= n as f64;
        }

        self.training_passes += 1;
        info!(
            "Baseline trained on {} samples, loss {:.6}, now {}",
            n,
            loss,
            self.version()
        );
        Some(TrainingReport { samples: n, loss })
    }

    fn version(&self) -> String {
        format!("v1.0.{}-baseline", self.training_passes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn inputs(n: usize, value: f64) -> Vec<Vec<f64>> {
        vec![vec![value; 18]; n]
    }

    #[test]
    fn test_confidence_is_at_least_half() {
        let predictor = LinearPredictor::new(18, 0.01, 16);
        let prediction = predictor.predict(&vec![0.3; 18]);
        assert!(prediction.confidence >= 0.5);
        assert!((0.0..=1.0).contains(&prediction.probability));
    }

    #[test]
    fn test_online_training_moves_toward_label() {
        let mut predictor = LinearPredictor::new(18, 0.05, 16);
        let input = vec![1.0; 18];
        let before = predictor.predict(&input).probability;
        for _ in 0..200 {
            predictor.train_online(&input, 1.0);
        }
        let after = predictor.predict(&input).probability;
        assert!(after > before);
    }

    #[test]
    fn test_small_batch_leaves_version_unchanged() {
        let mut predictor = LinearPredictor::new(18, 0.01, 16);
        let version = predictor.version();
        let report = predictor.train_batch(&inputs(8, 1.0), &vec![1.0; 8]);
        assert!(report.is_none());
        assert_eq!(predictor.version(), version);
    }

    #[test]
    fn test_batch_training_advances_version() {
        let mut predictor = LinearPredictor::new(18, 0.01, 16);
        assert_eq!(predictor.version(), "v1.0.0-baseline");

        let report = predictor.train_batch(&inputs(32, 0.5), &vec![1.0; 32]);
        assert!(report.is_some());
        assert_eq!(predictor.version(), "v1.0.1-baseline");

        predictor.train_batch(&inputs(32, 0.5), &vec![0.0; 32]);
        assert_eq!(predictor.version(), "v1.0.2-baseline");
    }

    #[test]
    fn test_learns_separable_labels() {
        let mut predictor = LinearPredictor::new(2, 0.5, 4);
        let mut batch_inputs = Vec::new();
        let mut batch_labels = Vec::new();
        for _ in 0..20 {
            batch_inputs.push(vec![1.0, 0.0]);
            batch_labels.push(1.0);
            batch_inputs.push(vec![-1.0, 0.0]);
            batch_labels.push(0.0);
        }
        for _ in 0..20 {
            predictor.train_batch(&batch_inputs, &batch_labels);
        }
        assert_eq!(predictor.predict(&[1.0, 0.0]).direction, Direction::Up);
        assert_eq!(predictor.predict(&[-1.0, 0.0]).direction, Direction::Down);
    }
}
