use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::{binary_cross_entropy, Prediction, Predictor, TrainingReport};

const HIDDEN_1: usize = 64;
const HIDDEN_2: usize = 32;
const HIDDEN_3: usize = 16;
const DROPOUT_1: f64 = 0.3;
const DROPOUT_2: f64 = 0.2;
const L2_LAMBDA: f64 = 0.001;
const EPOCHS: usize = 5;
const MINI_BATCH: usize = 32;

/// Small feed-forward network (64/32/16 ReLU hidden layers, sigmoid output)
/// trained by mini-batch gradient descent with L2 on the first two layers and
/// inverted dropout during training only.
pub struct MlpPredictor {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
    w3: Array2<f64>,
    b3: Array1<f64>,
    w4: Array2<f64>,
    b4: Array1<f64>,
    learning_rate: f64,
    min_batch_size: usize,
    training_passes: u64,
}

impl MlpPredictor {
    pub fn new(input_size: usize, learning_rate: f64, min_batch_size: usize) -> Self {
        let mut rng = rand::thread_rng();
        let mut layer = |rows: usize, cols: usize| {
            let scale = (2.0 / rows as f64).sqrt();
            Array2::from_shape_fn((rows, cols), |_| (rng.gen::<f64>() - 0.5) * 2.0 * scale)
        };

        let w1 = layer(input_size, HIDDEN_1);
        let w2 = layer(HIDDEN_1, HIDDEN_2);
        let w3 = layer(HIDDEN_2, HIDDEN_3);
        let w4 = layer(HIDDEN_3, 1);

        info!(
            "Initialized MLP predictor {}-{}-{}-{}-1",
            input_size, HIDDEN_1, HIDDEN_2, HIDDEN_3
        );
        Self {
            w1,
            b1: Array1::zeros(HIDDEN_1),
            w2,
            b2: Array1::zeros(HIDDEN_2),
            w3,
            b3: Array1::zeros(HIDDEN_3),
            w4,
            b4: Array1::zeros(1),
            learning_rate,
            min_batch_size,
            training_passes: 0,
        }
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let a1 = relu(&(x.dot(&self.w1) + &self.b1));
        let a2 = relu(&(a1.dot(&self.w2) + &self.b2));
        let a3 = relu(&(a2.dot(&self.w3) + &self.b3));
        (a3.dot(&self.w4) + &self.b4).mapv(super::sigmoid)
    }

    /// One gradient step on a mini-batch. Returns the mean loss over it.
    fn backprop(&mut self, x: &Array2<f64>, y: &Array2<f64>, use_dropout: bool) -> f64 {
        let n = x.nrows() as f64;
        let mut rng = rand::thread_rng();

        let z1 = x.dot(&self.w1) + &self.b1;
        let mut a1 = relu(&z1);
        let mask1 = dropout_mask(a1.dim(), DROPOUT_1, use_dropout, &mut rng);
        a1 = &a1 * &mask1;

        let z2 = a1.dot(&self.w2) + &self.b2;
        let mut a2 = relu(&z2);
        let mask2 = dropout_mask(a2.dim(), DROPOUT_2, use_dropout, &mut rng);
        a2 = &a2 * &mask2;

        let z3 = a2.dot(&self.w3) + &self.b3;
        let a3 = relu(&z3);

        let p = (a3.dot(&self.w4) + &self.b4).mapv(super::sigmoid);

        let loss = p
            .iter()
            .zip(y.iter())
            .map(|(&prob, &label)| binary_cross_entropy(prob, label))
            .sum::<f64>()
            / n;

        // Output layer: dL/dz4 = (p - y) / n for sigmoid + cross-entropy
        let dz4 = (&p - y) / n;
        let dw4 = a3.t().dot(&dz4);
        let db4 = dz4.sum_axis(Axis(0));

        let dz3 = dz4.dot(&self.w4.t()) * relu_grad(&z3);
        let dw3 = a2.t().dot(&dz3);
        let db3 = dz3.sum_axis(Axis(0));

        let dz2 = dz3.dot(&self.w3.t()) * &mask2 * relu_grad(&z2);
        let dw2 = a1.t().dot(&dz2) + &self.w2 * L2_LAMBDA;
        let db2 = dz2.sum_axis(Axis(0));

        let dz1 = dz2.dot(&self.w2.t()) * &mask1 * relu_grad(&z1);
        let dw1 = x.t().dot(&dz1) + &self.w1 * L2_LAMBDA;
        let db1 = dz1.sum_axis(Axis(0));

        let lr = self.learning_rate;
        self.w4 -= &(dw4 * lr);
        self.b4 -= &(db4 * lr);
        self.w3 -= &(dw3 * lr);
        self.b3 -= &(db3 * lr);
        self.w2 -= &(dw2 * lr);
        self.b2 -= &(db2 * lr);
        self.w1 -= &(dw1 * lr);
        self.b1 -= &(db1 * lr);

        loss
    }
}

impl Predictor for MlpPredictor {
    fn predict(&self, input: &[f64]) -> Prediction {
        let x = Array2::from_shape_vec((1, input.len()), input.to_vec())
            .unwrap_or_else(|_| Array2::zeros((1, self.w1.nrows())));
        let p = self.forward(&x)[[0, 0]];
        Prediction::from_raw(p)
    }

    fn train_online(&mut self, input: &[f64], label: f64) {
        let Ok(x) = Array2::from_shape_vec((1, input.len()), input.to_vec()) else {
            return;
        };
        let y = Array2::from_elem((1, 1), label);
        self.backprop(&x, &y, false);
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

        let mini_batch = MINI_BATCH.min(n);
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = rand::thread_rng();
        let mut loss = 0.0;

        for _ in 0..EPOCHS {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            let mut batches = 0;

            for chunk in order.chunks(mini_batch) {
                let rows = chunk.len();
                let mut data = Vec::with_capacity(rows * inputs[0].len());
                let mut targets = Vec::with_capacity(rows);
                for &i in chunk {
                    data.extend_from_slice(&inputs[i]);
                    targets.push(labels[i]);
                }
                let Ok(x) = Array2::from_shape_vec((rows, inputs[0].len()), data) else {
                    continue;
                };
                let Ok(y) = Array2::from_shape_vec((rows, 1), targets) else {
                    continue;
                };
                epoch_loss += self.backprop(&x, &y, true);
                batches += 1;
            }

            if batches > 0 {
                loss = epoch_loss / batches as f64;
            }
        }

        self.training_passes += 1;
        info!(
            "MLP trained on {} samples, loss {:.6}, now {}",
            n,
            loss,
            self.version()
        );
        Some(TrainingReport { samples: n, loss })
    }

    fn version(&self) -> String {
        format!("v2.0.{}-mlp", self.training_passes)
    }
}

fn relu(z: &Array2<f64>) -> Array2<f64> {
    z.mapv(|v| v.max(0.0))
}

fn relu_grad(z: &Array2<f64>) -> Array2<f64> {
    z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

/// Inverted dropout: kept units are scaled by 1/keep so inference needs no
/// rescaling. All-ones when not training.
fn dropout_mask(
    dim: (usize, usize),
    rate: f64,
    active: bool,
    rng: &mut impl Rng,
) -> Array2<f64> {
    if !active || rate <= 0.0 {
        return Array2::ones(dim);
    }
    let keep = 1.0 - rate;
    Array2::from_shape_fn(dim, |_| {
        if rng.gen::<f64>() < keep {
            1.0 / keep
        } else {
            0.0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_in_range() {
        let predictor = MlpPredictor::new(18, 0.001, 16);
        let prediction = predictor.predict(&vec![0.5; 18]);
        assert!((0.0..=1.0).contains(&prediction.probability));
        assert!(prediction.confidence >= 0.5);
    }

    #[test]
    fn test_small_batch_is_skipped() {
        let mut predictor = MlpPredictor::new(18, 0.001, 16);
        let version = predictor.version();
        let report = predictor.train_batch(&vec![vec![0.0; 18]; 15], &vec![1.0; 15]);
        assert!(report.is_none());
        assert_eq!(predictor.version(), version);
    }

    #[test]
    fn test_batch_training_advances_version() {
        let mut predictor = MlpPredictor::new(18, 0.001, 16);
        assert_eq!(predictor.version(), "v2.0.0-mlp");
        let report = predictor
            .train_batch(&vec![vec![0.1; 18]; 32], &vec![1.0; 32])
            .unwrap();
        assert_eq!(report.samples, 32);
        assert!(report.loss.is_finite());
        assert_eq!(predictor.version(), "v2.0.1-mlp");
    }

    #[test]
    fn test_training_keeps_predictions_valid() {
        let mut predictor = MlpPredictor::new(4, 0.01, 8);
        let mut inputs = Vec::new();
        let mut labels = Vec::new();
        for i in 0..64 {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            inputs.push(vec![sign, sign * 0.5, 0.0, 0.1]);
            labels.push(if sign > 0.0 { 1.0 } else { 0.0 });
        }
        for _ in 0..5 {
            predictor.train_batch(&inputs, &labels);
        }
        let p = predictor.predict(&[1.0, 0.5, 0.0, 0.1]).probability;
        assert!((0.0..=1.0).contains(&p));
    }
}
