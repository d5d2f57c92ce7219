use chrono::{DateTime, Utc};

use crate::types::{Direction, MetricSnapshot, Signal};

/// Accuracy, and UP-class precision/recall, over a window of verified
/// signals. Zero denominators yield 0. `None` when the window is empty.
pub fn compute_metrics(
    signals: &[Signal],
    model_version: &str,
    window_size: usize,
    now: DateTime<Utc>,
) -> Option<MetricSnapshot> {
    let verified: Vec<&Signal> = signals.iter().filter(|s| s.is_verified()).collect();
    if verified.is_empty() {
        return None;
    }

    let total = verified.len();
    let correct = verified
        .iter()
        .filter(|s| s.is_correct() == Some(true))
        .count();

    let predicted_up: Vec<&&Signal> = verified
        .iter()
        .filter(|s| s.direction == Direction::Up)
        .collect();
    let correct_up = predicted_up
        .iter()
        .filter(|s| s.is_correct() == Some(true))
        .count();
    let actual_up = verified
        .iter()
        .filter(|s| {
            s.outcome
                .as_ref()
                .map(|o| o.actual_direction == Direction::Up)
                .unwrap_or(false)
        })
        .count();

    let precision = if predicted_up.is_empty() {
        0.0
    } else {
        correct_up as f64 / predicted_up.len() as f64
    };
    let recall = if actual_up == 0 {
        0.0
    } else {
        correct_up as f64 / actual_up as f64
    };

    Some(MetricSnapshot {
        model_version: model_version.to_string(),
        accuracy: correct as f64 / total as f64,
        precision,
        recall,
        total_signals: total,
        correct_signals: correct,
        window_size,
        timestamp: now,
    })
}

/// Exponentially time-weighted accuracy: `weight = exp(-decay * age_hours)`.
/// With `decay = 0` this degenerates to the plain accuracy. 0 with no signals.
pub fn decayed_success_rate(signals: &[Signal], now: DateTime<Utc>, decay_per_hour: f64) -> f64 {
    let mut weighted_correct = 0.0;
    let mut total_weight = 0.0;

    for signal in signals.iter().filter(|s| s.is_verified()) {
        let age_hours = (now - signal.created_at).num_seconds().max(0) as f64 / 3600.0;
        let weight = (-decay_per_hour * age_hours).exp();
        if signal.is_correct() == Some(true) {
            weighted_correct += weight;
        }
        total_weight += weight;
    }

    if total_weight > 0.0 {
        weighted_correct / total_weight
    } else {
        0.0
    }
}
