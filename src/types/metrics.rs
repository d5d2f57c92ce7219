use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling model performance over the most recent verified-signal window.
/// Append-only: a new snapshot is created after every verification pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub model_version: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub total_signals: usize,
    pub correct_signals: usize,
    pub window_size: usize,
    pub timestamp: DateTime<Utc>,
}
