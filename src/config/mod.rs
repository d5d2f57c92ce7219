use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub aggregator: AggregatorSettings,
    #[serde(default)]
    pub predictor: PredictorSettings,
    #[serde(default)]
    pub buffer: BufferSettings,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub simulator: SimulatorSettings,
}

impl EngineConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&raw)?;
        config
            .validate()
            .map_err(|errors| anyhow::anyhow!("invalid config: {}", errors.join(", ")))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.aggregator.bar_interval_secs == 0 {
            errors.push("bar_interval_secs must be > 0".to_string());
        }
        if self.aggregator.history_size == 0 {
            errors.push("history_size must be > 0".to_string());
        }
        if self.buffer.capacity == 0 {
            errors.push("buffer capacity must be > 0".to_string());
        }
        if self.predictor.learning_rate <= 0.0 || self.predictor.learning_rate >= 1.0 {
            errors.push("learning_rate must be between 0 and 1".to_string());
        }
        if self.predictor.min_batch_size == 0 {
            errors.push("min_batch_size must be > 0".to_string());
        }
        if self.orchestrator.train_batch_size < self.predictor.min_batch_size {
            errors.push("train_batch_size must be >= min_batch_size".to_string());
        }
        if self.orchestrator.generate_interval_secs == 0
            || self.orchestrator.verify_interval_secs == 0
            || self.orchestrator.train_interval_secs == 0
        {
            errors.push("orchestrator intervals must be > 0".to_string());
        }
        if self.orchestrator.horizon_secs == 0 {
            errors.push("horizon_secs must be > 0".to_string());
        }
        if self.orchestrator.metrics_window == 0 {
            errors.push("metrics_window must be > 0".to_string());
        }
        if self.simulator.min_price >= self.simulator.max_price {
            errors.push("simulator min_price must be < max_price".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// How the start time of a freshly opened bar is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarAlignment {
    /// Bar starts at the timestamp of its first tick.
    FirstTick,
    /// Bar start is rounded down to the interval boundary.
    WallClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorSettings {
    pub bar_interval_secs: u64,
    pub close_check_interval_ms: u64,
    pub alignment: BarAlignment,
    pub history_size: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            bar_interval_secs: 60,
            close_check_interval_ms: 500,
            alignment: BarAlignment::FirstTick,
            history_size: 1440,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    Baseline,
    Mlp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorSettings {
    pub kind: PredictorKind,
    pub learning_rate: f64,
    /// Batches smaller than this are dropped instead of trained on.
    pub min_batch_size: usize,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            kind: PredictorKind::Baseline,
            learning_rate: 0.01,
            min_batch_size: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferSettings {
    pub capacity: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self { capacity: 50_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    pub generate_interval_secs: u64,
    pub verify_interval_secs: u64,
    pub train_interval_secs: u64,
    /// Delay before a prediction is checked against realized price.
    pub horizon_secs: u64,
    /// Minimum labeled samples before a training cycle is attempted.
    pub min_labeled_samples: usize,
    pub train_batch_size: usize,
    /// Verified signals considered for accuracy/precision/recall.
    pub metrics_window: usize,
    /// Bars fetched from storage for feature extraction.
    pub history_fetch: usize,
    /// Per-hour decay for the time-weighted success rate.
    pub decay_factor: f64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            generate_interval_secs: 60,
            verify_interval_secs: 5,
            train_interval_secs: 10,
            horizon_secs: 60,
            min_labeled_samples: 32,
            train_batch_size: 64,
            metrics_window: 100,
            history_fetch: 100,
            decay_factor: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorSettings {
    pub tick_interval_ms: u64,
    pub base_price: Decimal,
    pub spread: Decimal,
    pub volatility: f64,
    pub trend: f64,
    pub min_price: Decimal,
    pub max_price: Decimal,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            base_price: dec!(1.08500),
            spread: dec!(0.00005),
            volatility: 0.0001,
            trend: 0.00001,
            min_price: dec!(1.05),
            max_price: dec!(1.12),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let mut config = EngineConfig::default();
        config.aggregator.bar_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_batch_below_minimum() {
        let mut config = EngineConfig::default();
        config.orchestrator.train_batch_size = 8;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("train_batch_size")));
    }
}
