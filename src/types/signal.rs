use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Training label for the replay buffer: UP = 1, DOWN = 0.
    pub fn as_label(&self) -> u8 {
        match self {
            Direction::Up => 1,
            Direction::Down => 0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// Realized outcome of a signal, written exactly once at verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalOutcome {
    pub actual_direction: Direction,
    pub is_correct: bool,
    pub price_after_horizon: Decimal,
    pub verified_at: DateTime<Utc>,
}

/// One directional prediction. Starts pending (`outcome: None`), is verified
/// exactly once after the horizon elapses, and never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub direction: Direction,
    /// Confidence in the stated direction, always in [0.5, 1.0].
    pub probability: f64,
    pub model_version: String,
    pub price_at_prediction: Decimal,
    pub outcome: Option<SignalOutcome>,
}

impl Signal {
    pub fn is_verified(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn is_correct(&self) -> Option<bool> {
        self.outcome.as_ref().map(|o| o.is_correct)
    }
}

/// A buffered (features, label) pair awaiting its delayed label.
/// Shares its id with the signal it was generated alongside.
#[derive(Debug, Clone)]
pub struct ReplaySample {
    pub id: Uuid,
    pub features: Vec<f64>,
    pub label: Option<u8>,
    pub created_at: DateTime<Utc>,
}
