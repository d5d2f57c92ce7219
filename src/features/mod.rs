pub mod indicators;

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::types::Bar;
use indicators::{atr, ema, log_return, rsi, sma};

/// Minimum bar history required before features can be extracted. Covers the
/// longest lookback window used below.
pub const MIN_HISTORY: usize = 20;

/// Fixed-length feature set computed from recent bar history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalFeatures {
    // Price features
    pub returns_1: f64,
    pub returns_2: f64,
    pub returns_5: f64,
    pub returns_10: f64,
    pub body_ratio: f64,
    pub upper_wick_ratio: f64,
    pub lower_wick_ratio: f64,

    // Moving averages
    pub sma_3: f64,
    pub sma_5: f64,
    pub sma_13: f64,
    pub ema_3: f64,
    pub ema_5: f64,
    pub ema_13: f64,

    // Momentum and volatility
    pub rsi_14: f64,
    pub atr_14: f64,

    // Time features
    pub hour: f64,
    pub minute: f64,
    pub day_of_week: f64,
}

impl TechnicalFeatures {
    pub const NUM_FEATURES: usize = 18;

    /// Normalized model input. Returns are clamped and scaled to [-1, 1],
    /// moving averages and ATR are expressed relative to a reference price,
    /// RSI is rescaled to [-1, 1] and time components to [0, 1].
    pub fn to_model_input(&self) -> [f64; Self::NUM_FEATURES] {
        let reference = self.sma_3;
        let relative = |value: f64| {
            if reference != 0.0 {
                clamp((value - reference) / reference, -1.0, 1.0)
            } else {
                0.0
            }
        };

        [
            clamp(self.returns_1 * 100.0, -5.0, 5.0) / 5.0,
            clamp(self.returns_2 * 100.0, -5.0, 5.0) / 5.0,
            clamp(self.returns_5 * 100.0, -10.0, 10.0) / 10.0,
            clamp(self.returns_10 * 100.0, -15.0, 15.0) / 15.0,
            self.body_ratio,
            self.upper_wick_ratio,
            self.lower_wick_ratio,
            relative(self.sma_3),
            relative(self.sma_5),
            relative(self.sma_13),
            relative(self.ema_3),
            relative(self.ema_5),
            relative(self.ema_13),
            (self.rsi_14 - 50.0) / 50.0,
            if reference != 0.0 {
                clamp(self.atr_14 / reference, 0.0, 1.0)
            } else {
                0.0
            },
            self.hour / 24.0,
            self.minute / 60.0,
            self.day_of_week / 7.0,
        ]
    }
}

/// Extracts features from bar history (oldest first). Pure and deterministic;
/// `None` when the history is shorter than [`MIN_HISTORY`].
pub fn extract_features(bars: &[Bar]) -> Option<TechnicalFeatures> {
    if bars.len() < MIN_HISTORY {
        return None;
    }

    let latest = bars.last()?;
    let closes: Vec<f64> = bars
        .iter()
        .map(|b| b.close.try_into().unwrap_or(0.0))
        .collect();
    let last_close = *closes.last()?;

    Some(TechnicalFeatures {
        returns_1: log_return(&closes, 1),
        returns_2: log_return(&closes, 2),
        returns_5: log_return(&closes, 5),
        returns_10: log_return(&closes, 10),
        body_ratio: candle_ratio(latest, latest.body_size()),
        upper_wick_ratio: candle_ratio(latest, latest.upper_wick()),
        lower_wick_ratio: candle_ratio(latest, latest.lower_wick()),
        sma_3: sma(&closes, 3).unwrap_or(last_close),
        sma_5: sma(&closes, 5).unwrap_or(last_close),
        sma_13: sma(&closes, 13).unwrap_or(last_close),
        ema_3: ema(&closes, 3).unwrap_or(last_close),
        ema_5: ema(&closes, 5).unwrap_or(last_close),
        ema_13: ema(&closes, 13).unwrap_or(last_close),
        rsi_14: rsi(&closes, 14).unwrap_or(50.0),
        atr_14: atr(bars, 14).unwrap_or(0.0),
        hour: latest.start_time.hour() as f64,
        minute: latest.start_time.minute() as f64,
        day_of_week: latest.start_time.weekday().num_days_from_sunday() as f64,
    })
}

fn candle_ratio(bar: &Bar, part: rust_decimal::Decimal) -> f64 {
    let range = bar.range();
    if range.is_zero() {
        return 0.0;
    }
    (part / range).try_into().unwrap_or(0.0)
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.clamp(min, max)
}
