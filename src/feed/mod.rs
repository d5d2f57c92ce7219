use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::config::SimulatorSettings;
use crate::types::Tick;

/// Abstract producer of price samples. The engine only consumes ticks; where
/// they come from (simulator, exchange feed) is a construction-time choice.
pub trait TickSource: Send {
    fn next_tick(&mut self, now: DateTime<Utc>) -> Tick;
    fn current_price(&self) -> Decimal;
}

/// Bounded random-walk price generator with a fixed spread and a small
/// configurable trend component.
pub struct RandomWalkSimulator {
    settings: SimulatorSettings,
    price: f64,
}

impl RandomWalkSimulator {
    pub fn new(settings: SimulatorSettings) -> Self {
        let price = settings.base_price.try_into().unwrap_or(1.0);
        Self { settings, price }
    }

    pub fn set_trend(&mut self, trend: f64) {
        self.settings.trend = trend;
    }
}

impl TickSource for RandomWalkSimulator {
    fn next_tick(&mut self, now: DateTime<Utc>) -> Tick {
        let mut rng = rand::thread_rng();
        let random_change = (rng.gen::<f64>() - 0.5) * self.settings.volatility;
        let trend_change = self.settings.trend * (rng.gen::<f64>() - 0.3);
        self.price += random_change + trend_change;

        let min: f64 = self.settings.min_price.try_into().unwrap_or(0.0);
        let max: f64 = self.settings.max_price.try_into().unwrap_or(f64::MAX);
        self.price = self.price.clamp(min, max);

        let mid = Decimal::from_f64(self.price).unwrap_or(self.settings.base_price);
        let half_spread = self.settings.spread / Decimal::from(2);
        Tick::new(now, mid - half_spread, mid + half_spread)
    }

    fn current_price(&self) -> Decimal {
        Decimal::from_f64(self.price).unwrap_or(self.settings.base_price)
    }
}
