use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, bid: Decimal, ask: Decimal) -> Self {
        Self {
            timestamp,
            bid,
            ask,
            mid: (bid + ask) / Decimal::from(2),
        }
    }

    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}
