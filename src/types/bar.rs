use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One closed fixed-interval OHLCV bar. Immutable once emitted by the
/// aggregator; `sample_count` is the number of ticks folded into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub start_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub sample_count: u64,
}

impl Bar {
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    pub fn body_size(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn upper_wick(&self) -> Decimal {
        self.high - self.close.max(self.open)
    }

    pub fn lower_wick(&self) -> Decimal {
        self.close.min(self.open) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// `low <= open,close <= high`
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
    }
}

/// Bounded bar history, oldest evicted first.
#[derive(Debug, Clone, Default)]
pub struct BarBuffer {
    pub bars: Vec<Bar>,
    pub max_size: usize,
}

impl BarBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            bars: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, bar: Bar) {
        if self.bars.len() >= self.max_size {
            self.bars.remove(0);
        }
        self.bars.push(bar);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn last_n(&self, n: usize) -> &[Bar] {
        let len = self.bars.len();
        if n >= len {
            &self.bars[..]
        } else {
            &self.bars[len - n..]
        }
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(close: Decimal) -> Bar {
        Bar {
            start_time: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            sample_count: 1,
        }
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = BarBuffer::new(3);
        for i in 1..=5 {
            buffer.push(bar(Decimal::from(i)));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.bars[0].close, dec!(3));
        assert_eq!(buffer.last().unwrap().close, dec!(5));
    }

    #[test]
    fn test_last_n_clamps_to_len() {
        let mut buffer = BarBuffer::new(10);
        buffer.push(bar(dec!(1)));
        buffer.push(bar(dec!(2)));
        assert_eq!(buffer.last_n(5).len(), 2);
        assert_eq!(buffer.last_n(1)[0].close, dec!(2));
    }
}
