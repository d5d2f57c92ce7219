use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::{AggregatorSettings, BarAlignment};
use crate::types::{Bar, BarBuffer};

/// Folds a tick stream into fixed-interval OHLCV bars.
///
/// Owns the single open bar. `ingest` opens or updates it; `tick` closes it
/// once the interval has elapsed, appends it to the bounded history and
/// returns it. No bar is closed until `tick` observes the elapsed duration.
pub struct BarAggregator {
    interval: Duration,
    alignment: BarAlignment,
    current: Option<Bar>,
    history: BarBuffer,
}

impl BarAggregator {
    pub fn new(settings: &AggregatorSettings) -> Self {
        Self {
            interval: Duration::seconds(settings.bar_interval_secs as i64),
            alignment: settings.alignment,
            current: None,
            history: BarBuffer::new(settings.history_size),
        }
    }

    pub fn ingest(&mut self, price: Decimal, timestamp: DateTime<Utc>) {
        match self.current.as_mut() {
            None => {
                let start_time = match self.alignment {
                    BarAlignment::FirstTick => timestamp,
                    BarAlignment::WallClock => self.align_down(timestamp),
                };
                self.current = Some(Bar {
                    start_time,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    sample_count: 1,
                });
            }
            Some(bar) => {
                bar.high = bar.high.max(price);
                bar.low = bar.low.min(price);
                bar.close = price;
                bar.sample_count += 1;
            }
        }
    }

    /// Closes the open bar if its interval has elapsed. No-op when no bar
    /// is open or the interval has not yet passed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Bar> {
        let bar = self.current.as_ref()?;
        if now - bar.start_time < self.interval {
            return None;
        }

        let closed = self.current.take()?;
        debug!(
            "Closed bar at {}: O={} H={} L={} C={} ({} ticks)",
            closed.start_time, closed.open, closed.high, closed.low, closed.close,
            closed.sample_count
        );
        self.history.push(closed.clone());
        Some(closed)
    }

    pub fn current_bar(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &BarBuffer {
        &self.history
    }

    fn align_down(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let secs = self.interval.num_seconds();
        let aligned = timestamp.timestamp() / secs * secs;
        Utc.timestamp_opt(aligned, 0).single().unwrap_or(timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn settings() -> AggregatorSettings {
        AggregatorSettings::default()
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_first_tick_opens_bar() {
        let mut agg = BarAggregator::new(&settings());
        agg.ingest(dec!(1.1), ts(0));

        let bar = agg.current_bar().unwrap();
        assert_eq!(bar.open, dec!(1.1));
        assert_eq!(bar.high, dec!(1.1));
        assert_eq!(bar.low, dec!(1.1));
        assert_eq!(bar.close, dec!(1.1));
        assert_eq!(bar.sample_count, 1);
        assert_eq!(bar.start_time, ts(0));
    }

    #[test]
    fn test_update_rule() {
        let mut agg = BarAggregator::new(&settings());
        agg.ingest(dec!(1.10), ts(0));
        agg.ingest(dec!(1.12), ts(1));
        agg.ingest(dec!(1.08), ts(2));
        agg.ingest(dec!(1.09), ts(3));

        let bar = agg.current_bar().unwrap();
        assert_eq!(bar.open, dec!(1.10));
        assert_eq!(bar.high, dec!(1.12));
        assert_eq!(bar.low, dec!(1.08));
        assert_eq!(bar.close, dec!(1.09));
        assert_eq!(bar.sample_count, 4);
        assert!(bar.is_well_formed());
    }

    #[test]
    fn test_no_close_before_interval() {
        let mut agg = BarAggregator::new(&settings());
        agg.ingest(dec!(1.1), ts(0));
        assert!(agg.tick(ts(59)).is_none());
        assert!(agg.current_bar().is_some());
    }

    #[test]
    fn test_close_after_interval_resets() {
        let mut agg = BarAggregator::new(&settings());
        agg.ingest(dec!(1.1), ts(0));
        agg.ingest(dec!(1.2), ts(30));

        let closed = agg.tick(ts(60)).unwrap();
        assert_eq!(closed.close, dec!(1.2));
        assert!(closed.is_well_formed());
        assert!(agg.current_bar().is_none());
        assert_eq!(agg.history().len(), 1);

        // Next ingest opens a fresh bar aligned to its own timestamp
        agg.ingest(dec!(1.3), ts(75));
        assert_eq!(agg.current_bar().unwrap().start_time, ts(75));
    }

    #[test]
    fn test_tick_is_idempotent_with_no_open_bar() {
        let mut agg = BarAggregator::new(&settings());
        assert!(agg.tick(ts(0)).is_none());
        assert!(agg.tick(ts(120)).is_none());
    }

    #[test]
    fn test_wall_clock_alignment() {
        let mut config = settings();
        config.alignment = BarAlignment::WallClock;
        let mut agg = BarAggregator::new(&config);

        let timestamp = Utc.timestamp_opt(1_700_000_037, 0).unwrap();
        agg.ingest(dec!(1.1), timestamp);

        let start = agg.current_bar().unwrap().start_time;
        assert_eq!(start.timestamp() % 60, 0);
        assert!(start <= timestamp);
    }

    #[test]
    fn test_history_bounded() {
        let mut config = settings();
        config.history_size = 2;
        let mut agg = BarAggregator::new(&config);

        for i in 0..4 {
            agg.ingest(Decimal::from(i + 1), ts(i * 60));
            agg.tick(ts(i * 60 + 60));
        }
        assert_eq!(agg.history().len(), 2);
        assert_eq!(agg.history().bars[0].close, dec!(3));
    }
}
