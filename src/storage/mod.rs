use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::{Bar, MetricSnapshot, Signal, SignalOutcome, Tick};

/// Append-only record store with read-back-by-recency. `recent_*` reads are
/// most-recent-first. `update_signal_outcome` is the single sanctioned
/// mutation: it writes a pending signal's outcome exactly once and reports
/// whether the signal was found still pending.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn append_tick(&self, tick: Tick) -> Result<()>;
    async fn recent_ticks(&self, limit: usize) -> Result<Vec<Tick>>;

    async fn append_bar(&self, bar: Bar) -> Result<()>;
    async fn recent_bars(&self, limit: usize) -> Result<Vec<Bar>>;
    async fn latest_bar(&self) -> Result<Option<Bar>>;

    async fn append_signal(&self, signal: Signal) -> Result<()>;
    async fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>>;
    async fn find_signal(&self, id: Uuid) -> Result<Option<Signal>>;
    async fn update_signal_outcome(&self, id: Uuid, outcome: SignalOutcome) -> Result<bool>;
    /// The most recent `window` signals that have a verified outcome, in
    /// chronological order. Distinct from `recent_signals`, which is the
    /// display-history read over all signals.
    async fn verified_signals(&self, window: usize) -> Result<Vec<Signal>>;

    async fn append_metric(&self, metric: MetricSnapshot) -> Result<()>;
    async fn latest_metric(&self) -> Result<Option<MetricSnapshot>>;
}

const MAX_TICKS: usize = 10_000;
const MAX_BARS: usize = 1_440;
const MAX_SIGNALS: usize = 1_000;
const MAX_METRICS: usize = 100;

#[derive(Default)]
struct MemStoreInner {
    ticks: Vec<Tick>,
    bars: Vec<Bar>,
    signals: Vec<Signal>,
    metrics: Vec<MetricSnapshot>,
}

/// In-memory record store with bounded per-kind retention.
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<MemStoreInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn push_bounded<T>(records: &mut Vec<T>, record: T, max: usize) {
    records.push(record);
    if records.len() > max {
        let excess = records.len() - max;
        records.drain(..excess);
    }
}

fn recent<T: Clone>(records: &[T], limit: usize) -> Vec<T> {
    records.iter().rev().take(limit).cloned().collect()
}

#[async_trait]
impl RecordStore for MemStore {
    async fn append_tick(&self, tick: Tick) -> Result<()> {
        let mut inner = self.inner.write().await;
        push_bounded(&mut inner.ticks, tick, MAX_TICKS);
        Ok(())
    }

    async fn recent_ticks(&self, limit: usize) -> Result<Vec<Tick>> {
        Ok(recent(&self.inner.read().await.ticks, limit))
    }

    async fn append_bar(&self, bar: Bar) -> Result<()> {
        let mut inner = self.inner.write().await;
        push_bounded(&mut inner.bars, bar, MAX_BARS);
        Ok(())
    }

    async fn recent_bars(&self, limit: usize) -> Result<Vec<Bar>> {
        Ok(recent(&self.inner.read().await.bars, limit))
    }

    async fn latest_bar(&self) -> Result<Option<Bar>> {
        Ok(self.inner.read().await.bars.last().cloned())
    }

    async fn append_signal(&self, signal: Signal) -> Result<()> {
        let mut inner = self.inner.write().await;
        push_bounded(&mut inner.signals, signal, MAX_SIGNALS);
        Ok(())
    }

    async fn recent_signals(&self, limit: usize) -> Result<Vec<Signal>> {
        Ok(recent(&self.inner.read().await.signals, limit))
    }

    async fn find_signal(&self, id: Uuid) -> Result<Option<Signal>> {
        Ok(self
            .inner
            .read()
            .await
            .signals
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn update_signal_outcome(&self, id: Uuid, outcome: SignalOutcome) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.signals.iter_mut().find(|s| s.id == id) {
            Some(signal) if signal.outcome.is_none() => {
                signal.outcome = Some(outcome);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn verified_signals(&self, window: usize) -> Result<Vec<Signal>> {
        let inner = self.inner.read().await;
        let verified: Vec<Signal> = inner
            .signals
            .iter()
            .filter(|s| s.is_verified())
            .cloned()
            .collect();
        let start = verified.len().saturating_sub(window);
        Ok(verified[start..].to_vec())
    }

    async fn append_metric(&self, metric: MetricSnapshot) -> Result<()> {
        let mut inner = self.inner.write().await;
        push_bounded(&mut inner.metrics, metric, MAX_METRICS);
        Ok(())
    }

    async fn latest_metric(&self) -> Result<Option<MetricSnapshot>> {
        Ok(self.inner.read().await.metrics.last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn signal() -> Signal {
        Signal {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            direction: Direction::Up,
            probability: 0.7,
            model_version: "v1.0.0-baseline".to_string(),
            price_at_prediction: dec!(1.085),
            outcome: None,
        }
    }

    fn outcome(correct: bool) -> SignalOutcome {
        SignalOutcome {
            actual_direction: Direction::Up,
            is_correct: correct,
            price_after_horizon: dec!(1.086),
            verified_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_recent_is_most_recent_first() {
        let store = MemStore::new();
        for i in 0..3 {
            let mut s = signal();
            s.probability = 0.5 + i as f64 / 10.0;
            store.append_signal(s).await.unwrap();
        }
        let signals = store.recent_signals(2).await.unwrap();
        assert_eq!(signals.len(), 2);
        assert!(signals[0].probability > signals[1].probability);
    }

    #[tokio::test]
    async fn test_outcome_written_exactly_once() {
        let store = MemStore::new();
        let s = signal();
        let id = s.id;
        store.append_signal(s).await.unwrap();

        assert!(store.update_signal_outcome(id, outcome(true)).await.unwrap());
        assert!(!store.update_signal_outcome(id, outcome(false)).await.unwrap());

        let stored = store.find_signal(id).await.unwrap().unwrap();
        assert_eq!(stored.is_correct(), Some(true));
    }

    #[tokio::test]
    async fn test_update_missing_signal_reports_stale() {
        let store = MemStore::new();
        let updated = store
            .update_signal_outcome(Uuid::new_v4(), outcome(true))
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_verified_signals_excludes_pending() {
        let store = MemStore::new();
        let verified = signal();
        let verified_id = verified.id;
        store.append_signal(verified).await.unwrap();
        store.append_signal(signal()).await.unwrap();
        store
            .update_signal_outcome(verified_id, outcome(true))
            .await
            .unwrap();

        let window = store.verified_signals(10).await.unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, verified_id);

        // History read still sees both
        assert_eq!(store.recent_signals(10).await.unwrap().len(), 2);
    }
}
