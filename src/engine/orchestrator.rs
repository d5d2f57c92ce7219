use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregator::BarAggregator;
use crate::buffer::ReplayBuffer;
use crate::config::EngineConfig;
use crate::features;
use crate::predictor::{build_predictor, Predictor};
use crate::storage::RecordStore;
use crate::types::{
    Bar, Direction, MetricSnapshot, ReplaySample, Signal, SignalOutcome, Tick,
};

use super::controller::EngineController;
use super::metrics;

/// Events emitted for the delivery layer. Subscribe before `start` — the
/// channel exists from construction, so listeners attached first never miss
/// the first event.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    BarClosed(Bar),
    SignalGenerated(Signal),
    SignalVerified(Signal),
    MetricsUpdated(MetricSnapshot),
}

#[derive(Debug, Clone)]
struct PendingSignal {
    created_at: DateTime<Utc>,
    price_at_prediction: Decimal,
    direction: Direction,
}

/// Drives the closed loop: aggregate ticks into bars, generate predictions,
/// verify them after the horizon, label replay samples, retrain, and publish
/// metrics. Owns the pending-signal set; all cross-component calls go
/// through here.
pub struct PredictionOrchestrator {
    config: EngineConfig,
    store: Arc<dyn RecordStore>,
    aggregator: Mutex<BarAggregator>,
    predictor: RwLock<Box<dyn Predictor>>,
    buffer: Mutex<ReplayBuffer>,
    pending: Mutex<HashMap<Uuid, PendingSignal>>,
    controller: Arc<EngineController>,
    events: broadcast::Sender<EngineEvent>,
    training_in_flight: AtomicBool,
    trainings_skipped: AtomicU64,
}

impl PredictionOrchestrator {
    pub fn new(config: EngineConfig, store: Arc<dyn RecordStore>) -> Self {
        let aggregator = BarAggregator::new(&config.aggregator);
        let predictor = build_predictor(
            &config.predictor,
            features::TechnicalFeatures::NUM_FEATURES,
        );
        let buffer = ReplayBuffer::new(config.buffer.capacity);
        let (events, _) = broadcast::channel(256);

        Self {
            config,
            store,
            aggregator: Mutex::new(aggregator),
            predictor: RwLock::new(predictor),
            buffer: Mutex::new(buffer),
            pending: Mutex::new(HashMap::new()),
            controller: Arc::new(EngineController::new()),
            events,
            training_in_flight: AtomicBool::new(false),
            trainings_skipped: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn controller(&self) -> Arc<EngineController> {
        Arc::clone(&self.controller)
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn labeled_count(&self) -> usize {
        self.buffer.lock().await.labeled_count()
    }

    pub fn trainings_skipped(&self) -> u64 {
        self.trainings_skipped.load(Ordering::Relaxed)
    }

    pub async fn model_version(&self) -> String {
        self.predictor.read().await.version()
    }

    /// Feeds one tick into the open bar and the tick history.
    pub async fn ingest_tick(&self, tick: Tick) -> Result<()> {
        self.aggregator
            .lock()
            .await
            .ingest(tick.mid, tick.timestamp);
        self.store.append_tick(tick).await?;
        Ok(())
    }

    /// Closes the open bar when its interval has elapsed.
    pub async fn aggregate_cycle(&self, now: DateTime<Utc>) -> Result<Option<Bar>> {
        let closed = self.aggregator.lock().await.tick(now);
        if let Some(bar) = closed.clone() {
            self.store.append_bar(bar.clone()).await?;
            let _ = self.events.send(EngineEvent::BarClosed(bar));
        }
        Ok(closed)
    }

    /// Produces one prediction from recent bar history. Silently skips the
    /// cycle when history is too short for feature extraction.
    pub async fn generate_cycle(&self, now: DateTime<Utc>) -> Result<Option<Signal>> {
        let mut bars = self
            .store
            .recent_bars(self.config.orchestrator.history_fetch)
            .await?;
        bars.reverse(); // chronological

        let Some(extracted) = features::extract_features(&bars) else {
            debug!("Not enough bar history for prediction, skipping cycle");
            return Ok(None);
        };
        let input = extracted.to_model_input();

        let (prediction, model_version) = {
            let predictor = self.predictor.read().await;
            (predictor.predict(&input), predictor.version())
        };

        let price_at_prediction = bars
            .last()
            .map(|b| b.close)
            .unwrap_or_default();

        let signal = Signal {
            id: Uuid::new_v4(),
            created_at: now,
            direction: prediction.direction,
            probability: prediction.confidence,
            model_version,
            price_at_prediction,
            outcome: None,
        };
        self.store.append_signal(signal.clone()).await?;

        self.buffer.lock().await.add(ReplaySample {
            id: signal.id,
            features: input.to_vec(),
            label: None,
            created_at: now,
        });

        self.pending.lock().await.insert(
            signal.id,
            PendingSignal {
                created_at: now,
                price_at_prediction,
                direction: signal.direction,
            },
        );
        self.controller.increment_signals();

        info!(
            "Generated {} signal at {} with {:.1}% confidence",
            signal.direction,
            price_at_prediction,
            signal.probability * 100.0
        );
        let _ = self.events.send(EngineEvent::SignalGenerated(signal.clone()));
        Ok(Some(signal))
    }

    /// Verifies every pending signal older than the horizon against the
    /// latest realized price. Returns how many were verified.
    pub async fn verify_cycle(&self, now: DateTime<Utc>) -> Result<usize> {
        let horizon = Duration::seconds(self.config.orchestrator.horizon_secs as i64);
        let due: Vec<(Uuid, PendingSignal)> = self
            .pending
            .lock()
            .await
            .iter()
            .filter(|(_, p)| now - p.created_at >= horizon)
            .map(|(id, p)| (*id, p.clone()))
            .collect();
        if due.is_empty() {
            return Ok(0);
        }

        let Some(latest) = self.store.latest_bar().await? else {
            debug!("No realized price available yet, retrying next cycle");
            return Ok(0);
        };
        let realized = latest.close;

        let mut verified = 0;
        for (id, info) in due {
            let actual = if realized >= info.price_at_prediction {
                Direction::Up
            } else {
                Direction::Down
            };
            let outcome = SignalOutcome {
                actual_direction: actual,
                is_correct: actual == info.direction,
                price_after_horizon: realized,
                verified_at: now,
            };
            let is_correct = outcome.is_correct;

            let updated = self.store.update_signal_outcome(id, outcome).await?;
            self.pending.lock().await.remove(&id);
            if !updated {
                // Record evicted from storage before verification: skip permanently
                warn!("Signal {} missing from storage, skipping verification", id);
                continue;
            }

            self.buffer.lock().await.label_by_id(id, actual.as_label());
            verified += 1;

            info!(
                "Verified signal {}: predicted {}, actual {} ({})",
                id,
                info.direction,
                actual,
                if is_correct { "correct" } else { "incorrect" }
            );
            if let Some(signal) = self.store.find_signal(id).await? {
                let _ = self.events.send(EngineEvent::SignalVerified(signal));
            }
        }

        if verified > 0 {
            self.update_metrics(now).await?;
        }
        Ok(verified)
    }

    /// One training attempt. Non-reentrant: a cycle arriving while another is
    /// in flight is dropped and counted, never queued.
    pub async fn train_cycle(&self) -> Result<bool> {
        if self
            .training_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.trainings_skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Training already in progress, dropping cycle");
            return Ok(false);
        }

        let result = self.train_inner().await;
        self.training_in_flight.store(false, Ordering::Release);
        result
    }

    async fn train_inner(&self) -> Result<bool> {
        let batch = {
            let buffer = self.buffer.lock().await;
            if buffer.labeled_count() < self.config.orchestrator.min_labeled_samples {
                return Ok(false);
            }
            buffer.sample_labeled(self.config.orchestrator.train_batch_size)
        };

        let inputs: Vec<Vec<f64>> = batch.iter().map(|s| s.features.clone()).collect();
        let labels: Vec<f64> = batch
            .iter()
            .filter_map(|s| s.label.map(|l| l as f64))
            .collect();

        let report = self.predictor.write().await.train_batch(&inputs, &labels);
        Ok(report.is_some())
    }

    async fn update_metrics(&self, now: DateTime<Utc>) -> Result<()> {
        let window = self.config.orchestrator.metrics_window;
        let signals = self.store.verified_signals(window).await?;
        let version = self.predictor.read().await.version();

        if let Some(snapshot) = metrics::compute_metrics(&signals, &version, window, now) {
            self.store.append_metric(snapshot.clone()).await?;
            let _ = self.events.send(EngineEvent::MetricsUpdated(snapshot));
        }
        Ok(())
    }

    /// Recency-weighted accuracy over the metrics window.
    pub async fn decayed_success_rate(&self, now: DateTime<Utc>) -> Result<f64> {
        let signals = self
            .store
            .verified_signals(self.config.orchestrator.metrics_window)
            .await?;
        Ok(metrics::decayed_success_rate(
            &signals,
            now,
            self.config.orchestrator.decay_factor,
        ))
    }

    /// Starts all four periodic loops. Idempotent: a second call while
    /// running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        if !self.controller.start().await {
            return;
        }

        self.spawn_loop(
            std::time::Duration::from_millis(self.config.aggregator.close_check_interval_ms),
            "aggregate",
            |this, now| async move { this.aggregate_cycle(now).await.map(|_| ()) },
        );
        self.spawn_loop(
            std::time::Duration::from_secs(self.config.orchestrator.generate_interval_secs),
            "generate",
            |this, now| async move { this.generate_cycle(now).await.map(|_| ()) },
        );
        self.spawn_loop(
            std::time::Duration::from_secs(self.config.orchestrator.verify_interval_secs),
            "verify",
            |this, now| async move { this.verify_cycle(now).await.map(|_| ()) },
        );
        self.spawn_loop(
            std::time::Duration::from_secs(self.config.orchestrator.train_interval_secs),
            "train",
            |this, _now| async move { this.train_cycle().await.map(|_| ()) },
        );
    }

    /// Stops all loops together. Open bar, pending signals and buffer are
    /// left intact so a later `start` resumes cleanly.
    pub async fn stop(&self) {
        self.controller.stop().await;
    }

    fn spawn_loop<F, Fut>(self: &Arc<Self>, period: std::time::Duration, name: &'static str, cycle: F)
    where
        F: Fn(Arc<Self>, DateTime<Utc>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval.tick().await; // first tick fires immediately

            while this.controller.is_running() {
                interval.tick().await;
                if !this.controller.is_running() {
                    break;
                }
                if let Err(e) = cycle(Arc::clone(&this), Utc::now()).await {
                    error!("{} cycle failed: {:#}", name, e);
                }
            }
            debug!("{} loop stopped", name);
        });
    }
}
