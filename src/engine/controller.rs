use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Running,
    Stopped,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineStatus::Running => write!(f, "Running"),
            EngineStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineState {
    pub status: EngineStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
    pub signals_generated: u64,
}

/// Lifecycle switch shared by all periodic loops. `start` and `stop` are
/// idempotent and toggle every loop together; partially-accumulated state
/// (open bar, pending signals, buffer) survives a stop for clean restart.
pub struct EngineController {
    is_running: AtomicBool,
    started_at: RwLock<Option<DateTime<Utc>>>,
    signals_generated: AtomicU64,
    status_tx: broadcast::Sender<EngineStatus>,
}

impl EngineController {
    pub fn new() -> Self {
        let (status_tx, _) = broadcast::channel(32);
        Self {
            is_running: AtomicBool::new(false),
            started_at: RwLock::new(None),
            signals_generated: AtomicU64::new(0),
            status_tx,
        }
    }

    /// Returns false when already running.
    pub async fn start(&self) -> bool {
        if self.is_running.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.started_at.write().await = Some(Utc::now());
        info!("Engine started");
        let _ = self.status_tx.send(EngineStatus::Running);
        true
    }

    /// Returns false when already stopped.
    pub async fn stop(&self) -> bool {
        if !self.is_running.swap(false, Ordering::AcqRel) {
            return false;
        }
        info!("Engine stopped");
        let _ = self.status_tx.send(EngineStatus::Stopped);
        true
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    pub fn increment_signals(&self) {
        self.signals_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn get_state(&self) -> EngineState {
        let started_at = *self.started_at.read().await;
        let status = if self.is_running() {
            EngineStatus::Running
        } else {
            EngineStatus::Stopped
        };
        let uptime_seconds = match (status, started_at) {
            (EngineStatus::Running, Some(start)) => (Utc::now() - start).num_seconds().max(0) as u64,
            _ => 0,
        };

        EngineState {
            status,
            started_at,
            uptime_seconds,
            signals_generated: self.signals_generated.load(Ordering::Relaxed),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineStatus> {
        self.status_tx.subscribe()
    }
}

impl Default for EngineController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let controller = EngineController::new();
        assert!(!controller.is_running());

        assert!(controller.start().await);
        assert!(!controller.start().await);
        assert!(controller.is_running());

        assert!(controller.stop().await);
        assert!(!controller.stop().await);
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn test_status_broadcast() {
        let controller = EngineController::new();
        let mut rx = controller.subscribe();

        controller.start().await;
        assert_eq!(rx.recv().await.unwrap(), EngineStatus::Running);
        controller.stop().await;
        assert_eq!(rx.recv().await.unwrap(), EngineStatus::Stopped);
    }
}
