mod aggregator;
mod buffer;
mod config;
mod engine;
mod features;
mod feed;
mod predictor;
mod storage;
mod types;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::{EngineConfig, PredictorKind};
use engine::{EngineEvent, PredictionOrchestrator};
use feed::{RandomWalkSimulator, TickSource};
use storage::{MemStore, RecordStore};

#[derive(Parser)]
#[command(name = "fx-predictor")]
#[command(version = "0.1.0")]
#[command(about = "Online-learning directional prediction engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    Baseline,
    Mlp,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the prediction engine against the simulated tick feed
    Run {
        /// Predictor implementation (overrides the config file)
        #[arg(long)]
        model: Option<ModelArg>,

        /// Stop after this many seconds (runs until ctrl-c when omitted)
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("fx-predictor v0.1.0");

    let mut config = if std::path::Path::new(&cli.config).exists() {
        EngineConfig::from_file(&cli.config)?
    } else {
        EngineConfig::default()
    };

    match cli.command {
        Commands::Run {
            model,
            duration_secs,
        } => {
            if let Some(model) = model {
                config.predictor.kind = match model {
                    ModelArg::Baseline => PredictorKind::Baseline,
                    ModelArg::Mlp => PredictorKind::Mlp,
                };
            }
            run(config, duration_secs).await
        }
    }
}

async fn run(config: EngineConfig, duration_secs: Option<u64>) -> Result<()> {
    let store: Arc<dyn RecordStore> = Arc::new(MemStore::new());
    let orchestrator = Arc::new(PredictionOrchestrator::new(config.clone(), store));

    // Attach the delivery-layer stand-in before starting any loop
    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                EngineEvent::MetricsUpdated(m) => info!(
                    "Metrics [{}]: accuracy {:.1}% precision {:.2} recall {:.2} ({}/{} correct)",
                    m.model_version,
                    m.accuracy * 100.0,
                    m.precision,
                    m.recall,
                    m.correct_signals,
                    m.total_signals
                ),
                EngineEvent::SignalVerified(s) => {
                    if let Some(outcome) = s.outcome {
                        info!(
                            "Outcome for {}: {} ({})",
                            s.id,
                            outcome.actual_direction,
                            if outcome.is_correct { "correct" } else { "incorrect" }
                        );
                    }
                }
                _ => {}
            }
        }
    });

    orchestrator.start().await;
    info!(
        "Engine running: {}s bars, {}s horizon, model {}",
        config.aggregator.bar_interval_secs,
        config.orchestrator.horizon_secs,
        orchestrator.model_version().await
    );

    // Simulated tick feed; a real deployment would plug an exchange feed in
    let feeder = {
        let orchestrator = Arc::clone(&orchestrator);
        let mut simulator = RandomWalkSimulator::new(config.simulator.clone());
        let period = std::time::Duration::from_millis(config.simulator.tick_interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            while orchestrator.controller().is_running() {
                interval.tick().await;
                let tick = simulator.next_tick(Utc::now());
                if let Err(e) = orchestrator.ingest_tick(tick).await {
                    warn!("Failed to ingest tick: {:#}", e);
                }
            }
        })
    };

    match duration_secs {
        Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested");
        }
    }

    orchestrator.stop().await;
    let _ = feeder.await;

    let state = orchestrator.controller().get_state().await;
    info!(
        "Stopped after {} signals, {} trainings dropped",
        state.signals_generated,
        orchestrator.trainings_skipped()
    );
    Ok(())
}
