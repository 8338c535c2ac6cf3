//! AUGUR: trust-weighted market forecasting worker
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores repository state from disk (or seeds a fresh one), and runs
//! the sync / predict / feedback passes on their own intervals with
//! graceful shutdown.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use augur::config;
use augur::engine::accountant::Accountant;
use augur::engine::ForecastEngine;
use augur::feed::kalshi::KalshiFeed;
use augur::feed::MarketFeed;
use augur::llm::openai::OpenAiEstimator;
use augur::llm::ExternalEstimator;
use augur::storage::memory::{load_state, save_state, RepositoryState};
use augur::storage::MemoryRepository;
use augur::worker::{Worker, WorkerSettings};

const BANNER: &str = r#"
    _   _   _  ___ _   _ ___
   /_\ | | | |/ __| | | | _ \
  / _ \| |_| | (_ | |_| |   /
 /_/ \_\\___/ \___|\___/|_|_\

  Trust-weighted forecasting with a closed feedback loop
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    let boot_time = Utc::now();

    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        bankroll = format!("${:.2}", cfg.agent.bankroll_usd),
        llm_enabled = cfg.llm.enabled,
        feed_enabled = cfg.feed.enabled,
        "AUGUR starting up"
    );

    // -- Restore or create state -----------------------------------------

    let state_file = cfg.storage.state_file.as_str();
    let state = match load_state(Some(state_file))? {
        Some(s) => {
            info!(
                markets = s.markets.len(),
                runs = s.runs.len(),
                executions = s.executions.len(),
                "Resumed from saved state"
            );
            s
        }
        None if cfg.storage.seed_on_empty => {
            info!("Fresh start with seed data");
            RepositoryState::seeded(Utc::now())
        }
        None => RepositoryState::default(),
    };
    let repo = Arc::new(MemoryRepository::with_state(state));

    // -- Initialise components -------------------------------------------

    let estimator = build_estimator(&cfg);
    let use_external = estimator.is_some();
    let mut engine = ForecastEngine::new(repo.clone(), cfg.engine_config());
    if let Some(estimator) = estimator {
        engine = engine.with_estimator(estimator);
    }

    let feed: Option<Box<dyn MarketFeed>> = if cfg.feed.enabled {
        Some(Box::new(KalshiFeed::new(cfg.feed.base_url.clone())?))
    } else {
        None
    };

    let settings = WorkerSettings::from_scheduler(
        &cfg.scheduler,
        cfg.agent.agent_id.clone(),
        use_external,
        cfg.feed.fetch_limit,
    );
    let worker = Worker::new(
        Arc::new(engine),
        Accountant::new(repo.clone(), boot_time),
        feed,
        settings,
    );

    // -- Main loop -------------------------------------------------------

    let mut sync_interval = tokio::time::interval(Duration::from_secs(cfg.scheduler.sync_interval_secs));
    let mut prediction_interval =
        tokio::time::interval(Duration::from_secs(cfg.scheduler.prediction_interval_secs));
    let mut feedback_interval =
        tokio::time::interval(Duration::from_secs(cfg.scheduler.feedback_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        sync_secs = cfg.scheduler.sync_interval_secs,
        prediction_secs = cfg.scheduler.prediction_interval_secs,
        feedback_secs = cfg.scheduler.feedback_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
            _ = sync_interval.tick() => {
                if let Err(e) = worker.sync_task().await {
                    error!(error = %e, "Sync pass failed");
                }
            }
            _ = prediction_interval.tick() => {
                if let Err(e) = worker.prediction_task().await {
                    error!(error = %e, "Prediction pass failed");
                }
                persist(&repo, state_file).await;
            }
            _ = feedback_interval.tick() => {
                if let Err(e) = worker.feedback_task().await {
                    error!(error = %e, "Feedback pass failed");
                }
                persist(&repo, state_file).await;
            }
        }
    }

    save_state(&repo.snapshot().await, Some(state_file))?;
    info!("AUGUR shut down cleanly.");

    Ok(())
}

/// Build the configured external estimator, or `None` if it is disabled
/// or cannot be constructed.
fn build_estimator(cfg: &config::AppConfig) -> Option<Arc<dyn ExternalEstimator>> {
    if !cfg.llm.enabled {
        return None;
    }
    if cfg.llm.provider != "openai" {
        warn!(provider = %cfg.llm.provider, "Unsupported estimator provider, running deterministic-only");
        return None;
    }

    let api_key = match cfg.llm_api_key() {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "No estimator API key, running deterministic-only");
            return None;
        }
    };

    match OpenAiEstimator::new(api_key, Some(cfg.llm.model.clone()), Some(cfg.llm.max_tokens)) {
        Ok(client) => {
            info!(model = %cfg.llm.model, "Using OpenAI estimator");
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!(error = %e, "Failed to build estimator, running deterministic-only");
            None
        }
    }
}

async fn persist(repo: &MemoryRepository, state_file: &str) {
    if let Err(e) = save_state(&repo.snapshot().await, Some(state_file)) {
        error!(error = %e, "Failed to save state");
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("augur=info"));

    let json_logging = std::env::var("AUGUR_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
