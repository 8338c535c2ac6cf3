//! Background jobs driven by the binary's scheduler loop.
//!
//! Three independent passes: feed sync, prediction for stale open
//! markets, and feedback for resolved markets whose current resolution
//! has not been corrected yet. An engine failure on one market is logged
//! and skipped; a failed repository read or write made by the pass itself
//! aborts it.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::engine::accountant::Accountant;
use crate::engine::ForecastEngine;
use crate::feed::{sync_markets, MarketFeed, SyncReport};
use crate::types::{EngineError, MarketStatus, Result};

/// Open markets fetched per prediction pass, before the per-tick cap.
const PREDICTION_CANDIDATES: usize = 8;
/// Resolved markets inspected per feedback pass.
const FEEDBACK_CANDIDATES: usize = 20;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub agent_id: Option<String>,
    pub use_external: bool,
    pub fetch_limit: usize,
    pub stale_after: Duration,
    pub markets_per_tick: usize,
}

impl WorkerSettings {
    pub fn from_scheduler(scheduler: &SchedulerConfig, agent_id: Option<String>, use_external: bool, fetch_limit: usize) -> Self {
        Self {
            agent_id,
            use_external,
            fetch_limit,
            stale_after: Duration::minutes(scheduler.stale_after_mins),
            markets_per_tick: scheduler.markets_per_tick,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            agent_id: None,
            use_external: false,
            fetch_limit: 50,
            stale_after: Duration::minutes(30),
            markets_per_tick: 4,
        }
    }
}

pub struct Worker {
    engine: Arc<ForecastEngine>,
    accountant: Accountant,
    feed: Option<Box<dyn MarketFeed>>,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(
        engine: Arc<ForecastEngine>,
        accountant: Accountant,
        feed: Option<Box<dyn MarketFeed>>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            engine,
            accountant,
            feed,
            settings,
        }
    }

    pub async fn sync_task(&self) -> Result<SyncReport> {
        let report = sync_markets(
            self.engine.repository().as_ref(),
            self.feed.as_deref(),
            self.settings.fetch_limit,
        )
        .await?;
        info!(source = ?report.source, synced = report.synced, "Sync pass complete");
        Ok(report)
    }

    /// Score open markets whose latest run is missing or stale.
    /// Returns the number of runs created.
    pub async fn prediction_task(&self) -> Result<usize> {
        let repo = self.engine.repository();

        let agent = match &self.settings.agent_id {
            Some(id) => repo.get_agent(id).await?,
            None => repo.list_agents().await?.into_iter().next(),
        };
        let Some(agent) = agent else {
            warn!("No agent profile available, skipping prediction pass");
            return Ok(0);
        };

        let markets = repo
            .list_markets(Some(MarketStatus::Open), PREDICTION_CANDIDATES)
            .await?;
        let now = Utc::now();
        let mut created = 0;

        for market in markets.iter().take(self.settings.markets_per_tick) {
            let stale = match repo.get_latest_run(&market.id).await? {
                Some(run) => now - run.created_at > self.settings.stale_after,
                None => true,
            };
            if !stale {
                debug!(market_id = %market.id, "Latest run still fresh");
                continue;
            }

            match self
                .engine
                .run_prediction(&market.id, &agent.id, self.settings.use_external)
                .await
            {
                Ok(_) => created += 1,
                Err(e) => warn!(market_id = %market.id, error = %e, "Prediction failed"),
            }
        }

        self.accountant.record_prediction_metrics(Utc::now()).await?;
        info!(agent = %agent.name, created, "Prediction pass complete");
        Ok(created)
    }

    /// Correct trust for resolved markets whose current resolution has no
    /// correction yet.
    /// Returns the number of corrections written.
    pub async fn feedback_task(&self) -> Result<usize> {
        let repo = self.engine.repository();
        let markets = repo
            .list_markets(Some(MarketStatus::Resolved), FEEDBACK_CANDIDATES)
            .await?;
        let mut corrected = 0;

        for market in &markets {
            if repo.get_resolution(&market.id).await?.is_none() {
                continue;
            }
            if self.engine.has_correction(&market.id).await? {
                continue;
            }

            match self.engine.generate_feedback_correction(&market.id).await {
                Ok(_) => corrected += 1,
                Err(EngineError::RunMissing(_)) => {
                    debug!(market_id = %market.id, "Resolved market was never scored")
                }
                Err(e) => warn!(market_id = %market.id, error = %e, "Feedback failed"),
            }
        }

        self.accountant.refresh_unit_economics(Utc::now()).await?;
        info!(corrected, "Feedback pass complete");
        Ok(corrected)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
