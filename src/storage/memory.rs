//! In-process repository with JSON file snapshots.
//!
//! All tables live in one `RepositoryState` behind a `tokio::sync::Mutex`,
//! so each trait call (including the two commit operations) observes and
//! mutates a consistent view. The whole state can be saved to disk and
//! restored on the next start.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{seed, DailyMetrics, Repository, SettlementCommit};
use crate::types::{
    AgentProfile, EngineError, Execution, ExecutionStatus, FeedbackCorrection, Market,
    MarketStatus, PredictionRun, Resolution, Result, Signal, TrustRecord,
};

/// Default state file path.
const DEFAULT_STATE_FILE: &str = "augur_state.json";

const SIGNAL_LIST_LIMIT: usize = 50;

/// Every table the repository holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryState {
    pub markets: Vec<Market>,
    pub agents: Vec<AgentProfile>,
    pub signals: Vec<Signal>,
    pub trust: BTreeMap<String, TrustRecord>,
    pub runs: Vec<PredictionRun>,
    pub executions: Vec<Execution>,
    pub resolutions: Vec<Resolution>,
    pub corrections: Vec<FeedbackCorrection>,
    pub daily_metrics: Vec<DailyMetrics>,
}

impl RepositoryState {
    /// Demo agents, fallback markets and their seed signals.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self {
            markets: seed::seed_markets(now),
            agents: seed::demo_agents(now),
            signals: seed::seed_signals(now),
            ..Default::default()
        }
    }

    fn set_trust(&mut self, source_name: &str, weight: f64, now: DateTime<Utc>) -> TrustRecord {
        let record = self
            .trust
            .entry(source_name.to_string())
            .and_modify(|r| {
                r.weight = weight;
                r.version += 1;
                r.updated_at = now;
            })
            .or_insert_with(|| TrustRecord {
                source_name: source_name.to_string(),
                weight,
                version: 1,
                updated_at: now,
            })
            .clone();

        for signal in self.signals.iter_mut().filter(|s| s.source_name == source_name) {
            signal.trust_weight = weight;
        }
        record
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<RepositoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: RepositoryState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Repository pre-loaded with the seed data set.
    pub fn seeded() -> Self {
        Self::with_state(RepositoryState::seeded(Utc::now()))
    }

    /// Copy of the current state, e.g. for saving.
    pub async fn snapshot(&self) -> RepositoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_market(&self, market_id: &str) -> Result<Option<Market>> {
        let state = self.state.lock().await;
        Ok(state.markets.iter().find(|m| m.id == market_id).cloned())
    }

    async fn list_markets(&self, status: Option<MarketStatus>, limit: usize) -> Result<Vec<Market>> {
        let state = self.state.lock().await;
        let mut markets: Vec<Market> = state
            .markets
            .iter()
            .filter(|m| status.map_or(true, |s| m.status == s))
            .cloned()
            .collect();
        markets.sort_by(|a, b| {
            b.volume
                .partial_cmp(&a.volume)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        markets.truncate(limit);
        Ok(markets)
    }

    async fn upsert_markets(&self, markets: Vec<Market>) -> Result<()> {
        let mut state = self.state.lock().await;
        for incoming in markets {
            match state
                .markets
                .iter_mut()
                .find(|m| m.external_id == incoming.external_id)
            {
                Some(existing) => {
                    let id = std::mem::take(&mut existing.id);
                    // A recorded resolution outlives later feed snapshots.
                    let status = if existing.status == MarketStatus::Resolved {
                        MarketStatus::Resolved
                    } else {
                        incoming.status
                    };
                    *existing = Market { id, status, ..incoming };
                }
                None => state.markets.push(incoming),
            }
        }
        Ok(())
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentProfile>> {
        let state = self.state.lock().await;
        Ok(state.agents.iter().find(|a| a.id == agent_id).cloned())
    }

    async fn list_agents(&self) -> Result<Vec<AgentProfile>> {
        let state = self.state.lock().await;
        let mut agents = state.agents.clone();
        agents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(agents)
    }

    async fn list_signals(&self, market_id: &str) -> Result<Vec<Signal>> {
        let state = self.state.lock().await;
        let mut signals: Vec<Signal> = state
            .signals
            .iter()
            .filter(|s| s.market_id == market_id)
            .cloned()
            .collect();
        signals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        signals.truncate(SIGNAL_LIST_LIMIT);
        Ok(signals)
    }

    async fn insert_signals(&self, signals: Vec<Signal>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.signals.extend(signals);
        Ok(())
    }

    async fn trust_weight(&self, source_name: &str) -> Result<Option<TrustRecord>> {
        let state = self.state.lock().await;
        Ok(state.trust.get(source_name).cloned())
    }

    async fn update_trust_weight_by_source(&self, source_name: &str, weight: f64) -> Result<TrustRecord> {
        let mut state = self.state.lock().await;
        Ok(state.set_trust(source_name, weight, Utc::now()))
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<PredictionRun>> {
        let state = self.state.lock().await;
        Ok(state.runs.iter().find(|r| r.id == run_id).cloned())
    }

    async fn get_latest_run(&self, market_id: &str) -> Result<Option<PredictionRun>> {
        let state = self.state.lock().await;
        Ok(state
            .runs
            .iter()
            .filter(|r| r.market_id == market_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn create_run(&self, run: PredictionRun) -> Result<PredictionRun> {
        let mut state = self.state.lock().await;
        if state.runs.iter().any(|r| r.id == run.id) {
            return Err(EngineError::Conflict(format!("run {} already exists", run.id)));
        }
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn list_runs_by_ids(&self, run_ids: &[String]) -> Result<Vec<PredictionRun>> {
        let state = self.state.lock().await;
        Ok(state
            .runs
            .iter()
            .filter(|r| run_ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn create_execution(&self, execution: Execution) -> Result<Execution> {
        let mut state = self.state.lock().await;
        state.executions.push(execution.clone());
        Ok(execution)
    }

    async fn list_executions(&self, market_id: &str) -> Result<Vec<Execution>> {
        let state = self.state.lock().await;
        let mut executions: Vec<Execution> = state
            .executions
            .iter()
            .filter(|e| e.market_id == market_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(executions)
    }

    async fn list_open_executions(&self, market_id: &str) -> Result<Vec<Execution>> {
        let state = self.state.lock().await;
        Ok(state
            .executions
            .iter()
            .filter(|e| e.market_id == market_id && e.is_open())
            .cloned()
            .collect())
    }

    async fn list_closed_executions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Execution>> {
        let state = self.state.lock().await;
        Ok(state
            .executions
            .iter()
            .filter(|e| {
                e.status == ExecutionStatus::Closed && e.created_at >= start && e.created_at < end
            })
            .cloned()
            .collect())
    }

    async fn get_resolution(&self, market_id: &str) -> Result<Option<Resolution>> {
        let state = self.state.lock().await;
        Ok(state
            .resolutions
            .iter()
            .find(|r| r.market_id == market_id)
            .cloned())
    }

    async fn get_latest_correction(&self, market_id: &str) -> Result<Option<FeedbackCorrection>> {
        let state = self.state.lock().await;
        Ok(state
            .corrections
            .iter()
            .filter(|c| c.market_id == market_id)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn commit_settlement(&self, commit: SettlementCommit) -> Result<()> {
        let mut state = self.state.lock().await;
        let market_id = commit.resolution.market_id.clone();

        // Validate everything before touching any row.
        if !state.markets.iter().any(|m| m.id == market_id) {
            return Err(EngineError::not_found("market", market_id));
        }
        if let Some(bad) = commit
            .closed
            .iter()
            .find(|e| e.market_id != market_id || e.is_open())
        {
            return Err(EngineError::InvalidInput(format!(
                "execution {} is not a closed position on market {market_id}",
                bad.id
            )));
        }

        let open_now: HashSet<&str> = state
            .executions
            .iter()
            .filter(|e| e.market_id == market_id && e.is_open())
            .map(|e| e.id.as_str())
            .collect();
        let closing: HashSet<&str> = commit.closed.iter().map(|e| e.id.as_str()).collect();
        if open_now != closing {
            return Err(EngineError::Conflict(format!(
                "open executions on {market_id} changed during settlement"
            )));
        }

        let now = Utc::now();
        match state
            .resolutions
            .iter_mut()
            .find(|r| r.market_id == market_id)
        {
            Some(existing) => {
                existing.outcome = commit.resolution.outcome;
                existing.resolved_at = commit.resolution.resolved_at;
            }
            None => state.resolutions.push(commit.resolution.clone()),
        }

        if let Some(market) = state.markets.iter_mut().find(|m| m.id == market_id) {
            market.status = MarketStatus::Resolved;
            market.last_synced_at = now;
        }

        for closed in commit.closed {
            if let Some(row) = state.executions.iter_mut().find(|e| e.id == closed.id) {
                row.status = ExecutionStatus::Closed;
                row.pnl_usd = closed.pnl_usd;
            }
        }

        debug!(market_id = %market_id, "Settlement committed");
        Ok(())
    }

    async fn commit_correction(
        &self,
        correction: FeedbackCorrection,
        trust_updates: Vec<(String, f64)>,
    ) -> Result<FeedbackCorrection> {
        let mut state = self.state.lock().await;
        if state.corrections.iter().any(|c| c.id == correction.id) {
            return Err(EngineError::Conflict(format!(
                "correction {} already exists",
                correction.id
            )));
        }

        let now = Utc::now();
        for (source_name, weight) in &trust_updates {
            state.set_trust(source_name, *weight, now);
        }
        state.corrections.push(correction.clone());
        Ok(correction)
    }

    async fn get_daily_metrics(&self, date: NaiveDate) -> Result<Option<DailyMetrics>> {
        let state = self.state.lock().await;
        Ok(state.daily_metrics.iter().find(|m| m.date == date).cloned())
    }

    async fn upsert_daily_metrics(&self, metrics: DailyMetrics) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.daily_metrics.iter_mut().find(|m| m.date == metrics.date) {
            Some(existing) => *existing = metrics,
            None => state.daily_metrics.push(metrics),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File snapshots
// ---------------------------------------------------------------------------

/// Save repository state to a JSON file.
pub fn save_state(state: &RepositoryState, path: Option<&str>) -> anyhow::Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(state).context("Failed to serialise repository state")?;

    std::fs::write(path, &json).context(format!("Failed to write state to {path}"))?;

    debug!(
        path,
        markets = state.markets.len(),
        runs = state.runs.len(),
        "State saved"
    );
    Ok(())
}

/// Load repository state from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> anyhow::Result<Option<RepositoryState>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path).context(format!("Failed to read state from {path}"))?;

    let state: RepositoryState =
        serde_json::from_str(&json).context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        markets = state.markets.len(),
        runs = state.runs.len(),
        corrections = state.corrections.len(),
        "State loaded from disk"
    );

    Ok(Some(state))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> anyhow::Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path).context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
