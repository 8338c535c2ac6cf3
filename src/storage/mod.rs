//! Persistence layer.
//!
//! The engine only ever talks to the `Repository` trait. `MemoryRepository`
//! is the bundled implementation: everything lives behind one async mutex
//! and can be saved to / restored from a JSON file between runs.

pub mod memory;
pub mod seed;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    AgentProfile, Execution, FeedbackCorrection, Market, MarketStatus, PredictionRun, Resolution,
    Result, Signal, TrustRecord,
};

pub use memory::MemoryRepository;

/// Everything a market settlement writes, committed as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementCommit {
    pub resolution: Resolution,
    /// Executions that were OPEN when settlement read them, now CLOSED with PnL.
    pub closed: Vec<Execution>,
}

/// Persisted per-day unit economics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    /// Seconds from process boot to the first prediction of the day.
    pub ttfp_seconds: u64,
    pub unit_economics_net_alpha_usd: f64,
    pub tco_delta_estimate_usd: f64,
}

/// Storage contract consumed by the engine.
///
/// Implementations may be asynchronous internally; from the engine's point
/// of view every call completes or fails as a unit. `commit_settlement`
/// and `commit_correction` must be atomic.
#[async_trait]
pub trait Repository: Send + Sync {
    // -- Markets ----------------------------------------------------------

    async fn get_market(&self, market_id: &str) -> Result<Option<Market>>;

    /// Markets ordered by volume descending, optionally filtered by status.
    async fn list_markets(&self, status: Option<MarketStatus>, limit: usize) -> Result<Vec<Market>>;

    /// Insert or update by external id. An existing row keeps its id, and a
    /// resolved market stays resolved.
    async fn upsert_markets(&self, markets: Vec<Market>) -> Result<()>;

    // -- Agents -----------------------------------------------------------

    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentProfile>>;

    async fn list_agents(&self) -> Result<Vec<AgentProfile>>;

    // -- Signals & trust ----------------------------------------------------

    /// Signals for a market, newest first, at most 50.
    async fn list_signals(&self, market_id: &str) -> Result<Vec<Signal>>;

    async fn insert_signals(&self, signals: Vec<Signal>) -> Result<()>;

    /// Current trust record for a source, if it has ever been corrected.
    async fn trust_weight(&self, source_name: &str) -> Result<Option<TrustRecord>>;

    /// Set a source's trust on the keyed store and on all of its signals.
    async fn update_trust_weight_by_source(&self, source_name: &str, weight: f64) -> Result<TrustRecord>;

    // -- Runs ---------------------------------------------------------------

    async fn get_run(&self, run_id: &str) -> Result<Option<PredictionRun>>;

    async fn get_latest_run(&self, market_id: &str) -> Result<Option<PredictionRun>>;

    async fn create_run(&self, run: PredictionRun) -> Result<PredictionRun>;

    async fn list_runs_by_ids(&self, run_ids: &[String]) -> Result<Vec<PredictionRun>>;

    // -- Executions -----------------------------------------------------------

    async fn create_execution(&self, execution: Execution) -> Result<Execution>;

    /// All executions for a market, newest first.
    async fn list_executions(&self, market_id: &str) -> Result<Vec<Execution>>;

    async fn list_open_executions(&self, market_id: &str) -> Result<Vec<Execution>>;

    /// CLOSED executions created in `[start, end)`.
    async fn list_closed_executions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Execution>>;

    // -- Resolutions & corrections ------------------------------------------------

    async fn get_resolution(&self, market_id: &str) -> Result<Option<Resolution>>;

    async fn get_latest_correction(&self, market_id: &str) -> Result<Option<FeedbackCorrection>>;

    /// Upsert the resolution, mark the market resolved and close every
    /// listed execution, or change nothing.
    async fn commit_settlement(&self, commit: SettlementCommit) -> Result<()>;

    /// Store the correction and apply every trust write, or change nothing.
    async fn commit_correction(
        &self,
        correction: FeedbackCorrection,
        trust_updates: Vec<(String, f64)>,
    ) -> Result<FeedbackCorrection>;

    // -- Metrics ------------------------------------------------------------------

    async fn get_daily_metrics(&self, date: NaiveDate) -> Result<Option<DailyMetrics>>;

    async fn upsert_daily_metrics(&self, metrics: DailyMetrics) -> Result<()>;
}
