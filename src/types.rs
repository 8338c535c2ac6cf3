//! Shared types for the AUGUR engine.
//!
//! These types form the data model used across all modules. Everything
//! that leaves the engine (runs, executions, corrections) is serde
//! serializable so the storage and presentation layers can persist or
//! render it without knowing how it was computed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Contract side, also used for market outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Which way a piece of evidence points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Polarity {
    Yes,
    No,
    Neutral,
}

impl Polarity {
    /// +1 for YES, -1 for NO, 0 for NEUTRAL.
    pub fn direction(&self) -> f64 {
        match self {
            Polarity::Yes => 1.0,
            Polarity::No => -1.0,
            Polarity::Neutral => 0.0,
        }
    }

    /// The side this polarity backs, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Polarity::Yes => Some(Side::Yes),
            Polarity::No => Some(Side::No),
            Polarity::Neutral => None,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Yes => write!(f, "YES"),
            Polarity::No => write!(f, "NO"),
            Polarity::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Market lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Closed,
    Resolved,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "open"),
            MarketStatus::Closed => write!(f, "closed"),
            MarketStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Where a market row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSource {
    Feed,
    SeedFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    Balanced,
    Aggressive,
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// A binary prediction market. Prices are percentages (0–100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub external_id: String,
    pub title: String,
    pub category: String,
    pub yes_price: f64,
    pub no_price: f64,
    pub volume: f64,
    pub status: MarketStatus,
    pub close_time: DateTime<Utc>,
    pub source: MarketSource,
    pub last_synced_at: DateTime<Utc>,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (YES: {:.0}¢ | NO: {:.0}¢ | vol: ${:.0} | {})",
            self.category, self.title, self.yes_price, self.no_price, self.volume, self.status,
        )
    }
}

impl Market {
    /// Quoted price for one side as a probability (unclamped).
    pub fn price_for(&self, side: Side) -> f64 {
        match side {
            Side::Yes => self.yes_price / 100.0,
            Side::No => self.no_price / 100.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Agents & signals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub risk_profile: RiskProfile,
    pub prompt_template: String,
    pub created_at: DateTime<Utc>,
}

/// One piece of trust-weighted evidence about a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub market_id: String,
    /// Evidence provider; trust is tracked per source name.
    pub source_name: String,
    pub signal_type: String,
    pub polarity: Polarity,
    pub strength: f64,
    pub trust_weight: f64,
    pub excerpt: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// `direction × strength × trust`, the signal's signed contribution.
    pub fn signed_weight(&self) -> f64 {
        self.polarity.direction() * self.strength * self.trust_weight
    }
}

/// Current trust for one evidence source. Every write bumps `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustRecord {
    pub source_name: String,
    pub weight: f64,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Prediction runs
// ---------------------------------------------------------------------------

/// Trade recommendation attached to a run. `side == None` means no trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub side: Option<Side>,
    pub size_usd: f64,
}

impl Recommendation {
    pub fn no_trade() -> Self {
        Self {
            side: None,
            size_usd: 0.0,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Some(side) => write!(f, "{side} ${:.2}", self.size_usd),
            None => write!(f, "no trade"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Fallback,
}

/// One named stage of a run's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    pub step: String,
    pub status: StepStatus,
    pub detail: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Market,
    Agent,
    Signal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Directed signal → market edge, labelled with the signal's polarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relation: Polarity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Thresholds in force when a run was scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub confidence_threshold: f64,
    pub edge_threshold: f64,
    pub blend: String,
}

/// Exact inputs a run was scored on. Feedback reads this, never live data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub market: Market,
    pub signals: Vec<Signal>,
    pub policy: PolicySnapshot,
}

/// Immutable record of one scoring pass over a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRun {
    pub id: String,
    pub market_id: String,
    pub agent_id: String,
    pub probability_yes: f64,
    pub deterministic_probability: f64,
    pub external_probability: Option<f64>,
    pub confidence: f64,
    pub edge: f64,
    pub opportunity_signal: f64,
    pub recommendation: Recommendation,
    pub rationale: String,
    pub reasoning_graph: ReasoningGraph,
    pub step_log: Vec<StepLog>,
    pub snapshot: RunSnapshot,
    pub est_cost_usd: f64,
    pub expected_alpha_usd: f64,
    pub created_at: DateTime<Utc>,
}

impl PredictionRun {
    /// Side the run leaned toward (YES at exactly 0.5).
    pub fn predicted_side(&self) -> Side {
        if self.probability_yes >= 0.5 {
            Side::Yes
        } else {
            Side::No
        }
    }
}

impl fmt::Display for PredictionRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} P(YES)={:.1}% conf={:.1}% edge={:.1}pp -> {}",
            self.market_id,
            self.probability_yes * 100.0,
            self.confidence * 100.0,
            self.edge * 100.0,
            self.recommendation,
        )
    }
}

// ---------------------------------------------------------------------------
// Executions & resolutions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionMode {
    Sim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Open,
    Closed,
}

/// A simulated position taken against a prediction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub prediction_run_id: String,
    pub market_id: String,
    pub side: Side,
    pub size_usd: f64,
    /// Probability-as-price, always within [0.01, 0.99].
    pub entry_price: f64,
    pub mode: ExecutionMode,
    pub status: ExecutionStatus,
    pub pnl_usd: f64,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} {} ${:.2} @ {:.2}¢ ({:?}, pnl ${:.4})",
            self.mode,
            self.side,
            self.market_id,
            self.size_usd,
            self.entry_price * 100.0,
            self.status,
            self.pnl_usd,
        )
    }
}

impl Execution {
    pub fn is_open(&self) -> bool {
        self.status == ExecutionStatus::Open
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub id: String,
    pub market_id: String,
    pub outcome: Side,
    pub resolved_at: DateTime<Utc>,
}

/// Outcome of recording a resolution and settling the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub market_id: String,
    pub outcome: Side,
    pub closed_executions: usize,
    pub total_pnl_usd: f64,
}

// ---------------------------------------------------------------------------
// Feedback corrections
// ---------------------------------------------------------------------------

/// Why a resolved prediction went the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Calibrated,
    OverweightedSignals,
    CalibrationError,
    MissedSignals,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::Calibrated => write!(f, "calibrated"),
            ErrorType::OverweightedSignals => write!(f, "overweighted_signals"),
            ErrorType::CalibrationError => write!(f, "calibration_error"),
            ErrorType::MissedSignals => write!(f, "missed_signals"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustAdjustment {
    pub before: f64,
    pub after: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackCorrection {
    pub id: String,
    pub market_id: String,
    pub prediction_run_id: String,
    /// `resolved_at` of the resolution this correction answers. A later
    /// re-resolution makes the market uncorrected again.
    pub resolved_at: DateTime<Utc>,
    pub error_type: ErrorType,
    pub summary: String,
    pub trust_adjustments: BTreeMap<String, TrustAdjustment>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Engine failures. All are recoverable by the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("No resolution recorded for market {0}")]
    ResolutionMissing(String),

    #[error("No prediction run exists for market {0}")]
    RunMissing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflicting update: {0}")]
    Conflict(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Fresh prefixed identifier, e.g. `run-6f1c…`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
