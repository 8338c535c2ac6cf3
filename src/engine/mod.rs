//! Core engine: score a market, settle it, learn from the outcome.
//!
//! `ForecastEngine` holds no mutable state of its own. Everything that
//! changes between calls (signals, trust, runs, positions) lives behind
//! the `Repository`, so one engine can be shared freely across tasks.

pub mod accountant;
pub mod feedback;
pub mod pipeline;
pub mod settlement;

use std::sync::Arc;
use std::time::Duration;

use crate::llm::ExternalEstimator;
use crate::storage::Repository;

pub const DEFAULT_BANKROLL_USD: f64 = 10_000.0;
pub const DEFAULT_ESTIMATOR_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Notional bankroll used to size recommendations.
    pub bankroll_usd: f64,
    /// Upper bound on a single external estimate call.
    pub estimator_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bankroll_usd: DEFAULT_BANKROLL_USD,
            estimator_timeout: DEFAULT_ESTIMATOR_TIMEOUT,
        }
    }
}

pub struct ForecastEngine {
    repo: Arc<dyn Repository>,
    estimator: Option<Arc<dyn ExternalEstimator>>,
    config: EngineConfig,
}

impl ForecastEngine {
    pub fn new(repo: Arc<dyn Repository>, config: EngineConfig) -> Self {
        Self {
            repo,
            estimator: None,
            config,
        }
    }

    /// Attach an external estimator. Without one every run is deterministic-only.
    pub fn with_estimator(mut self, estimator: Arc<dyn ExternalEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
