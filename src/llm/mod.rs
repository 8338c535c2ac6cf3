//! External probability estimators.
//!
//! Defines the `ExternalEstimator` trait and an OpenAI-backed
//! implementation. Estimates are strictly advisory: the engine blends
//! them 25/75 with its own deterministic number and treats any failure
//! as "no estimate".

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::types::{Market, Signal};

/// Maximum number of signals forwarded to an estimator.
pub const MAX_ESTIMATOR_SIGNALS: usize = 8;

/// What an estimator is told about the market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub title: String,
    pub category: String,
    pub yes_price: f64,
}

impl From<&Market> for MarketSummary {
    fn from(market: &Market) -> Self {
        Self {
            title: market.title.clone(),
            category: market.category.clone(),
            yes_price: market.yes_price,
        }
    }
}

/// Compact signal view sent to an estimator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimatorSignal {
    pub source: String,
    pub polarity: String,
    pub strength: f64,
    pub trust: f64,
    pub excerpt: String,
}

impl From<&Signal> for EstimatorSignal {
    fn from(signal: &Signal) -> Self {
        Self {
            source: signal.source_name.clone(),
            polarity: signal.polarity.to_string(),
            strength: signal.strength,
            trust: signal.trust_weight,
            excerpt: signal.excerpt.clone(),
        }
    }
}

/// First `MAX_ESTIMATOR_SIGNALS` signals in estimator form.
pub fn capped_signals(signals: &[Signal]) -> Vec<EstimatorSignal> {
    signals
        .iter()
        .take(MAX_ESTIMATOR_SIGNALS)
        .map(EstimatorSignal::from)
        .collect()
}

/// Abstraction over external forecasters (LLMs or otherwise).
///
/// `Ok(None)` means the estimator had nothing usable to say. Errors are
/// logged by the engine and also treated as "no estimate".
#[async_trait]
pub trait ExternalEstimator: Send + Sync {
    /// Estimate P(YES) for a market from at most eight signals.
    async fn estimate(
        &self,
        market: &MarketSummary,
        signals: &[EstimatorSignal],
    ) -> Result<Option<f64>>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}
