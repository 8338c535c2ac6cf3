//! Prediction pipeline: evidence → probability → confidence → recommendation.
//!
//! One call scores one market for one agent and persists an immutable
//! `PredictionRun` carrying the exact inputs it was scored on, so the
//! feedback corrector never has to look at live data again.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::ForecastEngine;
use crate::llm::{capped_signals, MarketSummary};
use crate::strategy::confidence::confidence;
use crate::strategy::probability::{blend, blend_label, deterministic_probability};
use crate::strategy::recommendation::{
    edge, estimated_cost_usd, expected_alpha_usd, opportunity_signal, recommend,
    CONFIDENCE_THRESHOLD, EDGE_THRESHOLD,
};
use crate::strategy::{clamp_probability, round4};
use crate::types::{
    new_id, AgentProfile, EngineError, GraphEdge, GraphNode, Market, NodeKind, PolicySnapshot,
    Polarity, PredictionRun, ReasoningGraph, Recommendation, Result, RunSnapshot, Signal, StepLog,
    StepStatus,
};

const TOP_DRIVERS: usize = 3;

// ---------------------------------------------------------------------------
// Synthetic evidence
// ---------------------------------------------------------------------------

/// Evidence derived from the market itself, used when nothing else exists.
///
/// Three signals: the price tape, the volume regime (neutral) and a weak
/// structural prior. Both directional ones point the way the price leans.
pub fn synthetic_signals(market: &Market, now: DateTime<Utc>) -> Vec<Signal> {
    let momentum = (market.yes_price - 50.0).abs() / 50.0;
    let leaning = if market.yes_price >= 50.0 { Polarity::Yes } else { Polarity::No };
    let volume_strength = (market.volume.max(1.0).log10() / 6.0).clamp(0.25, 0.9);

    let signal = |source_name: &str, signal_type: &str, polarity, strength, excerpt: String, url: &str, ts| Signal {
        id: new_id("sig"),
        market_id: market.id.clone(),
        source_name: source_name.to_string(),
        signal_type: signal_type.to_string(),
        polarity,
        strength,
        trust_weight: 1.0,
        excerpt,
        url: url.to_string(),
        timestamp: ts,
    };

    vec![
        signal(
            "Kalshi Market Tape",
            "implied_probability",
            leaning,
            round4((0.45 + momentum * 0.5).clamp(0.35, 0.9)),
            "Market-implied probability trend from live order book snapshots.".to_string(),
            "https://trading-api.kalshi.com/",
            now,
        ),
        signal(
            "Volume Regime",
            "liquidity_quality",
            Polarity::Neutral,
            round4(volume_strength),
            format!(
                "Observed volume regime for {} market supports confidence scaling.",
                market.category
            ),
            "internal://volume-regime",
            now - Duration::seconds(20),
        ),
        signal(
            "System Prior",
            "historical_prior",
            leaning,
            round4((0.35 + momentum * 0.3).clamp(0.25, 0.7)),
            "Fallback structured prior generated when external evidence is sparse.".to_string(),
            "internal://system-prior",
            now - Duration::seconds(40),
        ),
    ]
}

// ---------------------------------------------------------------------------
// Run artefacts
// ---------------------------------------------------------------------------

/// Accumulates the ordered audit trail of a run.
#[derive(Debug, Default)]
struct StepRecorder {
    steps: Vec<StepLog>,
}

impl StepRecorder {
    fn push(&mut self, step: &str, status: StepStatus, detail: impl Into<String>) {
        self.steps.push(StepLog {
            step: step.to_string(),
            status,
            detail: detail.into(),
            ts: Utc::now(),
        });
    }

    fn completed(&mut self, step: &str, detail: impl Into<String>) {
        self.push(step, StepStatus::Completed, detail);
    }
}

/// One-line human explanation: probability, confidence, edge and the first
/// few drivers with their effective trust.
pub fn build_rationale(probability_yes: f64, confidence: f64, edge: f64, signals: &[Signal]) -> String {
    let drivers = signals
        .iter()
        .take(TOP_DRIVERS)
        .map(|s| format!("{}({}, w={:.2})", s.source_name, s.polarity, s.trust_weight))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Probability YES={:.1}%, confidence={:.1}%. Edge vs implied={:.1}pp. Top drivers: {}.",
        probability_yes * 100.0,
        confidence * 100.0,
        edge * 100.0,
        drivers
    )
}

/// Market and agent nodes, one node per signal, one edge per signal.
pub fn build_reasoning_graph(market: &Market, agent: &AgentProfile, signals: &[Signal]) -> ReasoningGraph {
    let mut nodes = vec![
        GraphNode {
            id: market.id.clone(),
            label: market.title.clone(),
            kind: NodeKind::Market,
            polarity: None,
            weight: None,
        },
        GraphNode {
            id: agent.id.clone(),
            label: agent.name.clone(),
            kind: NodeKind::Agent,
            polarity: None,
            weight: None,
        },
    ];
    nodes.extend(signals.iter().map(|s| GraphNode {
        id: s.id.clone(),
        label: s.source_name.clone(),
        kind: NodeKind::Signal,
        polarity: Some(s.polarity),
        weight: Some(s.trust_weight),
    }));

    let edges = signals
        .iter()
        .map(|s| GraphEdge {
            source: s.id.clone(),
            target: market.id.clone(),
            relation: s.polarity,
        })
        .collect();

    ReasoningGraph { nodes, edges }
}

fn allocation_detail(recommendation: &Recommendation) -> String {
    match recommendation.side {
        Some(side) => format!(
            "Recommended {side} with ${:.2} based on threshold policy.",
            recommendation.size_usd
        ),
        None => "No trade recommendation; confidence/edge below thresholds.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

impl ForecastEngine {
    /// Score a market for an agent and persist the resulting run.
    ///
    /// Fails with `NotFound` for an unknown market or agent. External
    /// estimator problems never fail a run; they only drop the blend.
    pub async fn run_prediction(
        &self,
        market_id: &str,
        agent_id: &str,
        use_external: bool,
    ) -> Result<PredictionRun> {
        let market = self
            .repo
            .get_market(market_id)
            .await?
            .ok_or_else(|| EngineError::not_found("market", market_id))?;
        let agent = self
            .repo
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| EngineError::not_found("agent", agent_id))?;

        let mut steps = StepRecorder::default();
        steps.completed("Plan & Reason", format!("Built structured query for {}.", market.title));

        let mut signals = self.repo.list_signals(&market.id).await?;
        if signals.is_empty() {
            signals = synthetic_signals(&market, Utc::now());
            self.repo.insert_signals(signals.clone()).await?;
            debug!(market_id = %market.id, count = signals.len(), "Synthesised fallback signals");
            steps.push(
                "Knowledge Engine",
                StepStatus::Fallback,
                "Generated fallback synthetic signals from market tape.",
            );
        } else {
            steps.completed(
                "Knowledge Engine",
                format!("Loaded {} recent trust-weighted signals.", signals.len()),
            );
        }

        let signals = self.apply_trust_overrides(signals).await?;
        steps.completed("Tool Selection", "Selected market snapshot + internal signal store.");

        let deterministic = deterministic_probability(market.yes_price, &signals);
        let external = if use_external {
            self.external_estimate(&market, &signals).await
        } else {
            None
        };
        let probability_yes = blend(deterministic, external);

        match (use_external, external) {
            (_, Some(_)) => steps.completed(
                "Prediction Model Selection",
                "Blended deterministic and external probabilities (0.75 / 0.25).",
            ),
            (true, None) => steps.push(
                "Prediction Model Selection",
                StepStatus::Fallback,
                "Deterministic engine only (external estimator unavailable).",
            ),
            (false, None) => steps.completed(
                "Prediction Model Selection",
                "Deterministic engine only (external estimator disabled).",
            ),
        }

        let confidence = confidence(&signals, market.last_synced_at, market.yes_price);
        let edge = edge(probability_yes, market.yes_price);
        let recommendation = recommend(probability_yes, confidence, edge, self.config.bankroll_usd);
        steps.completed("Capital Allocation", allocation_detail(&recommendation));

        let rationale = build_rationale(probability_yes, confidence, edge, &signals);
        let reasoning_graph = build_reasoning_graph(&market, &agent, &signals);
        steps.completed(
            "Auditability",
            "Persisted step logs, evidence snapshot, and reasoning graph.",
        );

        let run = PredictionRun {
            id: new_id("run"),
            market_id: market.id.clone(),
            agent_id: agent.id.clone(),
            probability_yes,
            deterministic_probability: deterministic,
            external_probability: external,
            confidence,
            edge,
            opportunity_signal: opportunity_signal(edge, confidence),
            recommendation,
            rationale,
            reasoning_graph,
            step_log: steps.steps,
            est_cost_usd: estimated_cost_usd(signals.len(), external.is_some()),
            expected_alpha_usd: expected_alpha_usd(recommendation.size_usd, edge, confidence),
            snapshot: RunSnapshot {
                market,
                signals,
                policy: PolicySnapshot {
                    confidence_threshold: CONFIDENCE_THRESHOLD,
                    edge_threshold: EDGE_THRESHOLD,
                    blend: blend_label(external).to_string(),
                },
            },
            created_at: Utc::now(),
        };

        let run = self.repo.create_run(run).await?;

        info!(
            run_id = %run.id,
            market_id = %run.market_id,
            agent = %agent.name,
            p_yes = format!("{:.1}%", run.probability_yes * 100.0),
            confidence = format!("{:.1}%", run.confidence * 100.0),
            edge = format!("{:.1}pp", run.edge * 100.0),
            recommendation = %run.recommendation,
            "Prediction run recorded"
        );

        Ok(run)
    }

    /// Replace each signal's trust with the trust store's weight for its
    /// source, where one exists.
    async fn apply_trust_overrides(&self, mut signals: Vec<Signal>) -> Result<Vec<Signal>> {
        let mut cache: HashMap<String, Option<f64>> = HashMap::new();
        for signal in signals.iter_mut() {
            let weight = match cache.get(&signal.source_name) {
                Some(weight) => *weight,
                None => {
                    let weight = self
                        .repo
                        .trust_weight(&signal.source_name)
                        .await?
                        .map(|r| r.weight);
                    cache.insert(signal.source_name.clone(), weight);
                    weight
                }
            };
            if let Some(weight) = weight {
                signal.trust_weight = weight;
            }
        }
        Ok(signals)
    }

    /// Ask the external estimator, bounded by the configured timeout.
    /// Any failure is logged and reported as "no estimate".
    async fn external_estimate(&self, market: &Market, signals: &[Signal]) -> Option<f64> {
        let estimator = self.estimator.as_ref()?;
        let summary = MarketSummary::from(market);
        let capped = capped_signals(signals);

        let outcome = tokio::time::timeout(
            self.config.estimator_timeout,
            estimator.estimate(&summary, &capped),
        )
        .await;

        match outcome {
            Ok(Ok(Some(p))) if p.is_finite() => {
                debug!(model = estimator.model_name(), p_yes = p, "External estimate received");
                Some(clamp_probability(p))
            }
            Ok(Ok(_)) => {
                debug!(model = estimator.model_name(), "External estimator returned nothing usable");
                None
            }
            Ok(Err(e)) => {
                warn!(model = estimator.model_name(), error = %e, "External estimate failed");
                None
            }
            Err(_) => {
                warn!(
                    model = estimator.model_name(),
                    timeout_ms = self.config.estimator_timeout.as_millis() as u64,
                    "External estimate timed out"
                );
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
