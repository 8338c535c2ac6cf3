//! Feedback corrector: learn source trust from resolved markets.
//!
//! Reads the latest run's snapshot (never live signals), classifies the
//! miss, nudges each directional source's trust toward what the outcome
//! rewarded, and commits the correction together with every trust write.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::info;

use super::ForecastEngine;
use crate::strategy::{clamp_trust, round4};
use crate::types::{
    new_id, EngineError, ErrorType, FeedbackCorrection, PredictionRun, Resolution, Result, Side,
    TrustAdjustment,
};

pub const HELPFUL_DELTA: f64 = 0.03;
pub const UNHELPFUL_DELTA: f64 = -0.05;

/// Confidence at or above which a miss is blamed on overweighted signals.
pub const OVERCONFIDENT_THRESHOLD: f64 = 0.7;
/// Confidence at or below which a miss is treated as a calibration problem.
pub const UNDERCONFIDENT_THRESHOLD: f64 = 0.45;

/// Move one trust weight after an outcome. `before` is clamped first.
pub fn apply_trust_delta(before: f64, helpful: bool) -> TrustAdjustment {
    let before = clamp_trust(before);
    let delta = if helpful { HELPFUL_DELTA } else { UNHELPFUL_DELTA };
    TrustAdjustment {
        before,
        after: clamp_trust(before + delta),
        delta,
    }
}

/// First matching rule wins.
pub fn classify_error(predicted: Side, outcome: Side, confidence: f64) -> ErrorType {
    if predicted == outcome {
        ErrorType::Calibrated
    } else if confidence >= OVERCONFIDENT_THRESHOLD {
        ErrorType::OverweightedSignals
    } else if confidence <= UNDERCONFIDENT_THRESHOLD {
        ErrorType::CalibrationError
    } else {
        ErrorType::MissedSignals
    }
}

/// A correction plus the trust writes it implies, in first-seen source order.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionPlan {
    pub correction: FeedbackCorrection,
    pub trust_updates: Vec<(String, f64)>,
}

/// Build the correction for `run` given how its market resolved.
///
/// Neutral signals are skipped. A source that appears more than once is
/// moved once per occurrence, each step starting from the previous result;
/// its adjustment records the first `before`, the last `after` and the sum
/// of the nominal deltas.
pub fn build_correction(run: &PredictionRun, resolution: &Resolution, now: DateTime<Utc>) -> CorrectionPlan {
    let predicted = run.predicted_side();
    let outcome = resolution.outcome;
    let error_type = classify_error(predicted, outcome, run.confidence);

    let mut adjustments: BTreeMap<String, TrustAdjustment> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();

    for signal in &run.snapshot.signals {
        let Some(side) = signal.polarity.side() else {
            continue;
        };
        let helpful = side == outcome;

        match adjustments.get_mut(&signal.source_name) {
            Some(existing) => {
                let step = apply_trust_delta(existing.after, helpful);
                existing.after = step.after;
                existing.delta = round4(existing.delta + step.delta);
            }
            None => {
                adjustments.insert(
                    signal.source_name.clone(),
                    apply_trust_delta(signal.trust_weight, helpful),
                );
                order.push(signal.source_name.clone());
            }
        }
    }

    let summary = if predicted == outcome {
        format!(
            "Prediction was correct. Calibrated confidence={:.2} and reinforced reliable signals.",
            run.confidence
        )
    } else {
        format!(
            "Prediction mismatch ({predicted} vs {outcome}). Applied {error_type} correction and reweighted source trust."
        )
    };

    let trust_updates = order
        .into_iter()
        .filter_map(|source| adjustments.get(&source).map(|adj| (source, adj.after)))
        .collect();

    CorrectionPlan {
        correction: FeedbackCorrection {
            id: new_id("corr"),
            market_id: run.market_id.clone(),
            prediction_run_id: run.id.clone(),
            resolved_at: resolution.resolved_at,
            error_type,
            summary,
            trust_adjustments: adjustments,
            created_at: now,
        },
        trust_updates,
    }
}

impl ForecastEngine {
    /// Correct source trust from the latest run on a resolved market.
    ///
    /// Does not itself refuse a second correction for the same resolution;
    /// callers that want one correction per resolution check
    /// `has_correction` first.
    pub async fn generate_feedback_correction(&self, market_id: &str) -> Result<FeedbackCorrection> {
        let resolution = self
            .repo
            .get_resolution(market_id)
            .await?
            .ok_or_else(|| EngineError::ResolutionMissing(market_id.to_string()))?;
        let run = self
            .repo
            .get_latest_run(market_id)
            .await?
            .ok_or_else(|| EngineError::RunMissing(market_id.to_string()))?;

        let plan = build_correction(&run, &resolution, Utc::now());
        let sources = plan.trust_updates.len();
        let correction = self
            .repo
            .commit_correction(plan.correction, plan.trust_updates)
            .await?;

        info!(
            market_id,
            run_id = %run.id,
            error_type = %correction.error_type,
            sources,
            "Feedback correction applied"
        );
        for (source, adj) in &correction.trust_adjustments {
            info!(
                source = %source,
                before = format!("{:.2}", adj.before),
                after = format!("{:.2}", adj.after),
                "Trust reweighted"
            );
        }

        Ok(correction)
    }

    /// Whether the market's current resolution has already been corrected.
    /// An unresolved market never counts as corrected.
    pub async fn has_correction(&self, market_id: &str) -> Result<bool> {
        let Some(resolution) = self.repo.get_resolution(market_id).await? else {
            return Ok(false);
        };
        Ok(self
            .repo
            .get_latest_correction(market_id)
            .await?
            .is_some_and(|c| c.resolved_at == resolution.resolved_at))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
