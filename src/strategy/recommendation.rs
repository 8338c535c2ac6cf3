//! Recommendation policy.
//!
//! Gates on confidence and edge, then sizes with a bounded Kelly-style
//! fraction under a hard per-trade ceiling of 5% of bankroll.

use tracing::debug;

use super::{round2, round4};
use crate::types::{Recommendation, Side};

/// Below this confidence the policy never trades.
pub const CONFIDENCE_THRESHOLD: f64 = 0.62;
/// Below this absolute edge the policy never trades.
pub const EDGE_THRESHOLD: f64 = 0.04;
/// Hard per-trade ceiling as a fraction of bankroll.
pub const MAX_BET_PCT: f64 = 0.05;
pub const MIN_KELLY_FRACTION: f64 = 0.005;
pub const MAX_KELLY_FRACTION: f64 = 0.05;

const BASE_COST_USD: f64 = 0.012;
const COST_PER_SIGNAL_USD: f64 = 0.001;
const EXTERNAL_ESTIMATE_COST_USD: f64 = 0.02;

/// Absolute edge of an estimate against the market-implied price, 4 dp.
pub fn edge(probability_yes: f64, yes_price_percent: f64) -> f64 {
    round4((probability_yes - yes_price_percent / 100.0).abs())
}

/// Choose a side and size for the given estimate.
pub fn recommend(probability_yes: f64, confidence: f64, edge: f64, bankroll_usd: f64) -> Recommendation {
    if confidence < CONFIDENCE_THRESHOLD || edge < EDGE_THRESHOLD {
        debug!(confidence, edge, "Below recommendation thresholds");
        return Recommendation::no_trade();
    }

    let side = if probability_yes >= 0.5 { Side::Yes } else { Side::No };
    let cap = bankroll_usd * MAX_BET_PCT;
    let kelly_like = (edge * (confidence - 0.5).max(0.0) * 2.0)
        .clamp(MIN_KELLY_FRACTION, MAX_KELLY_FRACTION);
    let size_usd = round2(cap.min(bankroll_usd * kelly_like));

    debug!(
        side = %side,
        kelly_like = format!("{:.3}%", kelly_like * 100.0),
        size = format!("${size_usd:.2}"),
        "Recommendation sized"
    );

    Recommendation {
        side: Some(side),
        size_usd,
    }
}

/// Edge scaled by confidence; used to rank markets.
pub fn opportunity_signal(edge: f64, confidence: f64) -> f64 {
    round4(edge * confidence)
}

/// Estimated operating cost of producing a run.
pub fn estimated_cost_usd(signal_count: usize, external_used: bool) -> f64 {
    let external = if external_used { EXTERNAL_ESTIMATE_COST_USD } else { 0.0 };
    round4(BASE_COST_USD + signal_count as f64 * COST_PER_SIGNAL_USD + external)
}

/// Expected alpha of acting on a recommendation.
pub fn expected_alpha_usd(size_usd: f64, edge: f64, confidence: f64) -> f64 {
    round4(size_usd * edge * confidence.max(0.5))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
