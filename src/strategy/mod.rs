//! Scoring engine: probability estimation, confidence, and sizing.
//!
//! Everything in here is a pure function of its explicit inputs so a
//! run's snapshot can be replayed and produce the same numbers.

pub mod confidence;
pub mod probability;
pub mod recommendation;

use rust_decimal::prelude::*;

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

pub const PROBABILITY_FLOOR: f64 = 0.01;
pub const PROBABILITY_CEIL: f64 = 0.99;

pub const CONFIDENCE_FLOOR: f64 = 0.2;
pub const CONFIDENCE_CEIL: f64 = 0.95;

pub const TRUST_FLOOR: f64 = 0.2;
pub const TRUST_CEIL: f64 = 1.5;

/// Clamp a probability-like value into [0.01, 0.99].
pub fn clamp_probability(value: f64) -> f64 {
    value.clamp(PROBABILITY_FLOOR, PROBABILITY_CEIL)
}

/// Clamp a trust weight into [0.2, 1.5].
pub fn clamp_trust(value: f64) -> f64 {
    value.clamp(TRUST_FLOOR, TRUST_CEIL)
}

/// Round to `dp` decimal places, half away from zero.
///
/// Goes through `Decimal` so that values like 0.65 stay 0.65 instead of
/// picking up binary noise from the intermediate multiply.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    match Decimal::from_f64(value) {
        Some(d) => d
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .unwrap_or(value),
        None => value,
    }
}

/// Round to 4 decimal places (probabilities, confidence, PnL).
pub fn round4(value: f64) -> f64 {
    round_dp(value, 4)
}

/// Round to cents.
pub fn round2(value: f64) -> f64 {
    round_dp(value, 2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
