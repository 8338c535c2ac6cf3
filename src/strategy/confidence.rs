//! Confidence scoring.
//!
//! Rewards agreeing signals, fresh market data and rich evidence;
//! penalizes markets already priced near the extremes.

use chrono::{DateTime, Utc};

use super::{round4, CONFIDENCE_CEIL, CONFIDENCE_FLOOR};
use crate::types::Signal;

const BASE: f64 = 0.35;
const CONSENSUS_WEIGHT: f64 = 0.35;
const FRESHNESS_WEIGHT: f64 = 0.15;
const COMPLETENESS_WEIGHT: f64 = 0.15;
const VOLATILITY_WEIGHT: f64 = 0.10;

/// Freshness decays linearly to zero over this window.
const FRESHNESS_WINDOW_MS: f64 = 86_400_000.0;
/// Signal count at which evidence is considered complete.
const COMPLETE_EVIDENCE_COUNT: f64 = 8.0;

/// Component breakdown, kept for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceFactors {
    pub consensus: f64,
    pub freshness: f64,
    pub volatility_penalty: f64,
    pub evidence_completeness: f64,
}

impl ConfidenceFactors {
    pub fn compute(
        signals: &[Signal],
        last_synced_at: DateTime<Utc>,
        yes_price_percent: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let signed: Vec<f64> = signals.iter().map(Signal::signed_weight).collect();
        let consensus = (1.0 - population_std_dev(&signed)).clamp(0.0, 1.0);

        let age_ms = (now - last_synced_at).num_milliseconds() as f64;
        let freshness = (1.0 - age_ms / FRESHNESS_WINDOW_MS).clamp(0.0, 1.0);

        let volatility_penalty = ((yes_price_percent - 50.0).abs() / 80.0).clamp(0.0, 1.0);
        let evidence_completeness =
            (signals.len() as f64 / COMPLETE_EVIDENCE_COUNT).clamp(0.0, 1.0);

        Self {
            consensus,
            freshness,
            volatility_penalty,
            evidence_completeness,
        }
    }

    /// Weighted combination, clamped into [0.2, 0.95] and rounded to 4 dp.
    pub fn score(&self) -> f64 {
        let raw = BASE + self.consensus * CONSENSUS_WEIGHT + self.freshness * FRESHNESS_WEIGHT
            + self.evidence_completeness * COMPLETENESS_WEIGHT
            - self.volatility_penalty * VOLATILITY_WEIGHT;
        round4(raw.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEIL))
    }
}

/// Confidence in a run, measured against the wall clock.
pub fn confidence(signals: &[Signal], last_synced_at: DateTime<Utc>, yes_price_percent: f64) -> f64 {
    confidence_at(signals, last_synced_at, yes_price_percent, Utc::now())
}

/// Confidence with an explicit `now`, for replay and tests.
pub fn confidence_at(
    signals: &[Signal],
    last_synced_at: DateTime<Utc>,
    yes_price_percent: f64,
    now: DateTime<Utc>,
) -> f64 {
    ConfidenceFactors::compute(signals, last_synced_at, yes_price_percent, now).score()
}

/// Population standard deviation; 0 for fewer than two values.
fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Polarity;
    use chrono::Duration;

    fn make_signal(polarity: Polarity, strength: f64, trust: f64) -> Signal {
        Signal {
            id: "sig".into(),
            market_id: "mkt-1".into(),
            source_name: "src".into(),
            signal_type: "test".into(),
            polarity,
            strength,
            trust_weight: trust,
            excerpt: String::new(),
            url: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(population_std_dev(&[]), 0.0);
        assert_eq!(population_std_dev(&[0.7]), 0.0);
        assert!((population_std_dev(&[1.0, -1.0]) - 1.0).abs() < 1e-12);
        assert!((population_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_signals_fresh_midprice() {
        // 0.35 + 0.35·1 + 0.15·1 + 0 − 0 = 0.85
        let now = Utc::now();
        assert_eq!(confidence_at(&[], now, 50.0, now), 0.85);
    }

    #[test]
    fn test_stale_extreme_market_floors() {
        let now = Utc::now();
        let signals = vec![
            make_signal(Polarity::Yes, 1.0, 1.5),
            make_signal(Polarity::No, 1.0, 1.5),
        ];
        // consensus 0, freshness 0, completeness 0.25, penalty 0.625
        let c = confidence_at(&signals, now - Duration::days(3), 100.0, now);
        assert!((c - 0.325).abs() < 1e-9, "got {c}");
    }

    #[test]
    fn test_full_marks_capped() {
        let now = Utc::now();
        let signals: Vec<_> = (0..8).map(|_| make_signal(Polarity::Yes, 0.6, 1.0)).collect();
        // 0.35 + 0.35 + 0.15 + 0.15 = 1.0 → capped to 0.95
        assert_eq!(confidence_at(&signals, now, 50.0, now), 0.95);
    }

    #[test]
    fn test_freshness_decays_linearly() {
        let now = Utc::now();
        let factors = ConfidenceFactors::compute(&[], now - Duration::hours(12), 50.0, now);
        assert!((factors.freshness - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_future_sync_time_counts_as_fresh() {
        let now = Utc::now();
        let factors = ConfidenceFactors::compute(&[], now + Duration::hours(1), 50.0, now);
        assert_eq!(factors.freshness, 1.0);
    }

    #[test]
    fn test_bounds_hold_for_wild_inputs() {
        let now = Utc::now();
        let wild = vec![
            make_signal(Polarity::Yes, 50.0, 1.5),
            make_signal(Polarity::No, 80.0, 1.5),
            make_signal(Polarity::Neutral, 3.0, 0.2),
        ];
        for price in [-200.0, 0.0, 37.0, 50.0, 100.0, 400.0] {
            for age in [Duration::zero(), Duration::days(10)] {
                let c = confidence_at(&wild, now - age, price, now);
                assert!((0.2..=0.95).contains(&c), "price {price} gave {c}");
                let c = confidence_at(&[], now - age, price, now);
                assert!((0.2..=0.95).contains(&c), "price {price} gave {c}");
            }
        }
    }

    #[test]
    fn test_wall_clock_variant_within_bounds() {
        let signals = vec![
            make_signal(Polarity::Yes, 0.7, 1.0),
            make_signal(Polarity::No, 0.2, 1.1),
            make_signal(Polarity::Yes, 0.5, 0.9),
        ];
        let c = confidence(&signals, Utc::now(), 58.0);
        assert!((0.2..=0.95).contains(&c));
    }
}
