//! Probability estimation.
//!
//! Turns a market's quoted YES price plus trust-weighted evidence into a
//! deterministic YES probability, and optionally blends it with an
//! advisory estimate from an external model.

use serde::Deserialize;
use tracing::debug;

use super::{clamp_probability, round4};
use crate::types::Signal;

/// Per-unit nudge a full-strength, trust-1.0 signal applies to the base price.
pub const SIGNAL_STEP: f64 = 0.08;

/// Weight of the deterministic estimate when blending with an external one.
pub const DETERMINISTIC_BLEND_WEIGHT: f64 = 0.75;
pub const EXTERNAL_BLEND_WEIGHT: f64 = 0.25;

/// Deterministic YES probability from price and evidence.
///
/// `base = clamp(yes_price / 100)`, then each signal shifts it by
/// `direction × strength × trust × 0.08`. Result is clamped into
/// [0.01, 0.99] and rounded to 4 dp.
pub fn deterministic_probability(yes_price_percent: f64, signals: &[Signal]) -> f64 {
    let base = clamp_probability(yes_price_percent / 100.0);
    let adjustment: f64 = signals
        .iter()
        .map(|s| s.signed_weight() * SIGNAL_STEP)
        .sum();

    round4(clamp_probability(base + adjustment))
}

/// Blend the deterministic estimate with an optional external one (75/25).
pub fn blend(deterministic: f64, external: Option<f64>) -> f64 {
    match external {
        None => round4(clamp_probability(deterministic)),
        Some(ext) => round4(clamp_probability(
            deterministic * DETERMINISTIC_BLEND_WEIGHT + ext * EXTERNAL_BLEND_WEIGHT,
        )),
    }
}

/// Human-readable label for the blend mode, stored in the run's policy snapshot.
pub fn blend_label(external: Option<f64>) -> &'static str {
    match external {
        None => "deterministic-only",
        Some(_) => "0.75 deterministic / 0.25 external",
    }
}

// ---------------------------------------------------------------------------
// External estimate parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct StructuredEstimate {
    probability_yes: Option<f64>,
}

/// Parse an external model's reply into a probability.
///
/// Tries the outermost `{…}` span as JSON with a numeric `probability_yes`
/// first, then falls back to the first number shaped like `0.xxxx` or
/// `1` / `1.0`. Anything unparseable is `None`, never an error.
pub fn parse_external_probability(raw: &str) -> Option<f64> {
    let parsed = parse_structured(raw).or_else(|| extract_probability_token(raw))?;
    if !parsed.is_finite() {
        return None;
    }
    Some(clamp_probability(parsed))
}

fn parse_structured(raw: &str) -> Option<f64> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }

    match serde_json::from_str::<StructuredEstimate>(&raw[start..=end]) {
        Ok(payload) => payload.probability_yes,
        Err(e) => {
            debug!(error = %e, "Structured estimate did not parse, scanning text");
            None
        }
    }
}

/// First token matching `0\.\d+` or `1(\.0+)?`, leftmost match wins.
fn extract_probability_token(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();

    for i in 0..bytes.len() {
        match bytes[i] {
            b'0' => {
                if bytes.get(i + 1) == Some(&b'.') {
                    let digits = count_while(&bytes[i + 2..], |b| b.is_ascii_digit());
                    if digits > 0 {
                        return text[i..i + 2 + digits].parse().ok();
                    }
                }
            }
            b'1' => {
                let mut end = i + 1;
                if bytes.get(i + 1) == Some(&b'.') {
                    let zeros = count_while(&bytes[i + 2..], |b| b == b'0');
                    if zeros > 0 {
                        end = i + 2 + zeros;
                    }
                }
                return text[i..end].parse().ok();
            }
            _ => {}
        }
    }
    None
}

fn count_while(bytes: &[u8], pred: impl Fn(u8) -> bool) -> usize {
    bytes.iter().take_while(|b| pred(**b)).count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
