//! Demo agents, fallback markets and their starting evidence.
//!
//! Used to populate a fresh repository and as the feed fallback when the
//! upstream market source is unreachable or returns nothing.

use chrono::{DateTime, Duration, Utc};

use crate::types::{AgentProfile, Market, MarketSource, MarketStatus, Polarity, RiskProfile, Signal};

pub fn demo_agents(now: DateTime<Utc>) -> Vec<AgentProfile> {
    vec![
        AgentProfile {
            id: "agent-macro-alpha".into(),
            name: "Alpha-Macro".into(),
            domain: "Macro".into(),
            risk_profile: RiskProfile::Balanced,
            prompt_template: "Focus on macro catalysts, rate expectations, inflation surprises, and signal conflicts.".into(),
            created_at: now,
        },
        AgentProfile {
            id: "agent-event-driven".into(),
            name: "Event-Driven".into(),
            domain: "Politics".into(),
            risk_profile: RiskProfile::Aggressive,
            prompt_template: "Prioritize event probability updates and weigh recent primary evidence highest.".into(),
            created_at: now,
        },
        AgentProfile {
            id: "agent-vol-arb".into(),
            name: "Vol-Arb".into(),
            domain: "Crypto".into(),
            risk_profile: RiskProfile::Conservative,
            prompt_template: "Prefer conservative allocations unless edge and confidence are both strongly positive.".into(),
            created_at: now,
        },
    ]
}

fn seed_market(
    id: &str,
    external_id: &str,
    title: &str,
    category: &str,
    (yes_price, no_price): (f64, f64),
    volume: f64,
    closes_in_days: i64,
    now: DateTime<Utc>,
) -> Market {
    Market {
        id: id.into(),
        external_id: external_id.into(),
        title: title.into(),
        category: category.into(),
        yes_price,
        no_price,
        volume,
        status: MarketStatus::Open,
        close_time: now + Duration::days(closes_in_days),
        source: MarketSource::SeedFallback,
        last_synced_at: now,
    }
}

pub fn seed_markets(now: DateTime<Utc>) -> Vec<Market> {
    vec![
        seed_market(
            "mkt-fed-cut-june",
            "KALSHI-FEDCUT-JUNE",
            "Fed rate cut by June 2026?",
            "Macro",
            (65.0, 35.0),
            600_564.0,
            75,
            now,
        ),
        seed_market(
            "mkt-recession-2026",
            "KALSHI-RECESSION-2026",
            "US recession by end of 2026?",
            "Macro",
            (38.0, 62.0),
            240_112.0,
            300,
            now,
        ),
        seed_market(
            "mkt-btc-150k-june",
            "KALSHI-BTC150K-JUNE",
            "BTC > $150k by June 2026?",
            "Crypto",
            (22.0, 78.0),
            520_000.0,
            110,
            now,
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn seed_signal(
    id: &str,
    market_id: &str,
    source_name: &str,
    signal_type: &str,
    polarity: Polarity,
    strength: f64,
    excerpt: &str,
    url: &str,
    timestamp: DateTime<Utc>,
) -> Signal {
    Signal {
        id: id.into(),
        market_id: market_id.into(),
        source_name: source_name.into(),
        signal_type: signal_type.into(),
        polarity,
        strength,
        trust_weight: 1.0,
        excerpt: excerpt.into(),
        url: url.into(),
        timestamp,
    }
}

pub fn seed_signals(now: DateTime<Utc>) -> Vec<Signal> {
    vec![
        seed_signal(
            "sig-fed-1",
            "mkt-fed-cut-june",
            "Bloomberg",
            "macro_news",
            Polarity::Yes,
            0.74,
            "Soft inflation print increased probability of easing cycle.",
            "https://example.com/bloomberg-fed-cut",
            now - Duration::hours(3),
        ),
        seed_signal(
            "sig-fed-2",
            "mkt-fed-cut-june",
            "Reuters",
            "market_reaction",
            Polarity::Yes,
            0.69,
            "Treasury yields moved lower after inflation miss.",
            "https://example.com/reuters-yields",
            now - Duration::minutes(90),
        ),
        seed_signal(
            "sig-recession-1",
            "mkt-recession-2026",
            "BLS",
            "labor",
            Polarity::No,
            0.62,
            "Labor conditions remain resilient in latest report.",
            "https://example.com/bls-report",
            now - Duration::hours(8),
        ),
        seed_signal(
            "sig-btc-1",
            "mkt-btc-150k-june",
            "OnChain",
            "flow",
            Polarity::Yes,
            0.55,
            "Large holder inflow suggests momentum continuation.",
            "https://example.com/onchain-flow",
            now - Duration::hours(5),
        ),
    ]
}
