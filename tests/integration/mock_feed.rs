//! Mock market feed for integration testing.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use augur::feed::{MarketFeed, MarketSnapshot};
use augur::types::MarketStatus;

/// Serves a fixed list of markets, or fails every call when `failing`.
/// Clones share the fetch counter.
#[derive(Clone)]
pub struct MockFeed {
    markets: Vec<MarketSnapshot>,
    failing: bool,
    fetches: Arc<AtomicUsize>,
}

impl MockFeed {
    pub fn serving(markets: Vec<MarketSnapshot>) -> Self {
        Self {
            markets,
            failing: false,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            markets: Vec::new(),
            failing: true,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn snapshot(external_id: &str, title: &str, yes_price: f64, volume: f64) -> MarketSnapshot {
        MarketSnapshot {
            external_id: external_id.to_string(),
            title: title.to_string(),
            category: "Economics".to_string(),
            yes_price,
            no_price: 100.0 - yes_price,
            volume,
            status: MarketStatus::Open,
            close_time: Utc::now() + Duration::days(14),
        }
    }
}

#[async_trait]
impl MarketFeed for MockFeed {
    async fn fetch_markets(&self, limit: usize) -> Result<Vec<MarketSnapshot>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if self.failing {
            anyhow::bail!("mock feed unavailable");
        }
        Ok(self.markets.iter().take(limit).cloned().collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
