//! Market data feeds.
//!
//! Defines the `MarketFeed` trait, a Kalshi implementation, and the sync
//! routine that upserts whatever the feed returns, falling back to the
//! built-in seed markets when the feed fails or comes back empty.

pub mod kalshi;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::storage::{seed, Repository};
use crate::types::{new_id, Market, MarketSource, MarketStatus};

/// One market as reported by an upstream feed. Prices are percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub external_id: String,
    pub title: String,
    pub category: String,
    pub yes_price: f64,
    pub no_price: f64,
    pub volume: f64,
    pub status: MarketStatus,
    pub close_time: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Fresh market row. The repository keeps the existing id on upsert.
    pub fn into_market(self, now: DateTime<Utc>) -> Market {
        Market {
            id: new_id("mkt"),
            external_id: self.external_id,
            title: self.title,
            category: self.category,
            yes_price: self.yes_price,
            no_price: self.no_price,
            volume: self.volume,
            status: self.status,
            close_time: self.close_time,
            source: MarketSource::Feed,
            last_synced_at: now,
        }
    }
}

#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn fetch_markets(&self, limit: usize) -> Result<Vec<MarketSnapshot>>;

    /// Feed name for logging.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncReport {
    pub synced: usize,
    pub source: MarketSource,
}

/// Pull markets from `feed` into the repository.
///
/// With no feed, a failing feed, or an empty payload the seed markets are
/// upserted instead. Only repository failures are returned as errors.
pub async fn sync_markets(
    repo: &dyn Repository,
    feed: Option<&dyn MarketFeed>,
    limit: usize,
) -> crate::types::Result<SyncReport> {
    let now = Utc::now();

    if let Some(feed) = feed {
        match feed.fetch_markets(limit).await {
            Ok(snapshots) if !snapshots.is_empty() => {
                let synced = snapshots.len();
                let markets = snapshots.into_iter().map(|s| s.into_market(now)).collect();
                repo.upsert_markets(markets).await?;
                info!(feed = feed.name(), synced, "Markets synced from feed");
                return Ok(SyncReport {
                    synced,
                    source: MarketSource::Feed,
                });
            }
            Ok(_) => warn!(feed = feed.name(), "Feed returned no markets, using seed set"),
            Err(e) => warn!(feed = feed.name(), error = %e, "Feed fetch failed, using seed set"),
        }
    }

    let markets = seed::seed_markets(now);
    let synced = markets.len();
    repo.upsert_markets(markets).await?;
    info!(synced, "Seed fallback markets synced");

    Ok(SyncReport {
        synced,
        source: MarketSource::SeedFallback,
    })
}
