//! Kalshi public market data.
//!
//! Read-only; no authentication is needed to list markets.
//! Prices arrive in cents, which map directly onto our 0–100 scale.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{MarketFeed, MarketSnapshot};
use crate::types::MarketStatus;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";
const FEED_NAME: &str = "kalshi";

/// API page size ceiling.
const MAX_PAGE_LIMIT: usize = 1000;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    #[serde(default)]
    markets: Vec<KalshiMarket>,
}

#[derive(Debug, Deserialize)]
struct KalshiMarket {
    ticker: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    event_ticker: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    last_price: Option<f64>,
    #[serde(default)]
    yes_bid: Option<f64>,
    #[serde(default)]
    yes_ask: Option<f64>,
    #[serde(default)]
    no_bid: Option<f64>,
    #[serde(default)]
    no_ask: Option<f64>,
    #[serde(default)]
    volume: f64,
    #[serde(default)]
    close_time: Option<DateTime<Utc>>,
}

fn midpoint(bid: Option<f64>, ask: Option<f64>) -> Option<f64> {
    match (bid, ask) {
        (Some(b), Some(a)) if b > 0.0 && a > 0.0 => Some((b + a) / 2.0),
        (Some(p), _) | (_, Some(p)) if p > 0.0 => Some(p),
        _ => None,
    }
}

fn map_status(raw: &str) -> MarketStatus {
    match raw {
        "settled" | "finalized" | "determined" => MarketStatus::Resolved,
        "closed" => MarketStatus::Closed,
        _ => MarketStatus::Open,
    }
}

impl KalshiMarket {
    /// Yes price: last trade, else the quoted midpoint. Markets that have
    /// never been quoted are skipped.
    fn into_snapshot(self) -> Option<MarketSnapshot> {
        let yes_price = self
            .last_price
            .filter(|p| *p > 0.0)
            .or_else(|| midpoint(self.yes_bid, self.yes_ask))?
            .clamp(0.0, 100.0);
        let no_price = midpoint(self.no_bid, self.no_ask)
            .unwrap_or(100.0 - yes_price)
            .clamp(0.0, 100.0);

        let category = self
            .category
            .filter(|c| !c.is_empty())
            .or(self.event_ticker)
            .unwrap_or_else(|| "General".to_string());

        Some(MarketSnapshot {
            title: if self.title.is_empty() { self.ticker.clone() } else { self.title },
            external_id: self.ticker,
            category,
            yes_price,
            no_price,
            volume: self.volume.max(0.0),
            status: map_status(&self.status),
            close_time: self.close_time.unwrap_or_else(Utc::now),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct KalshiFeed {
    http: Client,
    base_url: String,
}

impl KalshiFeed {
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("AUGUR/0.1.0 (forecast-engine)")
            .build()
            .context("Failed to build HTTP client for Kalshi")?;

        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    fn parse_markets(body: &str) -> Result<Vec<MarketSnapshot>> {
        let parsed: MarketsResponse =
            serde_json::from_str(body).context("Failed to parse Kalshi markets response")?;
        Ok(parsed
            .markets
            .into_iter()
            .filter_map(KalshiMarket::into_snapshot)
            .collect())
    }
}

#[async_trait]
impl MarketFeed for KalshiFeed {
    async fn fetch_markets(&self, limit: usize) -> Result<Vec<MarketSnapshot>> {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let url = format!("{}/markets?status=open&limit={limit}", self.base_url);
        debug!(url = %url, "Fetching Kalshi markets");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Kalshi API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Kalshi API error {status}: {body}");
        }

        let body = resp.text().await.context("Failed to read Kalshi response body")?;
        let markets = Self::parse_markets(&body)?;
        debug!(count = markets.len(), "Kalshi markets parsed");
        Ok(markets)
    }

    fn name(&self) -> &str {
        FEED_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "cursor": "",
        "markets": [
            {
                "ticker": "FED-26JUN-CUT",
                "event_ticker": "FED-26JUN",
                "title": "Fed cuts by June?",
                "category": "Economics",
                "status": "active",
                "last_price": 61,
                "yes_bid": 60, "yes_ask": 62, "no_bid": 38, "no_ask": 40,
                "volume": 12000,
                "close_time": "2026-06-30T18:00:00Z"
            },
            {
                "ticker": "BTC-150K",
                "event_ticker": "BTC",
                "title": "",
                "status": "active",
                "last_price": 0,
                "yes_bid": 20, "yes_ask": 24,
                "volume": 800
            },
            {
                "ticker": "NEVER-QUOTED",
                "title": "Nothing here",
                "status": "active"
            }
        ]
    }"#;

    #[test]
    fn test_client_construction() {
        let feed = KalshiFeed::new(None).unwrap();
        assert_eq!(feed.name(), "kalshi");
        assert_eq!(feed.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_parse_markets() {
        let markets = KalshiFeed::parse_markets(SAMPLE).unwrap();
        assert_eq!(markets.len(), 2);

        let fed = &markets[0];
        assert_eq!(fed.external_id, "FED-26JUN-CUT");
        assert_eq!(fed.yes_price, 61.0);
        assert_eq!(fed.no_price, 39.0);
        assert_eq!(fed.category, "Economics");
        assert_eq!(fed.status, MarketStatus::Open);

        let btc = &markets[1];
        assert_eq!(btc.title, "BTC-150K");
        assert_eq!(btc.yes_price, 22.0);
        assert_eq!(btc.no_price, 78.0);
        assert_eq!(btc.category, "BTC");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status("settled"), MarketStatus::Resolved);
        assert_eq!(map_status("closed"), MarketStatus::Closed);
        assert_eq!(map_status("active"), MarketStatus::Open);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(KalshiFeed::parse_markets("<html>").is_err());
    }
}
