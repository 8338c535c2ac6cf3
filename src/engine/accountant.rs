//! Accountant: daily unit economics.
//!
//! Rolls up, per UTC day, the realised PnL of closed simulated positions
//! against what it cost to produce the runs behind them, plus the time
//! the process took to emit its first prediction.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use crate::storage::{DailyMetrics, Repository};
use crate::strategy::round4;
use crate::types::Result;

/// Fixed total-cost-of-ownership delta reported alongside the economics.
pub const TCO_DELTA_ESTIMATE_USD: f64 = 1200.0;

// ---------------------------------------------------------------------------
// Unit economics
// ---------------------------------------------------------------------------

/// PnL against run costs for one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitEconomics {
    pub pnl_usd: f64,
    pub est_costs_usd: f64,
}

impl UnitEconomics {
    pub fn net_alpha_usd(&self) -> f64 {
        round4(self.pnl_usd - self.est_costs_usd)
    }
}

/// `[00:00, 24:00)` UTC bounds of a day.
fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

// ---------------------------------------------------------------------------
// Accountant
// ---------------------------------------------------------------------------

pub struct Accountant {
    repo: Arc<dyn Repository>,
    boot_time: DateTime<Utc>,
}

impl Accountant {
    pub fn new(repo: Arc<dyn Repository>, boot_time: DateTime<Utc>) -> Self {
        Self { repo, boot_time }
    }

    /// Closed executions created on `date`, and the estimated cost of each
    /// distinct run they were opened against.
    pub async fn unit_economics(&self, date: NaiveDate) -> Result<UnitEconomics> {
        let (start, end) = day_bounds(date);
        let closed = self.repo.list_closed_executions_between(start, end).await?;
        if closed.is_empty() {
            return Ok(UnitEconomics {
                pnl_usd: 0.0,
                est_costs_usd: 0.0,
            });
        }

        let run_ids: Vec<String> = closed
            .iter()
            .map(|e| e.prediction_run_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let runs = self.repo.list_runs_by_ids(&run_ids).await?;

        Ok(UnitEconomics {
            pnl_usd: closed.iter().map(|e| e.pnl_usd).sum(),
            est_costs_usd: runs.iter().map(|r| r.est_cost_usd).sum(),
        })
    }

    fn ttfp_seconds(&self, now: DateTime<Utc>) -> u64 {
        (now - self.boot_time).num_seconds().max(1) as u64
    }

    /// Called after a prediction pass. The first call of a day fixes that
    /// day's time-to-first-prediction.
    pub async fn record_prediction_metrics(&self, now: DateTime<Utc>) -> Result<DailyMetrics> {
        let date = now.date_naive();
        let existing = self.repo.get_daily_metrics(date).await?;
        let economics = self.unit_economics(date).await?;

        let metrics = DailyMetrics {
            date,
            ttfp_seconds: existing
                .map(|m| m.ttfp_seconds)
                .unwrap_or_else(|| self.ttfp_seconds(now)),
            unit_economics_net_alpha_usd: economics.net_alpha_usd(),
            tco_delta_estimate_usd: TCO_DELTA_ESTIMATE_USD,
        };
        self.repo.upsert_daily_metrics(metrics.clone()).await?;

        info!(
            date = %date,
            ttfp_s = metrics.ttfp_seconds,
            net_alpha = format!("${:.4}", metrics.unit_economics_net_alpha_usd),
            "Daily metrics recorded"
        );
        Ok(metrics)
    }

    /// Called after settlement/feedback passes. Keeps whatever TTFP and TCO
    /// figures the day already has.
    pub async fn refresh_unit_economics(&self, now: DateTime<Utc>) -> Result<DailyMetrics> {
        let date = now.date_naive();
        let existing = self.repo.get_daily_metrics(date).await?;
        let economics = self.unit_economics(date).await?;

        let metrics = DailyMetrics {
            date,
            ttfp_seconds: existing
                .as_ref()
                .map(|m| m.ttfp_seconds)
                .unwrap_or_else(|| self.ttfp_seconds(now)),
            unit_economics_net_alpha_usd: economics.net_alpha_usd(),
            tco_delta_estimate_usd: existing
                .map(|m| m.tco_delta_estimate_usd)
                .unwrap_or(TCO_DELTA_ESTIMATE_USD),
        };
        self.repo.upsert_daily_metrics(metrics.clone()).await?;
        Ok(metrics)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
