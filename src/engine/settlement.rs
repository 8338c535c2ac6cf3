//! Simulated positions and market settlement.

use chrono::Utc;
use tracing::{info, warn};

use super::ForecastEngine;
use crate::storage::SettlementCommit;
use crate::strategy::{clamp_probability, round2, round4};
use crate::types::{
    new_id, EngineError, Execution, ExecutionMode, ExecutionStatus, MarketStatus, Resolution, Result,
    SettlementReport, Side,
};

/// Largest simulated position accepted, in USD.
pub const MAX_EXECUTION_SIZE_USD: f64 = 1_000_000.0;

/// Realised PnL of a binary position at resolution.
///
/// A losing side forfeits its stake; a winning side is paid one dollar per
/// share bought at `entry_price`.
pub fn settlement_pnl(side: Side, outcome: Side, size_usd: f64, entry_price: f64) -> f64 {
    if side != outcome {
        return round4(-size_usd);
    }
    let shares = size_usd / clamp_probability(entry_price);
    round4(shares - size_usd)
}

/// Close an OPEN execution against an outcome. Already closed positions are
/// returned untouched.
pub fn settle(execution: &Execution, outcome: Side) -> Execution {
    if !execution.is_open() {
        return execution.clone();
    }
    Execution {
        status: ExecutionStatus::Closed,
        pnl_usd: settlement_pnl(execution.side, outcome, execution.size_usd, execution.entry_price),
        ..execution.clone()
    }
}

impl ForecastEngine {
    /// Open a simulated position against an existing run. Resolved markets
    /// take no new positions.
    pub async fn create_simulated_execution(
        &self,
        prediction_run_id: &str,
        side: Side,
        size_usd: f64,
    ) -> Result<Execution> {
        if !size_usd.is_finite() || size_usd <= 0.0 || size_usd > MAX_EXECUTION_SIZE_USD {
            return Err(EngineError::InvalidInput(format!(
                "size_usd must be in (0, {MAX_EXECUTION_SIZE_USD}], got {size_usd}"
            )));
        }

        let run = self
            .repo
            .get_run(prediction_run_id)
            .await?
            .ok_or_else(|| EngineError::not_found("prediction run", prediction_run_id))?;
        let market = self
            .repo
            .get_market(&run.market_id)
            .await?
            .ok_or_else(|| EngineError::not_found("market", run.market_id.as_str()))?;
        if market.status == MarketStatus::Resolved {
            return Err(EngineError::InvalidInput(format!(
                "market {} is already resolved",
                market.id
            )));
        }

        let entry_price = clamp_probability(market.price_for(side));
        let execution = Execution {
            id: new_id("exec"),
            prediction_run_id: run.id,
            market_id: market.id,
            side,
            size_usd: round2(size_usd),
            entry_price,
            mode: ExecutionMode::Sim,
            status: ExecutionStatus::Open,
            pnl_usd: 0.0,
            created_at: Utc::now(),
        };

        let execution = self.repo.create_execution(execution).await?;
        info!(execution = %execution, "Simulated execution opened");
        Ok(execution)
    }

    /// Record the outcome of a market and close every open position on it.
    ///
    /// The resolution, the market status change and every close commit
    /// together. Re-resolving a market updates the outcome but finds no
    /// open positions left to settle.
    pub async fn record_resolution_and_settle(&self, market_id: &str, outcome: Side) -> Result<SettlementReport> {
        let market = self
            .repo
            .get_market(market_id)
            .await?
            .ok_or_else(|| EngineError::not_found("market", market_id))?;

        let open = self.repo.list_open_executions(&market.id).await?;
        let closed: Vec<Execution> = open.iter().map(|e| settle(e, outcome)).collect();
        let total_pnl_usd = round4(closed.iter().map(|e| e.pnl_usd).sum());

        let commit = SettlementCommit {
            resolution: Resolution {
                id: new_id("res"),
                market_id: market.id.clone(),
                outcome,
                resolved_at: Utc::now(),
            },
            closed,
        };
        let closed_executions = commit.closed.len();

        if let Err(e) = self.repo.commit_settlement(commit).await {
            warn!(market_id = %market.id, error = %e, "Settlement rejected");
            return Err(e);
        }

        info!(
            market_id = %market.id,
            outcome = %outcome,
            closed = closed_executions,
            pnl = format!("${total_pnl_usd:.4}"),
            "Market settled"
        );

        Ok(SettlementReport {
            market_id: market.id,
            outcome,
            closed_executions,
            total_pnl_usd,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
