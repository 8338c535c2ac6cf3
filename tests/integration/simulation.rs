//! Worker-driven simulation: sync, score, trade, resolve, correct, and
//! carry the learned trust across a restart.

use chrono::Utc;
use std::sync::Arc;

use augur::engine::accountant::Accountant;
use augur::engine::{EngineConfig, ForecastEngine};
use augur::feed::MarketFeed;
use augur::storage::memory::{delete_state, load_state, save_state};
use augur::storage::{MemoryRepository, Repository};
use augur::types::*;
use augur::worker::{Worker, WorkerSettings};

use crate::mock_feed::MockFeed;

fn build_worker(repo: Arc<MemoryRepository>, feed: Option<MockFeed>) -> (Arc<ForecastEngine>, Worker) {
    let engine = Arc::new(ForecastEngine::new(repo.clone(), EngineConfig::default()));
    let feed = feed.map(|f| Box::new(f) as Box<dyn MarketFeed>);
    let worker = Worker::new(
        engine.clone(),
        Accountant::new(repo, Utc::now()),
        feed,
        WorkerSettings::default(),
    );
    (engine, worker)
}

fn temp_state_path(tag: &str) -> String {
    std::env::temp_dir()
        .join(format!("augur_{tag}_{}.json", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned()
}

#[tokio::test]
async fn test_full_cycle_on_seed_fallback() {
    let repo = Arc::new(MemoryRepository::seeded());
    let feed = MockFeed::failing();
    let (engine, worker) = build_worker(repo.clone(), Some(feed.clone()));

    // -- Sync: the feed is down, the seed set is re-upserted in place
    let report = worker.sync_task().await.unwrap();
    assert_eq!(report.source, MarketSource::SeedFallback);
    assert_eq!(report.synced, 3);
    assert_eq!(feed.fetches(), 1);
    assert_eq!(repo.list_markets(None, 10).await.unwrap().len(), 3);

    // -- Predict and open one position per market
    assert_eq!(worker.prediction_task().await.unwrap(), 3);

    let markets = repo.list_markets(Some(MarketStatus::Open), 10).await.unwrap();
    let mut run_costs = 0.0;
    for market in &markets {
        let run = repo.get_latest_run(&market.id).await.unwrap().unwrap();
        let (side, size) = match run.recommendation.side {
            Some(side) => (side, run.recommendation.size_usd),
            None => (run.predicted_side(), 25.0),
        };
        engine.create_simulated_execution(&run.id, side, size).await.unwrap();
        run_costs += run.est_cost_usd;
    }

    // -- Resolve everything NO and settle
    let mut total_pnl = 0.0;
    for market in &markets {
        let report = engine.record_resolution_and_settle(&market.id, Side::No).await.unwrap();
        assert_eq!(report.closed_executions, 1);
        total_pnl += report.total_pnl_usd;
    }
    assert!(repo.list_markets(Some(MarketStatus::Open), 10).await.unwrap().is_empty());

    // -- Feedback runs once per resolved market
    assert_eq!(worker.feedback_task().await.unwrap(), 3);
    assert_eq!(worker.feedback_task().await.unwrap(), 0);
    for market in &markets {
        assert!(engine.has_correction(&market.id).await.unwrap());
    }

    // Nothing left open, nothing to score.
    assert_eq!(worker.prediction_task().await.unwrap(), 0);

    let metrics = repo
        .get_daily_metrics(Utc::now().date_naive())
        .await
        .unwrap()
        .unwrap();
    assert!(metrics.ttfp_seconds >= 1);
    assert_eq!(metrics.tco_delta_estimate_usd, 1200.0);
    assert!((metrics.unit_economics_net_alpha_usd - (total_pnl - run_costs)).abs() < 1e-3);

    // -- Restart: learned trust survives a save/load round trip
    let path = temp_state_path("cycle");
    let before = repo.snapshot().await;
    assert!(!before.trust.is_empty());
    save_state(&before, Some(&path)).unwrap();

    let restored = load_state(Some(&path)).unwrap().unwrap();
    delete_state(Some(&path)).unwrap();
    assert_eq!(restored.runs.len(), before.runs.len());
    assert_eq!(restored.corrections.len(), 3);

    let reloaded = MemoryRepository::with_state(restored);
    for (source, record) in &before.trust {
        let loaded = reloaded.trust_weight(source).await.unwrap().unwrap();
        assert!((loaded.weight - record.weight).abs() < 1e-12);
        assert_eq!(loaded.version, record.version);
    }
}

#[tokio::test]
async fn test_feed_markets_are_scored_from_market_tape() {
    let repo = Arc::new(MemoryRepository::seeded());
    let feed = MockFeed::serving(vec![
        MockFeed::snapshot("EXT-CPI-HOT", "CPI above 3% in May?", 72.0, 9_000_000.0),
        MockFeed::snapshot("EXT-GDP-NEG", "Negative GDP print in Q2?", 18.0, 1_000.0),
    ]);
    let (_, worker) = build_worker(repo.clone(), Some(feed.clone()));

    let report = worker.sync_task().await.unwrap();
    assert_eq!(report.source, MarketSource::Feed);
    assert_eq!(report.synced, 2);
    assert_eq!(repo.list_markets(None, 10).await.unwrap().len(), 5);

    // Tick cap is 4; the CPI market has the most volume so it goes first.
    assert_eq!(worker.prediction_task().await.unwrap(), 4);

    let markets = repo.list_markets(None, 10).await.unwrap();
    let cpi = markets.iter().find(|m| m.external_id == "EXT-CPI-HOT").unwrap();
    assert_eq!(markets[0].id, cpi.id);

    let run = repo.get_latest_run(&cpi.id).await.unwrap().unwrap();
    assert_eq!(run.snapshot.signals.len(), 3);
    assert_eq!(run.step_log[1].step, "Knowledge Engine");
    assert_eq!(run.step_log[1].status, StepStatus::Fallback);
    assert_eq!(run.step_log.last().unwrap().step, "Auditability");
    assert_eq!(repo.list_signals(&cpi.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_resync_keeps_identity_and_resolution() {
    let repo = Arc::new(MemoryRepository::seeded());
    let feed = MockFeed::serving(vec![MockFeed::snapshot(
        "KALSHI-FEDCUT-JUNE",
        "Fed rate cut by June 2026?",
        70.0,
        700_000.0,
    )]);
    let (engine, worker) = build_worker(repo.clone(), Some(feed));

    worker.sync_task().await.unwrap();
    let market = repo.get_market("mkt-fed-cut-june").await.unwrap().unwrap();
    assert_eq!(market.yes_price, 70.0);
    assert_eq!(market.source, MarketSource::Feed);

    engine
        .record_resolution_and_settle("mkt-fed-cut-june", Side::Yes)
        .await
        .unwrap();
    worker.sync_task().await.unwrap();

    let market = repo.get_market("mkt-fed-cut-june").await.unwrap().unwrap();
    assert_eq!(market.status, MarketStatus::Resolved);
    assert_eq!(repo.list_markets(None, 10).await.unwrap().len(), 3);
}
