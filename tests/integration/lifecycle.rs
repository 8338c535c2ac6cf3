//! One market through its whole life: score, trade, resolve, correct,
//! and score again with the corrected trust.

use chrono::{Duration, Utc};
use std::sync::Arc;

use augur::engine::{EngineConfig, ForecastEngine};
use augur::storage::{MemoryRepository, Repository};
use augur::types::*;

use crate::mock_estimator::{Reply, ScriptedEstimator};

const MARKET_ID: &str = "mkt-rate-decision";

fn market_at_61() -> Market {
    let now = Utc::now();
    Market {
        id: MARKET_ID.into(),
        external_id: "EXT-RATE-DECISION".into(),
        title: "Central bank holds rates in March?".into(),
        category: "Economics".into(),
        yes_price: 61.0,
        no_price: 39.0,
        volume: 48_000.0,
        status: MarketStatus::Open,
        close_time: now + Duration::days(20),
        source: MarketSource::Feed,
        last_synced_at: now,
    }
}

fn evidence(id: &str, source: &str, polarity: Polarity, strength: f64, trust: f64) -> Signal {
    Signal {
        id: id.into(),
        market_id: MARKET_ID.into(),
        source_name: source.into(),
        signal_type: "news".into(),
        polarity,
        strength,
        trust_weight: trust,
        excerpt: format!("{source} excerpt"),
        url: format!("https://example.com/{id}"),
        timestamp: Utc::now() - Duration::minutes(10),
    }
}

async fn setup() -> (Arc<MemoryRepository>, ForecastEngine) {
    let repo = Arc::new(MemoryRepository::seeded());
    repo.upsert_markets(vec![market_at_61()]).await.unwrap();
    repo.insert_signals(vec![
        evidence("sig-a", "Desk A", Polarity::Yes, 0.7, 1.0),
        evidence("sig-b", "Desk B", Polarity::No, 0.2, 1.1),
        evidence("sig-c", "Desk C", Polarity::Yes, 0.5, 0.9),
    ])
    .await
    .unwrap();
    let engine = ForecastEngine::new(repo.clone(), EngineConfig::default());
    (repo, engine)
}

#[tokio::test]
async fn test_overconfident_miss_reweights_sources() {
    let (repo, engine) = setup().await;

    let run = engine.run_prediction(MARKET_ID, "agent-macro-alpha", false).await.unwrap();
    assert!((run.probability_yes - 0.6844).abs() < 1e-9);
    assert!(run.confidence >= 0.7, "confidence {}", run.confidence);
    assert_eq!(run.predicted_side(), Side::Yes);
    assert_eq!(run.recommendation.side, Some(Side::Yes));
    assert!(run.recommendation.size_usd > 0.0 && run.recommendation.size_usd <= 500.0);

    engine.record_resolution_and_settle(MARKET_ID, Side::No).await.unwrap();
    let correction = engine.generate_feedback_correction(MARKET_ID).await.unwrap();

    assert_eq!(correction.error_type, ErrorType::OverweightedSignals);
    assert_eq!(correction.prediction_run_id, run.id);

    let a = correction.trust_adjustments["Desk A"];
    let b = correction.trust_adjustments["Desk B"];
    let c = correction.trust_adjustments["Desk C"];
    assert!((a.after - (a.before - 0.05)).abs() < 1e-12);
    assert!((c.after - (c.before - 0.05)).abs() < 1e-12);
    assert!((b.after - (b.before + 0.03)).abs() < 1e-12);
    assert_eq!(a.delta, -0.05);
    assert_eq!(b.delta, 0.03);

    let stored = repo.trust_weight("Desk C").await.unwrap().unwrap();
    assert!((stored.weight - 0.85).abs() < 1e-12);
    assert!(engine.has_correction(MARKET_ID).await.unwrap());
}

#[tokio::test]
async fn test_next_run_reads_corrected_trust() {
    let (_, engine) = setup().await;
    engine.run_prediction(MARKET_ID, "agent-macro-alpha", false).await.unwrap();
    engine.record_resolution_and_settle(MARKET_ID, Side::No).await.unwrap();
    engine.generate_feedback_correction(MARKET_ID).await.unwrap();

    let rerun = engine.run_prediction(MARKET_ID, "agent-macro-alpha", false).await.unwrap();
    // 0.61 + 0.08 × (0.7·0.95 − 0.2·1.13 + 0.5·0.85)
    assert!((rerun.deterministic_probability - 0.6791).abs() < 1e-9);
    assert!(rerun
        .rationale
        .contains("w=0.95"), "{}", rerun.rationale);
}

#[tokio::test]
async fn test_feedback_uses_snapshot_not_live_signals() {
    let (repo, engine) = setup().await;
    engine.run_prediction(MARKET_ID, "agent-macro-alpha", false).await.unwrap();

    // Evidence arriving after the run must not be corrected.
    repo.insert_signals(vec![evidence("sig-late", "Late Desk", Polarity::Yes, 0.9, 1.0)])
        .await
        .unwrap();

    engine.record_resolution_and_settle(MARKET_ID, Side::No).await.unwrap();
    let correction = engine.generate_feedback_correction(MARKET_ID).await.unwrap();
    assert!(!correction.trust_adjustments.contains_key("Late Desk"));
    assert_eq!(correction.trust_adjustments.len(), 3);
}

#[tokio::test]
async fn test_positions_settle_against_outcome() {
    let (repo, engine) = setup().await;
    let run = engine.run_prediction(MARKET_ID, "agent-macro-alpha", false).await.unwrap();

    let yes = engine.create_simulated_execution(&run.id, Side::Yes, 61.0).await.unwrap();
    let no = engine.create_simulated_execution(&run.id, Side::No, 39.0).await.unwrap();
    assert!((yes.entry_price - 0.61).abs() < 1e-12);
    assert!((no.entry_price - 0.39).abs() < 1e-12);

    let report = engine.record_resolution_and_settle(MARKET_ID, Side::No).await.unwrap();
    assert_eq!(report.closed_executions, 2);
    // YES loses 61; NO pays 39 / 0.39 − 39 = 61
    assert!(report.total_pnl_usd.abs() < 1e-9);

    let again = engine.record_resolution_and_settle(MARKET_ID, Side::No).await.unwrap();
    assert_eq!(again.closed_executions, 0);

    let closed = repo.list_executions(MARKET_ID).await.unwrap();
    assert!(closed.iter().all(|e| e.status == ExecutionStatus::Closed));
    assert_eq!(repo.get_resolution(MARKET_ID).await.unwrap().unwrap().outcome, Side::No);
}

#[tokio::test]
async fn test_error_paths() {
    let (_, engine) = setup().await;

    assert_eq!(
        engine.generate_feedback_correction(MARKET_ID).await.unwrap_err(),
        EngineError::ResolutionMissing(MARKET_ID.into())
    );
    engine.record_resolution_and_settle(MARKET_ID, Side::Yes).await.unwrap();
    assert_eq!(
        engine.generate_feedback_correction(MARKET_ID).await.unwrap_err(),
        EngineError::RunMissing(MARKET_ID.into())
    );

    assert!(matches!(
        engine.create_simulated_execution("run-missing", Side::Yes, 10.0).await,
        Err(EngineError::NotFound { .. })
    ));
    assert!(matches!(
        engine.run_prediction("mkt-missing", "agent-macro-alpha", false).await,
        Err(EngineError::NotFound { entity: "market", .. })
    ));
}

#[tokio::test]
async fn test_external_estimate_is_blended_and_capped() {
    let repo = Arc::new(MemoryRepository::seeded());
    repo.upsert_markets(vec![market_at_61()]).await.unwrap();
    repo.insert_signals(
        (0..12)
            .map(|i| evidence(&format!("sig-{i}"), &format!("Desk {i}"), Polarity::Yes, 0.1, 1.0))
            .collect(),
    )
    .await
    .unwrap();

    let estimator = ScriptedEstimator::new([Reply::Estimate(0.2)]);
    let engine = ForecastEngine::new(repo, EngineConfig::default()).with_estimator(Arc::new(estimator.clone()));

    let run = engine.run_prediction(MARKET_ID, "agent-macro-alpha", true).await.unwrap();
    assert_eq!(run.external_probability, Some(0.2));
    let expected = 0.75 * run.deterministic_probability + 0.25 * 0.2;
    assert!((run.probability_yes - expected).abs() < 1e-4);

    let calls = estimator.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].signal_count, 8);
    assert_eq!(calls[0].market_title, "Central bank holds rates in March?");
}

#[tokio::test]
async fn test_estimator_failures_never_fail_a_run() {
    let (repo, _) = setup().await;
    let estimator = ScriptedEstimator::new([
        Reply::Fail("rate limited"),
        Reply::Nothing,
        Reply::Stall(std::time::Duration::from_secs(2)),
    ]);
    let config = EngineConfig {
        estimator_timeout: std::time::Duration::from_millis(50),
        ..EngineConfig::default()
    };
    let engine = ForecastEngine::new(repo, config).with_estimator(Arc::new(estimator.clone()));

    for _ in 0..3 {
        let run = engine.run_prediction(MARKET_ID, "agent-macro-alpha", true).await.unwrap();
        assert_eq!(run.external_probability, None);
        assert_eq!(run.probability_yes, run.deterministic_probability);
        assert_eq!(run.snapshot.policy.blend, "deterministic-only");
    }
    assert_eq!(estimator.calls().len(), 3);
}
