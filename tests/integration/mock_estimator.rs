//! Scripted external estimator for integration testing.
//!
//! Replies are queued up front and consumed one per call; once the queue
//! is empty every call reports "no estimate". Calls are recorded so tests
//! can check what the engine forwarded.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use augur::llm::{EstimatorSignal, ExternalEstimator, MarketSummary};

#[derive(Debug, Clone)]
pub enum Reply {
    Estimate(f64),
    Nothing,
    Fail(&'static str),
    /// Sleep for the given time before answering 0.5.
    Stall(Duration),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub market_title: String,
    pub signal_count: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedEstimator {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedEstimator {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExternalEstimator for ScriptedEstimator {
    async fn estimate(&self, market: &MarketSummary, signals: &[EstimatorSignal]) -> Result<Option<f64>> {
        self.calls.lock().unwrap().push(RecordedCall {
            market_title: market.title.clone(),
            signal_count: signals.len(),
        });

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Estimate(p)) => Ok(Some(p)),
            Some(Reply::Nothing) | None => Ok(None),
            Some(Reply::Fail(msg)) => Err(anyhow!(msg)),
            Some(Reply::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(Some(0.5))
            }
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
