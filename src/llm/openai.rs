//! OpenAI Chat Completions estimator.
//!
//! Asks the model for strict JSON `{"probability_yes": number}` and
//! parses whatever comes back with the tolerant parser in
//! `strategy::probability`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{EstimatorSignal, ExternalEstimator, MarketSummary};
use crate::strategy::probability::parse_external_probability;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 256;

const MAX_RETRIES: u32 = 2;
const BASE_BACKOFF_MS: u64 = 500;

const SYSTEM_PROMPT: &str = "You are a prediction calibration module. Return strict JSON: \
{\"probability_yes\": number} with value in [0.01,0.99].";
const INSTRUCTION: &str = "Estimate probability market resolves YES, accounting for \
trust-weighted evidence. Return only JSON.";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ForecastPrompt<'a> {
    market: &'a MarketSummary,
    signals: &'a [EstimatorSignal],
    instruction: &'static str,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiEstimator {
    http: Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    total_calls: std::sync::atomic::AtomicU64,
}

impl OpenAiEstimator {
    pub fn new(api_key: SecretString, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_calls: std::sync::atomic::AtomicU64::new(0),
        })
    }

    /// Build the user message: the market, its capped signals, and the ask.
    fn build_prompt(market: &MarketSummary, signals: &[EstimatorSignal]) -> Result<String> {
        serde_json::to_string(&ForecastPrompt {
            market,
            signals,
            instruction: INSTRUCTION,
        })
        .context("Failed to serialise forecast prompt")
    }

    async fn call_api(&self, user_message: String) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message,
                },
            ],
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }

            let resp = self
                .http
                .post(OPENAI_API_URL)
                .bearer_auth(self.api_key.expose_secret())
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response
                            .json()
                            .await
                            .context("Failed to parse OpenAI response")?;
                        self.total_calls
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

                        return Ok(body
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message)
                            .map(|m| m.content)
                            .unwrap_or_default());
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let error_text = response.text().await.unwrap_or_default();
                        warn!(status = %status, attempt, "Retryable OpenAI error");
                        last_error = Some(format!("HTTP {status}: {error_text}"));
                        continue;
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    anyhow::bail!("OpenAI API error {status}: {error_text}");
                }
                Err(e) => {
                    last_error = Some(format!("Request error: {e}"));
                    continue;
                }
            }
        }

        anyhow::bail!(
            "OpenAI API failed after {MAX_RETRIES} retries: {}",
            last_error.unwrap_or_default()
        )
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[async_trait]
impl ExternalEstimator for OpenAiEstimator {
    async fn estimate(
        &self,
        market: &MarketSummary,
        signals: &[EstimatorSignal],
    ) -> Result<Option<f64>> {
        debug!(market = %market.title, model = %self.model, signals = signals.len(), "OpenAI estimate");

        let prompt = Self::build_prompt(market, signals)?;
        let text = self.call_api(prompt).await?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let parsed = parse_external_probability(&text);
        if parsed.is_none() {
            debug!(model = %self.model, "No probability in OpenAI reply");
        }
        Ok(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::new("test-key".to_string())
    }

    #[test]
    fn test_client_construction() {
        let client = OpenAiEstimator::new(key(), None, None).unwrap();
        assert_eq!(client.model_name(), DEFAULT_MODEL);
        assert_eq!(client.total_calls(), 0);
    }

    #[test]
    fn test_client_custom_model() {
        let client = OpenAiEstimator::new(key(), Some("gpt-4o".into()), Some(64)).unwrap();
        assert_eq!(client.model_name(), "gpt-4o");
        assert_eq!(client.max_tokens, 64);
    }

    #[test]
    fn test_prompt_contains_market_and_signals() {
        let market = MarketSummary {
            title: "Fed rate cut by June?".into(),
            category: "Macro".into(),
            yes_price: 65.0,
        };
        let signals = vec![EstimatorSignal {
            source: "Bloomberg".into(),
            polarity: "YES".into(),
            strength: 0.74,
            trust: 1.0,
            excerpt: "Soft inflation print".into(),
        }];

        let prompt = OpenAiEstimator::build_prompt(&market, &signals).unwrap();
        let value: serde_json::Value = serde_json::from_str(&prompt).unwrap();
        assert_eq!(value["market"]["title"], "Fed rate cut by June?");
        assert_eq!(value["signals"][0]["source"], "Bloomberg");
        assert!(value["instruction"].as_str().unwrap().contains("Return only JSON"));
    }
}
