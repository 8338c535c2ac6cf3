//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::EngineConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub feed: FeedConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Agent profile the worker runs predictions as. Defaults to the first
    /// agent in the repository.
    #[serde(default)]
    pub agent_id: Option<String>,
    pub bankroll_usd: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    pub fetch_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub sync_interval_secs: u64,
    pub prediction_interval_secs: u64,
    pub feedback_interval_secs: u64,
    /// A market's latest run older than this is re-scored.
    pub stale_after_mins: i64,
    /// Open markets considered per prediction pass.
    pub markets_per_tick: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub state_file: String,
    /// Populate an empty repository with demo agents and markets.
    pub seed_on_empty: bool,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.agent.bankroll_usd.is_finite() || self.agent.bankroll_usd <= 0.0 {
            anyhow::bail!("agent.bankroll_usd must be positive");
        }
        if self.llm.timeout_secs == 0 {
            anyhow::bail!("llm.timeout_secs must be at least 1");
        }
        if self.scheduler.markets_per_tick == 0 {
            anyhow::bail!("scheduler.markets_per_tick must be at least 1");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The estimator API key, wrapped so it never ends up in logs.
    pub fn llm_api_key(&self) -> Result<SecretString> {
        Self::resolve_env(&self.llm.api_key_env).map(SecretString::new)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            bankroll_usd: self.agent.bankroll_usd,
            estimator_timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }
}
