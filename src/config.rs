//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The host-bridge token is referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`. Per-challenge solver options
//! are not configured here; they live in the persisted settings store.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::prices::futgg;
use crate::types::SbcError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub prices: PricesConfig,
    pub host: HostConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// How often the queue is drained when idle.
    pub poll_interval_secs: u64,
    #[serde(default = "default_true")]
    pub run_login_routine: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SolverConfig {
    /// Overrides the global `apiUrl` setting at startup when present.
    #[serde(default)]
    pub url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { url: None, request_timeout_secs: 300 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricesConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Upper bound of the random delay before a failed batch is retried.
    pub retry_backoff_max_ms: u64,
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            base_url: futgg::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 15,
            retry_backoff_max_ms: 2_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    pub bridge_url: String,
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_host_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// File path for `json`, connection URL for `sqlite`.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: StorageBackend::Json, path: crate::storage::DEFAULT_STATE_FILE.to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ControlConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { enabled: true, port: 3030 }
    }
}

fn default_true() -> bool {
    true
}

fn default_host_timeout() -> u64 {
    30
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
        if config.agent.poll_interval_secs == 0 {
            return Err(SbcError::Config("agent.poll_interval_secs must be positive".into()).into());
        }
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The host-bridge bearer token, if one is configured and set.
    pub fn host_token(&self) -> Option<SecretString> {
        let name = self.host.token_env.as_deref()?;
        Self::resolve_env(name).ok().map(SecretString::new)
    }
}
