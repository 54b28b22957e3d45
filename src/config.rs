use crate::exchanges::bitso::{BITSO_PRODUCTION_URL, BITSO_SANDBOX_URL};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use dotenv::dotenv;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BitsoConfig {
    pub production: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl BitsoConfig {
    /// Explicit `base_url` wins; otherwise the sandbox or production API.
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ if self.production => BITSO_PRODUCTION_URL.to_string(),
            _ => BITSO_SANDBOX_URL.to_string(),
        }
    }
}

/// Where cached prices live.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    /// On-disk sled database at `cache.path`.
    Sled,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    #[serde(default)]
    pub backend: CacheBackend,
    pub path: String,
}

/// What a run does with a pair that could not be resolved.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartialFailurePolicy {
    /// Leave the cell empty and record the reason on the row.
    #[default]
    Mark,
    /// Fail the whole run.
    Fail,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AggregatorConfig {
    pub max_attempts: u32,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub partial_failure: PartialFailurePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: Server,
    pub bitso: BitsoConfig,
    pub cache: CacheConfig,
    pub aggregator: AggregatorConfig,
}

impl Settings {
    /// Loads defaults, then `config.toml` if present, then `CRYPTO__*`
    /// environment variables (after reading `.env`).
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::load(Self::environment())
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::with_name("config").required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    fn environment() -> Environment {
        Environment::with_prefix("CRYPTO")
            .separator("__")
            .try_parsing(true)
    }

    /// Defaults overlaid with TOML text; no file or environment lookup.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("bitso.production", false)?
            .set_default("bitso.timeout_secs", 5)?
            .set_default("cache.ttl_secs", 60)?
            .set_default("cache.backend", "memory")?
            .set_default("cache.path", "./data/cryptos.db")?
            .set_default("aggregator.max_attempts", 3)?
            .set_default("aggregator.partial_failure", "mark")
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}
