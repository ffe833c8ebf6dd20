use std::time::Duration;

use formulary_db_redis::RedisSettings;
use serde::{Deserialize, Serialize};

use crate::index::IndexMaintenance;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub prior_auth: PriorAuthSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Index validations
        let prefix = &self.index.key_prefix;
        if prefix.is_empty() {
            return Err("index.key_prefix must not be empty".into());
        }
        if prefix.contains(':') {
            return Err("index.key_prefix must not contain ':'".into());
        }
        if self.index.max_tier == 0 {
            return Err("index.max_tier must be > 0".into());
        }
        if self.index.default_filter_limit == 0 {
            return Err("index.default_filter_limit must be > 0".into());
        }
        // Workflow validations
        if self.prior_auth.request_ttl_days == 0 {
            return Err("prior_auth.request_ttl_days must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Store validation
        if self.store.backend == StoreBackend::Redis && self.store.redis.url.trim().is_empty() {
            return Err("store.backend=redis requires store.redis.url".into());
        }
        if self.store.backend == StoreBackend::Redis && self.store.redis.pool_size == 0 {
            return Err("store.redis.pool_size must be > 0".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Only read when `backend = "redis"`.
    #[serde(default)]
    pub redis: RedisSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default)]
    pub maintenance: IndexMaintenance,
    /// Highest tier reported by statistics and export.
    #[serde(default = "default_max_tier")]
    pub max_tier: u8,
    #[serde(default = "default_filter_limit")]
    pub default_filter_limit: usize,
}

fn default_key_prefix() -> String {
    "formulary".into()
}
fn default_max_tier() -> u8 {
    5
}
fn default_filter_limit() -> usize {
    100
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            maintenance: IndexMaintenance::default(),
            max_tier: default_max_tier(),
            default_filter_limit: default_filter_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorAuthSettings {
    #[serde(default = "default_request_ttl_days")]
    pub request_ttl_days: u32,
}

fn default_request_ttl_days() -> u32 {
    30
}

impl Default for PriorAuthSettings {
    fn default() -> Self {
        Self {
            request_ttl_days: default_request_ttl_days(),
        }
    }
}

impl PriorAuthSettings {
    pub fn request_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.request_ttl_days) * 86_400)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::EngineConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "formulary.toml";

    /// Loads the file at `path` (or `formulary.toml` when `None`), applies
    /// `FORMULARY__*` environment overrides and validates the result.
    /// A missing file is not an error; defaults fill every section.
    pub fn load_config(path: Option<&str>) -> Result<EngineConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., FORMULARY__INDEX__MAX_TIER=3
        builder = builder.add_source(
            Environment::with_prefix("FORMULARY")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: EngineConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
