use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL (ledger, calculation history, rate settings)
    pub postgres_url: String,
    /// Redis URL for the fast cache and the distributed lock.
    /// When absent the service runs in single-instance mode with in-memory equivalents.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Trading backend serving positions, asset pairs, interest rates and quotes
    pub backend_url: String,
    /// Lock holder identity; falls back to `HOSTNAME`, then a random UUID
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    pub default_rate_settings: DefaultRateSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchConfig {
    /// Must exceed the worst-case batch duration
    pub distributed_lock_timeout_secs: u64,
    /// Positions calculated concurrently within one run (1 = sequential)
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            distributed_lock_timeout_secs: 3600,
            max_concurrency: 1,
        }
    }
}

impl BatchConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.distributed_lock_timeout_secs)
    }
}

/// Per-listener wait for downstream charge acknowledgements
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrackingConfig {
    pub overnight_swap_timeout_secs: u64,
    pub daily_pnl_timeout_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            overnight_swap_timeout_secs: 3600,
            daily_pnl_timeout_secs: 3600,
        }
    }
}

/// Static fallbacks for rate settings that were never configured
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DefaultRateSettings {
    pub default_order_execution_settings: DefaultOrderExecutionSettings,
    pub default_overnight_swap_settings: DefaultOvernightSwapSettings,
    pub default_on_behalf_settings: DefaultOnBehalfSettings,
    /// Legal entity applied on write when a rate omits it
    pub default_legal_entity: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DefaultOrderExecutionSettings {
    pub commission_cap: Decimal,
    pub commission_floor: Decimal,
    pub commission_rate: Decimal,
    pub commission_asset: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DefaultOvernightSwapSettings {
    pub repo_surcharge_percent: Decimal,
    pub fix_rate: Decimal,
    #[serde(default)]
    pub variable_rate_base: Option<String>,
    #[serde(default)]
    pub variable_rate_quote: Option<String>,
    /// Asset the swap amount is expressed in
    pub commission_asset: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DefaultOnBehalfSettings {
    pub commission: Decimal,
    pub commission_asset: String,
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.distributed_lock_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "batch.distributed_lock_timeout_secs must be positive".into(),
            ));
        }
        if self.batch.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "batch.max_concurrency must be at least 1".into(),
            ));
        }

        let defaults = &self.default_rate_settings;
        if defaults.default_legal_entity.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_rate_settings.default_legal_entity is required".into(),
            ));
        }
        if defaults
            .default_order_execution_settings
            .commission_asset
            .trim()
            .is_empty()
            || defaults
                .default_overnight_swap_settings
                .commission_asset
                .trim()
                .is_empty()
            || defaults
                .default_on_behalf_settings
                .commission_asset
                .trim()
                .is_empty()
        {
            return Err(ConfigError::Invalid(
                "default commission assets must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Identity used as the distributed lock holder
    pub fn holder_id(&self) -> String {
        self.instance_id
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}
