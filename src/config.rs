//! Layered application settings: defaults, TOML files, then `CFC__*` variables
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub versioning: VersioningConfig,
    #[serde(default)]
    pub suppression: SuppressionConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Directory of the sled database
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersioningConfig {
    /// Attempts after a concurrent-update conflict before the event is rejected
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_max_conflict_retries() -> u32 {
    3
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

/// Payment suppression thresholds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuppressionConfig {
    /// Currency -> largest absolute amount that is not worth settling
    #[serde(default)]
    pub upto_amount: HashMap<String, Decimal>,
    /// Suppress every INTER_BOOK cashflow
    #[serde(default)]
    pub interbook_tx: bool,
}

impl SuppressionConfig {
    /// Currency keys are matched case-insensitively; the config layer lower-cases them.
    pub fn limit_for(&self, curr_code: &str) -> Option<Decimal> {
        self.upto_amount
            .iter()
            .find(|(currency, _)| currency.eq_ignore_ascii_case(curr_code))
            .map(|(_, amount)| amount.abs())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichmentConfig {
    /// JSON reference data snapshot; without one every draft passes through unenriched
    #[serde(default)]
    pub reference_data: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// `default.toml`, then the `CFC_ENV` file, then `CFC__SECTION__KEY` variables.
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("store.path", "data/cashflows.db")?
            .set_default("versioning.max_conflict_retries", 3)?
            .set_default("suppression.interbook_tx", false)?
            .set_default("logging.level", "info")?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(
                    std::env::var("CFC_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            .add_source(
                Environment::with_prefix("CFC")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}
