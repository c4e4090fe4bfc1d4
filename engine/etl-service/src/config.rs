//! Service configuration management
//!
//! Sources are layered lowest to highest: built-in defaults, a TOML file,
//! `NFL_ETL__SECTION__KEY` environment variables, then the plain
//! `DATABASE_URL` / `CURRENT_SEASON` / `LOG_LEVEL` / `MAX_RETRIES` variables.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use leaderboard::LeaderboardConfig;
use metrics_engine::MetricsConfig;
use serde::{Deserialize, Serialize};
use stat_ingest::{QualificationThresholds, RetryConfig, SourceConfig};
use std::path::Path;
use warehouse::DatabaseConfig;

/// Default config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "nfl-etl";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtlConfig {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub retry: RetryConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// What a run loads and how hard it pushes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seasons to ingest
    pub seasons: Vec<i32>,

    /// Latest season that may be ingested; later entries in `seasons` are skipped
    pub current_season: Option<i32>,

    /// Season fetches in flight at once
    pub fetch_concurrency: usize,

    /// Database writes in flight at once
    pub write_concurrency: usize,

    /// Overwrite stored player attributes instead of leaving them untouched
    pub refresh_dimensions: bool,

    pub thresholds: QualificationThresholds,

    pub metrics: MetricsConfig,

    pub leaderboard: LeaderboardConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive, used when `RUST_LOG` is unset
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seasons: (2015..=2023).collect(),
            current_season: None,
            fetch_concurrency: 4,
            write_concurrency: 8,
            refresh_dimensions: false,
            thresholds: QualificationThresholds::default(),
            metrics: MetricsConfig::default(),
            leaderboard: LeaderboardConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl EtlConfig {
    /// Seasons this run will request, in order, without duplicates
    pub fn seasons_to_run(&self) -> Vec<i32> {
        let mut seasons: Vec<i32> = self
            .pipeline
            .seasons
            .iter()
            .copied()
            .filter(|s| self.pipeline.current_season.map_or(true, |current| *s <= current))
            .collect();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }

    /// Render the effective configuration
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }
}

/// Load configuration from defaults, an optional file, and the environment
pub fn load_config(path: Option<&Path>) -> Result<EtlConfig> {
    dotenv::dotenv().ok();

    let mut config = build_config(path, true)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;

    tracing::debug!("Configuration loaded: {:?}", config);
    Ok(config)
}

/// Layer defaults, the file and (optionally) `NFL_ETL__*` variables
fn build_config(path: Option<&Path>, with_env: bool) -> Result<EtlConfig> {
    let defaults = Config::try_from(&EtlConfig::default()).context("Failed to serialize defaults")?;
    let mut builder = Config::builder().add_source(defaults);

    builder = match path {
        Some(path) => {
            tracing::debug!("Loading configuration from file: {:?}", path);
            builder.add_source(File::from(path).required(true))
        }
        None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };

    if with_env {
        builder = builder.add_source(Environment::with_prefix("NFL_ETL").separator("__").try_parsing(true));
    }

    builder
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Invalid configuration")
}

/// Plain variables read by the deployment scripts and cron jobs
fn apply_env_overrides<F>(config: &mut EtlConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }

    if let Some(season) = lookup("CURRENT_SEASON") {
        let season = season
            .trim()
            .parse()
            .with_context(|| format!("CURRENT_SEASON is not a year: {season:?}"))?;
        config.pipeline.current_season = Some(season);
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.logging.level = level.to_lowercase();
    }

    if let Some(retries) = lookup("MAX_RETRIES") {
        config.retry.max_retries = retries
            .trim()
            .parse()
            .with_context(|| format!("MAX_RETRIES is not a number: {retries:?}"))?;
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &EtlConfig) -> Result<()> {
    config.database.validate().map_err(anyhow::Error::msg)?;
    config.retry.validate().map_err(anyhow::Error::msg)?;
    config.pipeline.leaderboard.validate().map_err(anyhow::Error::msg)?;

    if config.seasons_to_run().is_empty() {
        bail!("pipeline.seasons selects no seasons to ingest");
    }
    if config.pipeline.fetch_concurrency == 0 {
        bail!("pipeline.fetch_concurrency must be greater than 0");
    }
    if config.pipeline.write_concurrency == 0 {
        bail!("pipeline.write_concurrency must be greater than 0");
    }

    Ok(())
}
