//! NFL Stats ETL Service Library
//!
//! Configuration loading, logging setup and the pipeline run that ties the
//! ingestion, metrics, warehouse and leaderboard crates together.

use anyhow::{Context, Result};
use std::path::Path;

pub mod config;
pub mod logging;
pub mod pipeline;

pub use config::EtlConfig;
pub use logging::initialize_logging;
pub use pipeline::{Pipeline, RunOptions, RunSummary};

/// Load configuration from files and environment variables
pub fn load_configuration(path: Option<&Path>) -> Result<EtlConfig> {
    config::load_config(path).context("Failed to load service configuration")
}
