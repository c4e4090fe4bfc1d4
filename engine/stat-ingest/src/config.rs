use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which upstream implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Http,
    File,
}

/// Upstream feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source implementation
    pub kind: SourceKind,

    /// URL template for one season of weekly rows; `{season}` is substituted
    pub url_template: String,

    /// Directory holding `<season>.json` files (file source)
    pub fixture_dir: PathBuf,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Minimum spacing between consecutive requests, in milliseconds
    pub min_request_interval_ms: u64,
}

/// Retry policy for upstream fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per season, including the first
    pub max_retries: u32,

    /// Delay before the second attempt, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

/// Minimum season volume for a player-season to be loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualificationThresholds {
    /// Pass attempts a quarterback needs
    pub qb_min_attempts: i64,

    /// Targets a wide receiver needs
    pub wr_min_targets: i64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Http,
            url_template: "http://localhost:8000/player_stats/weekly/{season}.json".to_string(),
            fixture_dir: PathBuf::from("./data/weekly"),
            timeout_secs: 30,
            min_request_interval_ms: 500,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2_000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for QualificationThresholds {
    fn default() -> Self {
        Self { qb_min_attempts: 200, wr_min_targets: 40 }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    /// Resolve the URL for one season
    pub fn season_url(&self, season: i32) -> String {
        self.url_template.replace("{season}", &season.to_string())
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis as u64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("retry.max_retries must be at least 1".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("retry.backoff_multiplier must be >= 1.0".to_string());
        }
        Ok(())
    }
}
