//! # Leaderboard
//!
//! Twelve leaderboards (QB/WR x snap efficiency/consistency x latest season,
//! multi-year span, career) with standard competition ranking.
//!
//! Each one exists twice: as a plain SQL view for dashboard consumers, and as a
//! native sort-and-rank pass over the fact rows. Both produce the same entries.

pub mod config;
pub mod error;
pub mod models;
pub mod ranking;
pub mod views;

pub use config::LeaderboardConfig;
pub use error::{LeaderboardError, Result};
pub use models::{LeaderboardEntry, Metric, TimeWindow, ViewSpec};

use sqlx::SqlitePool;
use warehouse::{FactRow, Warehouse};

/// Leaderboard generator bound to one configuration
#[derive(Debug, Clone)]
pub struct Leaderboard {
    config: LeaderboardConfig,
}

impl Leaderboard {
    pub fn new(config: LeaderboardConfig) -> Result<Self> {
        config.validate().map_err(LeaderboardError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    /// Rank `rows` natively
    pub fn generate(&self, rows: &[FactRow], spec: ViewSpec) -> Vec<LeaderboardEntry> {
        ranking::generate(rows, spec, &self.config)
    }

    /// Rank the warehouse's current fact table natively
    pub async fn generate_from(&self, warehouse: &Warehouse, spec: ViewSpec) -> Result<Vec<LeaderboardEntry>> {
        let rows = warehouse.fact_rows().await?;
        Ok(self.generate(&rows, spec))
    }

    /// SQL body of one view
    pub fn view_sql(&self, spec: ViewSpec) -> String {
        views::view_sql(spec, &self.config)
    }

    pub async fn deploy_views(&self, pool: &SqlitePool) -> Result<Vec<String>> {
        views::deploy_views(pool, &self.config).await
    }

    pub async fn query_view(&self, pool: &SqlitePool, spec: ViewSpec) -> Result<Vec<LeaderboardEntry>> {
        views::query_view(pool, spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        let config = LeaderboardConfig { span_start: 2023, span_end: 2019, top_n: 30 };
        assert!(matches!(Leaderboard::new(config), Err(LeaderboardError::Config(_))));
    }
}
