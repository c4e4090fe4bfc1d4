//! One batch run: fetch, normalize, compute, load, deploy views

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use leaderboard::Leaderboard;
use metrics_engine::MetricCalculator;
use serde::Serialize;
use stat_ingest::{
    build_source, decode_rows, fetch_with_retry, normalize, NormalizeReport, StatsSource,
    WeeklyStatRow,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use warehouse::{DimensionWrite, Warehouse, WarehouseError};

use crate::config::EtlConfig;

/// Switches for a single run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Empty both tables before loading
    pub full_reload: bool,

    /// Skip redeploying the leaderboard views
    pub skip_views: bool,
}

/// A season that could not be fetched
#[derive(Debug, Clone, Serialize)]
pub struct SeasonFailure {
    pub season: i32,
    pub error: String,
}

/// A record rejected by the warehouse
#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub player_id: String,
    pub season_year: Option<i32>,
    pub error: String,
}

/// What a run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub seasons_requested: Vec<i32>,
    pub seasons_fetched: Vec<i32>,
    pub seasons_failed: Vec<SeasonFailure>,
    pub rows: NormalizeReport,
    pub players_inserted: usize,
    pub players_refreshed: usize,
    pub players_unchanged: usize,
    pub facts_written: usize,
    pub record_failures: Vec<RecordFailure>,
    pub views_deployed: usize,
}

impl RunSummary {
    fn new(seasons_requested: Vec<i32>) -> Self {
        Self {
            started_at: Utc::now(),
            elapsed_ms: 0,
            seasons_requested,
            seasons_fetched: Vec::new(),
            seasons_failed: Vec::new(),
            rows: NormalizeReport::default(),
            players_inserted: 0,
            players_refreshed: 0,
            players_unchanged: 0,
            facts_written: 0,
            record_failures: Vec::new(),
            views_deployed: 0,
        }
    }

    /// Every requested season was fetched and every record was written
    pub fn is_clean(&self) -> bool {
        self.seasons_failed.is_empty() && self.record_failures.is_empty()
    }
}

/// The ETL pipeline and the components it drives
pub struct Pipeline {
    config: EtlConfig,
    source: Arc<dyn StatsSource>,
    warehouse: Warehouse,
    calculator: MetricCalculator,
    leaderboard: Leaderboard,
}

impl Pipeline {
    pub fn new(config: EtlConfig, source: Arc<dyn StatsSource>, warehouse: Warehouse) -> Result<Self> {
        let calculator = MetricCalculator::new(config.pipeline.metrics.clone());
        let leaderboard = Leaderboard::new(config.pipeline.leaderboard.clone())
            .context("Invalid leaderboard configuration")?;

        Ok(Self { config, source, warehouse, calculator, leaderboard })
    }

    /// Build the configured source and connect to the configured database
    pub async fn from_config(config: EtlConfig) -> Result<Self> {
        let source = build_source(&config.source).context("Failed to build stats source")?;
        let warehouse =
            Warehouse::connect(&config.database).await.context("Failed to connect to database")?;
        Self::new(config, source, warehouse)
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    /// Execute one full run
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::new(self.config.seasons_to_run());
        info!(
            "Starting run for seasons {:?} from {}",
            summary.seasons_requested,
            self.source.describe()
        );

        let version = self.warehouse.ping().await.context("Database connection check failed")?;
        debug!("SQLite {}", version);
        self.warehouse.migrate().await.context("Failed to create schema")?;

        // Extract
        let rows = self.fetch_all(&mut summary).await;

        // Transform
        let batch = normalize(rows, &self.config.pipeline.thresholds);
        summary.rows.merge(&batch.report);
        info!(
            "Normalized {} rows into {} qualifying seasons for {} players ({} unqualified, {} rejected)",
            summary.rows.rows_seen,
            batch.seasons.len(),
            batch.players.len(),
            summary.rows.seasons_unqualified,
            summary.rows.rejected()
        );

        // Stored data stays untouched unless there is something to replace it with
        if batch.players.is_empty() {
            bail!(
                "No data to load: {} of {} seasons fetched, {} failed",
                summary.seasons_fetched.len(),
                summary.seasons_requested.len(),
                summary.seasons_failed.len()
            );
        }
        if options.full_reload {
            self.warehouse.truncate().await.context("Failed to truncate tables")?;
        }

        // Load: every dimension row goes in before any fact row
        self.load_players(&batch.players, &mut summary).await?;

        let facts: Vec<_> = batch.seasons.into_iter().map(|line| self.calculator.compute(line)).collect();
        self.load_facts(&facts, &mut summary).await?;

        if !options.skip_views {
            let deployed = self
                .leaderboard
                .deploy_views(self.warehouse.pool())
                .await
                .context("Failed to deploy leaderboard views")?;
            summary.views_deployed = deployed.len();
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Run complete in {}ms: {} facts written, {} seasons failed, {} records rejected",
            summary.elapsed_ms,
            summary.facts_written,
            summary.seasons_failed.len(),
            summary.record_failures.len()
        );
        Ok(summary)
    }

    /// Fetch every season concurrently. Failed seasons are recorded and skipped.
    async fn fetch_all(&self, summary: &mut RunSummary) -> Vec<WeeklyStatRow> {
        let retry = &self.config.retry;
        let source = self.source.as_ref();

        let mut results: Vec<_> = stream::iter(summary.seasons_requested.clone())
            .map(|season| async move { (season, fetch_with_retry(source, season, retry).await) })
            .buffer_unordered(self.config.pipeline.fetch_concurrency)
            .collect()
            .await;
        results.sort_by_key(|(season, _)| *season);

        let mut rows = Vec::new();
        for (season, result) in results {
            match result {
                Ok(raw) => {
                    let (decoded, rejected) = decode_rows(raw);
                    for e in &rejected {
                        warn!("Season {}: {}", season, e);
                    }
                    summary.rows.malformed += rejected.len();
                    summary.seasons_fetched.push(season);
                    rows.extend(decoded);
                }
                Err(e) => {
                    error!("Skipping season {}: {}", season, e);
                    summary.seasons_failed.push(SeasonFailure { season, error: e.to_string() });
                }
            }
        }
        rows
    }

    async fn load_players(&self, players: &[stat_ingest::Player], summary: &mut RunSummary) -> Result<()> {
        let refresh = self.config.pipeline.refresh_dimensions;
        let warehouse = &self.warehouse;

        let results: Vec<_> = stream::iter(players)
            .map(|player| async move {
                let written = if refresh {
                    warehouse.refresh_player(player).await
                } else {
                    warehouse.insert_player(player).await
                };
                (player, written)
            })
            .buffer_unordered(self.config.pipeline.write_concurrency)
            .collect()
            .await;

        for (player, result) in results {
            match result {
                Ok(DimensionWrite::Inserted) => summary.players_inserted += 1,
                Ok(DimensionWrite::Refreshed) => summary.players_refreshed += 1,
                Ok(DimensionWrite::Unchanged) => summary.players_unchanged += 1,
                Err(e) => record_or_abort(summary, &player.player_id, None, e)
                    .context("Failed to write players")?,
            }
        }
        Ok(())
    }

    async fn load_facts(&self, facts: &[metrics_engine::SeasonFact], summary: &mut RunSummary) -> Result<()> {
        let warehouse = &self.warehouse;

        let results: Vec<_> = stream::iter(facts)
            .map(|fact| async move { (fact, warehouse.upsert_season(fact).await) })
            .buffer_unordered(self.config.pipeline.write_concurrency)
            .collect()
            .await;

        for (fact, result) in results {
            match result {
                Ok(()) => summary.facts_written += 1,
                Err(e) => record_or_abort(summary, fact.player_id(), Some(fact.season_year()), e)
                    .context("Failed to write fact rows")?,
            }
        }
        Ok(())
    }
}

/// Record-level rejections are kept in the summary; anything else aborts the run
fn record_or_abort(
    summary: &mut RunSummary,
    player_id: &str,
    season_year: Option<i32>,
    error: WarehouseError,
) -> std::result::Result<(), WarehouseError> {
    if !error.is_record_level() {
        return Err(error);
    }
    warn!("Rejected record for player {} ({:?}): {}", player_id, season_year, error);
    summary.record_failures.push(RecordFailure {
        player_id: player_id.to_string(),
        season_year,
        error: error.to_string(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use leaderboard::{Metric, TimeWindow, ViewSpec};
    use serde_json::{json, Value};
    use stat_ingest::{FetchError, FileStatsSource, Position};
    use warehouse::DatabaseConfig;

    fn qb_rows(id: &str, name: &str, season: i32, weeks: u32, attempts: f64, yards: f64) -> Vec<Value> {
        (1..=weeks)
            .map(|week| {
                json!({
                    "player_id": id,
                    "player_name": name,
                    "position": "QB",
                    "recent_team": "BUF",
                    "season": season,
                    "week": week,
                    "attempts": attempts,
                    "completions": attempts * 0.6,
                    "passing_yards": yards + week as f64,
                    "passing_tds": 2.0,
                    "interceptions": 1.0
                })
            })
            .collect()
    }

    fn wr_rows(id: &str, name: &str, season: i32, weeks: u32, targets: f64, yards: f64) -> Vec<Value> {
        (1..=weeks)
            .map(|week| {
                json!({
                    "player_id": id,
                    "player_name": name,
                    "position": "WR",
                    "recent_team": "MIA",
                    "season": season,
                    "week": week,
                    "targets": targets,
                    "receptions": targets - 3.0,
                    "receiving_yards": yards * week as f64,
                    "receiving_tds": 0.5
                })
            })
            .collect()
    }

    fn write_season(dir: &std::path::Path, season: i32, rows: Vec<Value>) {
        std::fs::write(dir.join(format!("{season}.json")), Value::Array(rows).to_string()).unwrap();
    }

    fn test_config(seasons: Vec<i32>) -> EtlConfig {
        let mut config = EtlConfig::default();
        config.database = DatabaseConfig::new("sqlite::memory:");
        config.pipeline.seasons = seasons;
        config.retry.initial_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        config
    }

    async fn file_pipeline(dir: &std::path::Path, config: EtlConfig) -> Pipeline {
        let warehouse = Warehouse::connect(&config.database).await.unwrap();
        Pipeline::new(config, Arc::new(FileStatsSource::new(dir)), warehouse).unwrap()
    }

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();

        let mut season_2022 = qb_rows("qb1", "J.Allen", 2022, 16, 35.0, 270.0);
        season_2022.extend(qb_rows("qb2", "K.Backup", 2022, 3, 20.0, 150.0));
        season_2022.extend(wr_rows("wr1", "S.Diggs", 2022, 15, 9.0, 10.0));
        season_2022.push(json!({"player_id": "rb1", "player_name": "J.Cook", "position": "RB", "season": 2022, "week": 1}));
        season_2022.push(json!({"player_id": "bad", "season": "x"}));
        write_season(dir.path(), 2022, season_2022);

        let mut season_2023 = qb_rows("qb1", "J.Allen", 2023, 17, 34.0, 250.0);
        season_2023.extend(wr_rows("wr1", "S.Diggs", 2023, 17, 8.0, 9.0));
        write_season(dir.path(), 2023, season_2023);

        dir
    }

    #[tokio::test]
    async fn test_full_run_loads_and_deploys() {
        let dir = fixture_dir();
        let pipeline = file_pipeline(dir.path(), test_config(vec![2021, 2022, 2023])).await;

        let summary = pipeline.run(RunOptions::default()).await.unwrap();

        assert_eq!(summary.seasons_fetched, vec![2022, 2023]);
        assert_eq!(summary.seasons_failed.len(), 1);
        assert_eq!(summary.seasons_failed[0].season, 2021);
        assert_eq!(summary.rows.malformed, 1);
        assert_eq!(summary.rows.unsupported_position, 1);
        assert_eq!(summary.rows.seasons_unqualified, 1);
        assert_eq!(summary.players_inserted, 2);
        assert_eq!(summary.facts_written, 4);
        assert_eq!(summary.views_deployed, 12);
        assert!(summary.record_failures.is_empty());
        assert!(!summary.is_clean());

        let warehouse = pipeline.warehouse();
        assert_eq!(warehouse.count_players().await.unwrap(), 2);
        assert_eq!(warehouse.count_facts().await.unwrap(), 4);

        let career = warehouse.player_career("qb1").await.unwrap();
        assert_eq!(career.len(), 2);
        assert_eq!(career[0].games, 16);
        assert_eq!(career[0].attempts, 560);
        assert_eq!(career[0].snaps, Some(960));

        let spec = ViewSpec::new(Position::Quarterback, Metric::SnapEfficiency, TimeWindow::LatestSeason);
        let entries = pipeline.leaderboard().query_view(warehouse.pool(), spec).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].period, "2023");
        assert_eq!(entries[0].rank, 1);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let dir = fixture_dir();
        let pipeline = file_pipeline(dir.path(), test_config(vec![2022, 2023])).await;

        pipeline.run(RunOptions::default()).await.unwrap();
        let before = pipeline.warehouse().fact_rows().await.unwrap();

        let second = pipeline.run(RunOptions::default()).await.unwrap();
        assert_eq!(second.players_unchanged, 2);
        assert_eq!(second.players_inserted, 0);
        assert_eq!(pipeline.warehouse().fact_rows().await.unwrap(), before);
        assert!(second.is_clean());
    }

    #[tokio::test]
    async fn test_full_reload_and_skip_views() {
        let dir = fixture_dir();
        let mut config = test_config(vec![2022]);
        config.pipeline.refresh_dimensions = true;
        let pipeline = file_pipeline(dir.path(), config).await;

        pipeline.run(RunOptions::default()).await.unwrap();
        let summary = pipeline.run(RunOptions { full_reload: true, skip_views: true }).await.unwrap();

        assert_eq!(summary.players_inserted, 2);
        assert_eq!(summary.players_refreshed, 0);
        assert_eq!(summary.views_deployed, 0);
        assert_eq!(pipeline.warehouse().count_facts().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_refresh_dimensions_overwrites_players() {
        let dir = fixture_dir();
        let mut config = test_config(vec![2022, 2023]);
        config.pipeline.refresh_dimensions = true;
        let pipeline = file_pipeline(dir.path(), config).await;

        pipeline.run(RunOptions::default()).await.unwrap();
        let summary = pipeline.run(RunOptions { skip_views: true, ..Default::default() }).await.unwrap();
        assert_eq!(summary.players_refreshed, 2);
    }

    #[tokio::test]
    async fn test_full_reload_keeps_data_when_nothing_fetched() {
        let dir = fixture_dir();
        let pipeline = file_pipeline(dir.path(), test_config(vec![2022, 2023])).await;
        pipeline.run(RunOptions::default()).await.unwrap();

        std::fs::remove_file(dir.path().join("2022.json")).unwrap();
        std::fs::remove_file(dir.path().join("2023.json")).unwrap();
        let result = pipeline.run(RunOptions { full_reload: true, ..Default::default() }).await;

        assert!(result.is_err());
        assert_eq!(pipeline.warehouse().count_players().await.unwrap(), 2);
        assert_eq!(pipeline.warehouse().count_facts().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_empty_batch_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        write_season(dir.path(), 2022, qb_rows("qb2", "K.Backup", 2022, 3, 20.0, 150.0));
        let pipeline = file_pipeline(dir.path(), test_config(vec![2022])).await;

        assert!(pipeline.run(RunOptions::default()).await.is_err());
        assert_eq!(pipeline.warehouse().count_players().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_default_run_on_file_database() {
        let dir = fixture_dir();
        let db = tempfile::tempdir().unwrap();
        let mut config = test_config(vec![2022, 2023]);
        config.database = DatabaseConfig::new(format!("sqlite://{}", db.path().join("nfl.db").display()));
        let pipeline = file_pipeline(dir.path(), config).await;

        let summary = pipeline.run(RunOptions::default()).await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.facts_written, 4);

        let reload = pipeline.run(RunOptions { full_reload: true, ..Default::default() }).await.unwrap();
        assert_eq!(reload.players_inserted, 2);
        assert_eq!(pipeline.warehouse().count_facts().await.unwrap(), 4);
    }

    /// Answers 503 a fixed number of times before serving the season
    struct Unreliable {
        inner: FileStatsSource,
        failures: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl StatsSource for Unreliable {
        async fn fetch_weekly(&self, season: i32) -> Result<Vec<Value>, FetchError> {
            let remaining = self.failures.load(std::sync::atomic::Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, std::sync::atomic::Ordering::SeqCst);
                return Err(FetchError::Status { url: "test".into(), status: 503 });
            }
            self.inner.fetch_weekly(season).await
        }

        fn describe(&self) -> String {
            "unreliable".into()
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let dir = fixture_dir();
        let config = test_config(vec![2023]);
        let warehouse = Warehouse::connect(&config.database).await.unwrap();
        let source = Unreliable {
            inner: FileStatsSource::new(dir.path()),
            failures: std::sync::atomic::AtomicU32::new(2),
        };
        let pipeline = Pipeline::new(config, Arc::new(source), warehouse).unwrap();

        let summary = pipeline.run(RunOptions::default()).await.unwrap();
        assert_eq!(summary.seasons_fetched, vec![2023]);
        assert!(summary.is_clean());
        assert_eq!(summary.facts_written, 2);
    }
}
