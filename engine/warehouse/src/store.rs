use crate::config::DatabaseConfig;
use crate::error::{Result, WarehouseError};
use crate::models::{DimensionWrite, FactRow, PlayerRecord, TruncateReport};
use crate::schema::SCHEMA;
use chrono::Utc;
use dashmap::DashMap;
use metrics_engine::SeasonFact;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

type SeasonKey = (String, i32);

const FACT_COLUMNS: &str = r#"
    f.player_id, p.name, p.position, f.season_year, f.team, f.games, f.snaps,
    f.attempts, f.completions, f.yards, f.tds, f.ints,
    f.snap_efficiency, f.yards_per_attempt, f.weekly_cv, f.consistency_score
"#;

/// Handle to the star schema.
///
/// Every write opens with its write statement, so concurrent writers queue on
/// SQLite's busy timeout instead of failing a read-to-write lock upgrade.
/// Fact writes for different `(player_id, season_year)` keys run concurrently.
/// Writes for the same key are serialized, and the last one to commit wins.
pub struct Warehouse {
    pool: SqlitePool,
    season_locks: DashMap<SeasonKey, Arc<Mutex<()>>>,
}

impl Warehouse {
    /// Open a pool for the configured database, creating the file if needed
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate().map_err(WarehouseError::config)?;

        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());
        if !config.is_in_memory() {
            // Readers do not block the writer
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.effective_max_connections())
            .acquire_timeout(config.acquire_timeout());
        if config.is_in_memory() {
            // Closing the only connection would drop the database
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        info!(
            "Connected to {} (max {} connections)",
            config.url,
            config.effective_max_connections()
        );
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool, season_locks: DashMap::new() }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create tables and indexes if they do not exist
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        debug!("Schema ready");
        Ok(())
    }

    /// Engine version, as a connectivity check
    pub async fn ping(&self) -> Result<String> {
        let version: String = sqlx::query_scalar("SELECT sqlite_version()").fetch_one(&self.pool).await?;
        Ok(version)
    }

    /// Insert a player if absent. An existing row is left untouched.
    pub async fn insert_player(&self, player: &stat_ingest::Player) -> Result<DimensionWrite> {
        validate_player(player)?;

        let result = sqlx::query(
            r#"
            INSERT INTO dim_players (player_id, name, position, draft_year, height, weight, current_team)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (player_id) DO NOTHING
            "#,
        )
        .bind(&player.player_id)
        .bind(&player.name)
        .bind(player.position.code())
        .bind(player.draft_year)
        .bind(player.height)
        .bind(player.weight)
        .bind(&player.current_team)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() > 0 { DimensionWrite::Inserted } else { DimensionWrite::Unchanged })
    }

    /// Insert a player or overwrite its descriptive attributes.
    ///
    /// `player_id` and `created_at` never change. Attributes the feed does not
    /// carry (draft year, height, weight) keep their stored value when absent.
    pub async fn refresh_player(&self, player: &stat_ingest::Player) -> Result<DimensionWrite> {
        if self.insert_player(player).await? == DimensionWrite::Inserted {
            return Ok(DimensionWrite::Inserted);
        }

        sqlx::query(
            r#"
            UPDATE dim_players SET
                name = ?,
                position = ?,
                current_team = ?,
                draft_year = COALESCE(?, draft_year),
                height = COALESCE(?, height),
                weight = COALESCE(?, weight)
            WHERE player_id = ?
            "#,
        )
        .bind(&player.name)
        .bind(player.position.code())
        .bind(&player.current_team)
        .bind(player.draft_year)
        .bind(player.height)
        .bind(player.weight)
        .bind(&player.player_id)
        .execute(&self.pool)
        .await?;

        Ok(DimensionWrite::Refreshed)
    }

    /// Insert or fully replace the fact row for the fact's player and season.
    ///
    /// A single upsert statement, so readers see either the old row or the new
    /// one. The foreign key rejects players missing from `dim_players`.
    pub async fn upsert_season(&self, fact: &SeasonFact) -> Result<()> {
        let key = (fact.player_id().to_string(), fact.season_year());
        let lock = self.season_lock(&key);
        let written = {
            let _guard = lock.lock().await;
            self.write_season(fact).await
        };
        drop(lock);
        self.release_season_lock(&key);

        written.map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                WarehouseError::UnknownPlayer { player_id: key.0, season_year: key.1 }
            }
            other => WarehouseError::Database(other),
        })?;
        debug!("Upserted season {} for {}", fact.season_year(), fact.player_id());
        Ok(())
    }

    async fn write_season(&self, fact: &SeasonFact) -> std::result::Result<(), sqlx::Error> {
        let line = fact.line();
        let metrics = fact.metrics();
        sqlx::query(
            r#"
            INSERT INTO fact_player_seasons (
                player_id, season_year, team, games, snaps,
                attempts, completions, yards, tds, ints,
                snap_efficiency, yards_per_attempt, weekly_cv, consistency_score, loaded_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (player_id, season_year) DO UPDATE SET
                team = excluded.team,
                games = excluded.games,
                snaps = excluded.snaps,
                attempts = excluded.attempts,
                completions = excluded.completions,
                yards = excluded.yards,
                tds = excluded.tds,
                ints = excluded.ints,
                snap_efficiency = excluded.snap_efficiency,
                yards_per_attempt = excluded.yards_per_attempt,
                weekly_cv = excluded.weekly_cv,
                consistency_score = excluded.consistency_score,
                loaded_at = excluded.loaded_at
            "#,
        )
        .bind(&line.player_id)
        .bind(line.season_year)
        .bind(&line.team)
        .bind(line.games as i64)
        .bind(fact.snaps())
        .bind(line.attempts)
        .bind(line.completions)
        .bind(line.yards)
        .bind(line.tds)
        .bind(line.ints)
        .bind(metrics.snap_efficiency)
        .bind(metrics.yards_per_attempt)
        .bind(metrics.weekly_cv)
        .bind(metrics.consistency_score)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove every fact row, then every player
    pub async fn truncate(&self) -> Result<TruncateReport> {
        let mut tx = self.pool.begin().await?;
        let facts = sqlx::query("DELETE FROM fact_player_seasons").execute(&mut *tx).await?;
        let players = sqlx::query("DELETE FROM dim_players").execute(&mut *tx).await?;
        tx.commit().await?;

        let report =
            TruncateReport { facts: facts.rows_affected(), players: players.rows_affected() };
        info!("Truncated {} fact rows and {} players", report.facts, report.players);
        Ok(report)
    }

    /// Every fact row joined with its player, ordered by player then season
    pub async fn fact_rows(&self) -> Result<Vec<FactRow>> {
        let sql = format!(
            "SELECT {FACT_COLUMNS} FROM fact_player_seasons f \
             JOIN dim_players p ON p.player_id = f.player_id \
             ORDER BY f.player_id, f.season_year"
        );
        Ok(sqlx::query_as::<_, FactRow>(&sql).fetch_all(&self.pool).await?)
    }

    /// Seasons of every player whose name contains `fragment`, ignoring case.
    /// Newest seasons come first.
    pub async fn search_players(&self, fragment: &str) -> Result<Vec<FactRow>> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Err(WarehouseError::invalid_record("search term must not be empty"));
        }

        let sql = format!(
            "SELECT {FACT_COLUMNS} FROM dim_players p \
             JOIN fact_player_seasons f ON f.player_id = p.player_id \
             WHERE LOWER(p.name) LIKE ? ESCAPE '\\' \
             ORDER BY f.season_year DESC, p.name, p.player_id"
        );
        Ok(sqlx::query_as::<_, FactRow>(&sql)
            .bind(like_pattern(fragment))
            .fetch_all(&self.pool)
            .await?)
    }

    /// All stored seasons of one player, oldest first
    pub async fn player_career(&self, player_id: &str) -> Result<Vec<FactRow>> {
        let sql = format!(
            "SELECT {FACT_COLUMNS} FROM fact_player_seasons f \
             JOIN dim_players p ON p.player_id = f.player_id \
             WHERE f.player_id = ? \
             ORDER BY f.season_year"
        );
        Ok(sqlx::query_as::<_, FactRow>(&sql).bind(player_id).fetch_all(&self.pool).await?)
    }

    pub async fn get_player(&self, player_id: &str) -> Result<Option<PlayerRecord>> {
        Ok(sqlx::query_as::<_, PlayerRecord>(
            r#"
            SELECT player_id, name, position, draft_year, height, weight, current_team, created_at
            FROM dim_players WHERE player_id = ?
            "#,
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn count_players(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM dim_players").fetch_one(&self.pool).await?)
    }

    pub async fn count_facts(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM fact_player_seasons")
            .fetch_one(&self.pool)
            .await?)
    }

    fn season_lock(&self, key: &SeasonKey) -> Arc<Mutex<()>> {
        self.season_locks.entry(key.clone()).or_insert_with(Default::default).clone()
    }

    /// Forget the key's lock once no writer holds or waits on it
    fn release_season_lock(&self, key: &SeasonKey) {
        self.season_locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.season_locks.len()
    }
}

fn validate_player(player: &stat_ingest::Player) -> Result<()> {
    if player.player_id.trim().is_empty() {
        return Err(WarehouseError::invalid_record("player id must not be empty"));
    }
    if player.name.trim().is_empty() {
        return Err(WarehouseError::invalid_record(format!(
            "player {} has an empty name",
            player.player_id
        )));
    }
    Ok(())
}

/// Lower-cased `%fragment%` with LIKE wildcards escaped
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
