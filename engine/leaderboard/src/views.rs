//! # SQL views
//!
//! One plain view per [`ViewSpec`], recomputed by the engine on every read.

use crate::config::LeaderboardConfig;
use crate::error::Result;
use crate::models::{LeaderboardEntry, TimeWindow, ViewSpec};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// `SELECT` body of the view for `spec`
pub fn view_sql(spec: ViewSpec, config: &LeaderboardConfig) -> String {
    let column = spec.metric.column();
    let position = spec.position.code();

    let scored = match spec.window {
        TimeWindow::LatestSeason => format!(
            "SELECT f.player_id, p.name, CAST(f.season_year AS TEXT) AS period, f.{column} AS raw_value
        FROM fact_player_seasons f
        JOIN dim_players p ON p.player_id = f.player_id
        WHERE p.position = '{position}'
          AND f.{column} IS NOT NULL
          AND f.season_year = (SELECT MAX(season_year) FROM fact_player_seasons)"
        ),
        TimeWindow::Span => averaged(
            column,
            position,
            &config.span_label(),
            &format!("AND f.season_year BETWEEN {} AND {}", config.span_start, config.span_end),
        ),
        TimeWindow::Career => averaged(column, position, "Career", ""),
    };

    format!(
        "WITH scored AS (
        {scored}
    ),
    ranked AS (
        SELECT player_id, name, period, raw_value,
               RANK() OVER (ORDER BY raw_value DESC) AS rank
        FROM scored
    )
    SELECT player_id, name, period, ROUND(raw_value, {places}) AS value, rank
    FROM ranked
    ORDER BY rank, player_id
    LIMIT {top_n}",
        places = spec.metric.places(),
        top_n = config.top_n,
    )
}

fn averaged(column: &str, position: &str, period: &str, season_filter: &str) -> String {
    format!(
        "SELECT f.player_id, MIN(p.name) AS name, '{period}' AS period, AVG(f.{column}) AS raw_value
        FROM fact_player_seasons f
        JOIN dim_players p ON p.player_id = f.player_id
        WHERE p.position = '{position}'
          AND f.{column} IS NOT NULL
          {season_filter}
        GROUP BY f.player_id"
    )
}

/// Drop and recreate all twelve views. Returns the view names.
pub async fn deploy_views(pool: &SqlitePool, config: &LeaderboardConfig) -> Result<Vec<String>> {
    let mut tx = pool.begin().await?;
    let mut deployed = Vec::with_capacity(12);

    for spec in ViewSpec::all() {
        let name = spec.view_name();
        sqlx::query(&format!("DROP VIEW IF EXISTS {name}")).execute(&mut *tx).await?;
        sqlx::query(&format!("CREATE VIEW {name} AS\n    {}", view_sql(spec, config)))
            .execute(&mut *tx)
            .await?;
        debug!("Created view {}", name);
        deployed.push(name);
    }

    tx.commit().await?;
    info!("Deployed {} leaderboard views", deployed.len());
    Ok(deployed)
}

/// Read a deployed view
pub async fn query_view(pool: &SqlitePool, spec: ViewSpec) -> Result<Vec<LeaderboardEntry>> {
    let sql = format!(
        "SELECT player_id, name, period, value, rank FROM {} ORDER BY rank, player_id",
        spec.view_name()
    );
    Ok(sqlx::query_as::<_, LeaderboardEntry>(&sql).fetch_all(pool).await?)
}
