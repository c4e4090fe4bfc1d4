//! NFL Stats ETL command line
//!
//! `nfl-etl run` executes one batch (meant to be triggered daily by cron or a
//! similar scheduler). The other subcommands inspect what has been loaded.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leaderboard::{LeaderboardEntry, Metric, TimeWindow, ViewSpec};
use serde::Serialize;
use stat_ingest::Position;
use std::path::PathBuf;
use tracing::info;
use warehouse::{FactRow, Warehouse};

use etl_service::{initialize_logging, load_configuration, Pipeline, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "nfl-etl", version, about = "NFL stats ETL pipeline and leaderboards")]
struct Cli {
    /// Configuration file (TOML); defaults to ./nfl-etl.toml when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, transform and load every configured season
    Run {
        /// Empty the tables before loading
        #[arg(long)]
        full_reload: bool,

        /// Do not redeploy the leaderboard views
        #[arg(long)]
        skip_views: bool,
    },

    /// Drop and recreate the twelve leaderboard views
    DeployViews,

    /// Show one leaderboard
    Leaderboard {
        /// qb or wr
        #[arg(long)]
        position: Position,

        /// snap-efficiency or consistency
        #[arg(long)]
        metric: Metric,

        /// 1yr, 5yr or career
        #[arg(long, default_value = "1yr")]
        window: TimeWindow,

        /// Print the view SQL instead of its rows
        #[arg(long)]
        sql: bool,

        /// Rank the fact table directly instead of reading the view
        #[arg(long)]
        native: bool,
    },

    /// Find players by name
    Search { name: String },

    /// Season-by-season stats of one player
    Career { player_id: String },

    /// Verify the database connection
    CheckDb,

    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_configuration(cli.config.as_deref())?;
    initialize_logging(&config.logging)?;

    if let Command::ShowConfig = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("Starting nfl-etl v{}", env!("CARGO_PKG_VERSION"));
    let pipeline = Pipeline::from_config(config).await?;
    let warehouse = pipeline.warehouse();

    match cli.command {
        Command::Run { full_reload, skip_views } => {
            let summary = pipeline.run(RunOptions { full_reload, skip_views }).await?;
            if cli.json {
                print_json(&summary)?;
            } else {
                println!("Seasons fetched:  {:?}", summary.seasons_fetched);
                for failure in &summary.seasons_failed {
                    println!("Season failed:    {} ({})", failure.season, failure.error);
                }
                println!(
                    "Rows:             {} seen, {} rejected",
                    summary.rows.rows_seen,
                    summary.rows.rejected()
                );
                println!(
                    "Players:          {} new, {} refreshed, {} unchanged",
                    summary.players_inserted, summary.players_refreshed, summary.players_unchanged
                );
                println!("Seasons loaded:   {}", summary.facts_written);
                println!("Records rejected: {}", summary.record_failures.len());
                println!("Views deployed:   {}", summary.views_deployed);
                println!("Elapsed:          {}ms", summary.elapsed_ms);
            }
        }
        Command::DeployViews => {
            warehouse.migrate().await?;
            let views = pipeline.leaderboard().deploy_views(warehouse.pool()).await?;
            if cli.json {
                print_json(&views)?;
            } else {
                for view in views {
                    println!("{view}");
                }
            }
        }
        Command::Leaderboard { position, metric, window, sql, native } => {
            let spec = ViewSpec::new(position, metric, window);
            if sql {
                println!("CREATE VIEW {} AS\n{}", spec.view_name(), pipeline.leaderboard().view_sql(spec));
                return Ok(());
            }

            let entries = if native {
                pipeline.leaderboard().generate_from(warehouse, spec).await?
            } else {
                pipeline
                    .leaderboard()
                    .query_view(warehouse.pool(), spec)
                    .await
                    .with_context(|| format!("Failed to read {} (run deploy-views first?)", spec.view_name()))?
            };
            if cli.json {
                print_json(&entries)?;
            } else {
                print_leaderboard(&spec, &entries);
            }
        }
        Command::Search { name } => {
            let rows = warehouse.search_players(&name).await?;
            output_rows(&rows, cli.json)?;
        }
        Command::Career { player_id } => {
            let rows = warehouse.player_career(&player_id).await?;
            if rows.is_empty() {
                println!("No seasons stored for {player_id}");
            }
            output_rows(&rows, cli.json)?;
        }
        Command::CheckDb => check_db(warehouse).await?,
        Command::ShowConfig => {}
    }

    warehouse.close().await;
    Ok(())
}

async fn check_db(warehouse: &Warehouse) -> Result<()> {
    let version = warehouse.ping().await.context("Database connection failed")?;
    warehouse.migrate().await?;
    println!("Connected: SQLite {version}");
    println!("Players:   {}", warehouse.count_players().await?);
    println!("Seasons:   {}", warehouse.count_facts().await?);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_leaderboard(spec: &ViewSpec, entries: &[LeaderboardEntry]) {
    println!("{}", spec.view_name());
    println!("{:>4}  {:<12}  {:<24}  {:<10}  {:>10}", "Rank", "Player ID", "Name", "Period", spec.metric);
    for e in entries {
        println!("{:>4}  {:<12}  {:<24}  {:<10}  {:>10}", e.rank, e.player_id, e.name, e.period, e.value);
    }
}

fn output_rows(rows: &[FactRow], json: bool) -> Result<()> {
    if json {
        return print_json(rows);
    }
    println!(
        "{:<12}  {:<24}  {:<3}  {:>4}  {:<4}  {:>3}  {:>5}  {:>6}  {:>8}  {:>6}  {:>11}",
        "Player ID", "Name", "Pos", "Year", "Team", "G", "Att", "Yards", "SnapEff", "Y/A", "Consistency"
    );
    for r in rows {
        println!(
            "{:<12}  {:<24}  {:<3}  {:>4}  {:<4}  {:>3}  {:>5}  {:>6}  {:>8}  {:>6}  {:>11}",
            r.player_id,
            r.name,
            r.position,
            r.season_year,
            r.team.as_deref().unwrap_or("-"),
            r.games,
            r.attempts,
            r.yards,
            fmt_metric(r.snap_efficiency, metrics_engine::SNAP_EFFICIENCY_PLACES),
            fmt_metric(r.yards_per_attempt, metrics_engine::SCORE_PLACES),
            fmt_metric(r.consistency_score, metrics_engine::SCORE_PLACES),
        );
    }
    Ok(())
}

fn fmt_metric(value: Option<f64>, places: u32) -> String {
    match value {
        Some(v) => format!("{:.*}", places as usize, metrics_engine::round_to(v, places)),
        None => "-".to_string(),
    }
}
