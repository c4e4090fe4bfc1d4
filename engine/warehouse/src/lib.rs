//! # Warehouse
//!
//! Star-schema persistence for player seasons: the `dim_players` dimension and
//! the `fact_player_seasons` fact table, stored in SQLite through `sqlx`.
//!
//! ## Usage
//!
//! ```no_run
//! use warehouse::{DatabaseConfig, Warehouse};
//!
//! # async fn run() -> warehouse::Result<()> {
//! let warehouse = Warehouse::connect(&DatabaseConfig::new("sqlite://nfl_stats.db")).await?;
//! warehouse.migrate().await?;
//! println!("SQLite {}", warehouse.ping().await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod schema;
pub mod store;

pub use config::DatabaseConfig;
pub use error::{Result, WarehouseError};
pub use models::{DimensionWrite, FactRow, PlayerRecord, TruncateReport};
pub use store::Warehouse;

/// Re-exported so downstream crates share one pool type
pub use sqlx::SqlitePool;
