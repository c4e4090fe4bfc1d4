use thiserror::Error;

pub type Result<T> = std::result::Result<T, LeaderboardError>;

#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Warehouse(#[from] warehouse::WarehouseError),

    #[error("Unknown metric {0:?} (expected snap-efficiency or consistency)")]
    UnknownMetric(String),

    #[error("Unknown window {0:?} (expected 1yr, 5yr or career)")]
    UnknownWindow(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
