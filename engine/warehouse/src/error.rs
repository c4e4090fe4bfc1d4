//! Error types for the warehouse

use thiserror::Error;

/// Result type alias for warehouse operations
pub type Result<T> = std::result::Result<T, WarehouseError>;

/// Errors that can occur while reading or writing the warehouse
#[derive(Error, Debug)]
pub enum WarehouseError {
    /// Driver, connection or constraint failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Fact row written for a player missing from the dimension table
    #[error("Unknown player {player_id} for season {season_year}")]
    UnknownPlayer { player_id: String, season_year: i32 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record rejected before reaching the database
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl WarehouseError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Whether this error only concerns the one record being written
    pub fn is_record_level(&self) -> bool {
        match self {
            WarehouseError::UnknownPlayer { .. } | WarehouseError::InvalidRecord(_) => true,
            WarehouseError::Database(sqlx::Error::Database(db)) => {
                db.is_check_violation() || db.is_foreign_key_violation()
            }
            WarehouseError::Database(_) | WarehouseError::Config(_) => false,
        }
    }
}
