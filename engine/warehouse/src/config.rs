//! Configuration for the warehouse connection

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite://nfl_stats.db` or `sqlite::memory:`
    pub url: String,

    /// Connection pool size. In-memory databases always use a single connection.
    pub max_connections: u32,

    /// How long to wait for a pooled connection, in seconds
    pub acquire_timeout_secs: u64,

    /// How long a connection waits on another connection's write lock, in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://nfl_stats.db".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    /// Create a configuration for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Default::default() }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Every connection to `:memory:` opens its own database
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Pool size actually used
    pub fn effective_max_connections(&self) -> u32 {
        if self.is_in_memory() {
            1
        } else {
            self.max_connections.max(1)
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("database.url must not be empty".to_string());
        }
        if self.max_connections == 0 {
            return Err("database.max_connections must be greater than 0".to_string());
        }
        Ok(())
    }
}
