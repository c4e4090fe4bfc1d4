//! Metrics Engine
//!
//! Pure functions turning a season's counting stats into snap efficiency, yards
//! per attempt, weekly coefficient of variation and a consistency score.

pub mod calculator;
pub mod config;
pub mod models;

pub use calculator::{
    consistency, round_to, yards_per_attempt, MetricCalculator, SCORE_PLACES,
    SNAP_EFFICIENCY_PLACES,
};
pub use config::MetricsConfig;
pub use models::*;
