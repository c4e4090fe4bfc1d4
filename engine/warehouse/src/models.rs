use serde::Serialize;
use sqlx::FromRow;
use stat_ingest::Position;

/// One fact row joined with its player's dimension record
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct FactRow {
    pub player_id: String,
    pub name: String,
    pub position: String,
    pub season_year: i32,
    pub team: Option<String>,
    pub games: i64,
    pub snaps: Option<i64>,
    pub attempts: i64,
    pub completions: i64,
    pub yards: i64,
    pub tds: i64,
    pub ints: i64,
    pub snap_efficiency: Option<f64>,
    pub yards_per_attempt: Option<f64>,
    pub weekly_cv: Option<f64>,
    pub consistency_score: Option<f64>,
}

impl FactRow {
    /// Parsed position; `None` only if the row bypassed the schema check
    pub fn position(&self) -> Option<Position> {
        self.position.parse().ok()
    }
}

/// Stored player dimension record
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PlayerRecord {
    pub player_id: String,
    pub name: String,
    pub position: String,
    pub draft_year: Option<i32>,
    pub height: Option<i32>,
    pub weight: Option<i32>,
    pub current_team: Option<String>,
    pub created_at: String,
}

/// How a dimension write was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionWrite {
    Inserted,
    Unchanged,
    Refreshed,
}

/// Row counts removed by a truncate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TruncateReport {
    pub facts: u64,
    pub players: u64,
}
