use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported player positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "QB")]
    Quarterback,

    #[serde(rename = "WR")]
    WideReceiver,
}

impl Position {
    pub const ALL: [Position; 2] = [Position::Quarterback, Position::WideReceiver];

    /// Short code as stored in `dim_players.position`
    pub fn code(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::WideReceiver => "WR",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Position {
    type Err = IngestError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QB" => Ok(Position::Quarterback),
            "WR" => Ok(Position::WideReceiver),
            other => Err(IngestError::UnsupportedPosition {
                player_id: String::new(),
                position: other.to_string(),
            }),
        }
    }
}

/// Raw weekly row as delivered by the upstream feed.
///
/// Numeric columns arrive as floats or nulls depending on the export, so they are
/// kept optional here and treated as zero when absent.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct WeeklyStatRow {
    pub player_id: String,

    #[serde(default)]
    pub player_name: Option<String>,

    pub position: String,

    #[serde(default)]
    pub recent_team: Option<String>,

    pub season: i32,

    pub week: u32,

    #[serde(default)]
    pub attempts: Option<f64>,

    #[serde(default)]
    pub completions: Option<f64>,

    #[serde(default)]
    pub passing_yards: Option<f64>,

    #[serde(default)]
    pub passing_tds: Option<f64>,

    #[serde(default)]
    pub interceptions: Option<f64>,

    #[serde(default)]
    pub targets: Option<f64>,

    #[serde(default)]
    pub receptions: Option<f64>,

    #[serde(default)]
    pub receiving_yards: Option<f64>,

    #[serde(default)]
    pub receiving_tds: Option<f64>,
}

/// Player dimension record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub draft_year: Option<i32>,
    pub height: Option<i32>,
    pub weight: Option<i32>,
    pub current_team: Option<String>,
}

impl Player {
    /// Create a player with only the identity attributes filled in
    pub fn new(
        player_id: impl Into<String>,
        name: impl Into<String>,
        position: Position,
    ) -> Result<Self, IngestError> {
        let player_id = player_id.into();
        if player_id.trim().is_empty() {
            return Err(IngestError::EmptyPlayerId);
        }
        Ok(Self {
            player_id,
            name: name.into(),
            position,
            draft_year: None,
            height: None,
            weight: None,
            current_team: None,
        })
    }

    pub fn with_team(mut self, team: Option<String>) -> Self {
        self.current_team = team;
        self
    }
}

/// One player's counting stats for one season, aggregated from weekly rows.
///
/// For quarterbacks the volume columns are passing totals. For wide receivers
/// `attempts` holds targets, `completions` receptions, and `ints` is always 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonLine {
    pub player_id: String,
    pub name: String,
    pub position: Position,
    pub team: Option<String>,
    pub season_year: i32,
    pub games: u32,
    pub attempts: i64,
    pub completions: i64,
    pub yards: i64,
    pub tds: i64,
    pub ints: i64,

    /// Position yards per game played, ordered by week
    pub weekly_yards: Vec<f64>,
}
