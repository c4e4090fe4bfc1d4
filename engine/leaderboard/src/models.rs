use crate::error::LeaderboardError;
use metrics_engine::{SCORE_PLACES, SNAP_EFFICIENCY_PLACES};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stat_ingest::Position;
use std::fmt;
use std::str::FromStr;

/// Ranked metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    SnapEfficiency,
    Consistency,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::SnapEfficiency, Metric::Consistency];

    /// Fact table column holding the metric
    pub fn column(&self) -> &'static str {
        match self {
            Metric::SnapEfficiency => "snap_efficiency",
            Metric::Consistency => "consistency_score",
        }
    }

    /// Name fragment used in view names
    pub fn slug(&self) -> &'static str {
        match self {
            Metric::SnapEfficiency => "snap_efficiency",
            Metric::Consistency => "consistency",
        }
    }

    /// Presentation precision
    pub fn places(&self) -> u32 {
        match self {
            Metric::SnapEfficiency => SNAP_EFFICIENCY_PLACES,
            Metric::Consistency => SCORE_PLACES,
        }
    }

    pub fn value(&self, row: &warehouse::FactRow) -> Option<f64> {
        match self {
            Metric::SnapEfficiency => row.snap_efficiency,
            Metric::Consistency => row.consistency_score,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::SnapEfficiency => f.write_str("snap-efficiency"),
            Metric::Consistency => f.write_str("consistency"),
        }
    }
}

impl FromStr for Metric {
    type Err = LeaderboardError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "snap-efficiency" | "snap" => Ok(Metric::SnapEfficiency),
            "consistency" | "consistency-score" => Ok(Metric::Consistency),
            _ => Err(LeaderboardError::UnknownMetric(raw.to_string())),
        }
    }
}

/// Which seasons a leaderboard covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    /// The most recent season present in the fact table
    LatestSeason,
    /// The configured multi-year span
    Span,
    /// Every stored season
    Career,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [TimeWindow::LatestSeason, TimeWindow::Span, TimeWindow::Career];

    /// Suffix of the view name. The span keeps `5yr` whatever years it is
    /// configured to cover, so dashboard queries survive a span change; the
    /// covered years are reported in each row's `period`.
    pub fn slug(&self) -> &'static str {
        match self {
            TimeWindow::LatestSeason => "1yr",
            TimeWindow::Span => "5yr",
            TimeWindow::Career => "career",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for TimeWindow {
    type Err = LeaderboardError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1yr" | "latest" | "season" => Ok(TimeWindow::LatestSeason),
            "5yr" | "span" => Ok(TimeWindow::Span),
            "career" | "all" => Ok(TimeWindow::Career),
            _ => Err(LeaderboardError::UnknownWindow(raw.to_string())),
        }
    }
}

/// One of the twelve leaderboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewSpec {
    pub position: Position,
    pub metric: Metric,
    pub window: TimeWindow,
}

impl ViewSpec {
    pub fn new(position: Position, metric: Metric, window: TimeWindow) -> Self {
        Self { position, metric, window }
    }

    /// Every position x metric x window combination
    pub fn all() -> Vec<ViewSpec> {
        let mut specs = Vec::with_capacity(12);
        for position in Position::ALL {
            for metric in Metric::ALL {
                for window in TimeWindow::ALL {
                    specs.push(ViewSpec::new(position, metric, window));
                }
            }
        }
        specs
    }

    /// e.g. `vw_leaderboard_qb_snap_efficiency_1yr`
    pub fn view_name(&self) -> String {
        format!(
            "vw_leaderboard_{}_{}_{}",
            self.position.code().to_ascii_lowercase(),
            self.metric.slug(),
            self.window.slug()
        )
    }
}

/// A ranked row of a leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub player_id: String,
    pub name: String,
    /// Season year, span label, or `Career`
    pub period: String,
    /// Rounded for presentation
    pub value: f64,
    pub rank: i64,
}
