use serde::Serialize;
use stat_ingest::{Position, SeasonLine};

/// Derived metrics for one player-season, at full precision.
///
/// `None` means the metric is undefined for the inputs (no games, no attempts,
/// too few weeks, zero mean), never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeasonMetrics {
    pub snap_efficiency: Option<f64>,
    pub yards_per_attempt: Option<f64>,

    /// Coefficient of variation of weekly yards, in percent
    pub weekly_cv: Option<f64>,

    pub consistency_score: Option<f64>,
}

/// Mean-relative spread of weekly production
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Consistency {
    /// 100 - cv, clamped to [0, 100]
    pub score: f64,

    /// Coefficient of variation, in percent
    pub cv: f64,
}

/// A fact row ready to be written.
///
/// Only [`crate::MetricCalculator::compute`] builds these, so the stored metrics
/// always agree with the counting stats they were derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonFact {
    line: SeasonLine,
    snaps: Option<i64>,
    metrics: SeasonMetrics,
}

impl SeasonFact {
    pub(crate) fn new(line: SeasonLine, snaps: Option<i64>, metrics: SeasonMetrics) -> Self {
        Self { line, snaps, metrics }
    }

    pub fn player_id(&self) -> &str {
        &self.line.player_id
    }

    pub fn season_year(&self) -> i32 {
        self.line.season_year
    }

    pub fn position(&self) -> Position {
        self.line.position
    }

    /// Counting stats the metrics were computed from
    pub fn line(&self) -> &SeasonLine {
        &self.line
    }

    /// Estimated snaps (games x position baseline)
    pub fn snaps(&self) -> Option<i64> {
        self.snaps
    }

    pub fn metrics(&self) -> &SeasonMetrics {
        &self.metrics
    }
}
