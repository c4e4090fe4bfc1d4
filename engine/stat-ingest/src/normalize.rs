//! Weekly rows to season lines.
//!
//! Rows are grouped by `(player_id, season)`. Identity fields, position
//! included, come from the earliest week; rows listing another position for the
//! same season are rejected. Counting stats are summed, and the per-week position
//! yards are kept in week order for the consistency metric.

use crate::config::QualificationThresholds;
use crate::error::IngestError;
use crate::models::{Player, Position, SeasonLine, WeeklyStatRow};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Counters describing what happened to one batch of rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows_seen: usize,
    pub unsupported_position: usize,
    pub missing_name: usize,
    pub malformed: usize,
    pub position_conflicts: usize,
    pub seasons_built: usize,
    pub seasons_unqualified: usize,
}

impl NormalizeReport {
    /// Fold another report into this one
    pub fn merge(&mut self, other: &NormalizeReport) {
        self.rows_seen += other.rows_seen;
        self.unsupported_position += other.unsupported_position;
        self.missing_name += other.missing_name;
        self.malformed += other.malformed;
        self.position_conflicts += other.position_conflicts;
        self.seasons_built += other.seasons_built;
        self.seasons_unqualified += other.seasons_unqualified;
    }

    pub fn rejected(&self) -> usize {
        self.unsupported_position + self.missing_name + self.malformed + self.position_conflicts
    }
}

/// Output of [`normalize`]
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// One record per player with at least one qualifying season, by player id
    pub players: Vec<Player>,

    /// Qualifying season lines, ordered by player id then season
    pub seasons: Vec<SeasonLine>,

    pub report: NormalizeReport,
}

/// Decode raw JSON rows one at a time so a bad record only costs itself
pub fn decode_rows(raw: Vec<Value>) -> (Vec<WeeklyStatRow>, Vec<IngestError>) {
    let mut rows = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();

    for (index, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<WeeklyStatRow>(value) {
            Ok(row) if row.player_id.trim().is_empty() => {
                errors.push(IngestError::MalformedRow {
                    index,
                    message: IngestError::EmptyPlayerId.to_string(),
                });
            }
            Ok(row) => rows.push(row),
            Err(e) => errors.push(IngestError::MalformedRow { index, message: e.to_string() }),
        }
    }

    (rows, errors)
}

#[derive(Default)]
struct Accumulator {
    name: String,
    position: Option<Position>,
    team: Option<String>,
    first_week: Option<u32>,
    weeks: BTreeSet<u32>,
    attempts: f64,
    completions: f64,
    yards: f64,
    tds: f64,
    ints: f64,
    weekly: BTreeMap<u32, f64>,
}

impl Accumulator {
    fn add(&mut self, position: Position, name: &str, row: &WeeklyStatRow) {
        let earlier = self.first_week.map_or(true, |first| row.week < first);
        if earlier {
            self.first_week = Some(row.week);
            self.name = name.to_string();
            self.position = Some(position);
            self.team = row.recent_team.clone();
        }
        self.weeks.insert(row.week);

        let (attempts, completions, yards, tds, ints) = match position {
            Position::Quarterback => (
                row.attempts,
                row.completions,
                row.passing_yards,
                row.passing_tds,
                row.interceptions,
            ),
            Position::WideReceiver => {
                (row.targets, row.receptions, row.receiving_yards, row.receiving_tds, None)
            }
        };
        let yards = value(yards);

        self.attempts += value(attempts);
        self.completions += value(completions);
        self.yards += yards;
        self.tds += value(tds);
        self.ints += value(ints);
        *self.weekly.entry(row.week).or_insert(0.0) += yards;
    }

    fn finish(self, player_id: String, season_year: i32) -> Option<SeasonLine> {
        let position = self.position?;
        Some(SeasonLine {
            player_id,
            name: self.name,
            position,
            team: self.team,
            season_year,
            games: self.weeks.len() as u32,
            attempts: count(self.attempts),
            completions: count(self.completions),
            yards: count(self.yards),
            tds: count(self.tds),
            ints: count(self.ints),
            weekly_yards: self.weekly.into_values().collect(),
        })
    }
}

fn value(raw: Option<f64>) -> f64 {
    raw.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn count(total: f64) -> i64 {
    total.round() as i64
}

fn qualifies(line: &SeasonLine, thresholds: &QualificationThresholds) -> bool {
    match line.position {
        Position::Quarterback => line.attempts >= thresholds.qb_min_attempts,
        Position::WideReceiver => line.attempts >= thresholds.wr_min_targets,
    }
}

/// Group weekly rows into qualifying season lines plus their player records
pub fn normalize(rows: Vec<WeeklyStatRow>, thresholds: &QualificationThresholds) -> NormalizedBatch {
    let mut report = NormalizeReport { rows_seen: rows.len(), ..Default::default() };
    let mut groups: BTreeMap<(&str, i32), Vec<(Position, &str, &WeeklyStatRow)>> = BTreeMap::new();

    for row in &rows {
        let position = match row.position.parse::<Position>() {
            Ok(position) => position,
            Err(_) => {
                report.unsupported_position += 1;
                continue;
            }
        };
        let name = match row.player_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                debug!("Dropping row without a name for player {}", row.player_id);
                report.missing_name += 1;
                continue;
            }
        };

        groups.entry((row.player_id.as_str(), row.season)).or_default().push((position, name, row));
    }

    let mut seasons = Vec::with_capacity(groups.len());
    for ((player_id, season_year), mut weeks) in groups {
        weeks.sort_by_key(|(_, _, row)| row.week);
        let season_position = weeks[0].0;

        let mut acc = Accumulator::default();
        for (position, name, row) in weeks {
            if position != season_position {
                debug!(
                    "Dropping week {} of {} {}: listed as {} after {}",
                    row.week, player_id, season_year, position, season_position
                );
                report.position_conflicts += 1;
                continue;
            }
            acc.add(position, name, row);
        }

        let Some(line) = acc.finish(player_id.to_string(), season_year) else {
            continue;
        };
        if qualifies(&line, thresholds) {
            seasons.push(line);
        } else {
            report.seasons_unqualified += 1;
        }
    }
    report.seasons_built = seasons.len();

    // Seasons are sorted by (player_id, season_year), so the last line seen for a
    // player is their latest season.
    let mut latest: BTreeMap<&str, &SeasonLine> = BTreeMap::new();
    for line in &seasons {
        latest.insert(line.player_id.as_str(), line);
    }
    let players = latest
        .into_values()
        .filter_map(|line| {
            Player::new(line.player_id.clone(), line.name.clone(), line.position)
                .ok()
                .map(|player| player.with_team(line.team.clone()))
        })
        .collect();

    NormalizedBatch { players, seasons, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn qb_week(id: &str, season: i32, week: u32, attempts: f64, yards: f64) -> WeeklyStatRow {
        WeeklyStatRow {
            player_id: id.to_string(),
            player_name: Some(format!("{id}-name")),
            position: "QB".to_string(),
            recent_team: Some(format!("T{week}")),
            season,
            week,
            attempts: Some(attempts),
            completions: Some(attempts * 0.6),
            passing_yards: Some(yards),
            passing_tds: Some(2.0),
            interceptions: Some(1.0),
            ..Default::default()
        }
    }

    fn wr_week(id: &str, season: i32, week: u32, targets: f64, yards: f64) -> WeeklyStatRow {
        WeeklyStatRow {
            player_id: id.to_string(),
            player_name: Some(format!("{id}-name")),
            position: "WR".to_string(),
            recent_team: Some("MIA".to_string()),
            season,
            week,
            targets: Some(targets),
            receptions: Some(targets / 2.0),
            receiving_yards: Some(yards),
            receiving_tds: Some(1.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_rows_skips_malformed() {
        let raw = vec![
            json!({"player_id": "a", "player_name": "A", "position": "QB", "season": 2021, "week": 1}),
            json!({"player_id": "b", "position": "QB", "season": "not-a-year", "week": 1}),
            json!({"player_id": " ", "position": "WR", "season": 2021, "week": 1}),
            json!(42),
        ];
        let (rows, errors) = decode_rows(raw);
        assert_eq!(rows.len(), 1);
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], IngestError::MalformedRow { index: 1, .. }));
        assert!(matches!(errors[2], IngestError::MalformedRow { index: 3, .. }));
    }

    #[test]
    fn test_qb_season_aggregation() {
        // Weeks delivered out of order; identity comes from week 1
        let rows = vec![
            qb_week("qb1", 2022, 3, 40.0, 300.0),
            qb_week("qb1", 2022, 1, 35.0, 250.0),
            qb_week("qb1", 2022, 2, 45.0, 320.0),
            qb_week("qb1", 2022, 4, 90.0, 410.0),
        ];
        let batch = normalize(rows, &QualificationThresholds::default());

        assert_eq!(batch.seasons.len(), 1);
        let line = &batch.seasons[0];
        assert_eq!(line.games, 4);
        assert_eq!(line.attempts, 210);
        assert_eq!(line.yards, 1280);
        assert_eq!(line.tds, 8);
        assert_eq!(line.ints, 4);
        assert_eq!(line.team.as_deref(), Some("T1"));
        assert_eq!(line.weekly_yards, vec![250.0, 320.0, 300.0, 410.0]);
        assert_eq!(batch.report.seasons_built, 1);
    }

    #[test]
    fn test_wr_uses_receiving_columns() {
        let rows: Vec<_> = (1..=5).map(|w| wr_week("wr1", 2021, w, 10.0, 60.0 + w as f64)).collect();
        let batch = normalize(rows, &QualificationThresholds::default());

        let line = &batch.seasons[0];
        assert_eq!(line.position, Position::WideReceiver);
        assert_eq!(line.attempts, 50);
        assert_eq!(line.completions, 25);
        assert_eq!(line.yards, 315);
        assert_eq!(line.ints, 0);
        assert_eq!(line.weekly_yards.len(), 5);
    }

    #[test]
    fn test_thresholds_filter_seasons() {
        let mut rows = vec![wr_week("low", 2021, 1, 39.0, 100.0)];
        rows.push(wr_week("edge", 2021, 1, 40.0, 100.0));
        rows.push(qb_week("backup", 2021, 1, 199.0, 900.0));

        let batch = normalize(rows, &QualificationThresholds::default());
        let ids: Vec<_> = batch.seasons.iter().map(|s| s.player_id.as_str()).collect();
        assert_eq!(ids, vec!["edge"]);
        assert_eq!(batch.report.seasons_unqualified, 2);
        assert_eq!(batch.players.len(), 1);
    }

    #[test]
    fn test_rejects_unsupported_and_unnamed_rows() {
        let mut rb = qb_week("rb1", 2021, 1, 300.0, 10.0);
        rb.position = "RB".to_string();
        let mut unnamed = qb_week("qb2", 2021, 1, 300.0, 10.0);
        unnamed.player_name = Some("   ".to_string());

        let batch = normalize(vec![rb, unnamed], &QualificationThresholds::default());
        assert!(batch.seasons.is_empty());
        assert_eq!(batch.report.rows_seen, 2);
        assert_eq!(batch.report.unsupported_position, 1);
        assert_eq!(batch.report.missing_name, 1);
        assert_eq!(batch.report.rejected(), 2);
    }

    #[test]
    fn test_position_comes_from_earliest_week() {
        let rows = vec![
            qb_week("hybrid", 2021, 4, 250.0, 1500.0),
            wr_week("hybrid", 2021, 3, 9.0, 120.0),
            qb_week("hybrid", 2021, 2, 250.0, 1500.0),
        ];

        let batch = normalize(rows, &QualificationThresholds::default());
        let line = &batch.seasons[0];
        assert_eq!(line.position, Position::Quarterback);
        assert_eq!(line.games, 2);
        assert_eq!(line.attempts, 500);
        assert_eq!(line.yards, 3000);
        assert_eq!(line.weekly_yards, vec![1500.0, 1500.0]);
        assert_eq!(batch.report.position_conflicts, 1);
        assert_eq!(batch.report.rejected(), 1);
    }

    #[test]
    fn test_current_team_is_latest_season() {
        let mut early = qb_week("qb1", 2020, 1, 250.0, 3000.0);
        early.recent_team = Some("OLD".to_string());
        let mut late = qb_week("qb1", 2023, 1, 250.0, 3000.0);
        late.recent_team = Some("NEW".to_string());

        let batch = normalize(vec![late, early], &QualificationThresholds::default());
        assert_eq!(batch.seasons.len(), 2);
        assert_eq!(batch.seasons[0].season_year, 2020);
        assert_eq!(batch.players.len(), 1);
        assert_eq!(batch.players[0].current_team.as_deref(), Some("NEW"));
    }
}
