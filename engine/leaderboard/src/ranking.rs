//! # Native ranking
//!
//! Computes the same leaderboards as the SQL views straight from fact rows:
//! select the window, average per player where needed, sort, then assign
//! competition ranks in one pass.

use crate::config::LeaderboardConfig;
use crate::models::{LeaderboardEntry, TimeWindow, ViewSpec};
use metrics_engine::round_to;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use warehouse::FactRow;

/// A player's unrounded score within one window
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub player_id: String,
    pub name: String,
    pub value: f64,
}

/// Build one leaderboard from the full fact table
pub fn generate(rows: &[FactRow], spec: ViewSpec, config: &LeaderboardConfig) -> Vec<LeaderboardEntry> {
    // Latest season is taken across every position
    let Some(latest) = rows.iter().map(|r| r.season_year).max() else {
        return Vec::new();
    };

    let position = spec.position.code();
    let candidates = rows.iter().filter(|r| r.position == position);

    let (period, scored) = match spec.window {
        TimeWindow::LatestSeason => {
            let scored = candidates
                .filter(|r| r.season_year == latest)
                .filter_map(|r| {
                    spec.metric.value(r).map(|value| Scored {
                        player_id: r.player_id.clone(),
                        name: r.name.clone(),
                        value,
                    })
                })
                .collect();
            (latest.to_string(), scored)
        }
        TimeWindow::Span => {
            let (start, end) = (config.span_start, config.span_end);
            let in_span = candidates.filter(|r| (start..=end).contains(&r.season_year));
            (config.span_label(), average_by_player(in_span, spec))
        }
        TimeWindow::Career => ("Career".to_string(), average_by_player(candidates, spec)),
    };

    rank(scored, &period, spec.metric.places(), config.top_n as usize)
}

/// Mean of the player's non-null values in the window
fn average_by_player<'a>(rows: impl Iterator<Item = &'a FactRow>, spec: ViewSpec) -> Vec<Scored> {
    let mut sums: BTreeMap<&str, (&str, f64, u32)> = BTreeMap::new();
    for row in rows {
        let Some(value) = spec.metric.value(row) else {
            continue;
        };
        let entry = sums.entry(row.player_id.as_str()).or_insert((row.name.as_str(), 0.0, 0));
        entry.1 += value;
        entry.2 += 1;
    }

    sums.into_iter()
        .map(|(player_id, (name, sum, count))| Scored {
            player_id: player_id.to_string(),
            name: name.to_string(),
            value: sum / count as f64,
        })
        .collect()
}

/// Sort descending by value (player id breaks ties) and assign competition
/// ranks: tied values share a rank and the next value skips past the group.
pub fn rank(mut scored: Vec<Scored>, period: &str, places: u32, top_n: usize) -> Vec<LeaderboardEntry> {
    scored.sort_by(|a, b| match b.value.total_cmp(&a.value) {
        Ordering::Equal => a.player_id.cmp(&b.player_id),
        other => other,
    });

    let mut entries = Vec::with_capacity(scored.len().min(top_n));
    let mut current_rank = 0i64;
    let mut previous: Option<f64> = None;

    for (index, s) in scored.into_iter().enumerate() {
        if index >= top_n {
            break;
        }
        if previous != Some(s.value) {
            current_rank = index as i64 + 1;
            previous = Some(s.value);
        }
        entries.push(LeaderboardEntry {
            player_id: s.player_id,
            name: s.name,
            period: period.to_string(),
            value: round_to(s.value, places),
            rank: current_rank,
        });
    }

    entries
}
