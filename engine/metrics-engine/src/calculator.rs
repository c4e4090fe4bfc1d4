use crate::config::MetricsConfig;
use crate::models::*;
use stat_ingest::{Position, SeasonLine};
use tracing::debug;

/// Decimal places used when snap efficiency is presented
pub const SNAP_EFFICIENCY_PLACES: u32 = 4;

/// Decimal places used when consistency and yards per attempt are presented
pub const SCORE_PLACES: u32 = 2;

/// Computes the derived metrics of a season line
#[derive(Debug, Clone, Default)]
pub struct MetricCalculator {
    config: MetricsConfig,
}

impl MetricCalculator {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Estimated snaps for a season: games x position baseline
    pub fn estimated_snaps(&self, games: u32, position: Position) -> Option<i64> {
        self.config.baseline_for(position).map(|baseline| games as i64 * baseline as i64)
    }

    /// Yards per estimated snap. Undefined with no games or no baseline.
    pub fn snap_efficiency(&self, yards: i64, games: u32, position: Position) -> Option<f64> {
        if games == 0 {
            return None;
        }
        let snaps = self.estimated_snaps(games, position)?;
        Some(yards as f64 / snaps as f64)
    }

    /// Build the fact row for one season
    pub fn compute(&self, line: SeasonLine) -> SeasonFact {
        let consistency = consistency(&line.weekly_yards);
        let metrics = SeasonMetrics {
            snap_efficiency: self.snap_efficiency(line.yards, line.games, line.position),
            yards_per_attempt: yards_per_attempt(line.yards, line.attempts),
            weekly_cv: consistency.map(|c| c.cv),
            consistency_score: consistency.map(|c| c.score),
        };
        let snaps = self.estimated_snaps(line.games, line.position);

        debug!(
            "Computed metrics for {} {}: snap_eff={:?} ypa={:?} consistency={:?}",
            line.player_id,
            line.season_year,
            metrics.snap_efficiency,
            metrics.yards_per_attempt,
            metrics.consistency_score
        );

        SeasonFact::new(line, snaps, metrics)
    }
}

/// Total yards over total attempts
pub fn yards_per_attempt(yards: i64, attempts: i64) -> Option<f64> {
    if attempts == 0 {
        return None;
    }
    Some(yards as f64 / attempts as f64)
}

/// Consistency of weekly production.
///
/// Uses the population standard deviation. Needs at least two weeks and a
/// non-zero mean.
pub fn consistency(weekly: &[f64]) -> Option<Consistency> {
    if weekly.len() < 2 {
        return None;
    }

    let n = weekly.len() as f64;
    let mean = weekly.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return None;
    }

    let variance = weekly.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let cv = variance.sqrt() / mean * 100.0;
    let score = (100.0 - cv).clamp(0.0, 100.0);

    Some(Consistency { score, cv })
}

/// Digits kept past the rounding position when expanding a value
const GUARD_DIGITS: usize = 30;

/// Round half away from zero to `places` decimals, judged on the value's
/// decimal expansion (as SQLite's `ROUND` does). `2.675` is stored just below
/// the half-way point, so it rounds to `2.67` at two places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    // Past 2^53 there are no fractional digits left to round
    if !value.is_finite() || (value * factor).abs() >= 9.0e15 {
        return value;
    }

    let expanded = format!("{:.*}", places as usize + GUARD_DIGITS, value.abs());
    let (kept, rest) = expanded.split_at(expanded.len() - GUARD_DIGITS);
    let Ok(mut scaled) = kept.replace('.', "").parse::<u64>() else {
        return value;
    };
    if rest.as_bytes()[0] >= b'5' {
        scaled += 1;
    }

    (scaled as f64 / factor).copysign(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(position: Position, games: u32, yards: i64, attempts: i64, weekly: Vec<f64>) -> SeasonLine {
        SeasonLine {
            player_id: "p1".to_string(),
            name: "Player One".to_string(),
            position,
            team: Some("BUF".to_string()),
            season_year: 2022,
            games,
            attempts,
            completions: attempts / 2,
            yards,
            tds: 10,
            ints: 3,
            weekly_yards: weekly,
        }
    }

    #[test]
    fn test_snap_efficiency_qb() {
        let calc = MetricCalculator::default();
        let value = calc.snap_efficiency(4000, 16, Position::Quarterback).unwrap();
        assert_eq!(round_to(value, SNAP_EFFICIENCY_PLACES), 4.1667);
    }

    #[test]
    fn test_snap_efficiency_zero_games_is_none() {
        let calc = MetricCalculator::default();
        assert_eq!(calc.snap_efficiency(500, 0, Position::WideReceiver), None);
        assert_eq!(calc.snap_efficiency(0, 0, Position::Quarterback), None);
        assert_eq!(calc.snap_efficiency(0, 1, Position::Quarterback), Some(0.0));
    }

    #[test]
    fn test_snap_efficiency_without_baseline() {
        let mut config = MetricsConfig::default();
        config.snaps_per_game.remove("WR");
        let calc = MetricCalculator::new(config);
        assert_eq!(calc.snap_efficiency(900, 15, Position::WideReceiver), None);
        assert_eq!(calc.estimated_snaps(15, Position::WideReceiver), None);
    }

    #[test]
    fn test_consistency_known_value() {
        let c = consistency(&[10.0, 12.0, 11.0, 13.0]).unwrap();
        assert_eq!(round_to(c.score, SCORE_PLACES), 90.28);
        assert!((c.cv - 9.7217).abs() < 1e-3);
    }

    #[test]
    fn test_consistency_undefined_inputs() {
        assert!(consistency(&[]).is_none());
        assert!(consistency(&[120.0]).is_none());
        assert!(consistency(&[0.0, 0.0, 0.0]).is_none());
        assert!(consistency(&[5.0, -5.0]).is_none());
    }

    #[test]
    fn test_consistency_is_bounded() {
        let flat = consistency(&[80.0, 80.0, 80.0]).unwrap();
        assert_eq!(flat.score, 100.0);
        assert_eq!(flat.cv, 0.0);

        // Spread larger than the mean drives the score to the floor
        let wild = consistency(&[0.0, 0.0, 0.0, 400.0]).unwrap();
        assert_eq!(wild.score, 0.0);

        // Negative mean gives a negative cv, clamped to the ceiling
        let negative = consistency(&[-10.0, -2.0]).unwrap();
        assert!(negative.cv < 0.0);
        assert_eq!(negative.score, 100.0);
    }

    #[test]
    fn test_yards_per_attempt() {
        assert_eq!(yards_per_attempt(0, 0), None);
        assert_eq!(round_to(yards_per_attempt(4000, 550).unwrap(), SCORE_PLACES), 7.27);
    }

    #[test]
    fn test_compute_fact() {
        let calc = MetricCalculator::default();
        let fact = calc.compute(line(
            Position::WideReceiver,
            4,
            46,
            30,
            vec![10.0, 12.0, 11.0, 13.0],
        ));

        assert_eq!(fact.snaps(), Some(200));
        let m = fact.metrics();
        assert_eq!(m.snap_efficiency, Some(0.23));
        assert!(m.yards_per_attempt.is_some());
        assert_eq!(m.consistency_score.map(|s| round_to(s, SCORE_PLACES)), Some(90.28));
        assert!(m.weekly_cv.is_some());
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let calc = MetricCalculator::default();
        let input = line(Position::Quarterback, 17, 4300, 600, vec![250.0, 310.0, 190.0]);
        assert_eq!(calc.compute(input.clone()), calc.compute(input));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(4.166_666, 4), 4.1667);
        assert_eq!(round_to(90.275, 1), 90.3);
        assert_eq!(round_to(-1.005, 0), -1.0);
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(1.005, 2), 1.0);
        assert_eq!(round_to(0.125, 2), 0.13);
        assert_eq!(round_to(-0.125, 2), -0.13);
        assert_eq!(round_to(-2.5, 0), -3.0);
        assert_eq!(round_to(7.0, 2), 7.0);
        assert!(round_to(f64::NAN, 2).is_nan());
    }
}
