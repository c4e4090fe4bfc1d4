use serde::{Deserialize, Serialize};
use stat_ingest::Position;
use std::collections::HashMap;

/// Configuration for the metric calculator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Estimated snaps per game by position code. Positions without an entry
    /// get no snap estimate and no snap efficiency.
    pub snaps_per_game: HashMap<String, u32>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let mut baselines = HashMap::new();
        baselines.insert("QB".to_string(), 60);
        baselines.insert("WR".to_string(), 50);

        Self { snaps_per_game: baselines }
    }
}

impl MetricsConfig {
    /// Snaps-per-game baseline for a position. Keys match case-insensitively
    /// since layered config sources may lowercase them.
    pub fn baseline_for(&self, position: Position) -> Option<u32> {
        self.snaps_per_game
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(position.code()))
            .map(|(_, baseline)| *baseline)
            .filter(|b| *b > 0)
    }
}
