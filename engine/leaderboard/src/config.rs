//! # Configuration
//!
//! Span bounds and leaderboard length.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// First season of the multi-year span (inclusive)
    pub span_start: i32,
    /// Last season of the multi-year span (inclusive)
    pub span_end: i32,
    /// Entries kept per leaderboard
    pub top_n: u32,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self { span_start: 2019, span_end: 2023, top_n: 30 }
    }
}

impl LeaderboardConfig {
    /// Period label of the span window, e.g. `2019-2023`
    pub fn span_label(&self) -> String {
        format!("{}-{}", self.span_start, self.span_end)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.span_start > self.span_end {
            return Err(format!(
                "leaderboard span is inverted: {} > {}",
                self.span_start, self.span_end
            ));
        }
        if self.top_n == 0 {
            return Err("leaderboard top_n must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_label_and_validation() {
        let config = LeaderboardConfig::default();
        assert_eq!(config.span_label(), "2019-2023");
        assert!(config.validate().is_ok());

        let inverted = LeaderboardConfig { span_start: 2024, span_end: 2019, ..Default::default() };
        assert!(inverted.validate().is_err());
        let empty = LeaderboardConfig { top_n: 0, ..Default::default() };
        assert!(empty.validate().is_err());
    }
}
