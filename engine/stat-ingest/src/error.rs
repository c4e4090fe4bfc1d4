//! Error types for upstream fetches and record normalization

use thiserror::Error;

/// Errors raised while fetching a season from the upstream feed
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network-level failure (timeout, connection reset, DNS)
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Payload was not the expected JSON shape
    #[error("malformed payload from {origin}: {message}")]
    Decode { origin: String, message: String },

    /// No data exists for the requested season
    #[error("no data for season {season} at {origin}")]
    Missing { season: i32, origin: String },

    /// Local read failure (file source)
    #[error("I/O error reading {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    /// Retries used up; carries the last underlying failure
    #[error("gave up on season {season} after {attempts} attempts: {last}")]
    Exhausted {
        season: i32,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Decode { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Missing { .. } | FetchError::Io { .. } | FetchError::Exhausted { .. } => {
                false
            }
        }
    }
}

/// Per-record rejections. These are reported and counted, never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("malformed row #{index}: {message}")]
    MalformedRow { index: usize, message: String },

    #[error("unsupported position {position:?} for player {player_id}")]
    UnsupportedPosition { player_id: String, position: String },

    #[error("row for player {player_id} has no name")]
    MissingName { player_id: String },

    #[error("player id must not be empty")]
    EmptyPlayerId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let throttled = FetchError::Status { url: "u".into(), status: 429 };
        let unavailable = FetchError::Status { url: "u".into(), status: 503 };
        let not_found = FetchError::Status { url: "u".into(), status: 404 };
        let decode = FetchError::Decode { origin: "u".into(), message: "eof".into() };
        let missing = FetchError::Missing { season: 2020, origin: "dir".into() };

        assert!(throttled.is_transient());
        assert!(unavailable.is_transient());
        assert!(!not_found.is_transient());
        assert!(decode.is_transient());
        assert!(!missing.is_transient());
    }
}
