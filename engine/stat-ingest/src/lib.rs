//! Stat Ingest
//!
//! Pulls weekly NFL player stats from an upstream feed and normalizes them into
//! per-season lines and player dimension records. Fetches are retried with
//! bounded exponential backoff, and a failing season never aborts the others.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod retry;

pub use config::{QualificationThresholds, RetryConfig, SourceConfig, SourceKind};
pub use error::{FetchError, IngestError};
pub use fetcher::{build_source, FileStatsSource, HttpStatsSource, StatsSource};
pub use models::*;
pub use normalize::{decode_rows, normalize, NormalizeReport, NormalizedBatch};
pub use retry::fetch_with_retry;
