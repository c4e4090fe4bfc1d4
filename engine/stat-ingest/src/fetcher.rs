use crate::config::{SourceConfig, SourceKind};
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Upstream feed of weekly player rows, one season per call.
///
/// Rows are returned undecoded so that one malformed record can be rejected on
/// its own instead of failing the whole season.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch_weekly(&self, season: i32) -> Result<Vec<Value>, FetchError>;

    /// Human readable origin, for logs
    fn describe(&self) -> String;
}

/// Build the configured source
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn StatsSource>, FetchError> {
    match config.kind {
        SourceKind::Http => Ok(Arc::new(HttpStatsSource::new(config)?)),
        SourceKind::File => Ok(Arc::new(FileStatsSource::new(config.fixture_dir.clone()))),
    }
}

/// JSON-over-HTTP feed
pub struct HttpStatsSource {
    client: Client,
    config: SourceConfig,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpStatsSource {
    pub fn new(config: &SourceConfig) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(config.timeout()).build().map_err(|source| {
            FetchError::Transport { url: config.url_template.clone(), source }
        })?;

        Ok(Self {
            client,
            config: config.clone(),
            min_interval: config.min_request_interval(),
            last_request: Mutex::new(None),
        })
    }

    /// Keep at least `min_interval` between request starts
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Rate limiting: sleeping for {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    async fn fetch_weekly(&self, season: i32) -> Result<Vec<Value>, FetchError> {
        self.throttle().await;

        let url = self.config.season_url(season);
        info!("Fetching weekly stats for season {} from: {}", season, url);
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, concat!("nfl-etl/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Transport { url: url.clone(), source })?;

        let status = response.status();
        debug!("{} answered {} in {:?}", url, status, started.elapsed());
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::Missing { season, origin: url });
        }
        if !status.is_success() {
            return Err(FetchError::Status { url, status: status.as_u16() });
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport { url: url.clone(), source })?;
        let rows = parse_payload(&body, &url)?;

        info!("Fetched {} weekly rows for season {}", rows.len(), season);
        Ok(rows)
    }

    fn describe(&self) -> String {
        self.config.url_template.clone()
    }
}

/// Reads `<dir>/<season>.json`
pub struct FileStatsSource {
    dir: PathBuf,
}

impl FileStatsSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn season_path(&self, season: i32) -> PathBuf {
        self.dir.join(format!("{season}.json"))
    }
}

#[async_trait]
impl StatsSource for FileStatsSource {
    async fn fetch_weekly(&self, season: i32) -> Result<Vec<Value>, FetchError> {
        let path = self.season_path(season);
        let origin = path.display().to_string();

        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::Missing { season, origin });
            }
            Err(source) => return Err(FetchError::Io { origin, source }),
        };

        let rows = parse_payload(&body, &origin)?;
        info!("Loaded {} weekly rows for season {} from {}", rows.len(), season, origin);
        Ok(rows)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Accepts either a bare array of rows or an object wrapping it under `data`
fn parse_payload(body: &str, origin: &str) -> Result<Vec<Value>, FetchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Decode { origin: origin.to_string(), message: e.to_string() })?;

    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(FetchError::Decode {
                origin: origin.to_string(),
                message: "expected an array of rows or an object with a `data` array".to_string(),
            }),
        },
        _ => Err(FetchError::Decode {
            origin: origin.to_string(),
            message: "expected an array of rows".to_string(),
        }),
    }
}
