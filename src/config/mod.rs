use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

use crate::analytics::sample::MAX_SPAN_DAYS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_server: ServerConfig,
    pub ingest: IngestConfig,
    pub sample: SampleConfig,
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Capacity of the ingest actor's message queue
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Start with the five fixed demo events
    pub seed_events: bool,
    /// Number of additional random events to generate at startup
    pub synthetic_events: usize,
    /// Random events are spread over the last `span_days` days
    pub span_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// HMAC secret for log viewer cursors; random per process when unset
    pub cursor_hmac_secret: Option<String>,
}

impl IngestConfig {
    const fn default_buffer_size() -> usize {
        10_000
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            ingest: IngestConfig {
                buffer_size: IngestConfig::default_buffer_size(),
            },
            sample: SampleConfig {
                seed_events: true,
                synthetic_events: 0,
                span_days: 7,
            },
            pagination: PaginationConfig {
                cursor_hmac_secret: None,
            },
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_span_days(value: &str) -> anyhow::Result<i64> {
    let days = value
        .trim()
        .parse::<i64>()
        .with_context(|| format!("SAMPLE_SPAN_DAYS must be a number of days, got '{value}'"))?;
    ensure!(
        (1..=MAX_SPAN_DAYS).contains(&days),
        "SAMPLE_SPAN_DAYS must be between 1 and {MAX_SPAN_DAYS}, got {days}"
    );
    Ok(days)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let api_host = std::env::var("API_HOST").unwrap_or(defaults.api_server.host);
        let api_port = match std::env::var("API_PORT") {
            Ok(v) => v
                .parse::<u16>()
                .with_context(|| format!("API_PORT must be a port number, got '{v}'"))?,
            Err(_) => defaults.api_server.port,
        };

        let buffer_size = std::env::var("INGEST_BUFFER_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or_else(IngestConfig::default_buffer_size);

        let seed_events = std::env::var("SEED_SAMPLE_EVENTS")
            .map(|v| parse_bool(&v))
            .unwrap_or(defaults.sample.seed_events);

        let synthetic_events = match std::env::var("SAMPLE_EVENT_COUNT") {
            Ok(v) => v
                .parse::<usize>()
                .with_context(|| format!("SAMPLE_EVENT_COUNT must be a count, got '{v}'"))?,
            Err(_) => defaults.sample.synthetic_events,
        };

        let span_days = match std::env::var("SAMPLE_SPAN_DAYS") {
            Ok(v) => parse_span_days(&v)?,
            Err(_) => defaults.sample.span_days,
        };

        let cursor_hmac_secret = std::env::var("CURSOR_HMAC_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        if cursor_hmac_secret.is_none() {
            tracing::warn!(
                "CURSOR_HMAC_SECRET not set, using a random key; log viewer cursors won't survive restarts"
            );
        }

        Ok(Config {
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            ingest: IngestConfig { buffer_size },
            sample: SampleConfig {
                seed_events,
                synthetic_events,
                span_days,
            },
            pagination: PaginationConfig { cursor_hmac_secret },
        })
    }
}
