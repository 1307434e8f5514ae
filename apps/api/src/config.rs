use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Built once in `main` and handed to each component; there is no global copy.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    /// Base used to build public object URLs. Defaults to `s3_endpoint`.
    pub s3_public_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub generation_service_url: String,
    pub data_service_url: String,
    pub score_service_url: String,
    pub pay_notify_secret: String,
    pub scoring_rules_path: Option<PathBuf>,
    pub id_node: u16,
    pub port: u16,
    pub rust_log: String,
    pub tasks: TaskSettings,
}

/// Timing knobs for the asynchronous flows.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub poll_interval: Duration,
    pub deadline: Duration,
    pub record_ttl: Duration,
    pub stream_upstream_timeout: Duration,
    pub notify_claim_ttl: Duration,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(20),
            deadline: Duration::from_secs(30 * 60),
            record_ttl: Duration::from_secs(12 * 60 * 60),
            stream_upstream_timeout: Duration::from_secs(60),
            notify_claim_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3_endpoint = require_env("S3_ENDPOINT")?;
        let defaults = TaskSettings::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_public_url: std::env::var("S3_PUBLIC_URL").unwrap_or_else(|_| s3_endpoint.clone()),
            s3_endpoint,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            generation_service_url: require_env("GENERATION_SERVICE_URL")?,
            data_service_url: require_env("DATA_SERVICE_URL")?,
            score_service_url: require_env("SCORE_SERVICE_URL")?,
            pay_notify_secret: require_env("PAY_NOTIFY_SECRET")?,
            scoring_rules_path: std::env::var("SCORING_RULES_PATH").ok().map(PathBuf::from),
            id_node: parse_env("ID_NODE", 1)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            tasks: TaskSettings {
                poll_interval: secs_env("TASK_POLL_INTERVAL_SECS", defaults.poll_interval)?,
                deadline: secs_env("TASK_DEADLINE_SECS", defaults.deadline)?,
                record_ttl: secs_env("TASK_RECORD_TTL_SECS", defaults.record_ttl)?,
                stream_upstream_timeout: secs_env(
                    "STREAM_UPSTREAM_TIMEOUT_SECS",
                    defaults.stream_upstream_timeout,
                )?,
                notify_claim_ttl: secs_env("NOTIFY_CLAIM_TTL_SECS", defaults.notify_claim_ttl)?,
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn secs_env(key: &str, default: Duration) -> Result<Duration> {
    parse_env(key, default.as_secs()).map(Duration::from_secs)
}
