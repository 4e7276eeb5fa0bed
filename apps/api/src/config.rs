use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::jobs::scheduler::SchedulerConfig;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// External scoring model service. Heuristic adjustments when unset.
    pub model_service_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub max_concurrent_jobs: usize,
    pub job_timeout_secs: u64,
    pub job_max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_backoff_multiplier: f64,
    pub retry_max_delay_secs: u64,
    pub dispatch_interval_ms: u64,
    pub progress_interval_ms: u64,
    pub batch_chunk_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            model_service_url: std::env::var("MODEL_SERVICE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_concurrent_jobs: env_or("MAX_CONCURRENT_JOBS", 3)?,
            job_timeout_secs: env_or("JOB_TIMEOUT_SECS", 300)?,
            job_max_retries: env_or("JOB_MAX_RETRIES", 3)?,
            retry_base_delay_ms: env_or("RETRY_BASE_DELAY_MS", 1000)?,
            retry_backoff_multiplier: env_or("RETRY_BACKOFF_MULTIPLIER", 2.0)?,
            retry_max_delay_secs: env_or("RETRY_MAX_DELAY_SECS", 300)?,
            dispatch_interval_ms: env_or("DISPATCH_INTERVAL_MS", 1000)?,
            progress_interval_ms: env_or("PROGRESS_INTERVAL_MS", 5000)?,
            batch_chunk_size: env_or("BATCH_CHUNK_SIZE", 500)?,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent_jobs: self.max_concurrent_jobs.max(1),
            default_timeout: Duration::from_secs(self.job_timeout_secs),
            default_max_retries: self.job_max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            retry_backoff_multiplier: self.retry_backoff_multiplier,
            retry_max_delay: Duration::from_secs(self.retry_max_delay_secs),
            dispatch_interval: Duration::from_millis(self.dispatch_interval_ms.max(1)),
            progress_interval: Duration::from_millis(self.progress_interval_ms.max(1)),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
