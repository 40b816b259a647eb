//! Environment-based service configuration, read once at startup.

use std::time::Duration;

/// Runtime configuration for the worker service.
///
/// Environment variables:
/// - `WORKER_CONCURRENCY`: number of worker tasks (default: 4)
/// - `QUEUE_CAPACITY`: bounded work queue depth (default: 32)
/// - `RENDER_CMD`: base command line for the local render CLI
/// - `CONVERSION_FALLBACK`: enable the secondary backend on primary failure
/// - `RETRY_ON_TIMEOUT`: treat a backend timeout as retryable
/// - `REMOTE_API_URL` / `REMOTE_API_KEY`: secondary conversion API
/// - `WORKER_TIMEOUT`: per-attempt budget in seconds (default: 90)
#[derive(Debug, Clone)]
pub struct Config {
    pub worker_concurrency: usize,
    pub queue_capacity: usize,
    pub render_cmd: String,
    pub conversion_fallback: bool,
    pub retry_on_timeout: bool,
    pub remote_api_url: String,
    pub remote_api_key: String,
    pub worker_timeout: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            worker_concurrency: env_parse("WORKER_CONCURRENCY", 4),
            queue_capacity: env_parse("QUEUE_CAPACITY", 32),
            render_cmd: std::env::var("RENDER_CMD")
                .unwrap_or_else(|_| "htmlrender -S -T 120".to_string()),
            conversion_fallback: env_flag("CONVERSION_FALLBACK"),
            retry_on_timeout: env_flag("RETRY_ON_TIMEOUT"),
            remote_api_url: std::env::var("REMOTE_API_URL").unwrap_or_default(),
            remote_api_key: std::env::var("REMOTE_API_KEY").unwrap_or_default(),
            worker_timeout: env_parse("WORKER_TIMEOUT", 90),
        }
    }

    /// Deadline handed to the remote backend: the worker budget plus a small
    /// grace period, so the remote service hits its own timeout first.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout + 5)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(env_parse("RENDERMILL_TEST_UNSET_NUM", 7usize), 7);
        assert!(!env_flag("RENDERMILL_TEST_UNSET_FLAG"));
    }

    #[test]
    fn remote_timeout_adds_grace_period() {
        let config = Config {
            worker_concurrency: 4,
            queue_capacity: 32,
            render_cmd: "htmlrender".into(),
            conversion_fallback: true,
            retry_on_timeout: false,
            remote_api_url: String::new(),
            remote_api_key: String::new(),
            worker_timeout: 90,
        };
        assert_eq!(config.remote_timeout(), Duration::from_secs(95));
    }
}
