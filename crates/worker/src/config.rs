use std::time::Duration;

/// Default delay between queue polls when the queue is empty.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default wall-clock limit for one task.
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 100_000;

/// Worker settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub poll_interval: Duration,
    pub task_timeout: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env var                   | Default  |
    /// |---------------------------|----------|
    /// | `DATABASE_URL`            | required |
    /// | `WORKER_POLL_INTERVAL_MS` | `1000`   |
    /// | `TASK_TIMEOUT_SECS`       | `100000` |
    pub fn from_env() -> Result<Self, std::env::VarError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            poll_interval: Duration::from_millis(env_u64(
                "WORKER_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )),
            task_timeout: Duration::from_secs(env_u64(
                "TASK_TIMEOUT_SECS",
                DEFAULT_TASK_TIMEOUT_SECS,
            )),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
