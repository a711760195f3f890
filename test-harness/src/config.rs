use serde::Deserialize;
use std::time::Duration;

use crate::error::HarnessError;

/// Knobs for the harness itself, as opposed to the service under test.
///
/// Read from `HARNESS_RESET_TIMEOUT_MS`, `HARNESS_STARTUP_TIMEOUT_MS`,
/// `HARNESS_POOL_SIZE` and `HARNESS_LOG_LEVEL`.
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_reset_timeout_ms() -> u64 {
    5_000
}

fn default_startup_timeout_ms() -> u64 {
    10_000
}

fn default_pool_size() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            reset_timeout_ms: default_reset_timeout_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
            pool_size: default_pool_size(),
            log_level: default_log_level(),
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, HarnessError> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("HARNESS")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?;

        let parsed: Self = settings.try_deserialize()?;
        Ok(parsed.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if self.pool_size == 0 {
            tracing::warn!("HARNESS_POOL_SIZE of 0 is not usable, falling back to 1");
            self.pool_size = 1;
        }
        self
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}
