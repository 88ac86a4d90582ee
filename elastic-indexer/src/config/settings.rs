//! Indexer settings loaded from the environment.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::bulk::DEFAULT_BULK_LIMIT_BYTES;

/// Default number of references one bookkeeping batch pops.
pub const DEFAULT_BATCH_LIMIT: usize = 1000;

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Connection mode for the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection every retry interval until successful.
    #[default]
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Anything else falls back to "retry".
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!(
                    value = %value,
                    "Invalid ELASTICSEARCH_CONNECTION_MODE, defaulting to 'retry'"
                );
                Self::Retry
            }
        }
    }
}

/// Settings of the write pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerSettings {
    /// Byte budget of one bulk call.
    pub bulk_limit_bytes: usize,
    /// References popped per bookkeeping batch.
    pub batch_limit: usize,
    pub connection_mode: ConnectionMode,
    /// Wait between connection attempts in retry mode.
    pub retry_interval: Duration,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            bulk_limit_bytes: DEFAULT_BULK_LIMIT_BYTES,
            batch_limit: DEFAULT_BATCH_LIMIT,
            connection_mode: ConnectionMode::default(),
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
        }
    }
}

impl IndexerSettings {
    /// Load settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ELASTICSEARCH_MAX_BULK_SIZE_MB`: Bulk byte budget in MiB (default: 10)
    /// - `ELASTICSEARCH_BATCH_LIMIT`: References per bookkeeping batch (default: 1000)
    /// - `ELASTICSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `ELASTICSEARCH_RETRY_INTERVAL_SECS`: Connection retry interval (default: 15)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bulk_limit_bytes: parse_var::<usize>("ELASTICSEARCH_MAX_BULK_SIZE_MB")
                .filter(|mb| *mb > 0)
                .map(|mb| mb * BYTES_PER_MB)
                .unwrap_or(defaults.bulk_limit_bytes),
            batch_limit: parse_var::<usize>("ELASTICSEARCH_BATCH_LIMIT")
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.batch_limit),
            connection_mode: env::var("ELASTICSEARCH_CONNECTION_MODE")
                .map(|mode| ConnectionMode::parse(&mode))
                .unwrap_or(defaults.connection_mode),
            retry_interval: parse_var::<u64>("ELASTICSEARCH_RETRY_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_interval),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}
