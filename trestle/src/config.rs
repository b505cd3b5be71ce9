use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ErrorKind, TrestleResult};
use crate::bail;

/// Timing and retry configuration for the streaming pipeline.
///
/// Defaults reproduce the cadence of the original migration tool: shard
/// discovery every 10 seconds, empty-batch polling every 5 seconds, parent
/// polling every 6 seconds, a 5-attempt cap on trimmed-data recovery, and a
/// 1000 x 4 s retry budget for interleaved parent/child write races.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamingConfig {
    /// Sleep between shard-discovery passes that returned no shards, in milliseconds.
    #[serde(default = "default_shard_discovery_interval_ms")]
    pub shard_discovery_interval_ms: u64,
    /// Sleep after an empty record batch on an open shard, in milliseconds.
    #[serde(default = "default_empty_batch_interval_ms")]
    pub empty_batch_interval_ms: u64,
    /// Poll interval while waiting for a parent shard to finish, in milliseconds.
    #[serde(default = "default_parent_poll_interval_ms")]
    pub parent_poll_interval_ms: u64,
    /// Maximum trimmed-data retries per iterator-fetch cycle before the shard
    /// worker gives up on a closed, fully expired shard.
    #[serde(default = "default_trimmed_data_retry_limit")]
    pub trimmed_data_retry_limit: u32,
    /// Maximum retries when Spanner reports the interleave parent row missing.
    #[serde(default = "default_parent_missing_retry_limit")]
    pub parent_missing_retry_limit: u32,
    /// Spacing between parent-missing retries, in milliseconds.
    #[serde(default = "default_parent_missing_retry_interval_ms")]
    pub parent_missing_retry_interval_ms: u64,
    /// Interval between cutover advisor evaluations, in milliseconds.
    #[serde(default = "default_cutover_interval_ms")]
    pub cutover_interval_ms: u64,
    /// Maximum number of bad/dropped record samples retained for the report.
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
}

impl StreamingConfig {
    /// Default sleep between empty shard-discovery passes.
    pub const DEFAULT_SHARD_DISCOVERY_INTERVAL_MS: u64 = 10_000;
    /// Default sleep after an empty record batch.
    pub const DEFAULT_EMPTY_BATCH_INTERVAL_MS: u64 = 5_000;
    /// Default parent-shard poll interval.
    pub const DEFAULT_PARENT_POLL_INTERVAL_MS: u64 = 6_000;
    /// Default trimmed-data retry cap.
    pub const DEFAULT_TRIMMED_DATA_RETRY_LIMIT: u32 = 5;
    /// Default parent-missing retry cap.
    pub const DEFAULT_PARENT_MISSING_RETRY_LIMIT: u32 = 1_000;
    /// Default parent-missing retry spacing.
    pub const DEFAULT_PARENT_MISSING_RETRY_INTERVAL_MS: u64 = 4_000;
    /// Default cutover advisor interval.
    pub const DEFAULT_CUTOVER_INTERVAL_MS: u64 = 60_000;
    /// Default diagnostic sample cap.
    pub const DEFAULT_SAMPLE_LIMIT: usize = 100;

    /// Validates configuration settings.
    pub fn validate(&self) -> TrestleResult<()> {
        if self.sample_limit == 0 {
            bail!(
                ErrorKind::InvalidConfig,
                "invalid streaming configuration",
                "sample_limit must be greater than 0"
            );
        }
        if self.cutover_interval_ms == 0 {
            bail!(
                ErrorKind::InvalidConfig,
                "invalid streaming configuration",
                "cutover_interval_ms must be greater than 0"
            );
        }

        Ok(())
    }

    pub fn shard_discovery_interval(&self) -> Duration {
        Duration::from_millis(self.shard_discovery_interval_ms)
    }

    pub fn empty_batch_interval(&self) -> Duration {
        Duration::from_millis(self.empty_batch_interval_ms)
    }

    pub fn parent_poll_interval(&self) -> Duration {
        Duration::from_millis(self.parent_poll_interval_ms)
    }

    pub fn parent_missing_retry_interval(&self) -> Duration {
        Duration::from_millis(self.parent_missing_retry_interval_ms)
    }

    pub fn cutover_interval(&self) -> Duration {
        Duration::from_millis(self.cutover_interval_ms)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            shard_discovery_interval_ms: default_shard_discovery_interval_ms(),
            empty_batch_interval_ms: default_empty_batch_interval_ms(),
            parent_poll_interval_ms: default_parent_poll_interval_ms(),
            trimmed_data_retry_limit: default_trimmed_data_retry_limit(),
            parent_missing_retry_limit: default_parent_missing_retry_limit(),
            parent_missing_retry_interval_ms: default_parent_missing_retry_interval_ms(),
            cutover_interval_ms: default_cutover_interval_ms(),
            sample_limit: default_sample_limit(),
        }
    }
}

fn default_shard_discovery_interval_ms() -> u64 {
    StreamingConfig::DEFAULT_SHARD_DISCOVERY_INTERVAL_MS
}

fn default_empty_batch_interval_ms() -> u64 {
    StreamingConfig::DEFAULT_EMPTY_BATCH_INTERVAL_MS
}

fn default_parent_poll_interval_ms() -> u64 {
    StreamingConfig::DEFAULT_PARENT_POLL_INTERVAL_MS
}

fn default_trimmed_data_retry_limit() -> u32 {
    StreamingConfig::DEFAULT_TRIMMED_DATA_RETRY_LIMIT
}

fn default_parent_missing_retry_limit() -> u32 {
    StreamingConfig::DEFAULT_PARENT_MISSING_RETRY_LIMIT
}

fn default_parent_missing_retry_interval_ms() -> u64 {
    StreamingConfig::DEFAULT_PARENT_MISSING_RETRY_INTERVAL_MS
}

fn default_cutover_interval_ms() -> u64 {
    StreamingConfig::DEFAULT_CUTOVER_INTERVAL_MS
}

fn default_sample_limit() -> usize {
    StreamingConfig::DEFAULT_SAMPLE_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_cadence() {
        let config = StreamingConfig::default();
        assert_eq!(config.shard_discovery_interval(), Duration::from_secs(10));
        assert_eq!(config.empty_batch_interval(), Duration::from_secs(5));
        assert_eq!(config.parent_poll_interval(), Duration::from_secs(6));
        assert_eq!(config.trimmed_data_retry_limit, 5);
        assert_eq!(config.parent_missing_retry_limit, 1_000);
        assert_eq!(config.parent_missing_retry_interval(), Duration::from_secs(4));
        assert_eq!(config.cutover_interval(), Duration::from_secs(60));
        config.validate().unwrap();
    }

    #[test]
    fn zero_sample_limit_is_rejected() {
        let config = StreamingConfig {
            sample_limit: 0,
            ..StreamingConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let config: StreamingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(
            config.empty_batch_interval_ms,
            StreamingConfig::DEFAULT_EMPTY_BATCH_INTERVAL_MS
        );
    }
}
