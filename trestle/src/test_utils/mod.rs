//! Shared helpers for exercising the pipeline without AWS or Spanner.

pub mod schema;
pub mod source;
pub mod writer;

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::StreamingConfig;

/// Initializes tracing for a test binary. Safe to call repeatedly.
#[cfg(feature = "test-utils")]
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Millisecond-scale configuration so integration tests finish quickly.
pub fn test_config() -> StreamingConfig {
    StreamingConfig {
        shard_discovery_interval_ms: 5,
        empty_batch_interval_ms: 5,
        parent_poll_interval_ms: 5,
        trimmed_data_retry_limit: StreamingConfig::DEFAULT_TRIMMED_DATA_RETRY_LIMIT,
        parent_missing_retry_limit: StreamingConfig::DEFAULT_PARENT_MISSING_RETRY_LIMIT,
        parent_missing_retry_interval_ms: 1,
        cutover_interval_ms: 20,
        sample_limit: StreamingConfig::DEFAULT_SAMPLE_LIMIT,
    }
}

/// Polls `condition` until it holds or the timeout elapses.
///
/// Returns whether the condition was met. Prefer asserting on the returned
/// value so a timeout produces a test failure instead of a hang.
pub async fn wait_until<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(5)).await;
    }
}
