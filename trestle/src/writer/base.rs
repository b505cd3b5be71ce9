use std::future::Future;

use tokio::time::sleep;
use tracing::debug;

use crate::config::StreamingConfig;
use crate::error::TrestleResult;
use crate::types::Mutation;

/// Trait for sinks that can apply one Spanner mutation.
///
/// The production implementation wraps the Spanner commit API and tags every
/// request with migration metadata; tests inject recording fakes. A run
/// without a writer (dry run) is represented by `Option<W>` at the pipeline
/// level, not by a no-op implementation, so that records reaching the write
/// path without a writer are visible as anomalies.
pub trait SpannerWriter {
    /// Applies a single mutation, returning once it is committed.
    fn apply(&self, mutation: Mutation) -> impl Future<Output = TrestleResult<()>> + Send;
}

/// Applies a mutation, retrying while Spanner reports the interleave parent
/// row missing.
///
/// A child shard can run ahead of its parent's table rows when tables are
/// interleaved; the missing-parent window closes as soon as the parent row
/// lands, so the write is retried on a fixed spacing. The total number of
/// `apply` calls is capped at `parent_missing_retry_limit`; the last failure
/// is surfaced once the budget is spent. Every other error is surfaced
/// immediately.
pub async fn apply_with_retry<W: SpannerWriter>(
    writer: &W,
    mutation: Mutation,
    config: &StreamingConfig,
) -> TrestleResult<()> {
    let mut attempts_left = config.parent_missing_retry_limit;

    loop {
        match writer.apply(mutation.clone()).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_parent_data_missing() && attempts_left > 1 => {
                attempts_left -= 1;
                debug!(
                    table = mutation.table(),
                    attempts_left, "parent row missing, retrying write"
                );
                sleep(config.parent_missing_retry_interval()).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::writer::ScriptedWriter;
    use crate::trestle_error;
    use crate::types::Cell;

    fn retry_config(limit: u32) -> StreamingConfig {
        StreamingConfig {
            parent_missing_retry_limit: limit,
            parent_missing_retry_interval_ms: 1,
            ..StreamingConfig::default()
        }
    }

    fn parent_missing() -> crate::error::TrestleError {
        trestle_error!(
            ErrorKind::SpannerWriteFailed,
            "commit failed",
            "NOT_FOUND: Parent row for row [p1] in table Products is missing"
        )
    }

    fn mutation() -> Mutation {
        Mutation::insert(
            "Products",
            vec!["ProductId".to_string()],
            vec![Cell::String("p1".to_string())],
        )
    }

    #[tokio::test]
    async fn retry_budget_caps_total_attempts_exactly() {
        let writer = ScriptedWriter::new();
        for call in 1..=4 {
            writer.fail_call(call, parent_missing());
        }

        let err = apply_with_retry(&writer, mutation(), &retry_config(3))
            .await
            .unwrap_err();
        assert!(err.is_parent_data_missing());
        assert_eq!(writer.apply_calls(), 3, "the limit is the total call count");
    }

    #[tokio::test]
    async fn write_lands_when_parent_appears_within_budget() {
        let writer = ScriptedWriter::new();
        writer.fail_call(1, parent_missing());
        writer.fail_call(2, parent_missing());

        apply_with_retry(&writer, mutation(), &retry_config(3))
            .await
            .unwrap();
        assert_eq!(writer.apply_calls(), 3);
        assert_eq!(writer.applied_len(), 1);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let writer = ScriptedWriter::new();
        writer.fail_call(
            1,
            trestle_error!(
                ErrorKind::SpannerWriteFailed,
                "commit failed",
                "ALREADY_EXISTS: Row [p1] in table Products already exists"
            ),
        );

        let err = apply_with_retry(&writer, mutation(), &retry_config(3))
            .await
            .unwrap_err();
        assert!(!err.is_parent_data_missing());
        assert_eq!(writer.apply_calls(), 1);
    }
}
