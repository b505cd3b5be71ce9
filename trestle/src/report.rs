//! Shutdown-time snapshot of streaming statistics.
//!
//! Errors never bubble out of the streaming loops; this report is the
//! user-visible failure surface, merged into the caller's migration report
//! after the pipeline drains.

use std::collections::HashMap;

use crate::state::{BadRecordSample, DroppedRecordSample, RecordCounts, StreamingState};

/// Streaming statistics for one run.
#[derive(Debug, Clone, Default)]
pub struct StreamingReport {
    /// True whenever streaming ran, even if no records arrived.
    pub streaming: bool,
    /// Per-table, per-event-kind counts of records pulled from the stream.
    pub records: RecordCounts,
    /// Records whose conversion failed.
    pub bad_records: RecordCounts,
    /// Converted records whose write was rejected.
    pub dropped_records: RecordCounts,
    /// Total records pulled through conversion.
    pub records_processed: i64,
    /// Most recent failed conversions, oldest first (bounded ring).
    pub sample_bad_records: Vec<BadRecordSample>,
    /// Most recent rejected writes, oldest first (bounded ring).
    pub sample_dropped_records: Vec<DroppedRecordSample>,
    /// Anomaly message -> occurrence count.
    pub unexpecteds: HashMap<String, i64>,
}

impl StreamingReport {
    /// Builds the report from the shared state once every worker has joined.
    pub fn from_state(state: &StreamingState) -> Self {
        Self {
            streaming: true,
            records: state.record_counts(),
            bad_records: state.bad_record_counts(),
            dropped_records: state.dropped_record_counts(),
            records_processed: state.records_processed(),
            sample_bad_records: state.sample_bad_records(),
            sample_dropped_records: state.sample_dropped_records(),
            unexpecteds: state.unexpecteds(),
        }
    }

    /// Total records across all tables and kinds.
    pub fn total_records(&self) -> i64 {
        sum(&self.records)
    }

    /// Total bad records across all tables and kinds.
    pub fn total_bad_records(&self) -> i64 {
        sum(&self.bad_records)
    }

    /// Total dropped records across all tables and kinds.
    pub fn total_dropped_records(&self) -> i64 {
        sum(&self.dropped_records)
    }
}

fn sum(counts: &RecordCounts) -> i64 {
    counts
        .values()
        .flat_map(|by_kind| by_kind.values())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;

    #[test]
    fn report_snapshots_state() {
        let state = StreamingState::new(10);
        state.add_record("Products", EventKind::Insert);
        state.add_record("Products", EventKind::Remove);
        state.add_bad_record("Products", EventKind::Insert);
        state.add_record_processed();
        state.add_record_processed();
        state.unexpected("something odd".to_string());

        let report = StreamingReport::from_state(&state);
        assert!(report.streaming);
        assert_eq!(report.total_records(), 2);
        assert_eq!(report.total_bad_records(), 1);
        assert_eq!(report.total_dropped_records(), 0);
        assert_eq!(report.records_processed, 2);
        assert_eq!(report.unexpecteds["something odd"], 1);
    }
}
