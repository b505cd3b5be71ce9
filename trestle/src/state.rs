//! Shared coordination record for one streaming run.
//!
//! A single [`StreamingState`] is shared by the discovery loop, every shard
//! worker, and the cutover advisor. Counter maps sit behind their own locks,
//! the monotonic processed total is an atomic, and none of the locks is ever
//! held across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::{Cell, EventKind};

/// Per-table, per-event-kind record counters.
pub type RecordCounts = HashMap<String, HashMap<EventKind, i64>>;

/// A record whose conversion failed, retained for the migration report.
#[derive(Debug, Clone, PartialEq)]
pub struct BadRecordSample {
    pub table: String,
    pub kind: EventKind,
    /// Source column names, aligned with `values`.
    pub columns: Vec<String>,
    /// Raw source value representations.
    pub values: Vec<String>,
}

/// A converted record whose write was rejected, retained for the report.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRecordSample {
    pub table: String,
    pub kind: EventKind,
    /// Target column names, aligned with `values`.
    pub columns: Vec<String>,
    /// Converted Spanner values.
    pub values: Vec<Cell>,
    /// Error text from the rejected write.
    pub error: String,
}

#[derive(Debug, Default)]
struct StreamStats {
    records: RecordCounts,
    bad_records: RecordCounts,
    dropped_records: RecordCounts,
    /// Ring of the most recent conversion failures.
    sample_bad_records: VecDeque<BadRecordSample>,
    /// Ring of the most recent rejected writes.
    sample_dropped_records: VecDeque<DroppedRecordSample>,
}

/// Thread-safe counters and completion flags shared across one run.
#[derive(Debug)]
pub struct StreamingState {
    /// Shard id -> worker has exited. A missing entry means the worker has
    /// not started its record loop yet.
    shard_status: Mutex<HashMap<String, bool>>,
    stats: Mutex<StreamStats>,
    /// Monotonic total of records pulled through conversion, good or bad.
    records_processed: AtomicI64,
    unexpecteds: Mutex<HashMap<String, i64>>,
    sample_limit: usize,
}

impl StreamingState {
    /// Creates an empty state retaining the `sample_limit` most recent bad
    /// and dropped record samples each.
    pub fn new(sample_limit: usize) -> Self {
        Self {
            shard_status: Mutex::new(HashMap::new()),
            stats: Mutex::new(StreamStats::default()),
            records_processed: AtomicI64::new(0),
            unexpecteds: Mutex::new(HashMap::new()),
            sample_limit,
        }
    }

    /// Marks a shard as in progress (`done == false`) or finished.
    pub fn set_shard_status(&self, shard_id: &str, done: bool) {
        let mut statuses = lock(&self.shard_status);
        statuses.insert(shard_id.to_string(), done);
    }

    /// True once the shard's worker has exited. Absent shards are not done.
    pub fn shard_done(&self, shard_id: &str) -> bool {
        let statuses = lock(&self.shard_status);
        statuses.get(shard_id).copied().unwrap_or(false)
    }

    /// Snapshot of every shard's completion flag.
    pub fn shard_statuses(&self) -> HashMap<String, bool> {
        lock(&self.shard_status).clone()
    }

    pub fn add_record(&self, table: &str, kind: EventKind) {
        let mut stats = lock(&self.stats);
        bump(&mut stats.records, table, kind);
    }

    pub fn add_bad_record(&self, table: &str, kind: EventKind) {
        let mut stats = lock(&self.stats);
        bump(&mut stats.bad_records, table, kind);
    }

    pub fn add_dropped_record(&self, table: &str, kind: EventKind) {
        let mut stats = lock(&self.stats);
        bump(&mut stats.dropped_records, table, kind);
    }

    /// Increments the monotonic processed total read by the cutover advisor.
    pub fn add_record_processed(&self) {
        self.records_processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Current processed total.
    pub fn records_processed(&self) -> i64 {
        self.records_processed.load(Ordering::SeqCst)
    }

    /// Retains a sample of a record whose conversion failed.
    ///
    /// Once the ring is full, the oldest sample makes room for the new one,
    /// so the report always shows the most recent failures.
    pub fn collect_bad_record(
        &self,
        table: &str,
        kind: EventKind,
        columns: &[String],
        values: Vec<String>,
    ) {
        let mut stats = lock(&self.stats);
        if stats.sample_bad_records.len() >= self.sample_limit {
            stats.sample_bad_records.pop_front();
        }
        stats.sample_bad_records.push_back(BadRecordSample {
            table: table.to_string(),
            kind,
            columns: columns.to_vec(),
            values,
        });
    }

    /// Retains a sample of a converted record whose write was rejected.
    ///
    /// Same ring semantics as [`StreamingState::collect_bad_record`].
    pub fn collect_dropped_record(
        &self,
        table: &str,
        kind: EventKind,
        columns: &[String],
        values: Vec<Cell>,
        error: String,
    ) {
        let mut stats = lock(&self.stats);
        if stats.sample_dropped_records.len() >= self.sample_limit {
            stats.sample_dropped_records.pop_front();
        }
        stats.sample_dropped_records.push_back(DroppedRecordSample {
            table: table.to_string(),
            kind,
            columns: columns.to_vec(),
            values,
            error,
        });
    }

    /// Counts an anomaly under its human-readable message.
    pub fn unexpected(&self, message: String) {
        let mut unexpecteds = lock(&self.unexpecteds);
        *unexpecteds.entry(message).or_insert(0) += 1;
    }

    pub fn record_counts(&self) -> RecordCounts {
        lock(&self.stats).records.clone()
    }

    pub fn bad_record_counts(&self) -> RecordCounts {
        lock(&self.stats).bad_records.clone()
    }

    pub fn dropped_record_counts(&self) -> RecordCounts {
        lock(&self.stats).dropped_records.clone()
    }

    /// The most recent conversion failures, oldest first.
    pub fn sample_bad_records(&self) -> Vec<BadRecordSample> {
        lock(&self.stats).sample_bad_records.iter().cloned().collect()
    }

    /// The most recent rejected writes, oldest first.
    pub fn sample_dropped_records(&self) -> Vec<DroppedRecordSample> {
        lock(&self.stats)
            .sample_dropped_records
            .iter()
            .cloned()
            .collect()
    }

    pub fn unexpecteds(&self) -> HashMap<String, i64> {
        lock(&self.unexpecteds).clone()
    }
}

/// Counter locks are only poisoned by a panicking shard worker, which the
/// pool already reports; the counters themselves stay usable for the final
/// report.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn bump(counts: &mut RecordCounts, table: &str, kind: EventKind) {
    *counts
        .entry(table.to_string())
        .or_default()
        .entry(kind)
        .or_insert(0) += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_status_transitions() {
        let state = StreamingState::new(10);
        assert!(!state.shard_done("shard-1"));

        state.set_shard_status("shard-1", false);
        assert!(!state.shard_done("shard-1"));

        state.set_shard_status("shard-1", true);
        assert!(state.shard_done("shard-1"));
    }

    #[test]
    fn counters_accumulate_per_table_and_kind() {
        let state = StreamingState::new(10);
        state.add_record("Products", EventKind::Insert);
        state.add_record("Products", EventKind::Insert);
        state.add_record("Products", EventKind::Remove);
        state.add_bad_record("Products", EventKind::Modify);

        let records = state.record_counts();
        assert_eq!(records["Products"][&EventKind::Insert], 2);
        assert_eq!(records["Products"][&EventKind::Remove], 1);
        assert_eq!(state.bad_record_counts()["Products"][&EventKind::Modify], 1);
    }

    #[test]
    fn sample_rings_keep_the_most_recent_failures() {
        let state = StreamingState::new(2);
        for i in 0..5 {
            state.collect_bad_record(
                "Products",
                EventKind::Insert,
                &["ProductId".to_string()],
                vec![format!("p{i}")],
            );
        }

        let samples = state.sample_bad_records();
        assert_eq!(samples.len(), 2);
        // The oldest entries were evicted; the ring holds the newest two.
        assert_eq!(samples[0].values, vec!["p3".to_string()]);
        assert_eq!(samples[1].values, vec!["p4".to_string()]);
    }

    #[test]
    fn anomalies_count_by_message() {
        let state = StreamingState::new(10);
        state.unexpected("boom".to_string());
        state.unexpected("boom".to_string());
        assert_eq!(state.unexpecteds()["boom"], 2);
    }
}
