//! Scripted stand-ins for the DynamoDB control and data planes.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{ErrorKind, TrestleError, TrestleResult};
use crate::source::{SourceAdmin, StreamSource};
use crate::trestle_error;
use crate::types::{ChangeRecord, RecordBatch, ShardInfo, ShardPage, TableStreamSettings};

/// Scripted control-plane fake for provisioning tests.
#[derive(Debug, Clone, Default)]
pub struct FakeSourceAdmin {
    inner: Arc<Mutex<FakeAdminInner>>,
}

#[derive(Debug, Default)]
struct FakeAdminInner {
    settings: HashMap<String, TableStreamSettings>,
    enabled: Vec<String>,
}

impl FakeSourceAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the DescribeTable answer for a table. Tables without an entry
    /// report no stream.
    pub fn set_settings(&self, table: &str, settings: TableStreamSettings) {
        let mut inner = self.inner.lock().unwrap();
        inner.settings.insert(table.to_string(), settings);
    }

    /// Tables that had a stream enabled during the test.
    pub fn enabled_tables(&self) -> Vec<String> {
        self.inner.lock().unwrap().enabled.clone()
    }
}

impl SourceAdmin for FakeSourceAdmin {
    async fn describe_stream_settings(&self, table: &str) -> TrestleResult<TableStreamSettings> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.settings.get(table).cloned().unwrap_or_default())
    }

    async fn enable_stream(&self, table: &str) -> TrestleResult<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.enabled.push(table.to_string());
        Ok(format!("arn:enabled:{table}"))
    }
}

/// Scripted data-plane fake driving the discovery loop and shard workers.
///
/// Shard pages and per-shard record batches are queues the test fills in
/// advance; exhausted queues report the terminal answer (no shards / a
/// closed, drained shard) so workers wind down naturally once the script
/// runs out. Every call is journaled for assertions on iterator positions
/// and fetch counts.
#[derive(Debug, Clone, Default)]
pub struct FakeStreamSource {
    inner: Arc<Mutex<FakeStreamInner>>,
}

#[derive(Debug, Default)]
struct FakeStreamInner {
    shard_pages: VecDeque<TrestleResult<ShardPage>>,
    iterator_errors: HashMap<String, VecDeque<TrestleError>>,
    record_batches: HashMap<String, VecDeque<TrestleResult<RecordBatch>>>,
    open_when_empty: std::collections::HashSet<String>,
    iterator_requests: Vec<(String, Option<String>)>,
    records_requests: Vec<String>,
    list_calls: usize,
}

impl FakeStreamSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one DescribeStream page.
    pub fn push_shard_page(
        &self,
        shards: Vec<ShardInfo>,
        last_evaluated_shard_id: Option<&str>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.shard_pages.push_back(Ok(ShardPage {
            shards,
            last_evaluated_shard_id: last_evaluated_shard_id.map(str::to_string),
        }));
    }

    /// Queues a DescribeStream failure.
    pub fn push_shard_page_error(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.shard_pages.push_back(Err(trestle_error!(
            ErrorKind::ShardListingFailed,
            "unexpected call to DescribeStream",
            "scripted failure"
        )));
    }

    /// Queues a GetShardIterator failure for a shard.
    pub fn push_iterator_error(&self, shard_id: &str, error: TrestleError) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .iterator_errors
            .entry(shard_id.to_string())
            .or_default()
            .push_back(error);
    }

    /// Queues one GetRecords answer for a shard.
    pub fn push_record_batch(&self, shard_id: &str, batch: TrestleResult<RecordBatch>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .record_batches
            .entry(shard_id.to_string())
            .or_default()
            .push_back(batch);
    }

    /// Queues a batch of records; `open` keeps the shard open after it.
    pub fn push_records(&self, shard_id: &str, records: Vec<ChangeRecord>, open: bool) {
        self.push_record_batch(
            shard_id,
            Ok(RecordBatch {
                records,
                next_shard_iterator: open.then(|| format!("{shard_id}:open")),
            }),
        );
    }

    /// Queues a trimmed-data failure on GetRecords for a shard.
    pub fn push_trimmed_records_error(&self, shard_id: &str) {
        self.push_record_batch(
            shard_id,
            Err(trestle_error!(
                ErrorKind::TrimmedDataAccess,
                "records expired before they could be fetched",
                "scripted trim"
            )),
        );
    }

    /// Keeps the shard open once its scripted batches run out: further
    /// GetRecords calls return empty batches with a live iterator, as an
    /// open shard with no traffic would.
    pub fn keep_shard_open(&self, shard_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.open_when_empty.insert(shard_id.to_string());
    }

    /// Returns a trimmed-data error for iterator scripting.
    pub fn trimmed_iterator_error() -> TrestleError {
        trestle_error!(
            ErrorKind::TrimmedDataAccess,
            "shard iterator position has expired",
            "scripted trim"
        )
    }

    /// Every `(shard_id, after_sequence)` iterator request observed so far.
    pub fn iterator_requests(&self) -> Vec<(String, Option<String>)> {
        self.inner.lock().unwrap().iterator_requests.clone()
    }

    /// Shard ids of every GetRecords call observed so far.
    pub fn records_requests(&self) -> Vec<String> {
        self.inner.lock().unwrap().records_requests.clone()
    }

    /// Number of DescribeStream calls observed so far.
    pub fn list_calls(&self) -> usize {
        self.inner.lock().unwrap().list_calls
    }
}

impl StreamSource for FakeStreamSource {
    async fn list_shards(
        &self,
        _stream_arn: &str,
        _exclusive_start_shard_id: Option<&str>,
    ) -> TrestleResult<ShardPage> {
        let mut inner = self.inner.lock().unwrap();
        inner.list_calls += 1;
        match inner.shard_pages.pop_front() {
            Some(page) => page,
            // Script exhausted: the traversal is at the tip with no shards.
            None => Ok(ShardPage::default()),
        }
    }

    async fn shard_iterator(
        &self,
        _stream_arn: &str,
        shard_id: &str,
        after_sequence: Option<&str>,
    ) -> TrestleResult<Option<String>> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .iterator_requests
            .push((shard_id.to_string(), after_sequence.map(str::to_string)));

        if let Some(queue) = inner.iterator_errors.get_mut(shard_id) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }

        let position = after_sequence.unwrap_or("TRIM_HORIZON");
        Ok(Some(format!("{shard_id}:{position}")))
    }

    async fn records(&self, iterator: &str) -> TrestleResult<RecordBatch> {
        let shard_id = iterator.split(':').next().unwrap_or(iterator).to_string();

        let mut inner = self.inner.lock().unwrap();
        inner.records_requests.push(shard_id.clone());

        match inner
            .record_batches
            .get_mut(&shard_id)
            .and_then(VecDeque::pop_front)
        {
            Some(batch) => batch,
            None if inner.open_when_empty.contains(&shard_id) => Ok(RecordBatch {
                records: Vec::new(),
                next_shard_iterator: Some(format!("{shard_id}:open")),
            }),
            // Script exhausted: a closed shard with nothing left.
            None => Ok(RecordBatch::default()),
        }
    }
}
