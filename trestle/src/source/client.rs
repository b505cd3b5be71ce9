use std::future::Future;

use crate::error::TrestleResult;
use crate::types::{RecordBatch, ShardPage, TableStreamSettings};

/// Control-plane operations against the source table.
///
/// Seam for the two DynamoDB calls provisioning needs, so the provisioner is
/// testable without AWS. The production implementation is
/// [`crate::source::DynamoAdminClient`].
pub trait SourceAdmin {
    /// Describes the table's stream settings.
    fn describe_stream_settings(
        &self,
        table: &str,
    ) -> impl Future<Output = TrestleResult<TableStreamSettings>> + Send;

    /// Enables a `NEW_AND_OLD_IMAGES` stream on the table and returns the
    /// new stream's identifier.
    fn enable_stream(&self, table: &str) -> impl Future<Output = TrestleResult<String>> + Send;
}

/// Data-plane operations against a DynamoDB stream.
///
/// Implementations must map the service's trimmed-data failures onto
/// [`crate::error::ErrorKind::TrimmedDataAccess`]; the shard worker's
/// recovery policy keys off that kind alone.
pub trait StreamSource {
    /// Enumerates one page of shards after the given exclusive start id.
    fn list_shards(
        &self,
        stream_arn: &str,
        exclusive_start_shard_id: Option<&str>,
    ) -> impl Future<Output = TrestleResult<ShardPage>> + Send;

    /// Requests an iterator for a shard.
    ///
    /// `after_sequence == None` positions at the oldest unexpired record
    /// (`TRIM_HORIZON`); otherwise at the first record after the sequence
    /// number (`AFTER_SEQUENCE_NUMBER`).
    fn shard_iterator(
        &self,
        stream_arn: &str,
        shard_id: &str,
        after_sequence: Option<&str>,
    ) -> impl Future<Output = TrestleResult<Option<String>>> + Send;

    /// Fetches the next batch of records for an iterator.
    fn records(&self, iterator: &str) -> impl Future<Output = TrestleResult<RecordBatch>> + Send;
}
