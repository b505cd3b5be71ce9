use crate::types::ChangeRecord;

/// View type of an existing DynamoDB stream.
///
/// Only [`StreamView::NewImage`] and [`StreamView::NewAndOldImages`] carry
/// enough data to replicate writes; the other two are rejected at
/// provisioning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamView {
    KeysOnly,
    OldImage,
    NewImage,
    NewAndOldImages,
}

impl StreamView {
    /// True when the view carries the post-change item image.
    pub fn carries_new_image(&self) -> bool {
        matches!(self, Self::NewImage | Self::NewAndOldImages)
    }
}

/// Stream-related settings of a source table, as reported by DescribeTable.
#[derive(Debug, Clone, Default)]
pub struct TableStreamSettings {
    /// View type of the table's stream, if one is configured.
    pub view: Option<StreamView>,
    /// Identifier of the latest stream, if one exists.
    pub stream_arn: Option<String>,
}

/// A shard of a stream, with its position in the shard tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    /// Shard identifier.
    pub shard_id: String,
    /// Identifier of the shard this one split from, if any. A child's
    /// records must not be applied before the parent is fully consumed.
    pub parent_shard_id: Option<String>,
}

/// One page of shard enumeration from DescribeStream.
#[derive(Debug, Clone, Default)]
pub struct ShardPage {
    /// Shards returned by this page, in traversal order.
    pub shards: Vec<ShardInfo>,
    /// Pagination cursor; `None` means the traversal reached the tip.
    pub last_evaluated_shard_id: Option<String>,
}

/// One batch of records from GetRecords.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    /// Records in shard order.
    pub records: Vec<ChangeRecord>,
    /// Iterator for the next batch; `None` once a closed shard is drained.
    pub next_shard_iterator: Option<String>,
}

/// A source table paired with the stream that replicates it.
#[derive(Debug, Clone)]
pub struct TableStream {
    /// Source table name.
    pub table: String,
    /// Stream identifier returned by provisioning.
    pub stream_arn: String,
}
