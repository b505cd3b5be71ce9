pub mod cell;
pub mod event;
pub mod mutation;
pub mod schema;
pub mod stream;

pub use cell::Cell;
pub use event::{ChangeRecord, EventKind};
pub use mutation::Mutation;
pub use schema::{SchemaSnapshot, SourceTable, SpannerType, TableMapping};
pub use stream::{RecordBatch, ShardInfo, ShardPage, StreamView, TableStream, TableStreamSettings};

/// Attribute-value model carried by stream record images.
///
/// Re-exported from the DynamoDB Streams SDK so conversions and tests share
/// one representation of source data.
pub use aws_sdk_dynamodbstreams::types::AttributeValue;
