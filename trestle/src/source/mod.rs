pub mod aws;
pub mod client;
pub mod provision;

pub use aws::{DynamoAdminClient, DynamoStreamsClient};
pub use client::{SourceAdmin, StreamSource};
pub use provision::ensure_stream;
