//! Production DynamoDB clients.
//!
//! Thin adapters from the AWS SDK onto the crate's [`SourceAdmin`] and
//! [`StreamSource`] seams. All SDK-to-model mapping lives in free functions
//! so it stays testable without a network.

use aws_sdk_dynamodb::types::StreamSpecification;
use aws_sdk_dynamodbstreams::error::DisplayErrorContext;
use aws_sdk_dynamodbstreams::operation::get_records::GetRecordsOutput;
use aws_sdk_dynamodbstreams::types::{
    OperationType, Record, ShardIteratorType, StreamDescription,
};
use tracing::{debug, warn};

use crate::error::{ErrorKind, TrestleResult};
use crate::source::{SourceAdmin, StreamSource};
use crate::trestle_error;
use crate::types::{
    ChangeRecord, EventKind, RecordBatch, ShardInfo, ShardPage, StreamView, TableStreamSettings,
};

/// Control-plane client backed by `aws-sdk-dynamodb`.
#[derive(Debug, Clone)]
pub struct DynamoAdminClient {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoAdminClient {
    /// Connects using ambient AWS credentials, optionally against a custom
    /// endpoint (DynamoDB Local).
    pub async fn connect(endpoint_url: Option<&str>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let client = if let Some(endpoint) = endpoint_url {
            let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            aws_sdk_dynamodb::Client::from_conf(dynamo_config)
        } else {
            aws_sdk_dynamodb::Client::new(&config)
        };

        Self { client }
    }

    /// Wraps an already-configured SDK client.
    pub fn new(client: aws_sdk_dynamodb::Client) -> Self {
        Self { client }
    }
}

impl SourceAdmin for DynamoAdminClient {
    async fn describe_stream_settings(&self, table: &str) -> TrestleResult<TableStreamSettings> {
        let output = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|err| {
                trestle_error!(
                    ErrorKind::SourceDescribeFailed,
                    "unexpected call to DescribeTable",
                    DisplayErrorContext(err)
                )
            })?;

        let Some(description) = output.table() else {
            return Ok(TableStreamSettings::default());
        };

        let view = description
            .stream_specification()
            .map(|spec| stream_view(spec.stream_view_type()));

        Ok(TableStreamSettings {
            view,
            stream_arn: description.latest_stream_arn().map(str::to_string),
        })
    }

    async fn enable_stream(&self, table: &str) -> TrestleResult<String> {
        let specification = StreamSpecification::builder()
            .stream_enabled(true)
            .stream_view_type(aws_sdk_dynamodb::types::StreamViewType::NewAndOldImages)
            .build()
            .map_err(|err| {
                trestle_error!(
                    ErrorKind::StreamEnableFailed,
                    "failed to build stream specification",
                    DisplayErrorContext(err)
                )
            })?;

        let output = self
            .client
            .update_table()
            .table_name(table)
            .stream_specification(specification)
            .send()
            .await
            .map_err(|err| {
                trestle_error!(
                    ErrorKind::StreamEnableFailed,
                    "unexpected call to UpdateTable",
                    DisplayErrorContext(err)
                )
            })?;

        output
            .table_description()
            .and_then(|description| description.latest_stream_arn())
            .map(str::to_string)
            .ok_or_else(|| {
                trestle_error!(
                    ErrorKind::StreamMissing,
                    "UpdateTable returned no stream identifier",
                    table
                )
            })
    }
}

/// Maps the control-plane view type onto the crate's model.
///
/// Unknown or absent view types map to [`StreamView::KeysOnly`]-equivalent
/// rejection at provisioning time by reporting the most restrictive view.
fn stream_view(view: Option<&aws_sdk_dynamodb::types::StreamViewType>) -> StreamView {
    use aws_sdk_dynamodb::types::StreamViewType;

    match view {
        Some(StreamViewType::NewImage) => StreamView::NewImage,
        Some(StreamViewType::NewAndOldImages) => StreamView::NewAndOldImages,
        Some(StreamViewType::OldImage) => StreamView::OldImage,
        _ => StreamView::KeysOnly,
    }
}

/// Data-plane client backed by `aws-sdk-dynamodbstreams`.
#[derive(Debug, Clone)]
pub struct DynamoStreamsClient {
    client: aws_sdk_dynamodbstreams::Client,
}

impl DynamoStreamsClient {
    /// Connects using ambient AWS credentials, optionally against a custom
    /// endpoint (DynamoDB Local).
    pub async fn connect(endpoint_url: Option<&str>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let client = if let Some(endpoint) = endpoint_url {
            let streams_config = aws_sdk_dynamodbstreams::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            aws_sdk_dynamodbstreams::Client::from_conf(streams_config)
        } else {
            aws_sdk_dynamodbstreams::Client::new(&config)
        };

        Self { client }
    }

    /// Wraps an already-configured SDK client.
    pub fn new(client: aws_sdk_dynamodbstreams::Client) -> Self {
        Self { client }
    }
}

impl StreamSource for DynamoStreamsClient {
    async fn list_shards(
        &self,
        stream_arn: &str,
        exclusive_start_shard_id: Option<&str>,
    ) -> TrestleResult<ShardPage> {
        let output = self
            .client
            .describe_stream()
            .stream_arn(stream_arn)
            .set_exclusive_start_shard_id(exclusive_start_shard_id.map(str::to_string))
            .send()
            .await
            .map_err(|err| {
                trestle_error!(
                    ErrorKind::ShardListingFailed,
                    "unexpected call to DescribeStream",
                    DisplayErrorContext(err)
                )
            })?;

        Ok(shard_page(output.stream_description()))
    }

    async fn shard_iterator(
        &self,
        stream_arn: &str,
        shard_id: &str,
        after_sequence: Option<&str>,
    ) -> TrestleResult<Option<String>> {
        let mut request = self
            .client
            .get_shard_iterator()
            .stream_arn(stream_arn)
            .shard_id(shard_id);

        request = match after_sequence {
            None => request.shard_iterator_type(ShardIteratorType::TrimHorizon),
            Some(sequence) => request
                .shard_iterator_type(ShardIteratorType::AfterSequenceNumber)
                .sequence_number(sequence),
        };

        let output = request.send().await.map_err(|err| {
            let service_err = err.into_service_error();
            let trimmed = is_trimmed_data(
                service_err.is_trimmed_data_access_exception(),
                &service_err.to_string(),
            );
            if trimmed {
                trestle_error!(
                    ErrorKind::TrimmedDataAccess,
                    "shard iterator position has expired",
                    DisplayErrorContext(service_err)
                )
            } else {
                trestle_error!(
                    ErrorKind::ShardIteratorFailed,
                    "unexpected call to GetShardIterator",
                    DisplayErrorContext(service_err)
                )
            }
        })?;

        Ok(output.shard_iterator().map(str::to_string))
    }

    async fn records(&self, iterator: &str) -> TrestleResult<RecordBatch> {
        let output = self
            .client
            .get_records()
            .shard_iterator(iterator)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                let trimmed = is_trimmed_data(
                    service_err.is_trimmed_data_access_exception(),
                    &service_err.to_string(),
                );
                if trimmed {
                    trestle_error!(
                        ErrorKind::TrimmedDataAccess,
                        "records expired before they could be fetched",
                        DisplayErrorContext(service_err)
                    )
                } else {
                    trestle_error!(
                        ErrorKind::RecordFetchFailed,
                        "unexpected call to GetRecords",
                        DisplayErrorContext(service_err)
                    )
                }
            })?;

        Ok(record_batch(output))
    }
}

/// Typed variant first, message text as a fallback for unhandled shapes.
fn is_trimmed_data(typed: bool, message: &str) -> bool {
    typed || message.contains("TrimmedDataAccessException")
}

fn shard_page(description: Option<&StreamDescription>) -> ShardPage {
    let Some(description) = description else {
        return ShardPage::default();
    };

    let shards = description
        .shards()
        .iter()
        .filter_map(|shard| {
            let Some(shard_id) = shard.shard_id() else {
                warn!("DescribeStream returned a shard without an id, skipping");
                return None;
            };

            Some(ShardInfo {
                shard_id: shard_id.to_string(),
                parent_shard_id: shard.parent_shard_id().map(str::to_string),
            })
        })
        .collect();

    ShardPage {
        shards,
        last_evaluated_shard_id: description.last_evaluated_shard_id().map(str::to_string),
    }
}

fn record_batch(output: GetRecordsOutput) -> RecordBatch {
    let records = output
        .records()
        .iter()
        .filter_map(change_record)
        .collect();

    RecordBatch {
        records,
        next_shard_iterator: output.next_shard_iterator().map(str::to_string),
    }
}

/// Maps one SDK record onto the crate's envelope.
///
/// Records missing their event name, payload, or sequence number cannot be
/// ordered or applied and are skipped with a log line.
fn change_record(record: &Record) -> Option<ChangeRecord> {
    let kind = match record.event_name() {
        Some(OperationType::Insert) => EventKind::Insert,
        Some(OperationType::Modify) => EventKind::Modify,
        Some(OperationType::Remove) => EventKind::Remove,
        other => {
            debug!(event_name = ?other, "skipping record with unsupported event name");
            return None;
        }
    };

    let payload = record.dynamodb()?;
    let sequence_number = payload.sequence_number()?.to_string();

    Some(ChangeRecord {
        kind,
        sequence_number,
        keys: payload.keys().cloned().unwrap_or_default(),
        new_image: payload.new_image().cloned().unwrap_or_default(),
        old_image: payload.old_image().cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodbstreams::types::{AttributeValue, Shard, StreamRecord};

    #[test]
    fn shard_page_maps_ids_and_cursor() {
        let description = StreamDescription::builder()
            .shards(Shard::builder().shard_id("shard-1").build())
            .shards(
                Shard::builder()
                    .shard_id("shard-2")
                    .parent_shard_id("shard-1")
                    .build(),
            )
            .last_evaluated_shard_id("shard-2")
            .build();

        let page = shard_page(Some(&description));
        assert_eq!(
            page.shards,
            vec![
                ShardInfo {
                    shard_id: "shard-1".to_string(),
                    parent_shard_id: None,
                },
                ShardInfo {
                    shard_id: "shard-2".to_string(),
                    parent_shard_id: Some("shard-1".to_string()),
                },
            ]
        );
        assert_eq!(page.last_evaluated_shard_id.as_deref(), Some("shard-2"));
    }

    #[test]
    fn missing_description_is_an_empty_page() {
        let page = shard_page(None);
        assert!(page.shards.is_empty());
        assert!(page.last_evaluated_shard_id.is_none());
    }

    #[test]
    fn record_batch_maps_records_in_order() {
        let output = GetRecordsOutput::builder()
            .records(
                Record::builder()
                    .event_name(OperationType::Insert)
                    .dynamodb(
                        StreamRecord::builder()
                            .sequence_number("1")
                            .keys("pk", AttributeValue::S("p1".to_string()))
                            .new_image("pk", AttributeValue::S("p1".to_string()))
                            .build(),
                    )
                    .build(),
            )
            .records(
                Record::builder()
                    .event_name(OperationType::Remove)
                    .dynamodb(
                        StreamRecord::builder()
                            .sequence_number("2")
                            .keys("pk", AttributeValue::S("p1".to_string()))
                            .build(),
                    )
                    .build(),
            )
            .next_shard_iterator("next")
            .build();

        let batch = record_batch(output);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].kind, EventKind::Insert);
        assert_eq!(batch.records[0].sequence_number, "1");
        assert_eq!(batch.records[1].kind, EventKind::Remove);
        assert!(batch.records[1].new_image.is_empty());
        assert_eq!(batch.next_shard_iterator.as_deref(), Some("next"));
    }

    #[test]
    fn records_without_sequence_numbers_are_skipped() {
        let record = Record::builder()
            .event_name(OperationType::Insert)
            .dynamodb(StreamRecord::builder().build())
            .build();

        assert!(change_record(&record).is_none());
    }

    #[test]
    fn trimmed_detection_accepts_string_fallback() {
        assert!(is_trimmed_data(true, "anything"));
        assert!(is_trimmed_data(
            false,
            "TrimmedDataAccessException: data expired"
        ));
        assert!(!is_trimmed_data(false, "InternalServerError"));
    }
}
