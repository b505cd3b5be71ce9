use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::config::StreamingConfig;
use crate::record::process_record;
use crate::source::StreamSource;
use crate::state::StreamingState;
use crate::types::{SchemaSnapshot, ShardInfo};
use crate::writer::SpannerWriter;

/// Worker that drains one shard in sequence-number order.
///
/// Waits for the parent shard to finish before touching its own records,
/// then pulls batches until the shard closes or a shutdown drain pass
/// completes. Within the shard every record is applied synchronously, so the
/// mutation order seen by Spanner is exactly the record order of the shard.
pub(crate) struct ShardWorker<C, W> {
    config: Arc<StreamingConfig>,
    schema: Arc<SchemaSnapshot>,
    state: Arc<StreamingState>,
    source: C,
    writer: Option<W>,
    shutdown_rx: ShutdownRx,
    stream_arn: String,
    table: String,
    shard: ShardInfo,
}

impl<C, W> ShardWorker<C, W>
where
    C: StreamSource + Send + Sync,
    W: SpannerWriter + Send + Sync,
{
    #[expect(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: Arc<StreamingConfig>,
        schema: Arc<SchemaSnapshot>,
        state: Arc<StreamingState>,
        source: C,
        writer: Option<W>,
        shutdown_rx: ShutdownRx,
        stream_arn: String,
        table: String,
        shard: ShardInfo,
    ) -> Self {
        Self {
            config,
            schema,
            state,
            source,
            writer,
            shutdown_rx,
            stream_arn,
            table,
            shard,
        }
    }

    pub(crate) async fn run(self) {
        self.wait_for_parent().await;

        let shard_id = self.shard.shard_id.clone();
        self.state.set_shard_status(&shard_id, false);
        info!(shard_id = %shard_id, "processing shard");

        let mut last_sequence: Option<String> = None;
        let mut pass_after_user_exit = false;
        let mut trim_retries: u32 = 0;

        loop {
            let iterator = match self
                .source
                .shard_iterator(&self.stream_arn, &shard_id, last_sequence.as_deref())
                .await
            {
                Ok(Some(iterator)) => iterator,
                Ok(None) => {
                    self.state.unexpected(format!(
                        "Couldn't get shardIterator for table {}: no iterator returned",
                        self.table
                    ));
                    break;
                }
                Err(err) if err.is_trimmed_data() => {
                    // The resume position expired; start over from the
                    // oldest unexpired record.
                    debug!(shard_id = %shard_id, "iterator position trimmed, resetting to trim horizon");
                    last_sequence = None;
                    continue;
                }
                Err(err) => {
                    self.state.unexpected(format!(
                        "Couldn't get shardIterator for table {}: {err}",
                        self.table
                    ));
                    break;
                }
            };

            let batch = match self.source.records(&iterator).await {
                Ok(batch) => {
                    trim_retries = 0;
                    batch
                }
                Err(err) if err.is_trimmed_data() => {
                    // Closed shards keep handing out iterators after all
                    // their records have expired; GetRecords on such an
                    // iterator trims forever. The retry cap turns that
                    // infinite loop into a bounded drain.
                    if trim_retries < self.config.trimmed_data_retry_limit {
                        trim_retries += 1;
                        last_sequence = None;
                        continue;
                    }
                    self.state.unexpected(format!(
                        "Couldn't fetch records for table {}: {err}",
                        self.table
                    ));
                    break;
                }
                Err(err) => {
                    self.state.unexpected(format!(
                        "Couldn't fetch records for table {}: {err}",
                        self.table
                    ));
                    break;
                }
            };

            let record_count = batch.records.len();
            for record in batch.records {
                let sequence_number = record.sequence_number.clone();
                process_record(
                    &self.state,
                    &self.schema,
                    self.writer.as_ref(),
                    &self.config,
                    record,
                    &self.table,
                )
                .await;
                last_sequence = Some(sequence_number);
            }

            if batch.next_shard_iterator.is_none() || pass_after_user_exit {
                break;
            }
            if self.shutdown_rx.is_shutdown() {
                // One more drain pass so records arriving during shutdown
                // still land before the worker exits.
                pass_after_user_exit = true;
            } else if record_count == 0 {
                sleep(self.config.empty_batch_interval()).await;
            }
        }

        self.state.set_shard_status(&shard_id, true);
        info!(shard_id = %shard_id, "shard done");
    }

    /// Blocks until the parent shard's worker has exited.
    ///
    /// Child records must not be applied before every parent record has
    /// been consumed; polling the parent's done flag is what enforces the
    /// cross-shard ordering invariant.
    async fn wait_for_parent(&self) {
        let Some(parent_shard_id) = &self.shard.parent_shard_id else {
            return;
        };

        while !self.state.shard_done(parent_shard_id) {
            debug!(
                shard_id = %self.shard.shard_id,
                parent_shard_id = %parent_shard_id,
                "waiting for parent shard"
            );
            sleep(self.config.parent_poll_interval()).await;
        }
    }
}
