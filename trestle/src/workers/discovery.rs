use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::config::StreamingConfig;
use crate::error::{ErrorKind, TrestleResult};
use crate::source::StreamSource;
use crate::state::StreamingState;
use crate::trestle_error;
use crate::types::SchemaSnapshot;
use crate::workers::pool::ShardWorkerPool;
use crate::workers::shard::ShardWorker;
use crate::writer::SpannerWriter;

/// Handle for monitoring the discovery worker of one table.
#[derive(Debug)]
pub struct DiscoveryWorkerHandle {
    handle: Option<JoinHandle<()>>,
}

impl DiscoveryWorkerHandle {
    /// Waits for discovery and every shard worker it spawned to complete.
    pub async fn wait(mut self) -> TrestleResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        handle.await.map_err(|err| {
            if err.is_cancelled() {
                trestle_error!(
                    ErrorKind::ShardListingFailed,
                    "discovery worker was cancelled",
                    err
                )
            } else {
                trestle_error!(
                    ErrorKind::ShardListingFailed,
                    "discovery worker panicked",
                    err
                )
            }
        })?;

        Ok(())
    }
}

/// Worker that enumerates a stream's shards and fans out shard workers.
///
/// One discovery worker runs per source table; tables are fully independent.
/// The worker keeps re-describing the stream so shards created by splits and
/// merges during the run are picked up, and makes one final enumeration pass
/// after shutdown is requested so last-minute shards still drain.
pub struct DiscoveryWorker<C, W> {
    config: Arc<StreamingConfig>,
    schema: Arc<SchemaSnapshot>,
    state: Arc<StreamingState>,
    source: C,
    writer: Option<W>,
    shutdown_rx: ShutdownRx,
    stream_arn: String,
    table: String,
}

impl<C, W> DiscoveryWorker<C, W>
where
    C: StreamSource + Clone + Send + Sync + 'static,
    W: SpannerWriter + Clone + Send + Sync + 'static,
{
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<StreamingConfig>,
        schema: Arc<SchemaSnapshot>,
        state: Arc<StreamingState>,
        source: C,
        writer: Option<W>,
        shutdown_rx: ShutdownRx,
        stream_arn: String,
        table: String,
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
        }
    }

    /// Spawns the discovery worker and returns a handle for monitoring.
    pub fn start(self) -> DiscoveryWorkerHandle {
        info!(table = %self.table, "starting discovery worker");

        let span = tracing::info_span!("discovery_worker", table = %self.table);
        let handle = tokio::spawn(self.run().instrument(span.or_current()));

        DiscoveryWorkerHandle {
            handle: Some(handle),
        }
    }

    async fn run(self) {
        let pool = ShardWorkerPool::new(self.state.clone());

        let mut last_processed_shard_id: Option<String> = None;
        let mut pass_after_user_exit = false;

        loop {
            let page = match self
                .source
                .list_shards(&self.stream_arn, last_processed_shard_id.as_deref())
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    error!(error = %err, "shard enumeration failed");
                    self.state.unexpected(format!(
                        "Couldn't fetch shards for table {}: {err}",
                        self.table
                    ));
                    break;
                }
            };

            let shard_count = page.shards.len();
            for shard in page.shards {
                last_processed_shard_id = Some(shard.shard_id.clone());

                let worker = ShardWorker::new(
                    self.config.clone(),
                    self.schema.clone(),
                    self.state.clone(),
                    self.source.clone(),
                    self.writer.clone(),
                    self.shutdown_rx.clone(),
                    self.stream_arn.clone(),
                    self.table.clone(),
                    shard.clone(),
                );

                let span = tracing::info_span!("shard_worker", shard_id = %shard.shard_id);
                if pool
                    .dispatch(shard.shard_id.clone(), worker.run().instrument(span))
                    .await
                {
                    debug!(shard_id = %shard.shard_id, "dispatched shard worker");
                }
            }

            if page.last_evaluated_shard_id.is_none() && pass_after_user_exit {
                break;
            }
            if self.shutdown_rx.is_shutdown() {
                pass_after_user_exit = true;
            } else if shard_count == 0 {
                sleep(self.config.shard_discovery_interval()).await;
            }
        }

        pool.wait_all().await;
        info!(table = %self.table, "discovery worker finished");
    }
}
