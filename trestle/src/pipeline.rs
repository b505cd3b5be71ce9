use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::concurrency::shutdown::{ShutdownTx, shutdown_channel};
use crate::config::StreamingConfig;
use crate::error::TrestleResult;
use crate::report::StreamingReport;
use crate::source::StreamSource;
use crate::state::StreamingState;
use crate::types::{SchemaSnapshot, TableStream};
use crate::workers::cutover::{CutoverWorker, CutoverWorkerHandle};
use crate::workers::discovery::{DiscoveryWorker, DiscoveryWorkerHandle};
use crate::writer::SpannerWriter;

enum PipelineState {
    Created,
    Started {
        discovery_workers: Vec<DiscoveryWorkerHandle>,
        cutover_worker: CutoverWorkerHandle,
        signal_worker: JoinHandle<()>,
    },
}

impl std::fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Created => write!(f, "Created"),
            PipelineState::Started { .. } => write!(f, "Started"),
        }
    }
}

/// Coordinator for one streaming run.
///
/// Owns the shared state, the shutdown latch, and every long-lived task:
/// one discovery worker per table stream, the cutover advisor, and the
/// signal handler. Lifecycle mirrors the run itself:
///
/// 1. [`StreamingPipeline::start`] spawns the workers.
/// 2. The run continues until the operator interrupts it (or
///    [`StreamingPipeline::shutdown`] is called); every loop finishes its
///    current iteration plus one drain pass.
/// 3. [`StreamingPipeline::wait`] joins everything and returns the
///    [`StreamingReport`] for the migration report.
#[derive(Debug)]
pub struct StreamingPipeline<C, W> {
    config: Arc<StreamingConfig>,
    schema: Arc<SchemaSnapshot>,
    streams: Vec<TableStream>,
    source: C,
    writer: Option<W>,
    state: Arc<StreamingState>,
    shutdown_tx: ShutdownTx,
    pipeline_state: PipelineState,
}

impl<C, W> StreamingPipeline<C, W>
where
    C: StreamSource + Clone + Send + Sync + 'static,
    W: SpannerWriter + Clone + Send + Sync + 'static,
{
    /// Creates a pipeline in the `Created` state.
    ///
    /// `writer == None` runs the pipeline dry: records are converted and
    /// counted, and every record reaching the write path is reported as the
    /// writer-not-configured anomaly.
    pub fn new(
        config: StreamingConfig,
        schema: SchemaSnapshot,
        streams: Vec<TableStream>,
        source: C,
        writer: Option<W>,
    ) -> TrestleResult<Self> {
        config.validate()?;

        let state = Arc::new(StreamingState::new(config.sample_limit));
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();

        Ok(Self {
            config: Arc::new(config),
            schema: Arc::new(schema),
            streams,
            source,
            writer,
            state,
            shutdown_tx,
            pipeline_state: PipelineState::Created,
        })
    }

    /// Shared coordination state, for observers and tests.
    pub fn shared_state(&self) -> Arc<StreamingState> {
        self.state.clone()
    }

    /// Transmitter of the shutdown latch.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Starts the discovery workers, the cutover advisor, and the signal
    /// handler.
    pub fn start(&mut self) {
        info!(tables = self.streams.len(), "starting streaming pipeline");

        let signal_worker = spawn_signal_worker(self.shutdown_tx.clone());

        let discovery_workers = self
            .streams
            .iter()
            .map(|stream| {
                DiscoveryWorker::new(
                    self.config.clone(),
                    self.schema.clone(),
                    self.state.clone(),
                    self.source.clone(),
                    self.writer.clone(),
                    self.shutdown_tx.subscribe(),
                    stream.stream_arn.clone(),
                    stream.table.clone(),
                )
                .start()
            })
            .collect();

        let cutover_worker = CutoverWorker::new(
            self.config.clone(),
            self.state.clone(),
            self.shutdown_tx.subscribe(),
        )
        .start();

        self.pipeline_state = PipelineState::Started {
            discovery_workers,
            cutover_worker,
            signal_worker,
        };
    }

    /// Requests a graceful shutdown.
    pub fn shutdown(&self) {
        info!("sending shutdown signal to streaming workers");
        self.shutdown_tx.shutdown();
    }

    /// Waits for every worker to finish and returns the run's statistics.
    pub async fn wait(self) -> TrestleResult<StreamingReport> {
        let PipelineState::Started {
            discovery_workers,
            cutover_worker,
            signal_worker,
        } = self.pipeline_state
        else {
            info!("pipeline was not started, skipping wait");
            return Ok(StreamingReport::from_state(&self.state));
        };

        info!("waiting for discovery workers to complete");
        for worker in discovery_workers {
            if let Err(err) = worker.wait().await {
                error!(error = %err, "discovery worker failed");
                self.state.unexpected(format!("Discovery worker failed: {err}"));
            }
        }

        info!("waiting for cutover advisor to complete");
        cutover_worker.wait().await;

        // The run is over whether or not a signal ever arrived.
        signal_worker.abort();
        let _ = signal_worker.await;

        Ok(StreamingReport::from_state(&self.state))
    }

    /// Signals a graceful shutdown and waits for completion.
    pub async fn shutdown_and_wait(self) -> TrestleResult<StreamingReport> {
        self.shutdown();
        self.wait().await
    }
}

/// Spawns the interrupt handler.
///
/// The handler only flips the shutdown latch; clean shutdown happens because
/// every loop polls it. SIGKILL-style termination is out of scope.
fn spawn_signal_worker(shutdown_tx: ShutdownTx) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, draining streaming workers");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, draining streaming workers");
            }
        }

        shutdown_tx.shutdown();
    })
}
