use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::state::StreamingState;

/// Internal state for [`ShardWorkerPool`].
#[derive(Debug)]
struct ShardWorkerPoolInner {
    /// Shard ids that have ever been handed to a worker. DescribeStream can
    /// re-list a shard across discovery passes; a shard is processed exactly
    /// once.
    dispatched: HashSet<String>,
    /// Owns all spawned shard worker tasks.
    join_set: JoinSet<String>,
}

/// Pool owning the shard workers of one discovery loop.
///
/// Acts as the wait group over an unknown, growing number of shard workers:
/// discovery keeps dispatching while shards appear, and waits on the whole
/// pool once enumeration ends.
#[derive(Debug, Clone)]
pub struct ShardWorkerPool {
    inner: Arc<Mutex<ShardWorkerPoolInner>>,
    state: Arc<StreamingState>,
}

impl ShardWorkerPool {
    pub fn new(state: Arc<StreamingState>) -> Self {
        let inner = ShardWorkerPoolInner {
            dispatched: HashSet::new(),
            join_set: JoinSet::new(),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
            state,
        }
    }

    /// Spawns a worker for the shard unless one was already dispatched.
    ///
    /// Returns whether the worker was spawned.
    pub async fn dispatch<F>(&self, shard_id: String, worker: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock().await;

        if !inner.dispatched.insert(shard_id.clone()) {
            debug!(shard_id = %shard_id, "shard already dispatched, skipping");
            return false;
        }

        inner.join_set.spawn(async move {
            worker.await;
            shard_id
        });

        true
    }

    /// Waits for every dispatched shard worker to finish.
    ///
    /// Worker panics are recorded as anomalies; they never take the pipeline
    /// down.
    pub async fn wait_all(&self) {
        loop {
            let result = {
                let mut inner = self.inner.lock().await;
                inner.join_set.join_next().await
            };

            let Some(result) = result else {
                // JoinSet is empty, all workers have completed.
                break;
            };

            match result {
                Ok(shard_id) => {
                    debug!(shard_id = %shard_id, "shard worker finished");
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        debug!("shard worker was cancelled");
                    } else {
                        error!(error = %join_err, "shard worker panicked");
                        self.state
                            .unexpected(format!("Shard worker panicked: {join_err}"));
                    }
                }
            }
        }
    }

    /// Number of distinct shards ever dispatched.
    pub async fn dispatched_count(&self) -> usize {
        self.inner.lock().await.dispatched.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_shard_is_dispatched_once() {
        let state = Arc::new(StreamingState::new(10));
        let pool = ShardWorkerPool::new(state.clone());

        assert!(pool.dispatch("shard-1".to_string(), async {}).await);
        assert!(!pool.dispatch("shard-1".to_string(), async {}).await);
        assert_eq!(pool.dispatched_count().await, 1);

        pool.wait_all().await;
    }

    #[tokio::test]
    async fn panicking_worker_is_recorded_as_anomaly() {
        let state = Arc::new(StreamingState::new(10));
        let pool = ShardWorkerPool::new(state.clone());

        pool.dispatch("shard-1".to_string(), async {
            panic!("worker exploded");
        })
        .await;
        pool.wait_all().await;

        let unexpecteds = state.unexpecteds();
        assert!(
            unexpecteds
                .keys()
                .any(|message| message.starts_with("Shard worker panicked")),
            "expected a panic anomaly, got {unexpecteds:?}"
        );
    }
}
