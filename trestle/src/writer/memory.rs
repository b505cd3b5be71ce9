use std::sync::{Arc, Mutex};

use tracing::info;

use crate::error::TrestleResult;
use crate::types::Mutation;
use crate::writer::SpannerWriter;

/// In-memory writer for testing and development.
///
/// Stores every applied mutation in arrival order so tests can assert on the
/// exact write sequence. All data is lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    mutations: Arc<Mutex<Vec<Mutation>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every mutation applied so far, in order.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    /// Number of mutations applied so far.
    pub fn len(&self) -> usize {
        self.mutations.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpannerWriter for MemoryWriter {
    async fn apply(&self, mutation: Mutation) -> TrestleResult<()> {
        info!(table = mutation.table(), "applying mutation in memory");

        let mut mutations = self.mutations.lock().unwrap();
        mutations.push(mutation);

        Ok(())
    }
}
