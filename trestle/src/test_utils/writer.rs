//! Recording writer with scriptable failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{TrestleError, TrestleResult};
use crate::types::Mutation;
use crate::writer::SpannerWriter;

/// Writer that records every applied mutation and can be scripted to fail.
///
/// Failures are scripted against 1-based `apply` call numbers, so a test can
/// fail exactly the second write of a sequence. Unscripted calls succeed.
/// Retry behavior stays observable: `apply_calls` minus the number of
/// recorded mutations is the number of failed attempts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWriter {
    inner: Arc<Mutex<ScriptedWriterInner>>,
}

#[derive(Debug, Default)]
struct ScriptedWriterInner {
    mutations: Vec<Mutation>,
    failures: HashMap<usize, TrestleError>,
    apply_calls: usize,
}

impl ScriptedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a failure for the given 1-based `apply` call number.
    pub fn fail_call(&self, call: usize, error: TrestleError) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.insert(call, error);
    }

    /// Every successfully applied mutation, in order.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.inner.lock().unwrap().mutations.clone()
    }

    /// Number of successfully applied mutations.
    pub fn applied_len(&self) -> usize {
        self.inner.lock().unwrap().mutations.len()
    }

    /// Total `apply` calls, including failed ones.
    pub fn apply_calls(&self) -> usize {
        self.inner.lock().unwrap().apply_calls
    }
}

impl SpannerWriter for ScriptedWriter {
    async fn apply(&self, mutation: Mutation) -> TrestleResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.apply_calls += 1;

        let call = inner.apply_calls;
        if let Some(error) = inner.failures.remove(&call) {
            return Err(error);
        }

        inner.mutations.push(mutation);
        Ok(())
    }
}
