use std::sync::{Arc, Mutex};

use taskdispatch::batch::plan::{self, PlannedBatch};
use taskdispatch::batch::BatchGraph;
use taskdispatch::errors::{DispatchError, Result};
use taskdispatch::exec::Backend;

/// A fake backend that:
/// - records the plan it was handed, one entry per `run_batches` call
/// - executes nothing.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    received: Arc<Mutex<Vec<Vec<PlannedBatch>>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of what was received, usable after the backend has been
    /// boxed into a dispatcher.
    pub fn received(&self) -> Arc<Mutex<Vec<Vec<PlannedBatch>>>> {
        Arc::clone(&self.received)
    }

    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl Backend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn run_batches(&mut self, graph: &mut BatchGraph) -> Result<()> {
        let planned = plan::describe(graph)?;
        self.received.lock().unwrap().push(planned);
        Ok(())
    }
}

/// A backend whose every `run_batches` call fails.
#[derive(Debug, Clone, Default)]
pub struct FailingBackend {
    calls: Arc<Mutex<usize>>,
}

impl FailingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.calls)
    }
}

impl Backend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn run_batches(&mut self, _graph: &mut BatchGraph) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        Err(DispatchError::backend(
            "failing",
            anyhow::anyhow!("farm rejected the job"),
        ))
    }
}
