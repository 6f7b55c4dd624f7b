// src/exec/backend.rs

//! Pluggable dispatch backends.
//!
//! A backend receives the finished batch graph (immediate batches already
//! executed and pruned) and is responsible for actually running it.
//!
//! - [`LocalBackend`] runs every batch in-process, pre-tasks first.
//! - [`NullBackend`] only logs the plan. Useful for dry runs.
//!
//! Tests provide their own implementations that record what they were given.

use tracing::{debug, info};

use crate::batch::plan;
use crate::batch::{BatchGraph, BatchId};
use crate::context::ContextValue;
use crate::errors::Result;

/// Blind-data key marking batches already run by [`LocalBackend`].
pub const LOCAL_EXECUTED: &str = "local:executed";

/// Trait abstracting how a batch graph is executed.
pub trait Backend: Send {
    /// Name the backend is registered under.
    fn name(&self) -> &str;

    /// Run every batch reachable from the graph's root.
    ///
    /// The graph is handed over mutably so backends can attach blind data
    /// to batches. An error fails the whole dispatch.
    fn run_batches(&mut self, graph: &mut BatchGraph) -> Result<()>;
}

/// Runs batches synchronously in the current process.
#[derive(Debug, Default)]
pub struct LocalBackend {
    batches_run: usize,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches this backend has executed, across dispatches.
    pub fn batches_run(&self) -> usize {
        self.batches_run
    }

    fn run_batch(&mut self, graph: &mut BatchGraph, id: BatchId) -> Result<()> {
        if graph.batch(id).blind_data().contains_key(LOCAL_EXECUTED) {
            return Ok(());
        }

        let pre_tasks = graph.batch(id).pre_tasks().to_vec();
        for pre in pre_tasks {
            self.run_batch(graph, pre)?;
        }

        let batch = graph.batch(id);
        if !batch.is_root() && !batch.is_executed() && !batch.frames().is_empty() {
            graph.execute(id)?;
            self.batches_run += 1;
        }

        graph
            .batch_mut(id)
            .blind_data_mut()
            .insert(LOCAL_EXECUTED.to_string(), ContextValue::Bool(true));
        Ok(())
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn run_batches(&mut self, graph: &mut BatchGraph) -> Result<()> {
        let before = self.batches_run;
        let root = graph.root();
        self.run_batch(graph, root)?;
        info!(batches = self.batches_run - before, "local dispatch finished");
        Ok(())
    }
}

/// Executes nothing; logs the plan it would have run.
#[derive(Debug, Default)]
pub struct NullBackend;

impl Backend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn run_batches(&mut self, graph: &mut BatchGraph) -> Result<()> {
        let planned = plan::describe(graph)?;
        debug!(batches = planned.len(), "null backend received plan");
        for line in plan::render(&planned).lines() {
            info!("{line}");
        }
        Ok(())
    }
}
