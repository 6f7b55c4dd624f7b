// src/batch/task_batch.rs

//! Batches and the arena that owns them.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::context::{Context, ContextValue};
use crate::errors::{DispatchError, Result};
use crate::task::{NodeRef, TaskRequest};

/// Handle to a batch inside its [`BatchGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub(crate) usize);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Frames of one task in one context, executed together.
#[derive(Debug)]
pub struct TaskBatch {
    /// `None` only for the root batch.
    pub(crate) request: Option<TaskRequest>,
    pub(crate) frames: Vec<f32>,
    pub(crate) pre_tasks: Vec<BatchId>,
    pub(crate) pre_task_set: HashSet<BatchId>,
    /// Number of requests placed in this batch, no-ops included.
    pub(crate) size: usize,
    pub(crate) post_task_index: usize,
    pub(crate) immediate: bool,
    pub(crate) visited: bool,
    pub(crate) executed: bool,
    blind_data: BTreeMap<String, ContextValue>,
}

impl TaskBatch {
    pub(crate) fn root() -> Self {
        Self {
            request: None,
            frames: Vec::new(),
            pre_tasks: Vec::new(),
            pre_task_set: HashSet::new(),
            size: 0,
            post_task_index: 0,
            immediate: false,
            visited: false,
            executed: false,
            blind_data: BTreeMap::new(),
        }
    }

    /// A new batch for `request`, whose context is stored without its frame.
    pub(crate) fn for_request(request: &TaskRequest) -> Self {
        let batch_request = TaskRequest::new(
            request.node().clone(),
            request.context().without_frame(),
        );
        Self {
            request: Some(batch_request),
            ..Self::root()
        }
    }

    pub fn node(&self) -> Option<&NodeRef> {
        self.request.as_ref().map(TaskRequest::node)
    }

    /// The batch context. Never contains a frame.
    pub fn context(&self) -> Option<&Context> {
        self.request.as_ref().map(TaskRequest::context)
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn pre_tasks(&self) -> &[BatchId] {
        &self.pre_tasks
    }

    pub fn is_root(&self) -> bool {
        self.request.is_none()
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Name of the batch's task, or `"<root>"`.
    pub fn label(&self) -> &str {
        self.node().map(|n| n.name()).unwrap_or("<root>")
    }

    pub fn blind_data(&self) -> &BTreeMap<String, ContextValue> {
        &self.blind_data
    }

    pub fn blind_data_mut(&mut self) -> &mut BTreeMap<String, ContextValue> {
        &mut self.blind_data
    }

    pub(crate) fn remove_pre_task_at(&mut self, index: usize) {
        let removed = self.pre_tasks.remove(index);
        self.pre_task_set.remove(&removed);
        if index < self.post_task_index {
            self.post_task_index -= 1;
        }
    }
}

/// Arena of batches built for a single dispatch.
///
/// Batch `#0` is always the root: it has no task and no frames, and its
/// pre-tasks are the entry points of the plan.
#[derive(Debug)]
pub struct BatchGraph {
    batches: Vec<TaskBatch>,
}

impl Default for BatchGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchGraph {
    pub fn new() -> Self {
        Self {
            batches: vec![TaskBatch::root()],
        }
    }

    pub fn root(&self) -> BatchId {
        BatchId(0)
    }

    /// Total number of batches ever created, root and pruned batches
    /// included.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.len() <= 1
    }

    pub fn batch(&self, id: BatchId) -> &TaskBatch {
        &self.batches[id.0]
    }

    pub fn batch_mut(&mut self, id: BatchId) -> &mut TaskBatch {
        &mut self.batches[id.0]
    }

    pub(crate) fn insert(&mut self, batch: TaskBatch) -> BatchId {
        let id = BatchId(self.batches.len());
        self.batches.push(batch);
        id
    }

    /// Every batch reachable from the root, in depth-first pre-order,
    /// root first.
    pub fn reachable(&self) -> Vec<BatchId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![self.root()];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            for pre in self.batch(id).pre_tasks.iter().rev() {
                stack.push(*pre);
            }
        }

        order
    }

    /// Execute a batch's frames as one sequence.
    ///
    /// Empty batches (the root, no-ops, or batches that only exist to carry
    /// post-task edges) succeed without calling the task.
    pub fn execute(&self, id: BatchId) -> Result<()> {
        let batch = self.batch(id);
        let Some(request) = batch.request.as_ref() else {
            return Ok(());
        };
        if batch.frames.is_empty() {
            return Ok(());
        }

        debug!(
            batch = %id,
            task = %request.node().name(),
            frames = ?batch.frames,
            "executing batch"
        );

        request
            .execute_frames(&batch.frames)
            .map_err(|source| DispatchError::Execution {
                task: request.node().name().to_string(),
                source,
            })
    }
}
